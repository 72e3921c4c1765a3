//! Exponent pre-scaling for the fused multiply-add, plus the exact
//! power-of-two rescale primitive.

use super::bits::{biased_exp, offset_exp};
use super::classify::{Route, MANT_DIG};

pub(crate) const TWO53: f64 = f64::from_bits(0x4340_0000_0000_0000); // 2^53
pub(crate) const TWO54: f64 = f64::from_bits(0x4350_0000_0000_0000); // 2^54
pub(crate) const TWOM54: f64 = f64::from_bits(0x3c90_0000_0000_0000); // 2^-54
pub(crate) const TWO108: f64 = f64::from_bits(0x46b0_0000_0000_0000); // 2^108
pub(crate) const TWOM108: f64 = f64::from_bits(0x3930_0000_0000_0000); // 2^-108

/// Operands after pre-scaling. `adjust` records the single exact
/// correction applied after composition: +1 widens by 2^53, -1 narrows by
/// 2^-108, 0 leaves the result untouched.
pub(crate) struct Prescaled {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub adjust: i32,
}

/// Shift operand exponents so no intermediate of the Dekker/Knuth chain
/// can overflow or fall into the subnormal range. Exponent-field
/// arithmetic cannot express a subnormal adjustment, so subnormal
/// operands are scaled by an exact power-of-two multiply instead.
pub(crate) fn prescale(route: Route, x: f64, y: f64, z: f64) -> Prescaled {
    let ex = biased_exp(x.to_bits());
    let ey = biased_exp(y.to_bits());
    let ez = biased_exp(z.to_bits());
    match route {
        Route::ProductDown => {
            let (x, y) = if ex > ey {
                (offset_exp(x, -MANT_DIG), y)
            } else {
                (x, offset_exp(y, -MANT_DIG))
            };
            // A small addend is already below one ulp of the scaled
            // product; leaving it alone only perturbs the sticky bit.
            let z = if ez > MANT_DIG {
                offset_exp(z, -MANT_DIG)
            } else {
                z
            };
            Prescaled { x, y, z, adjust: 1 }
        }
        Route::AddendDown => {
            let (x, y) = if ex > ey {
                if ex > MANT_DIG {
                    (offset_exp(x, -MANT_DIG), y)
                } else {
                    (x, y)
                }
            } else if ey > MANT_DIG {
                (x, offset_exp(y, -MANT_DIG))
            } else {
                (x, y)
            };
            Prescaled {
                x,
                y,
                z: offset_exp(z, -MANT_DIG),
                adjust: 1,
            }
        }
        Route::RebalanceX => {
            let y = if ey != 0 {
                offset_exp(y, MANT_DIG)
            } else {
                y * TWO53
            };
            Prescaled {
                x: offset_exp(x, -MANT_DIG),
                y,
                z,
                adjust: 0,
            }
        }
        Route::RebalanceY => {
            let x = if ex != 0 {
                offset_exp(x, MANT_DIG)
            } else {
                x * TWO53
            };
            Prescaled {
                x,
                y: offset_exp(y, -MANT_DIG),
                z,
                adjust: 0,
            }
        }
        Route::ProductUp => {
            let (x, y) = if ex > ey {
                (offset_exp(x, 2 * MANT_DIG + 2), y)
            } else {
                (x, offset_exp(y, 2 * MANT_DIG + 2))
            };
            if ez <= 4 * MANT_DIG + 6 {
                let z = if ez != 0 {
                    offset_exp(z, 2 * MANT_DIG + 2)
                } else {
                    z * TWO108
                };
                Prescaled { x, y, z, adjust: -1 }
            } else {
                // The addend dominates; the scaled-up product only feeds
                // the sticky bit and the rounding direction.
                Prescaled { x, y, z, adjust: 0 }
            }
        }
        Route::Direct | Route::Special => Prescaled { x, y, z, adjust: 0 },
    }
}

/// scalbn(x, n): multiply by 2^n with correct overflow, underflow and
/// subnormal behavior, without calling any libm.
#[inline(always)]
pub fn scalbn(mut x: f64, n: i32) -> f64 {
    const HUGE: f64 = 1.0e300;
    const TINY: f64 = 1.0e-300;

    if n == 0 {
        return x;
    }

    let mut ix = x.to_bits();
    let mut k = ((ix >> 52) & 0x7ff) as i32;
    if k == 0 {
        if (ix & 0x000f_ffff_ffff_ffff) == 0 {
            return x;
        }
        x *= TWO54;
        ix = x.to_bits();
        k = ((ix >> 52) & 0x7ff) as i32 - 54;
    }
    if k == 0x7ff {
        return x + x;
    }
    if n < -50000 {
        return TINY * if x.is_sign_negative() { -TINY } else { TINY };
    }
    if n > 50000 || (k as i64 + n as i64) > 0x7fe {
        return HUGE * if x.is_sign_negative() { -HUGE } else { HUGE };
    }

    k += n;
    if k > 0 {
        return f64::from_bits((ix & 0x800f_ffff_ffff_ffffu64) | ((k as u64) << 52));
    }
    if k <= -54 {
        return TINY * if x.is_sign_negative() { -TINY } else { TINY };
    }
    k += 54;
    let res_bits = (ix & 0x800f_ffff_ffff_ffffu64) | ((k as u64) << 52);
    f64::from_bits(res_bits) * TWOM54
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusedlibm::bits::assemble;

    #[test]
    fn test_scalbn() {
        let values = [
            (1.0, 1),
            (1.0, -1),
            (1.0, 10),
            (1.0, -10),
            (std::f64::consts::PI, 5),
            (std::f64::consts::PI, -5),
            (1e-300, 10),
            (1e-300, -10),
        ];
        for &(x, n) in &values {
            let actual = scalbn(x, n);
            let expected = x * 2.0f64.powi(n);
            assert_eq!(
                actual.to_bits(),
                expected.to_bits(),
                "scalbn({x}, {n}) failed: got {actual}, expected {expected}"
            );
        }
    }

    #[test]
    fn scalbn_extremes() {
        assert_eq!(scalbn(1.0, 2000), f64::INFINITY);
        assert_eq!(scalbn(-1.0, 2000), f64::NEG_INFINITY);
        assert_eq!(scalbn(1.0, -2000), 0.0);
        assert!(scalbn(-1.0, -2000).is_sign_negative());
        assert_eq!(scalbn(f64::from_bits(1), 1), f64::from_bits(2));
        assert_eq!(scalbn(1.0, -1074), f64::from_bits(1));
        assert_eq!(scalbn(f64::INFINITY, -10), f64::INFINITY);
        assert!(scalbn(f64::NAN, 10).is_nan());
        assert_eq!(scalbn(0.0, 100).to_bits(), 0.0f64.to_bits());
        assert_eq!(scalbn(-0.0, 100).to_bits(), (-0.0f64).to_bits());
    }

    #[test]
    fn prescale_preserves_the_scaled_identity() {
        // ProductDown: result of x*y+z equals 2^53 * (x'*y' + z') when all
        // quantities stay exact.
        let x = assemble(false, 2040, 0);
        let y = assemble(false, 1000, 0);
        let z = assemble(false, 2000, 0);
        let p = prescale(Route::ProductDown, x, y, z);
        assert_eq!(p.adjust, 1);
        assert_eq!(p.x * TWO53, x);
        assert_eq!(p.y, y);
        assert_eq!(p.z * TWO53, z);

        // Rebalance keeps the product bit-for-bit identical.
        let x = assemble(false, 2000, 0x42);
        let y = assemble(false, 500, 0x17);
        let p = prescale(Route::RebalanceX, x, y, 1.0);
        assert_eq!(p.adjust, 0);
        assert_eq!(p.x * p.y, x * y);

        // Rebalance against a subnormal partner scales by multiplication.
        let y = f64::from_bits(3);
        let p = prescale(Route::RebalanceX, x, y, 1.0);
        assert_eq!(p.y, y * TWO53);

        // ProductUp with a tiny addend narrows at the end.
        let x = assemble(false, 500, 0x1);
        let y = assemble(false, 500, 0x3);
        let z = assemble(false, 100, 0);
        let p = prescale(Route::ProductUp, x, y, z);
        assert_eq!(p.adjust, -1);
        assert_eq!(p.z, z * TWO108);

        // ProductUp with a dominating addend leaves z and adjust alone.
        let z = assemble(false, 300, 0);
        let p = prescale(Route::ProductUp, x, y, z);
        assert_eq!(p.adjust, 0);
        assert_eq!(p.z, z);
    }
}
