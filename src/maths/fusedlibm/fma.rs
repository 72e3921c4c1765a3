//! Fused multiply-add with a single rounding.
//!
//! Software rendition of the glibc dbl-64 algorithm: Dekker product
//! splitting and Knuth two-sum produce exact residuals, which are folded
//! under round-toward-zero with the low bit forced to odd whenever the
//! fold was inexact. Rounding a round-to-odd value to nearest afterwards
//! is equivalent to rounding the exact sum directly, so no double
//! rounding can occur (Boldo & Melquiond). Operands whose exponents put
//! any intermediate at risk are rescaled by exact powers of two first and
//! the result corrected once at the end.

use super::bits::{biased_exp, mantissa, sign_bit, SIGN_MASK};
use super::classify::{route, signbit, Route, EXP_BIAS, EXP_SAT};
use super::fenv;
use super::scaling::{prescale, Prescaled, TWO53, TWO54, TWOM108, TWOM54};
use super::utils::{two_prod, two_sum};

const MIN_SUBNORMAL: f64 = f64::from_bits(1);

/// Force the low mantissa bit when the fold was inexact. NaN and Inf
/// keep their payloads.
#[inline(always)]
fn force_odd(u: f64, inexact: bool) -> f64 {
    let bits = u.to_bits();
    if inexact && bits & 1 == 0 && biased_exp(bits) != EXP_SAT {
        f64::from_bits(bits | 1)
    } else {
        u
    }
}

/// Paths where the composed algorithm is unnecessary or unusable: the
/// hardware multiply/add rules already produce the IEEE-correct answer.
#[cold]
fn special(x: f64, y: f64, z: f64) -> f64 {
    let ex = biased_exp(x.to_bits());
    let ey = biased_exp(y.to_bits());
    let ez = biased_exp(z.to_bits());

    // An infinite addend with finite factors wins no matter how large the
    // product is; summing this way cannot manufacture a spurious NaN from
    // an overflowed product.
    if ez == EXP_SAT && ex != EXP_SAT && ey != EXP_SAT {
        return (z + x) + y;
    }
    // An exact zero sum takes its sign from the product alone, even when
    // the product underflows to zero.
    if z == 0.0 && x != 0.0 && y != 0.0 {
        return x * y;
    }
    // NaN/Inf propagation and zero products.
    if ex == EXP_SAT || ey == EXP_SAT || x == 0.0 || y == 0.0 {
        return x * y + z;
    }
    // The true product exceeds the finite range whatever z contributes.
    if ex + ey > EXP_SAT + EXP_BIAS {
        return x * y;
    }
    // |x*y| is below a quarter of the smallest subnormal: only its sign
    // and inexactness can influence the result.
    let tiny = if signbit(x) != signbit(y) {
        -MIN_SUBNORMAL
    } else {
        MIN_SUBNORMAL
    };
    if ez >= 3 {
        return tiny + z;
    }
    // z itself is (near-)subnormal: widen so the sticky contribution of
    // the product survives the rounding, then narrow exactly once more.
    (z * TWO54 + tiny) * TWOM54
}

/// Fused multiply-add: x * y + z computed as if with unbounded
/// intermediate precision and rounded once to nearest-even, per the
/// IEEE-754-2008 fusedMultiplyAdd contract. The caller's rounding mode
/// and sticky exception flags are preserved; flags the operation itself
/// raises (invalid, overflow, underflow, inexact) are merged in.
pub fn fma(x: f64, y: f64, z: f64) -> f64 {
    let r = route(x, y, z);
    if r == Route::Special {
        return special(x, y, z);
    }
    let Prescaled { x, y, z, adjust } = prescale(r, x, y, z);

    // Multiplication m1 + m2 = x * y using Dekker's algorithm.
    let (m1, m2) = two_prod(x, y);
    // Addition a1 + a2 = z + m1 using Knuth's algorithm.
    let (a1, a2) = two_sum(z, m1);

    // An exact zero sum keeps the sign the naive addition gives it.
    if a1 == 0.0 && m2 == 0.0 {
        return z + m1;
    }

    // Fold the two residuals with round to odd; for the narrowing path
    // the truncated total a1 + u is formed in the same guarded window.
    let folded = fenv::fold_residuals(a1, a2, m2, adjust < 0);

    if adjust == 0 {
        return a1 + force_odd(folded.u, folded.inexact);
    }
    if adjust > 0 {
        return (a1 + force_odd(folded.u, folded.inexact)) * TWO53;
    }

    // Narrowing by 2^-108: the scale itself must carry the one rounding.
    let u = folded.u;
    let v = folded.v;
    if !folded.inexact {
        return v * TWOM108;
    }
    let vb = v.to_bits();
    let ve = biased_exp(vb);
    if ve > 108 {
        // The narrowed result is normal: rounding the sum directly is the
        // single rounding.
        return (a1 + u) * TWOM108;
    }
    if ve == 108 {
        // The scale shifts exactly one mantissa bit out. Round the low
        // two bits to odd by hand and add the exact parts back together.
        let tail = ((mantissa(vb) & 3) << 1) | 1;
        let low = f64::from_bits(((sign_bit(vb) as u64) * SIGN_MASK) | tail);
        let body = f64::from_bits(vb & !3u64);
        return body * TWOM108 + low * 0.25;
    }
    // Deep subnormal: the truncated total becomes the round-to-odd value.
    f64::from_bits(vb | 1) * TWOM108
}
