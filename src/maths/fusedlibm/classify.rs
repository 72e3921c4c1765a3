use super::bits::biased_exp;

pub const FP_NAN: i32 = 0;
pub const FP_INFINITE: i32 = 1;
pub const FP_ZERO: i32 = 2;
pub const FP_SUBNORMAL: i32 = 3;
pub const FP_NORMAL: i32 = 4;

pub(crate) const EXP_SAT: i32 = 0x7ff;
pub(crate) const EXP_BIAS: i32 = 1023;
pub(crate) const MANT_DIG: i32 = 53;

#[inline(always)]
pub fn isfinite(x: f64) -> bool {
    let u = x.to_bits();
    (u & 0x7ff0_0000_0000_0000u64) != 0x7ff0_0000_0000_0000u64
}

#[inline(always)]
pub fn isinf(x: f64) -> bool {
    let u = x.to_bits();
    (u & 0x7fff_ffff_ffff_ffffu64) == 0x7ff0_0000_0000_0000u64
}

#[inline(always)]
pub fn isnan(x: f64) -> bool {
    let u = x.to_bits();
    (u & 0x7ff0_0000_0000_0000u64) == 0x7ff0_0000_0000_0000u64
        && (u & 0x000f_ffff_ffff_ffffu64) != 0
}

#[inline(always)]
pub fn signbit(x: f64) -> bool {
    (x.to_bits() >> 63) != 0
}

#[inline(always)]
pub fn fpclassify(x: f64) -> i32 {
    let u = x.to_bits();
    let e = (u >> 52) & 0x7ff;
    let mant = u & 0x000f_ffff_ffff_ffffu64;
    if e == 0x7ff {
        if mant == 0 { FP_INFINITE } else { FP_NAN }
    } else if e == 0 {
        if mant == 0 { FP_ZERO } else { FP_SUBNORMAL }
    } else {
        FP_NORMAL
    }
}

/// Execution path for one fused multiply-add, decided once per call from
/// the operand exponent fields (plus the zero tests the exponent fields
/// cannot express). The variants are mutually exclusive and total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Route {
    /// NaN/Inf operand, a zero operand, certain overflow, or a product so
    /// small that only its sign can influence the result.
    Special,
    /// x*y close to overflow: scale the product down, widen at the end.
    ProductDown,
    /// z close to overflow: scale everything down, widen at the end.
    AddendDown,
    /// x huge against a small y: move 2^53 from x to y, product unchanged.
    RebalanceX,
    /// y huge against a small x: mirror image.
    RebalanceY,
    /// x*y in or near the subnormal range: scale up, narrow at the end.
    ProductUp,
    /// Every intermediate fits comfortably; no rescaling.
    Direct,
}

/// Thresholds use non-strict comparison so an exponent exactly at a
/// boundary takes the rescaling path, never the naive one.
#[inline(always)]
pub(crate) fn route(x: f64, y: f64, z: f64) -> Route {
    let ex = biased_exp(x.to_bits());
    let ey = biased_exp(y.to_bits());
    let ez = biased_exp(z.to_bits());

    let coarse = ex + ey >= EXP_SAT + EXP_BIAS - MANT_DIG
        || ex >= EXP_SAT - MANT_DIG
        || ey >= EXP_SAT - MANT_DIG
        || ez >= EXP_SAT - MANT_DIG
        || ex + ey <= EXP_BIAS + MANT_DIG;
    if !coarse {
        return Route::Direct;
    }
    if ex == EXP_SAT
        || ey == EXP_SAT
        || ez == EXP_SAT
        || x == 0.0
        || y == 0.0
        || z == 0.0
        || ex + ey > EXP_SAT + EXP_BIAS
        || ex + ey < EXP_BIAS - MANT_DIG - 2
    {
        Route::Special
    } else if ex + ey >= EXP_SAT + EXP_BIAS - MANT_DIG {
        Route::ProductDown
    } else if ez >= EXP_SAT - MANT_DIG {
        Route::AddendDown
    } else if ex >= EXP_SAT - MANT_DIG {
        Route::RebalanceX
    } else if ey >= EXP_SAT - MANT_DIG {
        Route::RebalanceY
    } else {
        // Reaching here the coarse test can only have fired on the
        // small-product disjunct.
        Route::ProductUp
    }
}
