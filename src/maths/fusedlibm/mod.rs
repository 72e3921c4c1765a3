//! Correctly rounded fused multiply-add and its support routines.
//!
//! The core algorithm follows glibc's dbl-64 fma (Dekker splitting,
//! Knuth two-sum, round-to-odd residual folding) expressed over explicit
//! bit-pattern accessors instead of overlapping storage. The numeric
//! string parser lives alongside but shares no state with the fused
//! operations.

mod bits;
mod classify;
pub mod fenv;
mod fma;
mod fmaf;
mod scaling;
mod strtod;
mod utils;

pub use classify::{
    fpclassify, isfinite, isinf, isnan, signbit, FP_INFINITE, FP_NAN, FP_NORMAL, FP_SUBNORMAL,
    FP_ZERO,
};
pub use fma::fma;
pub use fmaf::fmaf;
pub use scaling::scalbn;
pub use strtod::{parse, parse_in, Locale};
