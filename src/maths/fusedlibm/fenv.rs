//! Scoped access to the ambient floating-point environment.
//!
//! The round-to-odd residual fold needs one addition performed under
//! round-toward-zero while observing the inexact flag, without disturbing
//! what the caller can see: the rounding mode must be restored on every
//! exit path and newly raised sticky flags merged (not overwritten) into
//! the caller's set. `FeGuard` models that as an RAII acquisition whose
//! `Drop` performs the restore-and-merge.
//!
//! Backends: the x86_64 MXCSR and the aarch64 FPCR/FPSR, both of which
//! are thread-private, so concurrent calls need no coordination. On other
//! targets (or under the `soft-fenv` feature) there is no ambient state
//! to guard; the fold is emulated from the exact two-sum residual, which
//! assumes the Rust default round-to-nearest environment.

use super::utils::two_sum;

/// Outcome of the guarded residual fold.
///
/// `u` is a2 + m2 rounded toward zero (already forced to odd when
/// `narrow` was requested), `v` is a1 + u rounded toward zero (narrowing
/// only), and `inexact` is the sticky inexact state accumulated across
/// the folds.
pub(crate) struct Folded {
    pub u: f64,
    pub v: f64,
    pub inexact: bool,
}

#[cfg(all(target_arch = "x86_64", not(feature = "soft-fenv")))]
mod imp {
    use super::Folded;
    use core::arch::asm;

    const RC_MASK: u32 = 0x6000; // rounding-control field
    const RC_ZERO: u32 = 0x6000; // round toward zero
    const EXC_FLAGS: u32 = 0x003f; // sticky exception flags
    const EXC_MASKS: u32 = 0x1f80; // exception mask bits
    const INEXACT: u32 = 0x0020;

    // ldmxcsr/addsd modify MXCSR status bits, so none of these blocks may
    // claim to preserve flags; that is also what keeps them ordered.
    #[inline(always)]
    fn read_mxcsr() -> u32 {
        let mut csr: u32 = 0;
        unsafe {
            asm!("stmxcsr [{0}]", in(reg) &mut csr as *mut u32, options(nostack));
        }
        csr
    }

    #[inline(always)]
    fn write_mxcsr(csr: u32) {
        unsafe {
            asm!("ldmxcsr [{0}]", in(reg) &csr as *const u32, options(nostack));
        }
    }

    struct FeGuard {
        saved: u32,
    }

    impl FeGuard {
        /// Save the environment, clear the sticky flags, mask traps and
        /// install round-toward-zero.
        #[inline(always)]
        fn hold_toward_zero() -> Self {
            let saved = read_mxcsr();
            write_mxcsr((saved & !(RC_MASK | EXC_FLAGS)) | RC_ZERO | EXC_MASKS);
            FeGuard { saved }
        }

        #[inline(always)]
        fn inexact(&self) -> bool {
            read_mxcsr() & INEXACT != 0
        }

        /// Addition as an opaque instruction: the compiler cannot move it
        /// across the control-word writes.
        #[inline(always)]
        fn add(&self, a: f64, b: f64) -> f64 {
            let mut r = a;
            unsafe {
                asm!("addsd {0}, {1}", inout(xmm_reg) r, in(xmm_reg) b, options(nostack));
            }
            r
        }
    }

    impl Drop for FeGuard {
        #[inline(always)]
        fn drop(&mut self) {
            let raised = read_mxcsr() & EXC_FLAGS;
            write_mxcsr(self.saved | raised);
        }
    }

    /// Arguments are evaluated before the call and the call is opaque to
    /// the optimizer, so the surrounding error-free transforms and the
    /// final combination stay outside the round-toward-zero window.
    #[inline(never)]
    pub(crate) fn fold_residuals(a1: f64, a2: f64, m2: f64, narrow: bool) -> Folded {
        let guard = FeGuard::hold_toward_zero();
        let mut u = guard.add(a2, m2);
        let mut v = 0.0;
        if narrow {
            if guard.inexact() {
                u = f64::from_bits(u.to_bits() | 1);
            }
            v = guard.add(a1, u);
        }
        let inexact = guard.inexact();
        drop(guard);
        Folded { u, v, inexact }
    }

    /// (control, sticky flags) of the ambient environment.
    pub fn snapshot() -> (u64, u64) {
        let csr = read_mxcsr();
        ((csr & !EXC_FLAGS) as u64, (csr & EXC_FLAGS) as u64)
    }
}

#[cfg(all(target_arch = "aarch64", not(feature = "soft-fenv")))]
mod imp {
    use super::Folded;
    use core::arch::asm;

    const RMODE_MASK: u64 = 0x00c0_0000; // FPCR.RMode
    const RMODE_ZERO: u64 = 0x00c0_0000; // round toward zero
    const EXC_FLAGS: u64 = 0x0000_009f; // FPSR cumulative flags
    const INEXACT: u64 = 0x0000_0010; // FPSR.IXC

    // msr fpsr/fadd modify the FPSR status bits, so none of these blocks
    // may claim to preserve flags; that is also what keeps them ordered.
    #[inline(always)]
    fn read_fpcr() -> u64 {
        let r: u64;
        unsafe {
            asm!("mrs {0}, fpcr", out(reg) r, options(nostack));
        }
        r
    }

    #[inline(always)]
    fn write_fpcr(v: u64) {
        unsafe {
            asm!("msr fpcr, {0}", in(reg) v, options(nostack));
        }
    }

    #[inline(always)]
    fn read_fpsr() -> u64 {
        let r: u64;
        unsafe {
            asm!("mrs {0}, fpsr", out(reg) r, options(nostack));
        }
        r
    }

    #[inline(always)]
    fn write_fpsr(v: u64) {
        unsafe {
            asm!("msr fpsr, {0}", in(reg) v, options(nostack));
        }
    }

    struct FeGuard {
        saved_fpcr: u64,
        saved_fpsr: u64,
    }

    impl FeGuard {
        #[inline(always)]
        fn hold_toward_zero() -> Self {
            let saved_fpcr = read_fpcr();
            let saved_fpsr = read_fpsr();
            write_fpcr((saved_fpcr & !RMODE_MASK) | RMODE_ZERO);
            write_fpsr(saved_fpsr & !EXC_FLAGS);
            FeGuard {
                saved_fpcr,
                saved_fpsr,
            }
        }

        #[inline(always)]
        fn inexact(&self) -> bool {
            read_fpsr() & INEXACT != 0
        }

        #[inline(always)]
        fn add(&self, a: f64, b: f64) -> f64 {
            let r: f64;
            unsafe {
                asm!("fadd {0:d}, {1:d}, {2:d}", out(vreg) r, in(vreg) a, in(vreg) b, options(nostack));
            }
            r
        }
    }

    impl Drop for FeGuard {
        #[inline(always)]
        fn drop(&mut self) {
            let raised = read_fpsr() & EXC_FLAGS;
            write_fpcr(self.saved_fpcr);
            write_fpsr(self.saved_fpsr | raised);
        }
    }

    /// Arguments are evaluated before the call and the call is opaque to
    /// the optimizer, so the surrounding error-free transforms and the
    /// final combination stay outside the round-toward-zero window.
    #[inline(never)]
    pub(crate) fn fold_residuals(a1: f64, a2: f64, m2: f64, narrow: bool) -> Folded {
        let guard = FeGuard::hold_toward_zero();
        let mut u = guard.add(a2, m2);
        let mut v = 0.0;
        if narrow {
            if guard.inexact() {
                u = f64::from_bits(u.to_bits() | 1);
            }
            v = guard.add(a1, u);
        }
        let inexact = guard.inexact();
        drop(guard);
        Folded { u, v, inexact }
    }

    /// (control, sticky flags) of the ambient environment.
    pub fn snapshot() -> (u64, u64) {
        (read_fpcr(), read_fpsr() & EXC_FLAGS)
    }
}

#[cfg(any(
    feature = "soft-fenv",
    not(any(target_arch = "x86_64", target_arch = "aarch64"))
))]
mod imp {
    use super::{add_toward_zero, Folded};

    pub(crate) fn fold_residuals(a1: f64, a2: f64, m2: f64, narrow: bool) -> Folded {
        let (mut u, mut inexact) = add_toward_zero(a2, m2);
        let mut v = 0.0;
        if narrow {
            if inexact {
                u = f64::from_bits(u.to_bits() | 1);
            }
            let (w, ix) = add_toward_zero(a1, u);
            v = w;
            inexact |= ix;
        }
        Folded { u, v, inexact }
    }

    /// No ambient environment to observe on this backend.
    pub fn snapshot() -> (u64, u64) {
        (0, 0)
    }
}

/// Round-toward-zero addition recovered from the round-to-nearest sum and
/// its exact residual. Used by the emulated backend; an inexact sum that
/// rounded away from zero is stepped one ulp back.
#[allow(dead_code)]
#[inline(always)]
fn add_toward_zero(a: f64, b: f64) -> (f64, bool) {
    let (s, err) = two_sum(a, b);
    if err == 0.0 {
        return (s, false);
    }
    if !s.is_finite() {
        return (s, true);
    }
    if (err > 0.0) != (s > 0.0) {
        // Stepping the magnitude down crosses neither zero nor infinity.
        return (f64::from_bits(s.to_bits() - 1), true);
    }
    (s, true)
}

pub(crate) use imp::fold_residuals;
pub use imp::snapshot;
