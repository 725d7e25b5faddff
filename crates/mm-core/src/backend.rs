use std::fmt::Debug;

use tracing::{debug, warn};

use crate::error::Result;
use crate::shape::MatmulDims;

/// Trait for interchangeable matmul kernels (naive, blocked, ...).
///
/// All kernels share one contract: row-major f32 buffers, `a` of shape
/// [m, k], `b` of shape [k, n], and `c` of shape [m, n] receiving `C += A @ B`.
/// Different kernels differ only in iteration order and speed.
pub trait MatmulKernel: Send + Sync + Debug {
    /// Returns the name of this kernel (e.g., "naive", "blocked").
    fn name(&self) -> &str;

    /// Kernel-specific precondition check for `dims`.
    ///
    /// Buffer lengths are checked separately by [`matmul_into`](Self::matmul_into).
    fn validate(&self, _dims: MatmulDims) -> Result<()> {
        Ok(())
    }

    /// Accumulate `A @ B` into `c`.
    ///
    /// This is the hot path and performs no validation of its own; callers
    /// must have checked buffer lengths and run [`validate`](Self::validate).
    ///
    /// # Panics
    /// Panics on out-of-range slice indexing if the buffers are shorter than
    /// `dims` requires.
    fn accumulate(&self, a: &[f32], b: &[f32], c: &mut [f32], dims: MatmulDims);

    /// Validated `C += A @ B` into a caller-supplied buffer.
    ///
    /// On error, `c` is left untouched.
    fn matmul_into(&self, a: &[f32], b: &[f32], c: &mut [f32], dims: MatmulDims) -> Result<()> {
        dims.check_buffers(a.len(), b.len(), c.len())
            .and_then(|()| self.validate(dims))
            .inspect_err(|e| warn!(kernel = self.name(), error = %e, "rejected matmul"))?;
        debug!(kernel = self.name(), %dims, "dispatching matmul");
        self.accumulate(a, b, c, dims);
        Ok(())
    }

    /// Matrix multiplication: C = A @ B into a freshly zeroed buffer.
    fn matmul(&self, a: &[f32], b: &[f32], dims: MatmulDims) -> Result<Vec<f32>> {
        let mut c = vec![0.0f32; dims.m * dims.n];
        self.matmul_into(a, b, &mut c, dims)?;
        Ok(c)
    }
}
