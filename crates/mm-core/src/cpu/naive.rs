use crate::backend::MatmulKernel;
use crate::shape::MatmulDims;

/// Reference triple-loop kernel.
///
/// Loops run m, n, k from outermost to innermost and every iteration does
/// one multiply and one accumulate straight into C. Intended as the
/// correctness baseline for the blocked kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveMatmul;

impl NaiveMatmul {
    pub fn new() -> Self {
        NaiveMatmul
    }
}

impl MatmulKernel for NaiveMatmul {
    fn name(&self) -> &str {
        "naive"
    }

    fn accumulate(&self, a: &[f32], b: &[f32], c: &mut [f32], dims: MatmulDims) {
        matmul_naive(a, b, c, dims);
    }
}

/// `C += A @ B` with the m-n-k loop order.
pub fn matmul_naive(a: &[f32], b: &[f32], c: &mut [f32], dims: MatmulDims) {
    let MatmulDims { m, k, n } = dims;
    for i in 0..m {
        for j in 0..n {
            for p in 0..k {
                c[i * n + j] += a[i * k + p] * b[p * n + j];
            }
        }
    }
}
