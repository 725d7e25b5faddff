//! Cache-blocked matmul.
//!
//! Loop nest, outermost to innermost:
//!
//! ```text
//! m_outer, n_outer, k_outer, m_middle, n_middle, k_middle, m_inner, k_inner, n_inner
//! ```
//!
//! `A[m][k]` depends only on the m and k loops, so it is loaded once above
//! the n_inner sweep and reused for the whole contiguous run of B and C.
//! For a fixed output element the k indices are visited in ascending
//! order, the same order the naive kernel uses.

use rayon::prelude::*;

use crate::backend::MatmulKernel;
use crate::error::Result;
use crate::shape::MatmulDims;
use crate::tiling::TileConfig;

/// Tiled kernel driven by a [`TileConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedMatmul {
    tiles: TileConfig,
    parallel: bool,
}

impl BlockedMatmul {
    pub fn new(tiles: TileConfig) -> Self {
        BlockedMatmul {
            tiles,
            parallel: false,
        }
    }

    /// Blocked kernel with a tiling derived for `dims`.
    pub fn for_dims(dims: MatmulDims) -> Self {
        BlockedMatmul::new(TileConfig::for_dims(dims))
    }

    /// Process the m_outer row bands of C on the rayon pool.
    ///
    /// Bands write disjoint rows, and each band runs the same nest, so the
    /// result is identical to the serial kernel.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn tiles(&self) -> &TileConfig {
        &self.tiles
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }
}

impl Default for BlockedMatmul {
    fn default() -> Self {
        BlockedMatmul::new(TileConfig::REFERENCE)
    }
}

impl MatmulKernel for BlockedMatmul {
    fn name(&self) -> &str {
        if self.parallel {
            "blocked-par"
        } else {
            "blocked"
        }
    }

    fn validate(&self, dims: MatmulDims) -> Result<()> {
        self.tiles.validate(dims)
    }

    fn accumulate(&self, a: &[f32], b: &[f32], c: &mut [f32], dims: MatmulDims) {
        if self.parallel {
            par_matmul_blocked(a, b, c, dims, &self.tiles);
        } else {
            matmul_blocked(a, b, c, dims, &self.tiles);
        }
    }
}

/// `C += A @ B` over the tiled loop nest.
///
/// `tiles` must cover `dims` exactly (see [`TileConfig::validate`]).
pub fn matmul_blocked(a: &[f32], b: &[f32], c: &mut [f32], dims: MatmulDims, tiles: &TileConfig) {
    let band = tiles.m.block() * dims.n;
    if band == 0 {
        return;
    }
    for (m_outer, c_band) in c.chunks_mut(band).take(tiles.m.outer).enumerate() {
        accumulate_band(a, b, c_band, m_outer, dims, tiles);
    }
}

/// Same as [`matmul_blocked`], with one rayon task per m_outer band.
pub fn par_matmul_blocked(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    dims: MatmulDims,
    tiles: &TileConfig,
) {
    let band = tiles.m.block() * dims.n;
    if band == 0 {
        return;
    }
    c.par_chunks_mut(band)
        .take(tiles.m.outer)
        .enumerate()
        .for_each(|(m_outer, c_band)| accumulate_band(a, b, c_band, m_outer, dims, tiles));
}

/// Everything below the m_outer loop. `c_band` holds the rows of C owned
/// by block `m_outer`.
fn accumulate_band(
    a: &[f32],
    b: &[f32],
    c_band: &mut [f32],
    m_outer: usize,
    dims: MatmulDims,
    tiles: &TileConfig,
) {
    let MatmulDims {
        k: k_dim, n: n_dim, ..
    } = dims;
    let TileConfig { m: tm, n: tn, k: tk } = *tiles;

    for n_outer in 0..tn.outer {
        for k_outer in 0..tk.outer {
            for m_middle in 0..tm.middle {
                for n_middle in 0..tn.middle {
                    let n0 = tn.compose(n_outer, n_middle, 0);
                    for k_middle in 0..tk.middle {
                        for m_inner in 0..tm.inner {
                            let m = tm.compose(m_outer, m_middle, m_inner);
                            let a_row = &a[m * k_dim..(m + 1) * k_dim];
                            let c_off = tm.compose(0, m_middle, m_inner) * n_dim + n0;
                            let c_run = &mut c_band[c_off..c_off + tn.inner];
                            for k_inner in 0..tk.inner {
                                let k = tk.compose(k_outer, k_middle, k_inner);
                                // hoisted out of the n_inner sweep
                                let a_mk = a_row[k];
                                let b_off = k * n_dim + n0;
                                let b_run = &b[b_off..b_off + tn.inner];
                                for (c_mn, &b_kn) in c_run.iter_mut().zip(b_run) {
                                    *c_mn += a_mk * b_kn;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::naive::matmul_naive;
    use crate::error::MatmulError;
    use crate::tiling::{Axis, AxisTiling};

    fn pattern(len: usize, modulus: usize) -> Vec<f32> {
        (0..len).map(|i| (i % modulus) as f32 - 3.0).collect()
    }

    fn run_both(dims: MatmulDims, tiles: TileConfig) -> (Vec<f32>, Vec<f32>) {
        let a = pattern(dims.m * dims.k, 7);
        let b = pattern(dims.k * dims.n, 5);
        let mut naive = vec![0.0; dims.m * dims.n];
        let mut blocked = vec![0.0; dims.m * dims.n];
        matmul_naive(&a, &b, &mut naive, dims);
        matmul_blocked(&a, &b, &mut blocked, dims, &tiles);
        (naive, blocked)
    }

    #[test]
    fn test_matmul_basic() {
        let kernel = BlockedMatmul::for_dims(MatmulDims::square(2));
        let c = kernel
            .matmul(&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0], MatmulDims::square(2))
            .unwrap();
        assert_eq!(c, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matches_naive_on_uneven_tiling() {
        let tiles = TileConfig::new(
            AxisTiling::new(2, 3, 2),
            AxisTiling::new(3, 1, 4),
            AxisTiling::new(1, 5, 2),
        );
        let (naive, blocked) = run_both(tiles.dims(), tiles);
        // Small integers: every partial sum is exact.
        assert_eq!(naive, blocked);
    }

    #[test]
    fn test_matches_naive_with_derived_tiling() {
        for dims in [
            MatmulDims::new(64, 96, 256),
            MatmulDims::new(13, 17, 19),
            MatmulDims::new(1, 300, 1),
        ] {
            let (naive, blocked) = run_both(dims, TileConfig::for_dims(dims));
            assert_eq!(naive, blocked, "dims {dims}");
        }
    }

    #[test]
    fn test_every_output_gets_full_reduction() {
        // With all-ones inputs, C[m][n] counts how many k terms reached it.
        let tiles = TileConfig::REFERENCE;
        let dims = tiles.dims();
        let a = vec![1.0; dims.m * dims.k];
        let b = vec![1.0; dims.k * dims.n];
        let mut c = vec![0.0; dims.m * dims.n];
        matmul_blocked(&a, &b, &mut c, dims, &tiles);
        assert!(c.iter().all(|&v| v == dims.k as f32));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let tiles = TileConfig::new(
            AxisTiling::new(4, 2, 8),
            AxisTiling::new(2, 2, 16),
            AxisTiling::new(2, 4, 8),
        );
        let dims = tiles.dims();
        let a = pattern(dims.m * dims.k, 11);
        let b = pattern(dims.k * dims.n, 13);
        let serial = BlockedMatmul::new(tiles).matmul(&a, &b, dims).unwrap();
        let parallel = BlockedMatmul::new(tiles)
            .parallel(true)
            .matmul(&a, &b, dims)
            .unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_kernel_names() {
        assert_eq!(BlockedMatmul::default().name(), "blocked");
        assert_eq!(BlockedMatmul::default().parallel(true).name(), "blocked-par");
    }

    #[test]
    fn test_rejects_tiling_for_other_dims() {
        let kernel = BlockedMatmul::default();
        let dims = MatmulDims::new(512, 1024, 1024);
        let a = vec![0.0; dims.m * dims.k];
        let b = vec![0.0; dims.k * dims.n];
        let mut c = vec![5.0; dims.m * dims.n];
        let err = kernel.matmul_into(&a, &b, &mut c, dims).unwrap_err();
        assert!(matches!(err, MatmulError::InvalidTiling { axis: Axis::M, .. }));
        assert!(c.iter().all(|&v| v == 5.0));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rejects_wrapping_tiling() {
        let dims = MatmulDims::square(8);
        let tiles = TileConfig::new(
            AxisTiling::new(8, 1, 1),
            AxisTiling::new(9223372036854775812, 2, 1),
            AxisTiling::new(8, 1, 1),
        );
        let a = vec![1.0; 64];
        let b = vec![1.0; 64];
        let mut c = vec![5.0; 64];
        let err = BlockedMatmul::new(tiles)
            .matmul_into(&a, &b, &mut c, dims)
            .unwrap_err();
        assert!(matches!(err, MatmulError::InvalidTiling { axis: Axis::N, .. }));
        assert!(c.iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_empty_dims_are_noop() {
        let dims = MatmulDims::new(0, 4, 4);
        let kernel = BlockedMatmul::for_dims(dims);
        let c = kernel.matmul(&[], &[0.0; 16], dims).unwrap();
        assert!(c.is_empty());
    }
}
