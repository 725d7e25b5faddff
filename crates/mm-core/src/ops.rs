//! Named entry points over [`Tensor`].
//!
//! `matmul_naive` and `matmul_blocked` share one contract: both operands
//! must be 2-D with `a.cols == b.rows`, and the result is a freshly
//! zero-filled `[a.rows, b.cols]` tensor. They differ only in speed.

use std::fmt;
use std::str::FromStr;

use crate::backend::MatmulKernel;
use crate::cpu::{BlockedMatmul, NaiveMatmul};
use crate::error::Result;
use crate::shape::MatmulDims;
use crate::tensor::Tensor;
use crate::tiling::TileConfig;

/// Selects one of the kernel implementations by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    Naive,
    Blocked,
    BlockedParallel,
}

impl KernelKind {
    pub const ALL: [KernelKind; 3] = [
        KernelKind::Naive,
        KernelKind::Blocked,
        KernelKind::BlockedParallel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KernelKind::Naive => "naive",
            KernelKind::Blocked => "blocked",
            KernelKind::BlockedParallel => "blocked-par",
        }
    }

    /// Build a kernel for `dims`. Blocked kinds derive their tiling from the
    /// dimensions unless `tiles` is given.
    pub fn kernel(&self, dims: MatmulDims, tiles: Option<TileConfig>) -> Box<dyn MatmulKernel> {
        let tiles = tiles.unwrap_or_else(|| TileConfig::for_dims(dims));
        match self {
            KernelKind::Naive => Box::new(NaiveMatmul),
            KernelKind::Blocked => Box::new(BlockedMatmul::new(tiles)),
            KernelKind::BlockedParallel => Box::new(BlockedMatmul::new(tiles).parallel(true)),
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KernelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        KernelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                format!("unknown kernel {s:?} (expected naive, blocked or blocked-par)")
            })
    }
}

/// `a @ b` with the given kernel kind.
pub fn matmul_with(kind: KernelKind, a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let dims = MatmulDims::from_shapes(a.shape(), b.shape())?;
    a.matmul(b, kind.kernel(dims, None).as_ref())
}

/// `a @ b` with the triple-loop kernel.
pub fn matmul_naive(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    matmul_with(KernelKind::Naive, a, b)
}

/// `a @ b` with the blocked kernel, tiled for the operand dimensions.
pub fn matmul_blocked(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    matmul_with(KernelKind::Blocked, a, b)
}
