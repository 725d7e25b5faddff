//! Multi-level tile arithmetic.
//!
//! Each logical axis of the iteration space (`m`, `n`, `k`) is split into a
//! chain of three radices, `outer x middle x inner`, whose product is the
//! axis extent. A linear index maps to a [`TileCoord`] and back with
//!
//! ```text
//! index = outer * (middle_count * inner_count) + middle * inner_count + inner
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{MatmulError, Result};
use crate::shape::MatmulDims;

/// A logical axis of the matmul iteration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Rows of A and C.
    M,
    /// Columns of B and C.
    N,
    /// Reduction axis: columns of A, rows of B.
    K,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::M => write!(f, "m"),
            Axis::N => write!(f, "n"),
            Axis::K => write!(f, "k"),
        }
    }
}

/// Position of an index inside the three block levels of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub outer: usize,
    pub middle: usize,
    pub inner: usize,
}

/// Radix chain for one axis: `outer` blocks of `middle` sub-blocks of
/// `inner` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisTiling {
    pub outer: usize,
    pub middle: usize,
    pub inner: usize,
}

impl AxisTiling {
    pub const fn new(outer: usize, middle: usize, inner: usize) -> Self {
        AxisTiling {
            outer,
            middle,
            inner,
        }
    }

    /// A single block covering the whole axis.
    pub const fn untiled(extent: usize) -> Self {
        AxisTiling::new(1, 1, extent)
    }

    /// Derive a valid radix chain for `extent`.
    ///
    /// `inner` is the largest divisor of `extent` not above `inner_target`,
    /// `middle` the largest divisor of the remaining quotient not above
    /// `middle_target`, and `outer` whatever is left.
    pub fn fit(extent: usize, inner_target: usize, middle_target: usize) -> Self {
        if extent == 0 {
            return AxisTiling::new(1, 1, 0);
        }
        let inner = largest_divisor_at_most(extent, inner_target);
        let rest = extent / inner;
        let middle = largest_divisor_at_most(rest, middle_target);
        AxisTiling::new(rest / middle, middle, inner)
    }

    /// Number of indices covered by the chain.
    pub const fn extent(&self) -> usize {
        self.outer * self.middle * self.inner
    }

    /// [`extent`](Self::extent), or `None` if the product overflows `usize`.
    pub fn checked_extent(&self) -> Option<usize> {
        self.outer
            .checked_mul(self.middle)
            .and_then(|block| block.checked_mul(self.inner))
    }

    /// Indices spanned by one outer block.
    pub const fn block(&self) -> usize {
        self.middle * self.inner
    }

    /// Rebuild the linear index from block coordinates.
    #[inline(always)]
    pub const fn compose(&self, outer: usize, middle: usize, inner: usize) -> usize {
        outer * (self.middle * self.inner) + middle * self.inner + inner
    }

    /// Split a linear index into block coordinates.
    ///
    /// `index` must be below [`extent`](Self::extent).
    pub fn decompose(&self, index: usize) -> TileCoord {
        debug_assert!(index < self.extent());
        let block = self.block();
        let rem = index % block;
        TileCoord {
            outer: index / block,
            middle: rem / self.inner,
            inner: rem % self.inner,
        }
    }

    /// Check that the chain covers exactly `extent` indices of `axis`.
    pub fn validate(&self, axis: Axis, extent: usize) -> Result<()> {
        if self.checked_extent() != Some(extent) {
            return Err(MatmulError::InvalidTiling {
                axis,
                tiling: *self,
                extent,
            });
        }
        Ok(())
    }
}

fn largest_divisor_at_most(value: usize, cap: usize) -> usize {
    (1..=cap.min(value))
        .rev()
        .find(|d| value % d == 0)
        .unwrap_or(1)
}

impl fmt::Display for AxisTiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.outer, self.middle, self.inner)
    }
}

impl FromStr for AxisTiling {
    type Err = MatmulError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('x').collect();
        let radices = parts
            .iter()
            .map(|p| p.trim().parse::<usize>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| MatmulError::ParseTiling(s.to_string()))?;
        match radices.as_slice() {
            &[outer, middle, inner] => Ok(AxisTiling::new(outer, middle, inner)),
            _ => Err(MatmulError::ParseTiling(s.to_string())),
        }
    }
}

/// Preferred `(inner, middle)` radices per axis, used by [`TileConfig::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileTargets {
    pub m: (usize, usize),
    pub n: (usize, usize),
    pub k: (usize, usize),
}

impl TileTargets {
    /// Targets that reproduce [`TileConfig::REFERENCE`] on the 1024 cube.
    pub const REFERENCE: TileTargets = TileTargets {
        m: (32, 8),
        n: (128, 2),
        k: (32, 8),
    };
}

impl Default for TileTargets {
    fn default() -> Self {
        TileTargets::REFERENCE
    }
}

/// Tiling of all three axes for the blocked kernel.
///
/// The m and k axes share a chain while n uses a wider inner run, so a
/// full n_inner sweep reuses one hoisted A element over a long contiguous
/// row of B and C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileConfig {
    pub m: AxisTiling,
    pub n: AxisTiling,
    pub k: AxisTiling,
}

impl TileConfig {
    /// Tiling of the 1024 cube: m and k `4x8x32`, n `4x2x128`.
    pub const REFERENCE: TileConfig = TileConfig {
        m: AxisTiling::new(4, 8, 32),
        n: AxisTiling::new(4, 2, 128),
        k: AxisTiling::new(4, 8, 32),
    };

    pub const fn new(m: AxisTiling, n: AxisTiling, k: AxisTiling) -> Self {
        TileConfig { m, n, k }
    }

    /// Derive a tiling for `dims` from the reference targets.
    pub fn for_dims(dims: MatmulDims) -> Self {
        TileConfig::fit(dims, &TileTargets::REFERENCE)
    }

    /// Derive a tiling for `dims` from explicit targets.
    pub fn fit(dims: MatmulDims, targets: &TileTargets) -> Self {
        TileConfig {
            m: AxisTiling::fit(dims.m, targets.m.0, targets.m.1),
            n: AxisTiling::fit(dims.n, targets.n.0, targets.n.1),
            k: AxisTiling::fit(dims.k, targets.k.0, targets.k.1),
        }
    }

    /// Returns the tiling of `axis`.
    pub fn axis(&self, axis: Axis) -> &AxisTiling {
        match axis {
            Axis::M => &self.m,
            Axis::N => &self.n,
            Axis::K => &self.k,
        }
    }

    /// Problem dimensions covered by this tiling.
    pub fn dims(&self) -> MatmulDims {
        MatmulDims::new(self.m.extent(), self.k.extent(), self.n.extent())
    }

    /// Check that every axis covers its dimension exactly.
    pub fn validate(&self, dims: MatmulDims) -> Result<()> {
        self.m.validate(Axis::M, dims.m)?;
        self.n.validate(Axis::N, dims.n)?;
        self.k.validate(Axis::K, dims.k)?;
        debug!(tiles = %self, %dims, "validated tiling");
        Ok(())
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        TileConfig::REFERENCE
    }
}

impl fmt::Display for TileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m={} n={} k={}", self.m, self.n, self.k)
    }
}
