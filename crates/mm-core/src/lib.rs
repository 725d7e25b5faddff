//! `mm-core` - Dense f32 matrix multiplication kernels for tiled-matmul.
//!
//! This crate provides:
//! - A `MatmulKernel` trait shared by every kernel
//! - `NaiveMatmul`, the m-n-k triple loop used as the correctness baseline
//! - `BlockedMatmul`, a three-level tiled loop nest with the A load hoisted
//!   out of the innermost sweep, optionally parallel over row bands
//! - Tile arithmetic (`AxisTiling`, `TileConfig`) and loop-nest descriptions
//! - Shape validation and a `Tensor` boundary type

pub mod backend;
pub mod cpu;
pub mod error;
pub mod ops;
pub mod schedule;
pub mod shape;
pub mod tensor;
pub mod tiling;

// Re-export primary types at the crate root for convenience.
pub use backend::MatmulKernel;
pub use cpu::{BlockedMatmul, NaiveMatmul};
pub use error::{MatmulError, Operand, Result};
pub use ops::{matmul_blocked, matmul_naive, matmul_with, KernelKind};
pub use schedule::LoopNest;
pub use shape::{MatmulDims, Shape};
pub use tensor::Tensor;
pub use tiling::{Axis, AxisTiling, TileConfig, TileCoord, TileTargets};

/// Side length of the reference problem instance.
pub const REFERENCE_SIZE: usize = 1024;
