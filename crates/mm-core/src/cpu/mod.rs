//! Pure-Rust CPU kernels.

pub mod blocked;
pub mod naive;

pub use blocked::{matmul_blocked, par_matmul_blocked, BlockedMatmul};
pub use naive::{matmul_naive, NaiveMatmul};
