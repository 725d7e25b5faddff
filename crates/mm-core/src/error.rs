use std::fmt;

use thiserror::Error;

use crate::tiling::{Axis, AxisTiling};

/// Which of the three matmul buffers an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    A,
    B,
    C,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::A => write!(f, "A"),
            Operand::B => write!(f, "B"),
            Operand::C => write!(f, "C"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatmulError {
    #[error("shape mismatch for {operand}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        operand: Operand,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("rank mismatch for {operand}: expected 2 dimensions, got {ndim}")]
    RankMismatch { operand: Operand, ndim: usize },
    #[error("invalid tiling for axis {axis}: {tiling} does not cover extent {extent}")]
    InvalidTiling {
        axis: Axis,
        tiling: AxisTiling,
        extent: usize,
    },
    #[error("invalid tiling {0:?}: expected OUTERxMIDDLExINNER")]
    ParseTiling(String),
}

pub type Result<T> = std::result::Result<T, MatmulError>;
