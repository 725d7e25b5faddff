use crate::error::{MatmulError, Operand, Result};
use std::fmt;

/// A tensor shape, wrapping a vector of dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from a vector of dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Shorthand for a 2-D `[rows, cols]` shape.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Shape {
            dims: vec![rows, cols],
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns a reference to the underlying dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Interpret this shape as a matrix, returning `(rows, cols)`.
    ///
    /// # Errors
    /// Returns `RankMismatch` tagged with `operand` if the shape is not 2-D.
    pub fn as_matrix(&self, operand: Operand) -> Result<(usize, usize)> {
        match self.dims.as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            _ => Err(MatmulError::RankMismatch {
                operand,
                ndim: self.ndim(),
            }),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// Problem dimensions of `C[m, n] = A[m, k] @ B[k, n]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatmulDims {
    pub m: usize,
    pub k: usize,
    pub n: usize,
}

impl MatmulDims {
    pub const fn new(m: usize, k: usize, n: usize) -> Self {
        MatmulDims { m, k, n }
    }

    /// The `size`³ cube.
    pub const fn square(size: usize) -> Self {
        MatmulDims {
            m: size,
            k: size,
            n: size,
        }
    }

    /// Derive the problem dimensions from the two operand shapes.
    ///
    /// Both shapes must be 2-D and A's column count must equal B's row count.
    pub fn from_shapes(a: &Shape, b: &Shape) -> Result<Self> {
        let (m, k) = a.as_matrix(Operand::A)?;
        let (k2, n) = b.as_matrix(Operand::B)?;
        if k != k2 {
            return Err(MatmulError::ShapeMismatch {
                operand: Operand::B,
                expected: vec![k, n],
                got: vec![k2, n],
            });
        }
        element_count(Operand::A, m, k)?;
        element_count(Operand::B, k, n)?;
        element_count(Operand::C, m, n)?;
        Ok(MatmulDims { m, k, n })
    }

    /// Shape of A, `[m, k]`.
    pub fn a_shape(&self) -> Shape {
        Shape::matrix(self.m, self.k)
    }

    /// Shape of B, `[k, n]`.
    pub fn b_shape(&self) -> Shape {
        Shape::matrix(self.k, self.n)
    }

    /// Shape of C, `[m, n]`.
    pub fn c_shape(&self) -> Shape {
        Shape::matrix(self.m, self.n)
    }

    /// Check that an output shape is exactly `[m, n]`.
    pub fn check_output(&self, c: &Shape) -> Result<()> {
        let (rows, cols) = c.as_matrix(Operand::C)?;
        if (rows, cols) != (self.m, self.n) {
            return Err(MatmulError::ShapeMismatch {
                operand: Operand::C,
                expected: vec![self.m, self.n],
                got: vec![rows, cols],
            });
        }
        Ok(())
    }

    /// Check flat buffer lengths against the dimensions.
    ///
    /// A length mismatch is reported as `ShapeMismatch` with the expected and
    /// actual element counts.
    pub fn check_buffers(&self, a_len: usize, b_len: usize, c_len: usize) -> Result<()> {
        let expected = [
            (Operand::A, element_count(Operand::A, self.m, self.k)?, a_len),
            (Operand::B, element_count(Operand::B, self.k, self.n)?, b_len),
            (Operand::C, element_count(Operand::C, self.m, self.n)?, c_len),
        ];
        for (operand, want, got) in expected {
            if want != got {
                return Err(MatmulError::ShapeMismatch {
                    operand,
                    expected: vec![want],
                    got: vec![got],
                });
            }
        }
        Ok(())
    }

    /// Floating point operations of one multiply (one mul and one add per term).
    pub fn flops(&self) -> u64 {
        2 * (self.m as u64) * (self.n as u64) * (self.k as u64)
    }
}

/// Largest element count an f32 slice can hold.
const MAX_ELEMENTS: usize = isize::MAX as usize / std::mem::size_of::<f32>();

/// Element count of a `[rows, cols]` operand.
///
/// A count too large for any f32 buffer is reported as `ShapeMismatch`
/// with an empty expected shape.
fn element_count(operand: Operand, rows: usize, cols: usize) -> Result<usize> {
    rows.checked_mul(cols)
        .filter(|&count| count <= MAX_ELEMENTS)
        .ok_or_else(|| MatmulError::ShapeMismatch {
            operand,
            expected: vec![],
            got: vec![rows, cols],
        })
}

impl fmt::Display for MatmulDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}x{}] @ [{}x{}]", self.m, self.k, self.k, self.n)
    }
}
