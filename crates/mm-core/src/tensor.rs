use crate::backend::MatmulKernel;
use crate::error::Result;
use crate::shape::{MatmulDims, Shape};

/// Owned row-major f32 data with a shape of any rank.
///
/// This is the checked boundary around the kernels: rank and shape errors
/// are reported here, before any computation starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Shape,
}

impl Tensor {
    /// Create a new tensor from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor { data, shape }
    }

    /// Create a zero-filled tensor with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        Tensor {
            data: vec![0.0; shape.numel()],
            shape,
        }
    }

    /// The `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Tensor {
            data,
            shape: Shape::matrix(n, n),
        }
    }

    /// Build a tensor by evaluating `f` at every flat index.
    pub fn from_fn(shape: Shape, f: impl FnMut(usize) -> f32) -> Self {
        let data = (0..shape.numel()).map(f).collect();
        Tensor { data, shape }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Matrix multiplication of two 2D tensors with the given kernel.
    ///
    /// self is [m, k], other is [k, n], result is a fresh [m, n] tensor.
    pub fn matmul(&self, other: &Tensor, kernel: &dyn MatmulKernel) -> Result<Tensor> {
        let dims = MatmulDims::from_shapes(&self.shape, &other.shape)?;
        let data = kernel.matmul(&self.data, &other.data, dims)?;
        Ok(Tensor::new(data, dims.c_shape()))
    }

    /// Accumulate `self @ other` into `out`, which must be [m, n].
    ///
    /// `out` is normally zero-filled by the caller. It is left untouched if
    /// any check fails.
    pub fn matmul_into(
        &self,
        other: &Tensor,
        out: &mut Tensor,
        kernel: &dyn MatmulKernel,
    ) -> Result<()> {
        let dims = MatmulDims::from_shapes(&self.shape, &other.shape)?;
        dims.check_output(&out.shape)?;
        kernel.matmul_into(&self.data, &other.data, &mut out.data, dims)
    }
}
