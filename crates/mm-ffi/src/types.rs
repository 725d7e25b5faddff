use mm_core::MatmulError;

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MMStatus {
    Ok = 0,
    /// Null pointer or unusable tiling.
    ErrorInvalidArgument = 1,
    /// `A.cols != B.rows`, or C is not `[A.rows, B.cols]`.
    ErrorShapeMismatch = 2,
    /// An operand is not 2-dimensional.
    ErrorRankMismatch = 3,
    ErrorInternal = 4,
}

impl From<&MatmulError> for MMStatus {
    fn from(err: &MatmulError) -> Self {
        match err {
            MatmulError::ShapeMismatch { .. } => MMStatus::ErrorShapeMismatch,
            MatmulError::RankMismatch { .. } => MMStatus::ErrorRankMismatch,
            MatmulError::InvalidTiling { .. } | MatmulError::ParseTiling(_) => {
                MMStatus::ErrorInvalidArgument
            }
        }
    }
}

/// Read-only row-major f32 tensor owned by the caller.
///
/// `shape` points at `ndim` dimension sizes; `data` at their product of
/// elements.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MMTensorView {
    pub data: *const f32,
    pub ndim: usize,
    pub shape: *const usize,
}

/// Writable row-major f32 tensor owned by the caller, used for the output.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MMTensorViewMut {
    pub data: *mut f32,
    pub ndim: usize,
    pub shape: *const usize,
}
