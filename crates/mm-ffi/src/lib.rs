mod error;
mod types;

pub use error::*;
pub use types::*;

use std::ffi::CString;
use std::os::raw::c_char;

use mm_core::{KernelKind, MatmulDims, MatmulKernel, Shape};
use tracing::debug;

/// Execute a closure that returns an `MMStatus`, catching any panics
/// and converting them into `MMStatus::ErrorInternal`.
fn catch_panic<F: FnOnce() -> MMStatus + std::panic::UnwindSafe>(f: F) -> MMStatus {
    match std::panic::catch_unwind(f) {
        Ok(status) => status,
        Err(_) => {
            set_last_error("internal panic".to_string());
            MMStatus::ErrorInternal
        }
    }
}

/// Copy `ndim` dimension sizes out of a caller-owned array.
///
/// # Safety
/// `dims` must point at `ndim` readable `usize` values (or be anything when
/// `ndim == 0`).
unsafe fn read_shape(dims: *const usize, ndim: usize) -> Shape {
    if ndim == 0 {
        return Shape::new(vec![]);
    }
    Shape::new(std::slice::from_raw_parts(dims, ndim).to_vec())
}

/// Validate the three views, zero-fill C, then run the selected kernel.
///
/// # Safety
/// Every non-null pointer must be valid for the sizes its shape describes,
/// and C must not alias A or B.
unsafe fn run(kind: KernelKind, a: MMTensorView, b: MMTensorView, c: MMTensorViewMut) -> MMStatus {
    let shapes_missing = [(a.ndim, a.shape), (b.ndim, b.shape), (c.ndim, c.shape)]
        .iter()
        .any(|&(ndim, shape)| ndim > 0 && shape.is_null());
    if a.data.is_null() || b.data.is_null() || c.data.is_null() || shapes_missing {
        set_last_error("null argument".to_string());
        return MMStatus::ErrorInvalidArgument;
    }

    let a_shape = read_shape(a.shape, a.ndim);
    let b_shape = read_shape(b.shape, b.ndim);
    let c_shape = read_shape(c.shape, c.ndim);

    let dims = match MatmulDims::from_shapes(&a_shape, &b_shape)
        .and_then(|dims| dims.check_output(&c_shape).map(|()| dims))
    {
        Ok(dims) => dims,
        Err(e) => return fail(e),
    };
    let kernel = kind.kernel(dims, None);
    if let Err(e) = kernel.validate(dims) {
        return fail(e);
    }

    let a = std::slice::from_raw_parts(a.data, dims.m * dims.k);
    let b = std::slice::from_raw_parts(b.data, dims.k * dims.n);
    let c = std::slice::from_raw_parts_mut(c.data, dims.m * dims.n);

    debug!(kernel = kernel.name(), %dims, "ffi matmul");
    c.fill(0.0);
    kernel.accumulate(a, b, c, dims);
    MMStatus::Ok
}

/// Compute `C = A @ B` with the naive triple-loop kernel.
///
/// A must be `[m, k]`, B `[k, n]` and C `[m, n]`, all row-major f32. C is
/// zero-filled and written only after every check passes; on error it is
/// left untouched and `mm_last_error` describes the failure.
///
/// # Safety
/// Each view's `shape` must point at `ndim` sizes and its `data` at the
/// number of elements they describe. C must not overlap A or B.
#[no_mangle]
pub unsafe extern "C" fn mm_matmul_naive(
    a: MMTensorView,
    b: MMTensorView,
    c: MMTensorViewMut,
) -> MMStatus {
    catch_panic(|| unsafe { run(KernelKind::Naive, a, b, c) })
}

/// Compute `C = A @ B` with the cache-blocked kernel.
///
/// Same contract as [`mm_matmul_naive`]; the tiling is derived from the
/// operand dimensions.
///
/// # Safety
/// Same requirements as [`mm_matmul_naive`].
#[no_mangle]
pub unsafe extern "C" fn mm_matmul_blocked(
    a: MMTensorView,
    b: MMTensorView,
    c: MMTensorViewMut,
) -> MMStatus {
    catch_panic(|| unsafe { run(KernelKind::Blocked, a, b, c) })
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error on this
/// thread, or null if no error has occurred. The caller must free the
/// returned string with `mm_free_string`.
#[no_mangle]
pub extern "C" fn mm_last_error() -> *mut c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null_mut(),
    }
}

/// Free a string previously returned by `mm_last_error`.
///
/// # Safety
/// `s` must be null or a pointer obtained from `mm_last_error`.
#[no_mangle]
pub unsafe extern "C" fn mm_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn view(data: &[f32], shape: &[usize]) -> MMTensorView {
        MMTensorView {
            data: data.as_ptr(),
            ndim: shape.len(),
            shape: shape.as_ptr(),
        }
    }

    fn view_mut(data: &mut [f32], shape: &[usize]) -> MMTensorViewMut {
        MMTensorViewMut {
            data: data.as_mut_ptr(),
            ndim: shape.len(),
            shape: shape.as_ptr(),
        }
    }

    fn last_error() -> String {
        let ptr = mm_last_error();
        assert!(!ptr.is_null());
        let msg = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        unsafe { mm_free_string(ptr) };
        msg
    }

    #[test]
    fn test_both_entry_points_compute() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [5.0, 6.0, 7.0, 8.0];
        let dims = [2usize, 2];
        for entry in [mm_matmul_naive, mm_matmul_blocked] {
            // Stale contents must be cleared before accumulation.
            let mut c = [100.0f32; 4];
            let status = unsafe { entry(view(&a, &dims), view(&b, &dims), view_mut(&mut c, &dims)) };
            assert_eq!(status, MMStatus::Ok);
            assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
        }
    }

    #[test]
    fn test_inner_dimension_mismatch() {
        let a = [0.0f32; 6];
        let b = [0.0f32; 8];
        let mut c = [7.0f32; 6];
        let status = unsafe {
            mm_matmul_blocked(view(&a, &[2, 3]), view(&b, &[4, 2]), view_mut(&mut c, &[2, 2]))
        };
        assert_eq!(status, MMStatus::ErrorShapeMismatch);
        assert_eq!(c, [7.0; 6]);
        assert!(last_error().contains("shape mismatch"));
    }

    #[test]
    fn test_output_shape_mismatch() {
        let a = [0.0f32; 4];
        let b = [0.0f32; 4];
        let mut c = [7.0f32; 4];
        let status = unsafe {
            mm_matmul_naive(view(&a, &[2, 2]), view(&b, &[2, 2]), view_mut(&mut c, &[4, 1]))
        };
        assert_eq!(status, MMStatus::ErrorShapeMismatch);
        assert_eq!(c, [7.0; 4]);
    }

    #[test]
    fn test_unaddressable_shape() {
        let a = [0.0f32; 4];
        let b = [0.0f32; 4];
        let mut c = [7.0f32; 4];
        let huge = usize::MAX / 2;
        let a_dims = [huge, 4];
        let c_dims = [huge, 1];
        let status = unsafe {
            mm_matmul_blocked(view(&a, &a_dims), view(&b, &[4, 1]), view_mut(&mut c, &c_dims))
        };
        assert_eq!(status, MMStatus::ErrorShapeMismatch);
        assert_eq!(c, [7.0; 4]);
        assert!(last_error().contains("shape mismatch for A"));
    }

    #[test]
    fn test_rank_mismatch() {
        let a = [0.0f32; 8];
        let b = [0.0f32; 4];
        let mut c = [0.0f32; 4];
        let status = unsafe {
            mm_matmul_naive(view(&a, &[2, 2, 2]), view(&b, &[2, 2]), view_mut(&mut c, &[2, 2]))
        };
        assert_eq!(status, MMStatus::ErrorRankMismatch);
        assert!(last_error().contains("rank mismatch for A"));
    }

    #[test]
    fn test_null_arguments() {
        let b = [0.0f32; 4];
        let mut c = [0.0f32; 4];
        let dims = [2usize, 2];
        let a = MMTensorView {
            data: std::ptr::null(),
            ndim: 2,
            shape: dims.as_ptr(),
        };
        let status = unsafe { mm_matmul_naive(a, view(&b, &dims), view_mut(&mut c, &dims)) };
        assert_eq!(status, MMStatus::ErrorInvalidArgument);
        assert_eq!(last_error(), "null argument");
        assert!(mm_last_error().is_null());
    }

    #[test]
    fn test_free_null_is_noop() {
        unsafe { mm_free_string(std::ptr::null_mut()) };
    }
}
