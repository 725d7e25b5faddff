use std::cell::RefCell;
use std::ffi::CString;

use mm_core::MatmulError;
use tracing::warn;

use crate::types::MMStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `mm_last_error`.
pub fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Record a kernel error and return the status code it maps to.
pub fn fail(err: MatmulError) -> MMStatus {
    let status = MMStatus::from(&err);
    warn!(?status, error = %err, "matmul call rejected");
    set_last_error(err.to_string());
    status
}
