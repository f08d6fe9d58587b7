//! C ABI for generated code
//!
//! Generated code sees objects as `*mut ObjectHeader` and receives results
//! as a [`RawOutcome`]: exactly one of `value` and `error` is non-null. A
//! non-null `value` is a new reference; a non-null `error` is an owned boxed
//! [`RuntimeError`].

use core::ptr;
use core::slice;

use super::call::dispatch_call;
use crate::error::{RtResult, RuntimeError};
use crate::objects::{ObjRef, ObjectHeader, Slot};

/// Result of a native entry point
#[repr(C)]
#[derive(Debug)]
#[must_use]
pub struct RawOutcome {
    pub value: *mut ObjectHeader,
    pub error: *mut RuntimeError,
}

impl RawOutcome {
    pub fn ok(value: ObjRef) -> Self {
        Self {
            value: value.into_raw(),
            error: ptr::null_mut(),
        }
    }

    pub fn err(error: RuntimeError) -> Self {
        Self {
            value: ptr::null_mut(),
            error: Box::into_raw(Box::new(error)),
        }
    }

    pub fn from_result(result: RtResult<ObjRef>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(error) => Self::err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.value.is_null() && self.error.is_null()
    }

    /// Take ownership of whichever side is set
    ///
    /// # Safety
    /// The outcome must have been produced by `from_result` (or by native
    /// code honoring the same contract) and not consumed before.
    pub unsafe fn into_result(self) -> RtResult<ObjRef> {
        match (self.value.is_null(), self.error.is_null()) {
            (false, true) => Ok(ObjRef::from_raw(self.value)),
            (true, false) => Err(*Box::from_raw(self.error)),
            _ => panic!(
                "malformed native outcome: value={:p} error={:p}",
                self.value, self.error
            ),
        }
    }
}

/// Decode the packed call operand: low byte positional count, next byte
/// keyword pair count
#[inline]
pub const fn decode_oparg(oparg: u32) -> (usize, usize) {
    ((oparg & 0xff) as usize, ((oparg >> 8) & 0xff) as usize)
}

/// Dispatcher entry point for generated code
///
/// `stack` points at the top of an argument vector of `na + 2 * nk + 1`
/// slots laid out as `dispatch_call` expects. Every slot is nulled before
/// return.
///
/// # Safety
/// `stack` must be valid for reads and writes of that many slots, each a
/// null pointer or an owned reference.
#[no_mangle]
pub unsafe extern "C" fn nb_call_function(stack: *mut Slot, oparg: u32) -> RawOutcome {
    let (na, nk) = decode_oparg(oparg);
    let args = slice::from_raw_parts_mut(stack, na + 2 * nk + 1);
    RawOutcome::from_result(dispatch_call(args, na, nk))
}

/// Release a failure received in a [`RawOutcome`]
///
/// # Safety
/// `error` must be null or an owned pointer from a `RawOutcome`.
#[no_mangle]
pub unsafe extern "C" fn nb_error_free(error: *mut RuntimeError) {
    if !error.is_null() {
        drop(Box::from_raw(error));
    }
}

/// Numeric failure family of an owned failure, 0 for null
///
/// # Safety
/// `error` must be null or a live pointer from a `RawOutcome`.
#[no_mangle]
pub unsafe extern "C" fn nb_error_kind(error: *const RuntimeError) -> u32 {
    match error.as_ref() {
        Some(error) => error.kind() as u32,
        None => 0,
    }
}
