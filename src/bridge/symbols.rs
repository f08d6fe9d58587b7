//! Runtime primitives callable from generated code
//!
//! Arguments are borrowed unless stated otherwise. Results returned as a
//! bare object pointer are borrowed (null when absent); results in a
//! `RawOutcome` are new references. Null object arguments are reported as a
//! failure instead of being dereferenced.

use core::ffi::c_char;
use core::mem::ManuallyDrop;
use core::ptr;
use std::ffi::CStr;

use crate::error::{ErrorKind, RtResult, RuntimeError};
use crate::interop::{build_positional_tuple, RawOutcome};
use crate::objects::number::{binary_op, inplace_op};
use crate::objects::protocol::{self, CompareOp};
use crate::objects::{list, DictData, NumberOp, ObjRef, ObjectHeader, Slot};
use crate::runtime;

/// View a borrowed pointer as an `ObjRef` without touching the count
unsafe fn borrow(obj: *mut ObjectHeader, what: &str) -> RtResult<ManuallyDrop<ObjRef>> {
    if obj.is_null() {
        return Err(RuntimeError::System(format!("null object passed as {}", what)));
    }
    Ok(ManuallyDrop::new(ObjRef::from_raw(obj)))
}

fn error_ptr(result: RtResult<()>) -> *mut RuntimeError {
    match result {
        Ok(()) => ptr::null_mut(),
        Err(err) => Box::into_raw(Box::new(err)),
    }
}

/// Acquire a reference; null is ignored
///
/// # Safety
/// `obj` must be null or a live object.
#[no_mangle]
pub unsafe extern "C" fn nb_incref(obj: *mut ObjectHeader) {
    if let Some(header) = obj.as_ref() {
        header.refcount.set(header.refcount.get() + 1);
    }
}

/// Release a reference, destroying the object at zero; null is ignored
///
/// # Safety
/// `obj` must be null or an owned reference.
#[no_mangle]
pub unsafe extern "C" fn nb_decref(obj: *mut ObjectHeader) {
    if !obj.is_null() {
        drop(ObjRef::from_raw(obj));
    }
}

/// Borrowed lookup; null when absent, unhashable, or not a dict
///
/// # Safety
/// Both pointers must be null or live objects.
#[no_mangle]
pub unsafe extern "C" fn nb_dict_getitem(
    dict: *mut ObjectHeader,
    key: *mut ObjectHeader,
) -> *mut ObjectHeader {
    let (Ok(dict), Ok(key)) = (borrow(dict, "dict"), borrow(key, "key")) else {
        return ptr::null_mut();
    };
    match dict.downcast::<DictData>().map(|d| d.get(&key)) {
        // The dict keeps its own reference, so the pointer stays valid
        Some(Ok(Some(value))) => value.as_ptr(),
        _ => ptr::null_mut(),
    }
}

/// `dict[key] = value`; returns an owned failure or null
///
/// # Safety
/// All pointers must be null or live objects.
#[no_mangle]
pub unsafe extern "C" fn nb_dict_setitem(
    dict: *mut ObjectHeader,
    key: *mut ObjectHeader,
    value: *mut ObjectHeader,
) -> *mut RuntimeError {
    error_ptr((|| {
        let dict = borrow(dict, "dict")?;
        let key = borrow(key, "key")?;
        let value = borrow(value, "value")?;
        let target = dict.downcast::<DictData>().ok_or_else(|| {
            RuntimeError::System(format!("expected dict, got {}", dict.type_name()))
        })?;
        target.set((*key).clone(), (*value).clone())
    })())
}

/// `obj[key]`
///
/// # Safety
/// Both pointers must be null or live objects.
#[no_mangle]
pub unsafe extern "C" fn nb_object_getitem(obj: *mut ObjectHeader, key: *mut ObjectHeader) -> RawOutcome {
    RawOutcome::from_result((|| protocol::getitem(&*borrow(obj, "object")?, &*borrow(key, "key")?))())
}

/// `obj[key] = value`; returns an owned failure or null
///
/// # Safety
/// All pointers must be null or live objects.
#[no_mangle]
pub unsafe extern "C" fn nb_object_setitem(
    obj: *mut ObjectHeader,
    key: *mut ObjectHeader,
    value: *mut ObjectHeader,
) -> *mut RuntimeError {
    error_ptr((|| {
        let value = borrow(value, "value")?;
        protocol::setitem(&*borrow(obj, "object")?, &*borrow(key, "key")?, (*value).clone())
    })())
}

/// `iter(obj)`
///
/// # Safety
/// `obj` must be null or a live object.
#[no_mangle]
pub unsafe extern "C" fn nb_object_getiter(obj: *mut ObjectHeader) -> RawOutcome {
    RawOutcome::from_result((|| protocol::getiter(&*borrow(obj, "object")?))())
}

/// `obj.name` where `name` is a str object
///
/// # Safety
/// Both pointers must be null or live objects.
#[no_mangle]
pub unsafe extern "C" fn nb_object_getattr(obj: *mut ObjectHeader, name: *mut ObjectHeader) -> RawOutcome {
    RawOutcome::from_result((|| {
        let name = borrow(name, "attribute name")?;
        let name = name.as_str().ok_or_else(|| {
            RuntimeError::Type(format!(
                "attribute name must be string, not '{}'",
                name.type_name()
            ))
        })?;
        protocol::getattr(&*borrow(obj, "object")?, name)
    })())
}

/// Truth value: 1 or 0, -1 for a null object
///
/// # Safety
/// `obj` must be null or a live object.
#[no_mangle]
pub unsafe extern "C" fn nb_object_is_true(obj: *mut ObjectHeader) -> i32 {
    match borrow(obj, "object") {
        Ok(obj) => i32::from(protocol::is_true(&obj)),
        Err(_) => -1,
    }
}

/// Rich comparison; `op` is a `CompareOp` code
///
/// # Safety
/// Both pointers must be null or live objects.
#[no_mangle]
pub unsafe extern "C" fn nb_compare(a: *mut ObjectHeader, b: *mut ObjectHeader, op: u32) -> RawOutcome {
    RawOutcome::from_result((|| {
        let op = CompareOp::from_code(op)
            .ok_or_else(|| RuntimeError::System(format!("unknown comparison code {}", op)))?;
        protocol::compare(op, &*borrow(a, "left operand")?, &*borrow(b, "right operand")?)
    })())
}

/// Globals of the running frame, borrowed; null outside any frame
#[no_mangle]
pub extern "C" fn nb_eval_get_globals() -> *mut ObjectHeader {
    // The thread's globals stack keeps its own reference
    runtime::current_globals().map_or(ptr::null_mut(), |g| g.as_obj().as_ptr())
}

/// Builtins namespace of this thread, borrowed
#[no_mangle]
pub extern "C" fn nb_eval_get_builtins() -> *mut ObjectHeader {
    // Thread state keeps its own reference
    runtime::builtins().as_obj().as_ptr()
}

/// Build a failure from a template and the offending name object
///
/// # Safety
/// `template` must be a NUL-terminated string; `name` null or a live object.
#[no_mangle]
pub unsafe extern "C" fn nb_error_format(
    kind: u32,
    template: *const c_char,
    name: *mut ObjectHeader,
) -> *mut RuntimeError {
    let kind = ErrorKind::from_code(kind).unwrap_or(ErrorKind::System);
    let name = match borrow(name, "name") {
        Ok(name) => protocol::to_str(&name),
        Err(_) => "?".to_string(),
    };
    let message = if template.is_null() {
        name
    } else {
        super::messages::format_name(CStr::from_ptr(template), &name)
    };
    Box::into_raw(Box::new(RuntimeError::with_kind(kind, message)))
}

/// 1 when the failure belongs to the `kind` family, else 0
///
/// # Safety
/// `error` must be null or a live failure pointer.
#[no_mangle]
pub unsafe extern "C" fn nb_error_matches(error: *const RuntimeError, kind: u32) -> i32 {
    match error.as_ref() {
        Some(error) => i32::from(error.kind() as u32 == kind),
        None => 0,
    }
}

/// Tuple from the top `n` stack slots, consuming them
///
/// # Safety
/// `stack` must hold `n` owned references.
#[no_mangle]
pub unsafe extern "C" fn nb_tuple_from_stack(stack: *mut Slot, n: usize) -> *mut ObjectHeader {
    let slots = core::slice::from_raw_parts_mut(stack, n);
    build_positional_tuple(slots, n).into_obj().into_raw()
}

/// List from the top `n` stack slots, consuming them
///
/// # Safety
/// `stack` must hold `n` owned references.
#[no_mangle]
pub unsafe extern "C" fn nb_list_from_stack(stack: *mut Slot, n: usize) -> *mut ObjectHeader {
    let slots = core::slice::from_raw_parts_mut(stack, n);
    let items = build_positional_tuple(slots, n).items().to_vec();
    list(items).into_obj().into_raw()
}

unsafe fn number_op(
    op: NumberOp,
    inplace: bool,
    a: *mut ObjectHeader,
    b: *mut ObjectHeader,
) -> RawOutcome {
    RawOutcome::from_result((|| {
        let (a, b) = (borrow(a, "left operand")?, borrow(b, "right operand")?);
        if inplace {
            inplace_op(op, &a, &b)
        } else {
            binary_op(op, &a, &b)
        }
    })())
}

macro_rules! number_symbols {
    ($($op:ident => $binary:ident, $inplace:ident;)*) => {
        $(
            /// Binary number operation
            ///
            /// # Safety
            /// Both pointers must be null or live objects.
            #[no_mangle]
            pub unsafe extern "C" fn $binary(a: *mut ObjectHeader, b: *mut ObjectHeader) -> RawOutcome {
                number_op(NumberOp::$op, false, a, b)
            }

            /// In-place number operation
            ///
            /// # Safety
            /// Both pointers must be null or live objects.
            #[no_mangle]
            pub unsafe extern "C" fn $inplace(a: *mut ObjectHeader, b: *mut ObjectHeader) -> RawOutcome {
                number_op(NumberOp::$op, true, a, b)
            }
        )*

        /// `(binary name, in-place name, binary fn, in-place fn)` per operator
        pub(crate) fn number_table() -> Vec<(&'static str, &'static str, usize, usize)> {
            vec![
                $((
                    stringify!($binary),
                    stringify!($inplace),
                    $binary as usize,
                    $inplace as usize,
                ),)*
            ]
        }
    };
}

number_symbols! {
    Add => nb_number_add, nb_number_inplace_add;
    Subtract => nb_number_subtract, nb_number_inplace_subtract;
    Multiply => nb_number_multiply, nb_number_inplace_multiply;
    TrueDivide => nb_number_true_divide, nb_number_inplace_true_divide;
    FloorDivide => nb_number_floor_divide, nb_number_inplace_floor_divide;
    Remainder => nb_number_remainder, nb_number_inplace_remainder;
    Lshift => nb_number_lshift, nb_number_inplace_lshift;
    Rshift => nb_number_rshift, nb_number_inplace_rshift;
    And => nb_number_and, nb_number_inplace_and;
    Xor => nb_number_xor, nb_number_inplace_xor;
    Or => nb_number_or, nb_number_inplace_or;
}
