//! Call dispatch - calling-convention resolution for argument vectors
//!
//! A call site hands over `na + 2 * nk + 1` slots in stack order: keyword
//! pairs on top, positionals below them, the callable deepest. The callable
//! is classified once, then exactly one path runs. Whatever happens, every
//! slot is empty when `dispatch_call` returns.

use tracing::trace;

use super::marshal::{build_positional_tuple, merge_keywords, take_slot};
use crate::error::{Arity, RtResult, RuntimeError};
use crate::objects::{
    BoundMethodData, FunctionData, NativeFlags, NativeFunctionData, NativeImpl, ObjRef, Slot,
};
use crate::runtime::{call_native, call_object, eval_frame, record_dispatch, Frame, RecursionGuard};

/// Shape of a callable as seen by the dispatcher
pub enum CallableKind<'a> {
    /// `NoArgs`/`One` primitive reached without keywords
    FixedNative(&'a NativeFunctionData),
    VariadicNative(&'a NativeFunctionData),
    BoundMethod { receiver: ObjRef, function: ObjRef },
    Function(&'a FunctionData),
    Generic,
}

impl<'a> CallableKind<'a> {
    pub fn resolve(callable: &'a ObjRef, nk: usize) -> Self {
        if let Some(primitive) = callable.downcast::<NativeFunctionData>() {
            if nk == 0 && primitive.flags().is_fixed() {
                return Self::FixedNative(primitive);
            }
            return Self::VariadicNative(primitive);
        }
        if let Some(method) = callable.downcast::<BoundMethodData>() {
            return Self::BoundMethod {
                receiver: method.receiver.clone(),
                function: method.function.clone(),
            };
        }
        if let Some(function) = callable.downcast::<FunctionData>() {
            return Self::Function(function);
        }
        Self::Generic
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedNative(_) => "fixed_native",
            Self::VariadicNative(_) => "variadic_native",
            Self::BoundMethod { .. } => "bound_method",
            Self::Function(_) => "function",
            Self::Generic => "generic",
        }
    }
}

/// Release every reference still held by the vector
fn release_slots(slots: &mut [Slot]) {
    for slot in slots.iter_mut() {
        drop(slot.take());
    }
}

#[cold]
#[inline(never)]
fn malformed_vector(len: usize, na: usize, nk: usize) -> ! {
    panic!(
        "malformed argument vector for na={} nk={}: {} slots",
        na, nk, len
    )
}

#[inline(never)]
fn trace_dispatch(kind: &CallableKind<'_>, na: usize, nk: usize) {
    trace!(
        event = "dispatch",
        path = kind.name(),
        positional = na,
        keywords = nk,
        "Dispatching call"
    );
}

/// Dispatch a call described by an argument vector
///
/// Consumes all `na + 2 * nk + 1` slots and yields one result or one failure.
/// A vector of the wrong length, or without a callable, is a caller defect
/// and panics.
pub fn dispatch_call(args: &mut [Slot], na: usize, nk: usize) -> RtResult<ObjRef> {
    let n = na + 2 * nk;
    if args.len() != n + 1 {
        malformed_vector(args.len(), na, nk);
    }
    let callable = match &args[n] {
        Some(callable) => callable.clone(),
        None => panic!("argument vector has no callable"),
    };

    let kind = CallableKind::resolve(&callable, nk);
    trace_dispatch(&kind, na, nk);

    let result = match kind {
        CallableKind::FixedNative(primitive) => {
            record_dispatch(|s| s.fixed_native += 1);
            call_fixed_native(primitive, &mut args[..n], na)
        }
        CallableKind::VariadicNative(primitive) => {
            record_dispatch(|s| s.variadic_native += 1);
            if nk == 0 {
                let positional = build_positional_tuple(&mut args[..na], na);
                call_native(primitive, &positional, None)
            } else {
                do_call(&callable, &mut args[..n], na, nk)
            }
        }
        CallableKind::BoundMethod { receiver, function } => {
            record_dispatch(|s| s.bound_method += 1);
            // Receiver takes the callable's slot and becomes the first positional
            let previous = args[n].replace(receiver);
            drop(previous);
            call_unbound(&function, &mut args[..=n], na + 1, nk)
        }
        CallableKind::Function(function) => fast_function(function, &callable, &mut args[..n], na, nk),
        CallableKind::Generic => {
            record_dispatch(|s| s.generic += 1);
            do_call(&callable, &mut args[..n], na, nk)
        }
    };

    release_slots(args);
    if result.is_err() {
        record_dispatch(|s| s.failures += 1);
    }
    result
}

/// Path 4 or 5 for the function underneath a bound method
fn call_unbound(function: &ObjRef, payload: &mut [Slot], na: usize, nk: usize) -> RtResult<ObjRef> {
    match function.downcast::<FunctionData>() {
        Some(f) => fast_function(f, function, payload, na, nk),
        None => do_call(function, payload, na, nk),
    }
}

fn call_fixed_native(
    primitive: &NativeFunctionData,
    payload: &mut [Slot],
    na: usize,
) -> RtResult<ObjRef> {
    let receiver = primitive.receiver.as_ref();
    match (primitive.implementation(), na) {
        (NativeImpl::NoArgs(f), 0) => f(receiver),
        (NativeImpl::One(f), 1) => {
            let arg = take_slot(&mut payload[0]);
            f(receiver, &arg)
        }
        _ => {
            let expected = match primitive.flags() {
                NativeFlags::NoArgs => Arity::NoArgs,
                _ => Arity::ExactlyOne,
            };
            Err(RuntimeError::Arity {
                callable: primitive.name.to_string(),
                expected,
                given: na,
            })
        }
    }
}

/// Build a frame directly when the function needs no argument binding,
/// otherwise take the generic route
fn fast_function(
    function: &FunctionData,
    callable: &ObjRef,
    payload: &mut [Slot],
    na: usize,
    nk: usize,
) -> RtResult<ObjRef> {
    let code = &function.code;
    let simple = function.defaults.is_none()
        && nk == 0
        && code.kwonlyargcount == 0
        && code.argcount == na
        && code.flags().is_simple();
    if !simple {
        record_dispatch(|s| s.generic += 1);
        return do_call(callable, payload, na, nk);
    }

    record_dispatch(|s| s.fast_function += 1);
    let mut frame = Frame::new(code.clone(), function.globals.clone(), None);
    // Deepest slot is the first parameter
    for (local, slot) in frame.locals.iter_mut().zip(payload[..na].iter_mut().rev()) {
        *local = Some(take_slot(slot));
    }
    let result = eval_frame(&mut frame);
    {
        let _teardown = RecursionGuard::unchecked();
        drop(frame);
    }
    result
}

/// Generic path: keyword dict and positional tuple, then `call_object`
fn do_call(callable: &ObjRef, payload: &mut [Slot], na: usize, nk: usize) -> RtResult<ObjRef> {
    let (keyword_slots, positional_slots) = payload.split_at_mut(2 * nk);
    let kwargs = if nk > 0 {
        Some(merge_keywords(None, keyword_slots, nk, callable)?)
    } else {
        None
    };
    let positional = build_positional_tuple(positional_slots, na);
    call_object(callable, &positional, kwargs.as_ref())
}
