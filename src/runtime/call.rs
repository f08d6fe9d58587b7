//! General call interface
//!
//! `call_object` is the slow, fully general route every dispatch path can
//! fall back on: positionals as a tuple, keywords as an optional dict.

use super::eval::eval_code_ex;
use super::state::RecursionGuard;
use crate::compiled::CompiledCode;
use crate::error::{Arity, RtResult, RuntimeError};
use crate::objects::{
    tuple, BoundMethodData, CallableData, DictData, FunctionData, NativeFunctionData, NativeImpl,
    ObjRef, Ref, TupleData,
};

/// Call `callable(*args, **kwargs)`
pub fn call_object(
    callable: &ObjRef,
    args: &Ref<TupleData>,
    kwargs: Option<&Ref<DictData>>,
) -> RtResult<ObjRef> {
    if let Some(primitive) = callable.downcast::<NativeFunctionData>() {
        return call_native(primitive, args, kwargs);
    }
    if let Some(function) = callable.downcast::<FunctionData>() {
        return call_function(function, args.items(), kwargs);
    }
    if let Some(method) = callable.downcast::<BoundMethodData>() {
        let mut with_receiver = Vec::with_capacity(args.len() + 1);
        with_receiver.push(method.receiver.clone());
        with_receiver.extend(args.items().iter().cloned());
        return call_object(&method.function, &tuple(with_receiver), kwargs);
    }
    if let Some(object) = callable.downcast::<CallableData>() {
        let _depth = RecursionGuard::enter(" while calling a native object")?;
        return object.call(args, kwargs);
    }
    if let Some(compiled) = callable.downcast::<CompiledCode>() {
        let given = args.len() + kwargs.map_or(0, |k| k.len());
        if given != 0 {
            return Err(RuntimeError::Arity {
                callable: compiled.name(),
                expected: Arity::NoArgs,
                given,
            });
        }
        return compiled.call();
    }
    Err(RuntimeError::Type(format!(
        "'{}' object is not callable",
        callable.type_name()
    )))
}

/// Invoke a plain function through full argument binding
pub fn call_function(
    function: &FunctionData,
    args: &[ObjRef],
    kwargs: Option<&Ref<DictData>>,
) -> RtResult<ObjRef> {
    eval_code_ex(
        &function.code,
        &function.globals,
        args,
        kwargs,
        function.defaults.as_ref(),
        function.kwdefaults.as_ref(),
        function.closure.as_ref(),
    )
}

/// Generic native-call interface; enforces the primitive's flags
pub fn call_native(
    primitive: &NativeFunctionData,
    args: &Ref<TupleData>,
    kwargs: Option<&Ref<DictData>>,
) -> RtResult<ObjRef> {
    let receiver = primitive.receiver.as_ref();
    let has_keywords = kwargs.map_or(false, |k| !k.is_empty());
    if has_keywords && !matches!(primitive.implementation(), NativeImpl::Keywords(_)) {
        return Err(RuntimeError::Type(format!(
            "{}() takes no keyword arguments",
            primitive.name
        )));
    }
    match primitive.implementation() {
        NativeImpl::NoArgs(f) => match args.len() {
            0 => f(receiver),
            given => Err(RuntimeError::Arity {
                callable: primitive.name.to_string(),
                expected: Arity::NoArgs,
                given,
            }),
        },
        NativeImpl::One(f) => match args.items() {
            [arg] => f(receiver, arg),
            items => Err(RuntimeError::Arity {
                callable: primitive.name.to_string(),
                expected: Arity::ExactlyOne,
                given: items.len(),
            }),
        },
        NativeImpl::VarArgs(f) => f(receiver, args),
        NativeImpl::Keywords(f) => f(receiver, args, kwargs),
    }
}
