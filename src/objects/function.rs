//! Callable payloads: functions, native primitives, bound methods, generic
//! callables and closure cells

use core::cell::RefCell;
use std::rc::Rc;

use super::code::CodeData;
use super::dict::DictData;
use super::header::{payload_type, ObjRef, ObjectType, Ref};
use super::tuple::TupleData;
use crate::error::RtResult;

/// Plain function: code plus the environment it runs in
pub struct FunctionData {
    pub name: Box<str>,
    pub code: Ref<CodeData>,
    pub globals: Ref<DictData>,
    pub defaults: Option<Ref<TupleData>>,
    pub kwdefaults: Option<Ref<DictData>>,
    /// Tuple of cells, one per free variable
    pub closure: Option<Ref<TupleData>>,
}

payload_type!(FunctionData, FUNCTION_TYPE, "function", ObjectType::Function);

impl FunctionData {
    pub fn new(code: Ref<CodeData>, globals: Ref<DictData>) -> Self {
        Self {
            name: code.name.clone(),
            code,
            globals,
            defaults: None,
            kwdefaults: None,
            closure: None,
        }
    }

    pub fn with_defaults(mut self, defaults: Ref<TupleData>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn with_kwdefaults(mut self, kwdefaults: Ref<DictData>) -> Self {
        self.kwdefaults = Some(kwdefaults);
        self
    }

    pub fn with_closure(mut self, closure: Ref<TupleData>) -> Self {
        self.closure = Some(closure);
        self
    }
}

pub fn function(code: Ref<CodeData>, globals: Ref<DictData>) -> Ref<FunctionData> {
    Ref::new(FunctionData::new(code, globals))
}

/// Calling flags of a native primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFlags {
    NoArgs,
    One,
    VarArgs,
    VarArgsKeywords,
}

impl NativeFlags {
    /// Fixed-arity shapes that may skip tuple materialization
    #[inline]
    pub fn is_fixed(self) -> bool {
        matches!(self, Self::NoArgs | Self::One)
    }
}

type NoArgsFn = dyn Fn(Option<&ObjRef>) -> RtResult<ObjRef>;
type OneFn = dyn Fn(Option<&ObjRef>, &ObjRef) -> RtResult<ObjRef>;
type VarArgsFn = dyn Fn(Option<&ObjRef>, &Ref<TupleData>) -> RtResult<ObjRef>;
type KeywordsFn = dyn Fn(Option<&ObjRef>, &Ref<TupleData>, Option<&Ref<DictData>>) -> RtResult<ObjRef>;

/// Implementation of a native primitive, tagged by shape
pub enum NativeImpl {
    NoArgs(Box<NoArgsFn>),
    One(Box<OneFn>),
    VarArgs(Box<VarArgsFn>),
    Keywords(Box<KeywordsFn>),
}

/// Native primitive; the receiver is passed as the first implementation
/// argument when bound
pub struct NativeFunctionData {
    pub name: Box<str>,
    pub receiver: Option<ObjRef>,
    imp: Rc<NativeImpl>,
}

payload_type!(
    NativeFunctionData,
    NATIVE_FUNCTION_TYPE,
    "builtin_function_or_method",
    ObjectType::NativeFunction
);

impl NativeFunctionData {
    fn with_impl(name: &str, imp: NativeImpl) -> Self {
        Self {
            name: name.into(),
            receiver: None,
            imp: Rc::new(imp),
        }
    }

    pub fn no_args(name: &str, f: impl Fn(Option<&ObjRef>) -> RtResult<ObjRef> + 'static) -> Self {
        Self::with_impl(name, NativeImpl::NoArgs(Box::new(f)))
    }

    pub fn one(
        name: &str,
        f: impl Fn(Option<&ObjRef>, &ObjRef) -> RtResult<ObjRef> + 'static,
    ) -> Self {
        Self::with_impl(name, NativeImpl::One(Box::new(f)))
    }

    pub fn varargs(
        name: &str,
        f: impl Fn(Option<&ObjRef>, &Ref<TupleData>) -> RtResult<ObjRef> + 'static,
    ) -> Self {
        Self::with_impl(name, NativeImpl::VarArgs(Box::new(f)))
    }

    pub fn keywords(
        name: &str,
        f: impl Fn(Option<&ObjRef>, &Ref<TupleData>, Option<&Ref<DictData>>) -> RtResult<ObjRef>
            + 'static,
    ) -> Self {
        Self::with_impl(name, NativeImpl::Keywords(Box::new(f)))
    }

    /// Copy of this primitive bound to `receiver`
    pub fn bind(&self, receiver: ObjRef) -> Self {
        Self {
            name: self.name.clone(),
            receiver: Some(receiver),
            imp: self.imp.clone(),
        }
    }

    pub fn flags(&self) -> NativeFlags {
        match &*self.imp {
            NativeImpl::NoArgs(_) => NativeFlags::NoArgs,
            NativeImpl::One(_) => NativeFlags::One,
            NativeImpl::VarArgs(_) => NativeFlags::VarArgs,
            NativeImpl::Keywords(_) => NativeFlags::VarArgsKeywords,
        }
    }

    #[inline]
    pub fn implementation(&self) -> &NativeImpl {
        &self.imp
    }
}

pub fn native(data: NativeFunctionData) -> Ref<NativeFunctionData> {
    Ref::new(data)
}

/// Function bound to a receiver
pub struct BoundMethodData {
    pub receiver: ObjRef,
    pub function: ObjRef,
}

payload_type!(BoundMethodData, BOUND_METHOD_TYPE, "method", ObjectType::BoundMethod);

pub fn bound_method(receiver: ObjRef, function: ObjRef) -> Ref<BoundMethodData> {
    Ref::new(BoundMethodData { receiver, function })
}

type CallSlot = dyn Fn(&Ref<TupleData>, Option<&Ref<DictData>>) -> RtResult<ObjRef>;

/// Arbitrary object exposing only the general call slot
pub struct CallableData {
    pub name: Box<str>,
    call: Box<CallSlot>,
}

payload_type!(CallableData, CALLABLE_TYPE, "callable", ObjectType::Callable);

impl CallableData {
    pub fn new(
        name: &str,
        call: impl Fn(&Ref<TupleData>, Option<&Ref<DictData>>) -> RtResult<ObjRef> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            call: Box::new(call),
        }
    }

    pub fn call(&self, args: &Ref<TupleData>, kwargs: Option<&Ref<DictData>>) -> RtResult<ObjRef> {
        (self.call)(args, kwargs)
    }
}

pub fn callable(data: CallableData) -> Ref<CallableData> {
    Ref::new(data)
}

/// Closure cell
pub struct CellData {
    contents: RefCell<Option<ObjRef>>,
}

payload_type!(CellData, CELL_TYPE, "cell", ObjectType::Cell);

impl CellData {
    pub fn get(&self) -> Option<ObjRef> {
        self.contents.borrow().clone()
    }

    pub fn set(&self, value: ObjRef) {
        let previous = self.contents.replace(Some(value));
        drop(previous);
    }
}

pub fn cell(contents: Option<ObjRef>) -> Ref<CellData> {
    Ref::new(CellData {
        contents: RefCell::new(contents),
    })
}
