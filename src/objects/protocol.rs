//! Object protocol - truth, equality, ordering, hashing, items, iteration,
//! attributes and descriptions used in error messages

use core::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::code::CodeData;
use super::dict::DictData;
use super::function::{bound_method, native, BoundMethodData, CallableData, FunctionData, NativeFunctionData};
use super::header::{ObjRef, ObjectType, Ref};
use super::instance::InstanceData;
use super::iter::IteratorData;
use super::list::{list, ListData};
use super::scalar::{boolean, none, string, StrData};
use super::tuple::{tuple, TupleData};
use crate::bridge::messages::clip_name;
use crate::error::{RtResult, RuntimeError};

/// Rich comparison and membership operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::IsNot => "is not",
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Lt,
            1 => Self::Le,
            2 => Self::Eq,
            3 => Self::Ne,
            4 => Self::Gt,
            5 => Self::Ge,
            6 => Self::In,
            7 => Self::NotIn,
            8 => Self::Is,
            9 => Self::IsNot,
            _ => return None,
        })
    }
}

pub fn is_true(obj: &ObjRef) -> bool {
    match obj.object_type() {
        ObjectType::None => false,
        ObjectType::Bool | ObjectType::Int => obj.as_int() != Some(0),
        ObjectType::Float => obj.as_float() != Some(0.0),
        ObjectType::Str | ObjectType::Tuple | ObjectType::List | ObjectType::Dict => {
            len(obj).map_or(true, |n| n != 0)
        }
        _ => true,
    }
}

fn is_numeric(obj: &ObjRef) -> bool {
    matches!(
        obj.object_type(),
        ObjectType::Int | ObjectType::Bool | ObjectType::Float
    )
}

/// Structural equality; identity for types without value semantics
pub fn equals(a: &ObjRef, b: &ObjRef) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    if is_numeric(a) && is_numeric(b) {
        if let (Some(x), Some(y)) = (int_value(a), int_value(b)) {
            return x == y;
        }
        return a.as_float() == b.as_float();
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.downcast::<TupleData>(), b.downcast::<TupleData>()) {
        return items_equal(x.items(), y.items());
    }
    if let (Some(x), Some(y)) = (a.downcast::<ListData>(), b.downcast::<ListData>()) {
        return items_equal(&x.snapshot(), &y.snapshot());
    }
    if let (Some(x), Some(y)) = (a.downcast::<DictData>(), b.downcast::<DictData>()) {
        return x.len() == y.len()
            && x.entries().iter().all(|(key, value)| {
                matches!(y.get(key), Ok(Some(other)) if equals(value, &other))
            });
    }
    false
}

fn int_value(obj: &ObjRef) -> Option<i64> {
    match obj.object_type() {
        ObjectType::Int | ObjectType::Bool => obj.as_int(),
        _ => None,
    }
}

fn items_equal(a: &[ObjRef], b: &[ObjRef]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
}

fn order(a: &ObjRef, b: &ObjRef, op: CompareOp) -> RtResult<Ordering> {
    let unordered = || {
        RuntimeError::Type(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ))
    };
    if is_numeric(a) && is_numeric(b) {
        if let (Some(x), Some(y)) = (int_value(a), int_value(b)) {
            return Ok(x.cmp(&y));
        }
        return match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(unordered),
            _ => Err(unordered()),
        };
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Ok(x.cmp(y));
    }
    let sequences = match (a.object_type(), b.object_type()) {
        (ObjectType::Tuple, ObjectType::Tuple) | (ObjectType::List, ObjectType::List) => {
            (collect_items(a)?, collect_items(b)?)
        }
        _ => return Err(unordered()),
    };
    let (xs, ys) = sequences;
    for (x, y) in xs.iter().zip(&ys) {
        if !equals(x, y) {
            return order(x, y, op);
        }
    }
    Ok(xs.len().cmp(&ys.len()))
}

/// Evaluate `a <op> b` to a bool object
pub fn compare(op: CompareOp, a: &ObjRef, b: &ObjRef) -> RtResult<ObjRef> {
    let result = match op {
        CompareOp::Eq => equals(a, b),
        CompareOp::Ne => !equals(a, b),
        CompareOp::Is => a.ptr_eq(b),
        CompareOp::IsNot => !a.ptr_eq(b),
        CompareOp::In => contains(b, a)?,
        CompareOp::NotIn => !contains(b, a)?,
        CompareOp::Lt => order(a, b, op)? == Ordering::Less,
        CompareOp::Le => order(a, b, op)? != Ordering::Greater,
        CompareOp::Gt => order(a, b, op)? == Ordering::Greater,
        CompareOp::Ge => order(a, b, op)? != Ordering::Less,
    };
    Ok(boolean(result))
}

fn hash_value<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

pub fn hash_str(value: &str) -> u64 {
    hash_value(value)
}

/// Runtime hash; numerically equal values hash alike
pub fn hash(obj: &ObjRef) -> RtResult<u64> {
    match obj.object_type() {
        ObjectType::None => Ok(hash_value("None")),
        ObjectType::Bool | ObjectType::Int => Ok(hash_value(&obj.as_int().unwrap_or(0))),
        ObjectType::Float => {
            let value = obj.as_float().unwrap_or(0.0);
            if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
                Ok(hash_value(&(value as i64)))
            } else {
                Ok(hash_value(&value.to_bits()))
            }
        }
        ObjectType::Str => Ok(hash_str(obj.as_str().unwrap_or_default())),
        ObjectType::Tuple => {
            let mut hasher = DefaultHasher::new();
            if let Some(items) = obj.downcast::<TupleData>() {
                for item in items.items() {
                    hasher.write_u64(hash(item)?);
                }
            }
            Ok(hasher.finish())
        }
        ObjectType::List | ObjectType::Dict => Err(RuntimeError::Type(format!(
            "unhashable type: '{}'",
            obj.type_name()
        ))),
        _ => Ok(hash_value(&obj.id())),
    }
}

pub fn len(obj: &ObjRef) -> RtResult<usize> {
    if let Some(text) = obj.as_str() {
        return Ok(text.chars().count());
    }
    if let Some(items) = obj.downcast::<TupleData>() {
        return Ok(items.len());
    }
    if let Some(items) = obj.downcast::<ListData>() {
        return Ok(items.len());
    }
    if let Some(map) = obj.downcast::<DictData>() {
        return Ok(map.len());
    }
    Err(RuntimeError::Type(format!(
        "object of type '{}' has no len()",
        obj.type_name()
    )))
}

pub fn contains(container: &ObjRef, item: &ObjRef) -> RtResult<bool> {
    if let Some(map) = container.downcast::<DictData>() {
        return map.contains(item);
    }
    if let Some(text) = container.as_str() {
        return match item.as_str() {
            Some(needle) => Ok(text.contains(needle)),
            None => Err(RuntimeError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                item.type_name()
            ))),
        };
    }
    match container.object_type() {
        ObjectType::Tuple | ObjectType::List | ObjectType::Iterator => {
            Ok(collect_items(container)?.iter().any(|x| equals(x, item)))
        }
        _ => Err(RuntimeError::Type(format!(
            "argument of type '{}' is not iterable",
            container.type_name()
        ))),
    }
}

fn sequence_index(index: &ObjRef, len: usize, kind: &str) -> RtResult<usize> {
    let raw = int_value(index).ok_or_else(|| {
        RuntimeError::Type(format!(
            "{} indices must be integers, not {}",
            kind,
            index.type_name()
        ))
    })?;
    let resolved = if raw < 0 { raw + len as i64 } else { raw };
    if resolved < 0 || resolved >= len as i64 {
        return Err(RuntimeError::Index(format!("{} index out of range", kind)));
    }
    Ok(resolved as usize)
}

/// `obj[key]`
pub fn getitem(obj: &ObjRef, key: &ObjRef) -> RtResult<ObjRef> {
    if let Some(map) = obj.downcast::<DictData>() {
        return map
            .get(key)?
            .ok_or_else(|| RuntimeError::Key(repr(key)));
    }
    if let Some(items) = obj.downcast::<TupleData>() {
        let index = sequence_index(key, items.len(), "tuple")?;
        return Ok(items.items()[index].clone());
    }
    if let Some(items) = obj.downcast::<ListData>() {
        let index = sequence_index(key, items.len(), "list")?;
        return items
            .get(index)
            .ok_or_else(|| RuntimeError::Index("list index out of range".into()));
    }
    if let Some(text) = obj.as_str() {
        let chars: Vec<char> = text.chars().collect();
        let index = sequence_index(key, chars.len(), "string")?;
        return Ok(string(chars[index].encode_utf8(&mut [0; 4])));
    }
    Err(RuntimeError::Type(format!(
        "'{}' object is not subscriptable",
        obj.type_name()
    )))
}

/// `obj[key] = value`
pub fn setitem(obj: &ObjRef, key: &ObjRef, value: ObjRef) -> RtResult<()> {
    if let Some(map) = obj.downcast::<DictData>() {
        return map.set(key.clone(), value);
    }
    if let Some(items) = obj.downcast::<ListData>() {
        let index = sequence_index(key, items.len(), "list")?;
        if items.set(index, value) {
            return Ok(());
        }
        return Err(RuntimeError::Index("list assignment index out of range".into()));
    }
    Err(RuntimeError::Type(format!(
        "'{}' object does not support item assignment",
        obj.type_name()
    )))
}

/// `iter(obj)`
pub fn getiter(obj: &ObjRef) -> RtResult<ObjRef> {
    match obj.object_type() {
        ObjectType::Iterator => Ok(obj.clone()),
        ObjectType::Tuple | ObjectType::List | ObjectType::Str => {
            Ok(ObjRef::new(IteratorData::over(obj.clone())))
        }
        ObjectType::Dict => {
            let keys = obj
                .downcast::<DictData>()
                .map(DictData::keys)
                .unwrap_or_default();
            Ok(ObjRef::new(IteratorData::over(tuple(keys).into_obj())))
        }
        _ => Err(RuntimeError::Type(format!(
            "'{}' object is not iterable",
            obj.type_name()
        ))),
    }
}

/// Advance an iterator object
pub fn next(iter: &ObjRef) -> RtResult<Option<ObjRef>> {
    match iter.downcast::<IteratorData>() {
        Some(cursor) => Ok(cursor.next()),
        None => Err(RuntimeError::Type(format!(
            "'{}' object is not an iterator",
            iter.type_name()
        ))),
    }
}

/// Drain any iterable into a vector
pub fn collect_items(obj: &ObjRef) -> RtResult<Vec<ObjRef>> {
    if let Some(items) = obj.downcast::<TupleData>() {
        return Ok(items.items().to_vec());
    }
    if let Some(items) = obj.downcast::<ListData>() {
        return Ok(items.snapshot());
    }
    let iter = getiter(obj)?;
    let mut items = Vec::new();
    while let Some(item) = next(&iter)? {
        items.push(item);
    }
    Ok(items)
}

/// `obj.name`
pub fn getattr(obj: &ObjRef, name: &str) -> RtResult<ObjRef> {
    if let Some(inst) = obj.downcast::<InstanceData>() {
        if let Some(value) = inst.attrs.get_str(name) {
            return Ok(value);
        }
        if let Some(value) = inst.class_dict.get_str(name) {
            if value.is::<FunctionData>() {
                return Ok(bound_method(obj.clone(), value).into_obj());
            }
            return Ok(value);
        }
    } else if name == "__name__" && is_named_callable(obj) {
        return Ok(string(&func_name(obj)));
    } else if let Some(function) = obj.downcast::<FunctionData>() {
        match name {
            "__code__" => return Ok(function.code.as_obj().clone()),
            "__globals__" => return Ok(function.globals.as_obj().clone()),
            "__defaults__" => {
                return Ok(function
                    .defaults
                    .as_ref()
                    .map_or_else(none, |d| d.as_obj().clone()))
            }
            _ => {}
        }
    } else if let Some(method) = builtin_method(obj, name) {
        return Ok(native(method).into_obj());
    }
    Err(RuntimeError::Attribute(format!(
        "'{}' object has no attribute '{}'",
        func_type_name(obj),
        name
    )))
}

fn is_named_callable(obj: &ObjRef) -> bool {
    matches!(
        obj.object_type(),
        ObjectType::Function
            | ObjectType::NativeFunction
            | ObjectType::BoundMethod
            | ObjectType::Callable
            | ObjectType::Code
    )
}

fn receiver_str(receiver: Option<&ObjRef>) -> RtResult<&str> {
    receiver
        .and_then(ObjRef::as_str)
        .ok_or_else(|| RuntimeError::Type("descriptor requires a 'str' receiver".into()))
}

/// Bound native methods of the builtin types
fn builtin_method(obj: &ObjRef, name: &str) -> Option<NativeFunctionData> {
    let method = match (obj.object_type(), name) {
        (ObjectType::Str, "upper") => NativeFunctionData::no_args("upper", |receiver| {
            Ok(string(&receiver_str(receiver)?.to_uppercase()))
        }),
        (ObjectType::Str, "lower") => NativeFunctionData::no_args("lower", |receiver| {
            Ok(string(&receiver_str(receiver)?.to_lowercase()))
        }),
        (ObjectType::Str, "strip") => NativeFunctionData::no_args("strip", |receiver| {
            Ok(string(receiver_str(receiver)?.trim()))
        }),
        (ObjectType::Str, "startswith") => {
            NativeFunctionData::one("startswith", |receiver, prefix| {
                let prefix = prefix.as_str().ok_or_else(|| {
                    RuntimeError::Type(format!(
                        "startswith first arg must be str, not {}",
                        prefix.type_name()
                    ))
                })?;
                Ok(boolean(receiver_str(receiver)?.starts_with(prefix)))
            })
        }
        (ObjectType::Str, "join") => NativeFunctionData::one("join", |receiver, items| {
            let separator = receiver_str(receiver)?;
            let parts = collect_items(items)?
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_owned).ok_or_else(|| {
                        RuntimeError::Type(format!(
                            "sequence item: expected str instance, {} found",
                            item.type_name()
                        ))
                    })
                })
                .collect::<RtResult<Vec<_>>>()?;
            Ok(string(&parts.join(separator)))
        }),
        (ObjectType::Str, "split") => NativeFunctionData::varargs("split", |receiver, args| {
            let text = receiver_str(receiver)?;
            let parts: Vec<ObjRef> = match args.items() {
                [] => text.split_whitespace().map(string).collect(),
                [sep] => {
                    let sep = sep.as_str().ok_or_else(|| {
                        RuntimeError::Type(format!("must be str, not {}", sep.type_name()))
                    })?;
                    if sep.is_empty() {
                        return Err(RuntimeError::Value("empty separator".into()));
                    }
                    text.split(sep).map(string).collect()
                }
                more => {
                    return Err(RuntimeError::Type(format!(
                        "split() takes at most 1 argument ({} given)",
                        more.len()
                    )))
                }
            };
            Ok(list(parts).into_obj())
        }),
        (ObjectType::List, "append") => NativeFunctionData::one("append", |receiver, item| {
            match receiver.and_then(|r| r.downcast::<ListData>()) {
                Some(items) => {
                    items.push(item.clone());
                    Ok(none())
                }
                None => Err(RuntimeError::Type(
                    "descriptor 'append' requires a 'list' receiver".into(),
                )),
            }
        }),
        _ => return None,
    };
    Some(method.bind(obj.clone()))
}

/// Name used when describing a callable in a failure
pub fn func_name(obj: &ObjRef) -> String {
    if let Some(function) = obj.downcast::<FunctionData>() {
        return function.name.to_string();
    }
    if let Some(primitive) = obj.downcast::<NativeFunctionData>() {
        return primitive.name.to_string();
    }
    if let Some(method) = obj.downcast::<BoundMethodData>() {
        return func_name(&method.function);
    }
    if let Some(callable) = obj.downcast::<CallableData>() {
        return callable.name.to_string();
    }
    if let Some(code) = obj.downcast::<CodeData>() {
        return code.name.to_string();
    }
    func_type_name(obj).to_string()
}

fn func_type_name(obj: &ObjRef) -> &str {
    match obj.downcast::<InstanceData>() {
        Some(inst) => &inst.class_name,
        None => obj.type_name(),
    }
}

/// `"()"` for function-like callables, `" object"` otherwise
pub fn func_desc(obj: &ObjRef) -> &'static str {
    match obj.object_type() {
        ObjectType::Function | ObjectType::NativeFunction | ObjectType::BoundMethod => "()",
        _ => " object",
    }
}

/// Callable name plus description, e.g. `f()` or `Counter object`
pub fn describe_callable(obj: &ObjRef) -> String {
    format!("{}{}", clip_name(&func_name(obj)), func_desc(obj))
}

fn repr_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

fn join_repr(items: &[ObjRef]) -> String {
    items.iter().map(repr).collect::<Vec<_>>().join(", ")
}

pub fn repr(obj: &ObjRef) -> String {
    match obj.object_type() {
        ObjectType::None => "None".into(),
        ObjectType::Bool => {
            let text = if obj.as_int() == Some(1) { "True" } else { "False" };
            text.to_string()
        }
        ObjectType::Int => obj.as_int().unwrap_or_default().to_string(),
        ObjectType::Float => format!("{:?}", obj.as_float().unwrap_or_default()),
        ObjectType::Str => repr_str(obj.as_str().unwrap_or_default()),
        ObjectType::Tuple => {
            let items = collect_items(obj).unwrap_or_default();
            if items.len() == 1 {
                format!("({},)", repr(&items[0]))
            } else {
                format!("({})", join_repr(&items))
            }
        }
        ObjectType::List => format!("[{}]", join_repr(&collect_items(obj).unwrap_or_default())),
        ObjectType::Dict => {
            let entries = obj
                .downcast::<DictData>()
                .map(DictData::entries)
                .unwrap_or_default();
            let body = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", repr(k), repr(v)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{}}}", body)
        }
        ObjectType::Function => format!("<function {} at {:#x}>", func_name(obj), obj.id()),
        ObjectType::NativeFunction => format!("<built-in function {}>", func_name(obj)),
        ObjectType::BoundMethod => format!("<bound method {}>", func_name(obj)),
        ObjectType::Code => format!("<code object {} at {:#x}>", func_name(obj), obj.id()),
        ObjectType::Instance => format!("<{} object at {:#x}>", func_type_name(obj), obj.id()),
        _ => format!("<{} object at {:#x}>", obj.type_name(), obj.id()),
    }
}

/// Text form: strings unquoted, everything else as `repr`
pub fn to_str(obj: &ObjRef) -> String {
    match obj.downcast::<StrData>() {
        Some(text) => text.as_str().to_string(),
        None => repr(obj),
    }
}

/// Typed view helper for dict-valued attributes
pub fn as_dict(obj: &ObjRef) -> RtResult<Ref<DictData>> {
    Ref::from_obj(obj)
        .ok_or_else(|| RuntimeError::Type(format!("expected dict, got {}", obj.type_name())))
}
