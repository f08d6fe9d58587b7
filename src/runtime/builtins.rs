//! Builtins namespace consulted after globals

use crate::error::{RtResult, RuntimeError};
use crate::objects::{dict, float, int, native, protocol, string, DictData, NativeFunctionData, ObjRef, ObjectType, Ref};

fn builtin_len(_: Option<&ObjRef>, obj: &ObjRef) -> RtResult<ObjRef> {
    let n = protocol::len(obj)?;
    i64::try_from(n)
        .map(int)
        .map_err(|_| RuntimeError::Overflow("length does not fit in int".into()))
}

fn builtin_repr(_: Option<&ObjRef>, obj: &ObjRef) -> RtResult<ObjRef> {
    Ok(string(&protocol::repr(obj)))
}

fn builtin_abs(_: Option<&ObjRef>, obj: &ObjRef) -> RtResult<ObjRef> {
    match obj.object_type() {
        ObjectType::Int | ObjectType::Bool => obj
            .as_int()
            .and_then(i64::checked_abs)
            .map(int)
            .ok_or_else(|| RuntimeError::Overflow("integer overflow".into())),
        ObjectType::Float => Ok(float(obj.as_float().unwrap_or_default().abs())),
        _ => Err(RuntimeError::Type(format!(
            "bad operand type for abs(): '{}'",
            obj.type_name()
        ))),
    }
}

pub(crate) fn namespace() -> Ref<DictData> {
    let ns = dict();
    for (name, f) in [
        ("len", builtin_len as fn(Option<&ObjRef>, &ObjRef) -> RtResult<ObjRef>),
        ("repr", builtin_repr),
        ("abs", builtin_abs),
    ] {
        ns.set_str(name, native(NativeFunctionData::one(name, f)).into_obj());
    }
    ns
}
