//! Immutable scalar payloads: none, bool, int, float, str

use super::header::{payload_type, ObjRef, ObjectType};

pub struct NoneData;

pub struct BoolData(pub bool);

pub struct IntData(pub i64);

pub struct FloatData(pub f64);

pub struct StrData(Box<str>);

payload_type!(NoneData, NONE_TYPE, "NoneType", ObjectType::None);
payload_type!(BoolData, BOOL_TYPE, "bool", ObjectType::Bool);
payload_type!(IntData, INT_TYPE, "int", ObjectType::Int);
payload_type!(FloatData, FLOAT_TYPE, "float", ObjectType::Float);
payload_type!(StrData, STR_TYPE, "str", ObjectType::Str);

impl StrData {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

thread_local! {
    static NONE: ObjRef = ObjRef::new(NoneData);
    static TRUE: ObjRef = ObjRef::new(BoolData(true));
    static FALSE: ObjRef = ObjRef::new(BoolData(false));
}

/// The `None` singleton of the current thread
pub fn none() -> ObjRef {
    NONE.with(ObjRef::clone)
}

pub fn boolean(value: bool) -> ObjRef {
    if value {
        TRUE.with(ObjRef::clone)
    } else {
        FALSE.with(ObjRef::clone)
    }
}

pub fn int(value: i64) -> ObjRef {
    ObjRef::new(IntData(value))
}

pub fn float(value: f64) -> ObjRef {
    ObjRef::new(FloatData(value))
}

pub fn string(value: &str) -> ObjRef {
    ObjRef::new(StrData(value.into()))
}

impl ObjRef {
    #[inline]
    pub fn is_none(&self) -> bool {
        self.object_type() == ObjectType::None
    }

    /// Integer value of an int or bool
    pub fn as_int(&self) -> Option<i64> {
        if let Some(int) = self.downcast::<IntData>() {
            return Some(int.0);
        }
        self.downcast::<BoolData>().map(|b| i64::from(b.0))
    }

    /// Float value of a float, int or bool
    pub fn as_float(&self) -> Option<f64> {
        match self.downcast::<FloatData>() {
            Some(f) => Some(f.0),
            None => self.as_int().map(|i| i as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.downcast::<StrData>().map(StrData::as_str)
    }
}
