//! Class instances

use super::dict::{dict, DictData};
use super::header::{payload_type, ObjRef, ObjectType, Ref};

/// Instance of a user class; methods live in the shared class dict
pub struct InstanceData {
    pub class_name: Box<str>,
    pub class_dict: Ref<DictData>,
    pub attrs: Ref<DictData>,
}

payload_type!(InstanceData, INSTANCE_TYPE, "object", ObjectType::Instance);

pub fn instance(class_name: &str, class_dict: Ref<DictData>) -> Ref<InstanceData> {
    Ref::new(InstanceData {
        class_name: class_name.into(),
        class_dict,
        attrs: dict(),
    })
}

impl InstanceData {
    pub fn set_attr(&self, name: &str, value: ObjRef) {
        self.attrs.set_str(name, value);
    }
}
