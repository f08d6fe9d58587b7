//! Dict payload - insertion ordered, keyed by runtime hash/equality

use core::cell::RefCell;
use core::hash::{Hash, Hasher};

use indexmap::IndexMap;

use super::header::{payload_type, ObjRef, ObjectType, Ref};
use super::protocol;
use super::scalar::string;
use crate::error::RtResult;

/// Key wrapper carrying the precomputed runtime hash
pub struct DictKey {
    hash: u64,
    key: ObjRef,
}

impl DictKey {
    pub fn new(key: ObjRef) -> RtResult<Self> {
        let hash = protocol::hash(&key)?;
        Ok(Self { hash, key })
    }

    #[inline]
    pub fn key(&self) -> &ObjRef {
        &self.key
    }

    #[inline]
    pub fn into_key(self) -> ObjRef {
        self.key
    }
}

impl Hash for DictKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && protocol::equals(&self.key, &other.key)
    }
}

impl Eq for DictKey {}

pub struct DictData {
    map: RefCell<IndexMap<DictKey, ObjRef>>,
}

payload_type!(DictData, DICT_TYPE, "dict", ObjectType::Dict);

impl DictData {
    pub fn new() -> Self {
        Self {
            map: RefCell::new(IndexMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }

    pub fn get(&self, key: &ObjRef) -> RtResult<Option<ObjRef>> {
        let key = DictKey::new(key.clone())?;
        Ok(self.map.borrow().get(&key).cloned())
    }

    pub fn get_str(&self, name: &str) -> Option<ObjRef> {
        // str keys are always hashable
        self.get(&string(name)).ok().flatten()
    }

    pub fn contains(&self, key: &ObjRef) -> RtResult<bool> {
        let key = DictKey::new(key.clone())?;
        Ok(self.map.borrow().contains_key(&key))
    }

    /// Insert or replace; the displaced value is released after the borrow ends
    pub fn set(&self, key: ObjRef, value: ObjRef) -> RtResult<()> {
        let key = DictKey::new(key)?;
        self.insert_hashed(key, value);
        Ok(())
    }

    pub fn set_str(&self, name: &str, value: ObjRef) {
        let key = DictKey {
            hash: protocol::hash_str(name),
            key: string(name),
        };
        self.insert_hashed(key, value);
    }

    /// Insert a prehashed key; returns the previous value
    pub fn insert_hashed(&self, key: DictKey, value: ObjRef) -> Option<ObjRef> {
        self.map.borrow_mut().insert(key, value)
    }

    pub fn contains_hashed(&self, key: &DictKey) -> bool {
        self.map.borrow().contains_key(key)
    }

    pub fn remove(&self, key: &ObjRef) -> RtResult<Option<ObjRef>> {
        let key = DictKey::new(key.clone())?;
        let removed = self.map.borrow_mut().shift_remove_entry(&key);
        Ok(removed.map(|(_, value)| value))
    }

    /// Clone out `(key, value)` pairs in insertion order
    pub fn entries(&self) -> Vec<(ObjRef, ObjRef)> {
        self.map
            .borrow()
            .iter()
            .map(|(k, v)| (k.key.clone(), v.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<ObjRef> {
        self.map.borrow().keys().map(|k| k.key.clone()).collect()
    }

    /// Shallow copy sharing keys and values
    pub fn copy(&self) -> Self {
        let copied = self
            .map
            .borrow()
            .iter()
            .map(|(k, v)| {
                (
                    DictKey {
                        hash: k.hash,
                        key: k.key.clone(),
                    },
                    v.clone(),
                )
            })
            .collect();
        Self {
            map: RefCell::new(copied),
        }
    }
}

impl Default for DictData {
    fn default() -> Self {
        Self::new()
    }
}

pub fn dict() -> Ref<DictData> {
    Ref::new(DictData::new())
}
