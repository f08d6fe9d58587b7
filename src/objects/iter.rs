//! Sequence iterators

use core::cell::Cell;
use core::mem::ManuallyDrop;
use core::ptr;

use super::header::{payload_type, ObjRef, ObjectHeader, ObjectType};
use super::list::ListData;
use super::scalar::{string, StrData};
use super::tuple::TupleData;

/// Cursor over a tuple, list or str
///
/// Lists are indexed live, so appends during iteration are observed.
pub struct IteratorData {
    source: ObjRef,
    index: Cell<usize>,
}

payload_type!(
    IteratorData,
    ITERATOR_TYPE,
    "iterator",
    ObjectType::Iterator,
    Some(iterator_next)
);

impl IteratorData {
    pub(crate) fn over(source: ObjRef) -> Self {
        Self {
            source,
            index: Cell::new(0),
        }
    }

    /// Next item, or `None` once exhausted
    pub fn next(&self) -> Option<ObjRef> {
        let index = self.index.get();
        let item = if let Some(tuple) = self.source.downcast::<TupleData>() {
            tuple.get(index).cloned()
        } else if let Some(list) = self.source.downcast::<ListData>() {
            list.get(index)
        } else if let Some(text) = self.source.downcast::<StrData>() {
            text.as_str()
                .chars()
                .nth(index)
                .map(|c| string(c.encode_utf8(&mut [0; 4])))
        } else {
            None
        };
        if item.is_some() {
            self.index.set(index + 1);
        }
        item
    }
}

/// `iternext` slot: new reference or null
///
/// # Safety
/// `obj` must point at a live iterator object.
unsafe extern "C" fn iterator_next(obj: *mut ObjectHeader) -> *mut ObjectHeader {
    let iter = ManuallyDrop::new(ObjRef::from_raw(obj));
    match iter.downcast::<IteratorData>().and_then(IteratorData::next) {
        Some(item) => item.into_raw(),
        None => ptr::null_mut(),
    }
}
