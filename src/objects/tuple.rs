//! Tuple payload
//!
//! Items live in a separately allocated array whose `{ptr, len}` pair has a
//! fixed `repr(C)` layout, so generated code can index it through
//! `tuple_item_offset`.

use core::ptr::{self, NonNull};
use core::slice;

use super::header::{payload_type, ObjRef, ObjectType, Ref};

/// Owned, fixed-length array of references
#[repr(C)]
pub struct ItemArray {
    pub(crate) ptr: NonNull<ObjRef>,
    pub(crate) len: usize,
}

impl ItemArray {
    pub fn from_vec(items: Vec<ObjRef>) -> Self {
        let boxed = items.into_boxed_slice();
        let len = boxed.len();
        let raw = Box::into_raw(boxed).cast::<ObjRef>();
        Self {
            // SAFETY: Box::into_raw never returns null, even for empty slices
            ptr: unsafe { NonNull::new_unchecked(raw) },
            len,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[ObjRef] {
        // SAFETY: ptr/len come from a boxed slice owned by self
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for ItemArray {
    fn drop(&mut self) {
        // SAFETY: reconstructs the boxed slice created in from_vec
        unsafe {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.len,
            )));
        }
    }
}

#[repr(C)]
pub struct TupleData {
    pub(crate) items: ItemArray,
}

payload_type!(TupleData, TUPLE_TYPE, "tuple", ObjectType::Tuple);

impl TupleData {
    #[inline]
    pub fn items(&self) -> &[ObjRef] {
        self.items.as_slice()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.len == 0
    }

    pub fn get(&self, index: usize) -> Option<&ObjRef> {
        self.items().get(index)
    }
}

/// Build a tuple taking ownership of `items`
pub fn tuple(items: Vec<ObjRef>) -> Ref<TupleData> {
    Ref::new(TupleData {
        items: ItemArray::from_vec(items),
    })
}
