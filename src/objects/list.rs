//! List payload
//!
//! Storage is a `Vec<ObjRef>` split into raw parts held in cells, which
//! gives generated code a stable `{ptr, len, capacity}` layout. Elements
//! displaced by a mutation are dropped only after the parts are written
//! back, so a destructor never observes stale parts.

use core::cell::Cell;
use core::mem::ManuallyDrop;
use core::ptr::NonNull;

use super::header::{payload_type, ObjRef, ObjectType, Ref};

#[repr(C)]
pub struct ListData {
    pub(crate) ptr: Cell<NonNull<ObjRef>>,
    pub(crate) len: Cell<usize>,
    pub(crate) capacity: Cell<usize>,
}

payload_type!(ListData, LIST_TYPE, "list", ObjectType::List);

impl ListData {
    pub fn from_vec(items: Vec<ObjRef>) -> Self {
        let mut items = ManuallyDrop::new(items);
        Self {
            // SAFETY: Vec::as_mut_ptr is non-null (dangling when unallocated)
            ptr: Cell::new(unsafe { NonNull::new_unchecked(items.as_mut_ptr()) }),
            len: Cell::new(items.len()),
            capacity: Cell::new(items.capacity()),
        }
    }

    /// Run `f` on the backing vector; whatever `f` returns is dropped by the
    /// caller after the parts are stored back.
    fn with_vec<R>(&self, f: impl FnOnce(&mut Vec<ObjRef>) -> R) -> R {
        // SAFETY: parts always describe a live Vec allocation owned by self
        let mut items = ManuallyDrop::new(unsafe {
            Vec::from_raw_parts(self.ptr.get().as_ptr(), self.len.get(), self.capacity.get())
        });
        let result = f(&mut items);
        // SAFETY: see from_vec
        self.ptr.set(unsafe { NonNull::new_unchecked(items.as_mut_ptr()) });
        self.len.set(items.len());
        self.capacity.set(items.capacity());
        result
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len.get()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    pub fn get(&self, index: usize) -> Option<ObjRef> {
        self.with_vec(|items| items.get(index).cloned())
    }

    /// Clone out the current contents
    pub fn snapshot(&self) -> Vec<ObjRef> {
        self.with_vec(|items| items.clone())
    }

    pub fn push(&self, value: ObjRef) {
        self.with_vec(|items| items.push(value));
    }

    pub fn extend(&self, values: Vec<ObjRef>) {
        self.with_vec(|items| items.extend(values));
    }

    /// Replace the element at `index`, returning false when out of range
    pub fn set(&self, index: usize, value: ObjRef) -> bool {
        let displaced = self.with_vec(|items| match items.get_mut(index) {
            Some(slot) => Ok(core::mem::replace(slot, value)),
            None => Err(value),
        });
        displaced.is_ok()
    }
}

impl Drop for ListData {
    fn drop(&mut self) {
        // SAFETY: reclaims the Vec described by the parts
        drop(unsafe {
            Vec::from_raw_parts(self.ptr.get().as_ptr(), self.len.get(), self.capacity.get())
        });
    }
}

pub fn list(items: Vec<ObjRef>) -> Ref<ListData> {
    Ref::new(ListData::from_vec(items))
}
