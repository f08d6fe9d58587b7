//! Object metadata - layout primitives shared with generated code
//!
//! Every heap object is a `Boxed<T>`: an [`ObjectHeader`] followed by its
//! payload. Generated code touches the header through the offsets the bridge
//! table publishes, so both header structs are `repr(C)`.

use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ops::Deref;
use core::ptr::{self, NonNull};

#[cfg(feature = "count-allocs")]
use std::sync::atomic::{AtomicUsize, Ordering};

/// Header prefixed to every heap object
#[repr(C)]
pub struct ObjectHeader {
    pub refcount: Cell<usize>,
    pub type_info: &'static TypeInfo,
}

/// Destructor slot; frees the whole `Boxed<T>` allocation
pub type DeallocFn = unsafe extern "C" fn(*mut ObjectHeader);

/// Iteration slot; returns a new reference or null when exhausted
pub type IterNextFn = unsafe extern "C" fn(*mut ObjectHeader) -> *mut ObjectHeader;

/// Type metadata - one immutable static per payload type
#[repr(C)]
pub struct TypeInfo {
    pub dealloc: DeallocFn,
    pub iternext: Option<IterNextFn>,
    pub object_type: ObjectType,
    pub name: &'static str,
}

/// Object type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectType {
    None = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    Str = 4,
    Tuple = 5,
    List = 6,
    Dict = 7,
    Code = 8,
    Function = 9,
    NativeFunction = 10,
    BoundMethod = 11,
    Callable = 12,
    Instance = 13,
    Cell = 14,
    Iterator = 15,
    Compiled = 16,
}

/// Heap layout of an object: header first, payload after
#[repr(C)]
pub struct Boxed<T> {
    pub header: ObjectHeader,
    pub data: T,
}

/// Payload types that can live behind an [`ObjRef`]
pub trait Payload: Sized + 'static {
    fn type_info() -> &'static TypeInfo;
}

/// Generic destructor installed in every `TypeInfo`
///
/// # Safety
/// `obj` must point at a `Boxed<T>` whose refcount just reached zero.
pub unsafe extern "C" fn dealloc_boxed<T: Payload>(obj: *mut ObjectHeader) {
    drop(Box::from_raw(obj.cast::<Boxed<T>>()));
}

/// Declare the static `TypeInfo` of a payload type and implement [`Payload`]
macro_rules! payload_type {
    ($ty:ty, $info:ident, $name:literal, $kind:expr) => {
        payload_type!($ty, $info, $name, $kind, None);
    };
    ($ty:ty, $info:ident, $name:literal, $kind:expr, $iternext:expr) => {
        pub(crate) static $info: $crate::objects::TypeInfo = $crate::objects::TypeInfo {
            dealloc: $crate::objects::dealloc_boxed::<$ty>,
            iternext: $iternext,
            object_type: $kind,
            name: $name,
        };

        impl $crate::objects::Payload for $ty {
            #[inline]
            fn type_info() -> &'static $crate::objects::TypeInfo {
                &$info
            }
        }
    };
}
pub(crate) use payload_type;

/// Refcount checks run in debug builds and with `ref-debug`
pub const REF_DEBUG: bool = cfg!(any(debug_assertions, feature = "ref-debug"));

#[cfg(feature = "count-allocs")]
static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
#[cfg(feature = "count-allocs")]
static DEALLOCATED: AtomicUsize = AtomicUsize::new(0);

/// Allocation counters, all zero unless built with `count-allocs`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub allocated: usize,
    pub deallocated: usize,
}

pub fn alloc_stats() -> AllocStats {
    #[cfg(feature = "count-allocs")]
    {
        AllocStats {
            allocated: ALLOCATED.load(Ordering::Relaxed),
            deallocated: DEALLOCATED.load(Ordering::Relaxed),
        }
    }
    #[cfg(not(feature = "count-allocs"))]
    {
        AllocStats::default()
    }
}

/// Owned reference to a heap object
///
/// Clone acquires, drop releases; the last release runs the type's
/// `dealloc`. `repr(transparent)` over a non-null pointer, so `Option<ObjRef>`
/// is a nullable object pointer on the native side.
#[repr(transparent)]
pub struct ObjRef(NonNull<ObjectHeader>);

/// One argument-vector position; `None` once its reference was consumed
pub type Slot = Option<ObjRef>;

impl ObjRef {
    /// Allocate a new object with refcount 1
    pub fn new<T: Payload>(data: T) -> Self {
        let boxed = Box::new(Boxed {
            header: ObjectHeader {
                refcount: Cell::new(1),
                type_info: T::type_info(),
            },
            data,
        });
        #[cfg(feature = "count-allocs")]
        ALLOCATED.fetch_add(1, Ordering::Relaxed);
        // SAFETY: Box::into_raw never returns null
        Self(unsafe { NonNull::new_unchecked(Box::into_raw(boxed).cast()) })
    }

    #[inline]
    pub fn header(&self) -> &ObjectHeader {
        // SAFETY: a live ObjRef always points at a live object
        unsafe { self.0.as_ref() }
    }

    #[inline]
    pub fn type_info(&self) -> &'static TypeInfo {
        self.header().type_info
    }

    #[inline]
    pub fn object_type(&self) -> ObjectType {
        self.type_info().object_type
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_info().name
    }

    /// Current reference count
    #[inline]
    pub fn refcount(&self) -> usize {
        self.header().refcount.get()
    }

    #[inline]
    pub fn is<T: Payload>(&self) -> bool {
        ptr::eq(self.type_info(), T::type_info())
    }

    /// Borrow the payload if the object has type `T`
    #[inline]
    pub fn downcast<T: Payload>(&self) -> Option<&T> {
        if self.is::<T>() {
            // SAFETY: type_info identifies the payload type of the allocation
            Some(unsafe { &(*self.0.as_ptr().cast::<Boxed<T>>()).data })
        } else {
            None
        }
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ObjRef) -> bool {
        self.0 == other.0
    }

    /// Identity of the object (its address)
    #[inline]
    pub fn id(&self) -> usize {
        self.0.as_ptr() as usize
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut ObjectHeader {
        self.0.as_ptr()
    }

    /// Give up ownership without releasing
    #[inline]
    pub fn into_raw(self) -> *mut ObjectHeader {
        let raw = self.0.as_ptr();
        mem::forget(self);
        raw
    }

    /// Take ownership of a reference previously produced by `into_raw`
    ///
    /// # Safety
    /// `raw` must be a non-null pointer to a live object carrying a reference
    /// the caller owns.
    #[inline]
    pub unsafe fn from_raw(raw: *mut ObjectHeader) -> Self {
        Self(NonNull::new_unchecked(raw))
    }

    /// Acquire a new reference from a borrowed pointer
    ///
    /// # Safety
    /// `raw` must be a non-null pointer to a live object.
    #[inline]
    pub unsafe fn from_borrowed(raw: *mut ObjectHeader) -> Self {
        let borrowed = ManuallyDrop::new(Self::from_raw(raw));
        (*borrowed).clone()
    }

    /// Release a reference, running the destructor at zero
    #[cold]
    #[inline(never)]
    fn destroy(&mut self) {
        let dealloc = self.type_info().dealloc;
        #[cfg(feature = "count-allocs")]
        DEALLOCATED.fetch_add(1, Ordering::Relaxed);
        // SAFETY: the count just reached zero; nobody else can observe the object
        unsafe { dealloc(self.0.as_ptr()) }
    }
}

impl Clone for ObjRef {
    #[inline]
    fn clone(&self) -> Self {
        let count = &self.header().refcount;
        if REF_DEBUG {
            assert!(count.get() < usize::MAX, "refcount overflow");
        }
        count.set(count.get() + 1);
        Self(self.0)
    }
}

impl Drop for ObjRef {
    #[inline]
    fn drop(&mut self) {
        let count = &self.header().refcount;
        let old = count.get();
        if REF_DEBUG {
            assert!(old > 0, "refcount underflow");
        }
        count.set(old - 1);
        if old == 1 {
            self.destroy();
        }
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::objects::protocol::repr(self))
    }
}

/// Typed owned reference; derefs to the payload
#[repr(transparent)]
pub struct Ref<T: Payload> {
    obj: ObjRef,
    _marker: PhantomData<T>,
}

impl<T: Payload> Ref<T> {
    pub fn new(data: T) -> Self {
        Self {
            obj: ObjRef::new(data),
            _marker: PhantomData,
        }
    }

    /// Convert an untyped reference, handing it back on type mismatch
    pub fn downcast(obj: ObjRef) -> Result<Self, ObjRef> {
        if obj.is::<T>() {
            Ok(Self {
                obj,
                _marker: PhantomData,
            })
        } else {
            Err(obj)
        }
    }

    /// Acquire a typed reference from a borrowed untyped one
    pub fn from_obj(obj: &ObjRef) -> Option<Self> {
        Self::downcast(obj.clone()).ok()
    }

    #[inline]
    pub fn as_obj(&self) -> &ObjRef {
        &self.obj
    }

    #[inline]
    pub fn into_obj(self) -> ObjRef {
        self.obj
    }
}

impl<T: Payload> Deref for Ref<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: construction checked the payload type
        unsafe { &(*self.obj.as_ptr().cast::<Boxed<T>>()).data }
    }
}

impl<T: Payload> Clone for Ref<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            obj: self.obj.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Payload> From<Ref<T>> for ObjRef {
    fn from(value: Ref<T>) -> Self {
        value.into_obj()
    }
}

impl<T: Payload> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.obj, f)
    }
}
