//! Object model - reference counted heap objects shared with generated code
//!
//! Architecture:
//! - `header.rs` - header/type layout, `ObjRef` ownership, typed `Ref<T>`
//! - `scalar.rs` - none, bool, int, float, str
//! - `tuple.rs`, `list.rs`, `dict.rs` - containers
//! - `code.rs` - code objects, flags and the decoded instruction set
//! - `function.rs` - functions, native primitives, bound methods, cells
//! - `instance.rs`, `iter.rs` - class instances and iterators
//! - `number.rs`, `protocol.rs` - operator and object protocols

mod header;
mod scalar;
mod tuple;
mod list;
mod dict;
mod code;
mod function;
mod instance;
mod iter;
pub mod number;
pub mod protocol;

pub(crate) use header::payload_type;
pub use header::{
    alloc_stats, dealloc_boxed, AllocStats, Boxed, DeallocFn, IterNextFn, ObjRef, ObjectHeader,
    ObjectType, Payload, Ref, Slot, TypeInfo, REF_DEBUG,
};
pub use scalar::{boolean, float, int, none, string, BoolData, FloatData, IntData, NoneData, StrData};
pub use tuple::{tuple, ItemArray, TupleData};
pub use list::{list, ListData};
pub use dict::{dict, DictData, DictKey};
pub use code::{CodeBuilder, CodeData, CodeFlags, Instr};
pub use function::{
    bound_method, callable, cell, function, native, BoundMethodData, CallableData, CellData,
    FunctionData, NativeFlags, NativeFunctionData, NativeImpl,
};
pub use instance::{instance, InstanceData};
pub use iter::IteratorData;
pub use number::NumberOp;
pub use protocol::CompareOp;

/// Type info of the dict type, published for generated type checks
pub fn dict_type() -> &'static TypeInfo {
    <DictData as Payload>::type_info()
}
