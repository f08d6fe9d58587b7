//! Runtime bridge table - what generated code links against
//!
//! Architecture:
//! - `symbols.rs` - `extern "C"` runtime primitives
//! - `messages.rs` - failure message templates
//!
//! The table maps symbolic names to primitive addresses, field offsets,
//! template addresses and error-kind codes. It is built once, verified, and
//! then read-only for the life of the process.

pub mod messages;
pub mod symbols;

use core::mem::offset_of;
use std::collections::BTreeMap;
use std::ffi::CStr;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{error, info};

use crate::error::{ErrorKind, RtResult, RuntimeError};
use crate::interop::{nb_call_function, nb_error_free, nb_error_kind};
use crate::objects::{dict_type, Boxed, ItemArray, ListData, ObjectHeader, TupleData, TypeInfo};
use symbols::*;

/// Field offsets every table must carry
pub const REQUIRED_OFFSETS: &[&str] = &[
    "refcnt_offset",
    "type_offset",
    "type_dealloc_offset",
    "type_iternext_offset",
    "tuple_item_offset",
    "tuple_size_offset",
    "list_item_offset",
    "list_size_offset",
];

/// Primitive addresses every table must carry; number operations are
/// checked separately
pub const REQUIRED_ADDRESSES: &[&str] = &[
    "nb_incref",
    "nb_decref",
    "nb_dict_getitem",
    "nb_dict_setitem",
    "nb_object_getitem",
    "nb_object_setitem",
    "nb_object_getiter",
    "nb_object_getattr",
    "nb_object_is_true",
    "nb_eval_get_globals",
    "nb_eval_get_builtins",
    "nb_error_format",
    "nb_error_matches",
    "nb_error_free",
    "nb_error_kind",
    "nb_tuple_from_stack",
    "nb_list_from_stack",
    "nb_compare",
    "nb_call_function",
    "dict_type",
];

/// Build target name as reported to the generator
pub const fn architecture() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "X86_64"
    } else if cfg!(target_arch = "x86") {
        "X86"
    } else if cfg!(any(target_arch = "powerpc", target_arch = "powerpc64")) {
        "PowerPC"
    } else if cfg!(target_arch = "aarch64") {
        "AArch64"
    } else {
        "unknown"
    }
}

/// Immutable name-to-value registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeTable {
    pub architecture: &'static str,
    pub ref_debug: bool,
    pub count_allocs: bool,
    pub offsets: BTreeMap<&'static str, usize>,
    pub addresses: BTreeMap<&'static str, usize>,
    pub messages: BTreeMap<&'static str, usize>,
    pub constants: BTreeMap<&'static str, u32>,
}

impl BridgeTable {
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    pub fn address(&self, name: &str) -> Option<usize> {
        self.addresses.get(name).copied()
    }

    pub fn message(&self, name: &str) -> Option<usize> {
        self.messages.get(name).copied()
    }

    pub fn constant(&self, name: &str) -> Option<u32> {
        self.constants.get(name).copied()
    }

    /// Total number of published entries
    pub fn len(&self) -> usize {
        self.offsets.len() + self.addresses.len() + self.messages.len() + self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self) -> RtResult<String> {
        serde_json::to_string(self).map_err(|e| RuntimeError::Bridge(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> RtResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RuntimeError::Bridge(e.to_string()))
    }
}

/// Accumulates entries, rejecting duplicates as they arrive
#[derive(Debug)]
pub struct BridgeTableBuilder {
    table: BridgeTable,
}

fn insert<V>(
    section: &str,
    map: &mut BTreeMap<&'static str, V>,
    name: &'static str,
    value: V,
) -> RtResult<()> {
    if map.contains_key(name) {
        return Err(RuntimeError::Bridge(format!(
            "duplicate {} entry '{}'",
            section, name
        )));
    }
    map.insert(name, value);
    Ok(())
}

impl BridgeTableBuilder {
    pub fn new() -> Self {
        Self {
            table: BridgeTable {
                architecture: architecture(),
                ref_debug: crate::objects::REF_DEBUG,
                count_allocs: cfg!(feature = "count-allocs"),
                offsets: BTreeMap::new(),
                addresses: BTreeMap::new(),
                messages: BTreeMap::new(),
                constants: BTreeMap::new(),
            },
        }
    }

    pub fn offset(&mut self, name: &'static str, value: usize) -> RtResult<&mut Self> {
        insert("offset", &mut self.table.offsets, name, value)?;
        Ok(self)
    }

    pub fn address(&mut self, name: &'static str, address: usize) -> RtResult<&mut Self> {
        if address == 0 {
            return Err(RuntimeError::Bridge(format!("null address for '{}'", name)));
        }
        insert("address", &mut self.table.addresses, name, address)?;
        Ok(self)
    }

    pub fn message(&mut self, name: &'static str, template: &'static CStr) -> RtResult<&mut Self> {
        insert("message", &mut self.table.messages, name, template.as_ptr() as usize)?;
        Ok(self)
    }

    pub fn constant(&mut self, name: &'static str, value: u32) -> RtResult<&mut Self> {
        insert("constant", &mut self.table.constants, name, value)?;
        Ok(self)
    }

    /// Verify that every required entry is present
    pub fn finish(self) -> RtResult<BridgeTable> {
        let table = self.table;
        let missing: Vec<&str> = REQUIRED_OFFSETS
            .iter()
            .filter(|name| !table.offsets.contains_key(*name))
            .chain(
                REQUIRED_ADDRESSES
                    .iter()
                    .filter(|name| !table.addresses.contains_key(*name)),
            )
            .copied()
            .chain(
                number_table()
                    .into_iter()
                    .flat_map(|(binary, inplace, _, _)| [binary, inplace])
                    .filter(|name| !table.addresses.contains_key(name)),
            )
            .chain(
                messages::all()
                    .into_iter()
                    .map(|(name, _)| name)
                    .filter(|name| !table.messages.contains_key(name)),
            )
            .collect();

        if !missing.is_empty() {
            return Err(RuntimeError::Bridge(format!(
                "missing required entries: {}",
                missing.join(", ")
            )));
        }
        Ok(table)
    }
}

impl Default for BridgeTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Snake-case constant name for an error family, e.g. `zero_division_error`
fn error_constant_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Type => "type_error",
        ErrorKind::Name => "name_error",
        ErrorKind::UnboundLocal => "unbound_local_error",
        ErrorKind::Attribute => "attribute_error",
        ErrorKind::Index => "index_error",
        ErrorKind::Key => "key_error",
        ErrorKind::Value => "value_error",
        ErrorKind::ZeroDivision => "zero_division_error",
        ErrorKind::Overflow => "overflow_error",
        ErrorKind::Recursion => "recursion_error",
        ErrorKind::System => "system_error",
        ErrorKind::Io => "io_error",
        ErrorKind::Bridge => "bridge_error",
        ErrorKind::Config => "config_error",
        ErrorKind::Raised => "raised_error",
        ErrorKind::StopIteration => "stop_iteration",
    }
}

/// Assemble the table for this build
pub fn build() -> RtResult<BridgeTable> {
    let mut builder = BridgeTableBuilder::new();

    let tuple_items = offset_of!(Boxed<TupleData>, data) + offset_of!(TupleData, items);
    let list_data = offset_of!(Boxed<ListData>, data);
    builder
        .offset("refcnt_offset", offset_of!(ObjectHeader, refcount))?
        .offset("type_offset", offset_of!(ObjectHeader, type_info))?
        .offset("type_dealloc_offset", offset_of!(TypeInfo, dealloc))?
        .offset("type_iternext_offset", offset_of!(TypeInfo, iternext))?
        .offset("tuple_item_offset", tuple_items + offset_of!(ItemArray, ptr))?
        .offset("tuple_size_offset", tuple_items + offset_of!(ItemArray, len))?
        .offset("list_item_offset", list_data + offset_of!(ListData, ptr))?
        .offset("list_size_offset", list_data + offset_of!(ListData, len))?;

    builder
        .address("nb_incref", nb_incref as usize)?
        .address("nb_decref", nb_decref as usize)?
        .address("nb_dict_getitem", nb_dict_getitem as usize)?
        .address("nb_dict_setitem", nb_dict_setitem as usize)?
        .address("nb_object_getitem", nb_object_getitem as usize)?
        .address("nb_object_setitem", nb_object_setitem as usize)?
        .address("nb_object_getiter", nb_object_getiter as usize)?
        .address("nb_object_getattr", nb_object_getattr as usize)?
        .address("nb_object_is_true", nb_object_is_true as usize)?
        .address("nb_eval_get_globals", nb_eval_get_globals as usize)?
        .address("nb_eval_get_builtins", nb_eval_get_builtins as usize)?
        .address("nb_error_format", nb_error_format as usize)?
        .address("nb_error_matches", nb_error_matches as usize)?
        .address("nb_error_free", nb_error_free as usize)?
        .address("nb_error_kind", nb_error_kind as usize)?
        .address("nb_tuple_from_stack", nb_tuple_from_stack as usize)?
        .address("nb_list_from_stack", nb_list_from_stack as usize)?
        .address("nb_compare", nb_compare as usize)?
        .address("nb_call_function", nb_call_function as usize)?
        .address("dict_type", dict_type() as *const TypeInfo as usize)?;

    for (binary, inplace, binary_fn, inplace_fn) in number_table() {
        builder.address(binary, binary_fn)?.address(inplace, inplace_fn)?;
    }

    for (name, template) in messages::all() {
        builder.message(name, template)?;
    }

    for kind in ErrorKind::ALL {
        builder.constant(error_constant_name(kind), kind as u32)?;
    }

    builder.finish()
}

static TABLE: OnceCell<BridgeTable> = OnceCell::new();

/// Build and publish the table on first use
///
/// # Panics
/// When the table cannot be built; generated code cannot run without it.
pub fn publish() -> &'static BridgeTable {
    TABLE.get_or_init(|| {
        let _timer = crate::logging::perf::track("bridge_build");
        match build() {
            Ok(table) => {
                info!(
                    event = "bridge_published",
                    architecture = table.architecture,
                    entries = table.len(),
                    ref_debug = table.ref_debug,
                    count_allocs = table.count_allocs,
                    "Bridge table published"
                );
                table
            }
            Err(e) => {
                error!(event = "bridge_publish_failed", error = %e, "Bridge table incomplete");
                panic!("{}", e);
            }
        }
    })
}

/// The published table, if any
pub fn global() -> Option<&'static BridgeTable> {
    TABLE.get()
}

#[cfg(test)]
mod tests;
