//! Interoperability - calls arriving from generated code
//!
//! Architecture:
//! - `call.rs` - callable classification and the dispatch paths
//! - `marshal.rs` - stack slots to positional tuples and keyword dicts
//! - `abi.rs` - `extern "C"` entry points and the `RawOutcome` convention

mod call;
mod marshal;
mod abi;

pub use call::{dispatch_call, CallableKind};
pub use marshal::{build_positional_tuple, merge_keywords};
pub use abi::{decode_oparg, nb_call_function, nb_error_free, nb_error_kind, RawOutcome};

pub use crate::runtime::DispatchStats as InteropStats;

/// Dispatch path counters for the calling thread
pub fn stats() -> InteropStats {
    crate::runtime::dispatch_stats()
}

#[cfg(test)]
mod tests;
