//! Runtime - frames, evaluation and the general call interface
//!
//! Architecture:
//! - `state.rs` - thread-local recursion counter, active globals, counters
//! - `frame.rs` - activation records with fast locals
//! - `eval.rs` - instruction loop and argument binding
//! - `call.rs` - `call_object`, the fully general call route
//! - `builtins.rs` - builtins namespace

mod state;
mod frame;
mod eval;
mod call;
mod builtins;

pub use state::{
    builtins, current_globals, dispatch_stats, recursion_depth, recursion_limit,
    set_default_recursion_limit, set_recursion_limit, DispatchStats, GlobalsScope,
    RecursionGuard, DEFAULT_RECURSION_LIMIT, STACK_RED_ZONE,
};
pub(crate) use state::record_dispatch;
pub use frame::Frame;
pub use eval::{eval_code_ex, eval_frame};
pub use call::{call_function, call_native, call_object};

use crate::objects::ObjRef;

pub(crate) fn builtins_lookup(name: &str) -> Option<ObjRef> {
    builtins().get_str(name)
}
