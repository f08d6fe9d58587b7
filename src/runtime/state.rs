//! Per-thread interpreter state
//!
//! Holds the recursion counter, the stack of active globals, the builtins
//! namespace and the dispatch path counters. Everything here is
//! thread-local; the only process-wide value is the default recursion limit
//! new threads start with.

use core::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::warn;

use crate::error::{RtResult, RuntimeError};
use crate::objects::{DictData, Ref};

pub const DEFAULT_RECURSION_LIMIT: u32 = 1000;

/// Native stack that must still be free when a level is entered
pub const STACK_RED_ZONE: usize = 128 * 1024;

static DEFAULT_LIMIT: AtomicU32 = AtomicU32::new(DEFAULT_RECURSION_LIMIT);

/// Counters for each dispatch path taken on this thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub fixed_native: u64,
    pub variadic_native: u64,
    pub bound_method: u64,
    pub fast_function: u64,
    pub generic: u64,
    pub failures: u64,
}

pub struct ThreadState {
    depth: Cell<u32>,
    limit: Cell<u32>,
    globals: RefCell<Vec<Ref<DictData>>>,
    builtins: RefCell<Option<Ref<DictData>>>,
    dispatch: Cell<DispatchStats>,
}

thread_local! {
    static STATE: ThreadState = ThreadState::new();
}

impl ThreadState {
    fn new() -> Self {
        Self {
            depth: Cell::new(0),
            limit: Cell::new(DEFAULT_LIMIT.load(Ordering::Relaxed)),
            globals: RefCell::new(Vec::new()),
            builtins: RefCell::new(None),
            dispatch: Cell::new(DispatchStats::default()),
        }
    }
}

#[inline]
fn with_state<R>(f: impl FnOnce(&ThreadState) -> R) -> R {
    STATE.with(f)
}

/// Current recursion depth of this thread
pub fn recursion_depth() -> u32 {
    with_state(|s| s.depth.get())
}

pub fn recursion_limit() -> u32 {
    with_state(|s| s.limit.get())
}

/// Set the limit for this thread
pub fn set_recursion_limit(limit: u32) {
    with_state(|s| s.limit.set(limit.max(1)));
}

/// Set the limit for this thread and every thread started afterwards
pub fn set_default_recursion_limit(limit: u32) {
    DEFAULT_LIMIT.store(limit.max(1), Ordering::Relaxed);
    set_recursion_limit(limit);
}

/// Scope holding one unit of recursion depth
#[must_use]
pub struct RecursionGuard {
    _private: (),
}

impl RecursionGuard {
    /// Enter one level, failing once the limit would be exceeded or the
    /// thread's native stack is down to [`STACK_RED_ZONE`]
    pub fn enter(context: &str) -> RtResult<Self> {
        let remaining = stacker::remaining_stack();
        with_state(|s| {
            let depth = s.depth.get() + 1;
            let exhausted = remaining.is_some_and(|left| left < STACK_RED_ZONE);
            if depth > s.limit.get() || exhausted {
                warn!(
                    event = "recursion_limit",
                    depth = s.depth.get(),
                    limit = s.limit.get(),
                    remaining_stack = ?remaining,
                    "Recursion limit exceeded"
                );
                return Err(RuntimeError::Recursion(format!(
                    "maximum recursion depth exceeded{}",
                    context
                )));
            }
            s.depth.set(depth);
            Ok(Self { _private: () })
        })
    }

    /// Enter one level without checking the limit
    pub fn unchecked() -> Self {
        with_state(|s| s.depth.set(s.depth.get() + 1));
        Self { _private: () }
    }
}

impl Drop for RecursionGuard {
    fn drop(&mut self) {
        with_state(|s| s.depth.set(s.depth.get().saturating_sub(1)));
    }
}

/// Scope during which `globals` is the active namespace
#[must_use]
pub struct GlobalsScope {
    _private: (),
}

impl GlobalsScope {
    pub fn push(globals: Ref<DictData>) -> Self {
        with_state(|s| s.globals.borrow_mut().push(globals));
        Self { _private: () }
    }
}

impl Drop for GlobalsScope {
    fn drop(&mut self) {
        let popped = with_state(|s| s.globals.borrow_mut().pop());
        drop(popped);
    }
}

/// Globals of the innermost running frame
pub fn current_globals() -> Option<Ref<DictData>> {
    with_state(|s| s.globals.borrow().last().cloned())
}

/// Builtins namespace of this thread, created on first use
pub fn builtins() -> Ref<DictData> {
    if let Some(existing) = with_state(|s| s.builtins.borrow().clone()) {
        return existing;
    }
    let created = super::builtins::namespace();
    with_state(|s| *s.builtins.borrow_mut() = Some(created.clone()));
    created
}

pub(crate) fn record_dispatch(update: impl FnOnce(&mut DispatchStats)) {
    with_state(|s| {
        let mut stats = s.dispatch.get();
        update(&mut stats);
        s.dispatch.set(stats);
    });
}

/// Dispatch path counters of this thread
pub fn dispatch_stats() -> DispatchStats {
    with_state(|s| s.dispatch.get())
}
