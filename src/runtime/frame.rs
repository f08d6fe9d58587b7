//! Execution frames

use smallvec::{smallvec, SmallVec};

use crate::error::{RtResult, RuntimeError};
use crate::objects::{CodeData, DictData, ObjRef, Ref, Slot, TupleData};

/// Activation record for one code object
pub struct Frame {
    pub code: Ref<CodeData>,
    pub globals: Ref<DictData>,
    /// Fast locals, parameters first; `None` while unbound
    pub locals: SmallVec<[Slot; 8]>,
    /// Closure cells, one per free variable
    pub cells: SmallVec<[ObjRef; 4]>,
    stack: Vec<ObjRef>,
}

impl Frame {
    pub fn new(code: Ref<CodeData>, globals: Ref<DictData>, closure: Option<&Ref<TupleData>>) -> Self {
        let nlocals = code.nlocals();
        let cells = closure
            .map(|cells| cells.items().iter().cloned().collect())
            .unwrap_or_default();
        Self {
            code,
            globals,
            locals: smallvec![None; nlocals],
            cells,
            stack: Vec::with_capacity(8),
        }
    }

    #[inline]
    pub fn push(&mut self, value: ObjRef) {
        self.stack.push(value);
    }

    #[inline]
    pub fn pop(&mut self) -> RtResult<ObjRef> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::System("value stack underflow".into()))
    }

    pub fn top(&self) -> RtResult<&ObjRef> {
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::System("value stack underflow".into()))
    }

    /// Pop `n` values in push order
    pub fn pop_n(&mut self, n: usize) -> RtResult<Vec<ObjRef>> {
        if n > self.stack.len() {
            return Err(RuntimeError::System("value stack underflow".into()));
        }
        let at = self.stack.len() - n;
        Ok(self.stack.split_off(at))
    }

    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }
}
