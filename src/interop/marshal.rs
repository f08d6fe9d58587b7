//! Argument marshaling - stack slots to tuples and keyword dicts
//!
//! Slices are in stack order: index 0 is the most recently pushed value.
//! Every reference taken out of a slice is moved, never copied, so a slot
//! is `None` exactly when its reference has been handed on.

use crate::error::{RtResult, RuntimeError};
use crate::objects::protocol::{describe_callable, repr};
use crate::objects::{tuple, DictData, DictKey, ObjRef, Ref, Slot, TupleData};

/// Move the reference out of a slot
///
/// An already emptied slot means the argument vector was malformed; that is
/// a defect in the caller and aborts the call.
#[inline]
pub(crate) fn take_slot(slot: &mut Slot) -> ObjRef {
    match slot.take() {
        Some(obj) => obj,
        None => panic!("argument vector slot consumed twice"),
    }
}

/// Build the positional tuple from the top `n` slots
///
/// Reverses stack order into call order; moves exactly `n` references.
pub fn build_positional_tuple(slots: &mut [Slot], n: usize) -> Ref<TupleData> {
    assert!(
        slots.len() >= n,
        "argument vector holds {} slots, {} positionals requested",
        slots.len(),
        n
    );
    let items = slots[..n].iter_mut().rev().map(take_slot).collect();
    tuple(items)
}

/// Merge `nk` keyword pairs into a fresh dict or a copy of `existing`
///
/// The slice holds `2 * nk` slots as pushed: for the pair at call position
/// `j`, the value sits at `2 * (nk - 1 - j)` and the key right after it.
/// Pairs are merged in call order. A repeated key releases that pair and the
/// partial dict and fails; later pairs stay in their slots.
pub fn merge_keywords(
    existing: Option<Ref<DictData>>,
    slots: &mut [Slot],
    nk: usize,
    callable: &ObjRef,
) -> RtResult<Ref<DictData>> {
    assert!(
        slots.len() >= 2 * nk,
        "argument vector holds {} slots, {} keyword pairs requested",
        slots.len(),
        nk
    );
    let merged = match existing {
        Some(original) => Ref::new(original.copy()),
        None => Ref::new(DictData::new()),
    };

    for position in 0..nk {
        let base = 2 * (nk - 1 - position);
        let value = take_slot(&mut slots[base]);
        let key = take_slot(&mut slots[base + 1]);
        let key = DictKey::new(key)?;
        if merged.contains_hashed(&key) {
            return Err(RuntimeError::DuplicateKeyword {
                callable: describe_callable(callable),
                key: keyword_text(key.key()),
            });
        }
        merged.insert_hashed(key, value);
    }
    Ok(merged)
}

fn keyword_text(key: &ObjRef) -> String {
    match key.as_str() {
        Some(text) => text.to_string(),
        None => repr(key),
    }
}
