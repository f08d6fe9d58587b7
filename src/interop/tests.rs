use proptest::prelude::*;

use super::*;
use crate::error::{RtResult, RuntimeError};
use crate::objects::protocol::{getattr, repr};
use crate::objects::{
    bound_method, callable, dict, function, int, native, string, CallableData, CodeBuilder,
    Instr, NativeFunctionData, NumberOp, ObjRef, Slot,
};

/// Lay out a call the way generated code pushes it and return the vector
/// top first
fn vector(callable: &ObjRef, positional: &[ObjRef], keywords: &[(&str, ObjRef)]) -> Vec<Slot> {
    let mut pushed = vec![callable.clone()];
    pushed.extend(positional.iter().cloned());
    for (key, value) in keywords {
        pushed.push(string(key));
        pushed.push(value.clone());
    }
    pushed.into_iter().rev().map(Some).collect()
}

fn dispatch(callable: &ObjRef, positional: &[ObjRef], keywords: &[(&str, ObjRef)]) -> RtResult<ObjRef> {
    let mut args = vector(callable, positional, keywords);
    let result = dispatch_call(&mut args, positional.len(), keywords.len());
    assert!(args.iter().all(Option::is_none), "dispatch left references behind");
    result
}

/// `def f(a, b): return a - b`
fn subtract() -> ObjRef {
    let code = CodeBuilder::new("f")
        .args(["a", "b"])
        .instrs([
            Instr::LoadFast(0),
            Instr::LoadFast(1),
            Instr::BinaryOp(NumberOp::Subtract),
            Instr::ReturnValue,
        ])
        .build();
    function(code, dict()).into_obj()
}

fn echo_args() -> ObjRef {
    native(NativeFunctionData::varargs("echo", |_, args| {
        Ok(string(&repr(args.as_obj())))
    }))
    .into_obj()
}

fn echo_kwargs() -> ObjRef {
    native(NativeFunctionData::keywords("echo_kw", |_, args, kwargs| {
        let kwargs = kwargs.map_or_else(|| "None".to_string(), |k| repr(k.as_obj()));
        Ok(string(&format!("{} {}", repr(args.as_obj()), kwargs)))
    }))
    .into_obj()
}

#[test]
fn test_fixed_native_no_args() {
    let clear = native(NativeFunctionData::no_args("clear", |_| Ok(int(1)))).into_obj();
    let before = stats();
    assert_eq!(dispatch(&clear, &[], &[]).unwrap().as_int(), Some(1));
    assert_eq!(stats().fixed_native, before.fixed_native + 1);

    let extra = [int(1), int(2)];
    let err = dispatch(&clear, &extra, &[]).unwrap_err();
    assert_eq!(err.to_string(), "clear() takes no arguments (2 given)");
    assert_eq!(stats().failures, before.failures + 1);
    assert!(extra.iter().all(|arg| arg.refcount() == 1));
}

#[test]
fn test_fixed_native_one() {
    let double = native(NativeFunctionData::one("double", |_, arg| {
        Ok(int(arg.as_int().unwrap_or_default() * 2))
    }))
    .into_obj();
    let arg = int(21);
    assert_eq!(dispatch(&double, &[arg.clone()], &[]).unwrap().as_int(), Some(42));
    assert_eq!(arg.refcount(), 1);

    let err = dispatch(&double, &[], &[]).unwrap_err();
    assert_eq!(err.to_string(), "double() takes exactly one argument (0 given)");
}

#[test]
fn test_fixed_native_with_keywords_goes_generic() {
    let double = native(NativeFunctionData::one("double", |_, arg| Ok(arg.clone()))).into_obj();
    let before = stats();
    let err = dispatch(&double, &[int(1)], &[("x", int(2))]).unwrap_err();
    assert_eq!(err.to_string(), "double() takes no keyword arguments");
    assert_eq!(stats().variadic_native, before.variadic_native + 1);
    assert_eq!(stats().fixed_native, before.fixed_native);
}

#[test]
fn test_bound_native_receiver() {
    let upper = getattr(&string("abc"), "upper").unwrap();
    assert_eq!(dispatch(&upper, &[], &[]).unwrap().as_str(), Some("ABC"));
}

#[test]
fn test_variadic_native_receives_call_order() {
    let echo = echo_args();
    let before = stats();
    let result = dispatch(&echo, &[int(1), int(2), int(3)], &[]).unwrap();
    assert_eq!(result.as_str(), Some("(1, 2, 3)"));
    assert_eq!(stats().variadic_native, before.variadic_native + 1);
}

#[test]
fn test_keyword_native_receives_merged_dict() {
    let echo = echo_kwargs();
    let result = dispatch(&echo, &[int(1)], &[("a", int(2)), ("b", int(3))]).unwrap();
    assert_eq!(result.as_str(), Some("(1,) {'a': 2, 'b': 3}"));

    let result = dispatch(&echo, &[], &[]).unwrap();
    assert_eq!(result.as_str(), Some("() None"));
}

#[test]
fn test_bound_method_passes_receiver_first() {
    let method = bound_method(int(10), subtract()).into_obj();
    let before = stats();
    assert_eq!(dispatch(&method, &[int(3)], &[]).unwrap().as_int(), Some(7));
    let after = stats();
    assert_eq!(after.bound_method, before.bound_method + 1);
    assert_eq!(after.fast_function, before.fast_function + 1);

    // With keywords the receiver still binds the first parameter
    assert_eq!(dispatch(&method, &[], &[("b", int(4))]).unwrap().as_int(), Some(6));
}

#[test]
fn test_bound_method_over_generic_callable() {
    let target = callable(CallableData::new("gadget", |args, _| Ok(string(&repr(args.as_obj())))));
    let method = bound_method(string("self"), target.into_obj()).into_obj();
    let result = dispatch(&method, &[int(1)], &[]).unwrap();
    assert_eq!(result.as_str(), Some("('self', 1)"));
}

#[test]
fn test_function_fast_path() {
    let f = subtract();
    let before = stats();
    assert_eq!(dispatch(&f, &[int(9), int(4)], &[]).unwrap().as_int(), Some(5));
    assert_eq!(stats().fast_function, before.fast_function + 1);
    assert_eq!(stats().generic, before.generic);
}

#[test]
fn test_function_with_keywords_takes_generic_path() {
    let f = subtract();
    let before = stats();
    let result = dispatch(&f, &[int(9)], &[("b", int(4))]).unwrap();
    assert_eq!(result.as_int(), Some(5));
    assert_eq!(stats().generic, before.generic + 1);
    assert_eq!(stats().fast_function, before.fast_function);

    // Arity mismatch also leaves the fast path
    let err = dispatch(&f, &[int(9)], &[]).unwrap_err();
    assert_eq!(err.to_string(), "f() takes exactly 2 positional arguments (1 given)");
}

#[test]
fn test_compiled_flag_does_not_block_fast_path() {
    let code = CodeBuilder::new("g")
        .consts([int(11)])
        .instrs([Instr::LoadConst(0), Instr::ReturnValue])
        .build();
    code.mark_compiled();
    let g = function(code, dict()).into_obj();
    let before = stats();
    assert_eq!(dispatch(&g, &[], &[]).unwrap().as_int(), Some(11));
    assert_eq!(stats().fast_function, before.fast_function + 1);
}

#[test]
fn test_generic_callable() {
    let gadget = callable(CallableData::new("gadget", |args, kwargs| {
        let kwargs = kwargs.map_or(0, |k| k.len());
        Ok(int((args.len() * 10 + kwargs) as i64))
    }))
    .into_obj();
    let before = stats();
    let result = dispatch(&gadget, &[int(1), int(2)], &[("k", int(3))]).unwrap();
    assert_eq!(result.as_int(), Some(21));
    assert_eq!(stats().generic, before.generic + 1);
}

#[test]
fn test_not_callable() {
    let value = int(3);
    let arg = string("x");
    let err = dispatch(&value, &[arg.clone()], &[]).unwrap_err();
    assert_eq!(err.to_string(), "'int' object is not callable");
    assert_eq!(value.refcount(), 1);
    assert_eq!(arg.refcount(), 1);
}

#[test]
fn test_duplicate_keyword_in_call() {
    let echo = echo_kwargs();
    let first = int(1);
    let second = int(2);
    let third = int(3);
    let err = dispatch(
        &echo,
        &[],
        &[("x", first.clone()), ("x", second.clone()), ("y", third.clone())],
    )
    .unwrap_err();
    assert!(matches!(err, RuntimeError::DuplicateKeyword { .. }));
    assert_eq!(
        err.to_string(),
        "echo_kw() got multiple values for keyword argument 'x'"
    );
    for value in [&first, &second, &third] {
        assert_eq!(value.refcount(), 1);
    }
}

#[test]
fn test_duplicate_keyword_on_generic_object() {
    let gadget = callable(CallableData::new("gadget", |_, _| Ok(int(0)))).into_obj();
    let err = dispatch(&gadget, &[], &[("k", int(1)), ("k", int(2))]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "gadget object got multiple values for keyword argument 'k'"
    );
}

#[test]
fn test_long_names_are_clipped_in_call_errors() {
    let name = "w".repeat(300);
    let wide = native(NativeFunctionData::no_args(&name, |_| Ok(int(0))));
    let err = dispatch(wide.as_obj(), &[int(1)], &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("{}() takes no arguments (1 given)", "w".repeat(200))
    );

    let wide = callable(CallableData::new(&name, |_, _| Ok(int(0)))).into_obj();
    let err = dispatch(&wide, &[], &[("k", int(1)), ("k", int(2))]).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "{} object got multiple values for keyword argument 'k'",
            "w".repeat(200)
        )
    );
}

#[test]
fn test_merge_stops_at_duplicate() {
    let echo = echo_kwargs();
    let third = int(3);
    let mut slots = vector(&echo, &[], &[("x", int(1)), ("x", int(2)), ("y", third.clone())]);
    let err = merge_keywords(None, &mut slots[..6], 3, &echo).unwrap_err();
    assert!(matches!(err, RuntimeError::DuplicateKeyword { .. }));

    // First two pairs consumed, the third untouched
    assert!(slots[2..6].iter().all(Option::is_none));
    assert!(slots[0].as_ref().is_some_and(|v| v.ptr_eq(&third)));
    assert_eq!(slots[1].as_ref().and_then(|k| k.as_str()), Some("y"));
}

#[test]
fn test_merge_copies_existing_dict() {
    let existing = dict();
    existing.set_str("a", int(1));
    let echo = echo_kwargs();
    let mut slots = vector(&echo, &[], &[("b", int(2))]);
    let merged = merge_keywords(Some(existing.clone()), &mut slots[..2], 1, &echo).unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(existing.len(), 1);

    let mut slots = vector(&echo, &[], &[("a", int(5))]);
    let err = merge_keywords(Some(existing), &mut slots[..2], 1, &echo).unwrap_err();
    assert!(err.to_string().contains("'a'"));
}

#[test]
fn test_unhashable_keyword_fails() {
    let echo = echo_kwargs();
    let mut args: Vec<Slot> = vec![
        Some(int(1)),
        Some(crate::objects::list(vec![]).into_obj()),
        Some(echo.clone()),
    ];
    let err = dispatch_call(&mut args, 0, 1).unwrap_err();
    assert!(err.to_string().contains("unhashable"));
    assert!(args.iter().all(Option::is_none));
}

#[test]
fn test_build_positional_tuple_reverses() {
    let mut slots: Vec<Slot> = vec![Some(int(3)), Some(int(2)), Some(int(1)), Some(int(0))];
    let built = build_positional_tuple(&mut slots, 3);
    assert_eq!(repr(built.as_obj()), "(1, 2, 3)");
    assert!(slots[..3].iter().all(Option::is_none));
    assert!(slots[3].is_some());
}

#[test]
#[should_panic(expected = "malformed argument vector")]
fn test_wrong_length_panics() {
    let echo = echo_args();
    let mut args: Vec<Slot> = vec![Some(int(1)), Some(echo)];
    let _ = dispatch_call(&mut args, 2, 0);
}

#[test]
#[should_panic(expected = "no callable")]
fn test_missing_callable_panics() {
    let mut args: Vec<Slot> = vec![Some(int(1)), None];
    let _ = dispatch_call(&mut args, 1, 0);
}

#[test]
#[should_panic(expected = "consumed twice")]
fn test_emptied_slot_panics() {
    let echo = echo_args();
    let mut args: Vec<Slot> = vec![None, Some(echo)];
    let _ = dispatch_call(&mut args, 1, 0);
}

#[test]
fn test_c_entry_point() {
    assert_eq!(decode_oparg(0x0203), (3, 2));

    let echo = echo_kwargs();
    let mut args = vector(&echo, &[int(1)], &[("k", int(2))]);
    let outcome = unsafe { nb_call_function(args.as_mut_ptr(), 1 | (1 << 8)) };
    assert!(outcome.is_ok());
    let value = unsafe { outcome.into_result() }.unwrap();
    assert_eq!(value.as_str(), Some("(1,) {'k': 2}"));
    assert!(args.iter().all(Option::is_none));

    let mut args = vector(&int(0), &[], &[]);
    let outcome = unsafe { nb_call_function(args.as_mut_ptr(), 0) };
    assert!(!outcome.is_ok());
    unsafe {
        assert_eq!(nb_error_kind(outcome.error), crate::error::ErrorKind::Type as u32);
        nb_error_free(outcome.error);
    }
}

#[test]
#[should_panic(expected = "malformed native outcome")]
fn test_malformed_outcome_panics() {
    let outcome = RawOutcome {
        value: core::ptr::null_mut(),
        error: core::ptr::null_mut(),
    };
    let _ = unsafe { outcome.into_result() };
}

#[test]
fn test_positional_tuple_keeps_refcounts_balanced() {
    let echo = echo_args();
    let items = [string("a"), string("b")];
    dispatch(&echo, &items, &[]).unwrap();
    assert!(items.iter().all(|item| item.refcount() == 1));
    assert_eq!(echo.refcount(), 1);
}

proptest! {
    #[test]
    fn prop_every_slot_is_released(na in 0usize..6, nk in 0usize..4, use_function in any::<bool>()) {
        let target = if use_function {
            // def f(*args, **kwargs): return None
            let code = CodeBuilder::new("sink")
                .varargs("args")
                .varkw("kwargs")
                .consts([crate::objects::none()])
                .instrs([Instr::LoadConst(0), Instr::ReturnValue])
                .build();
            function(code, dict()).into_obj()
        } else {
            echo_kwargs()
        };
        let positional: Vec<ObjRef> = (0..na).map(|i| int(i as i64 + 1000)).collect();
        let keys: Vec<String> = (0..nk).map(|i| format!("k{i}")).collect();
        let keywords: Vec<(&str, ObjRef)> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.as_str(), int(i as i64 + 2000)))
            .collect();

        let result = dispatch(&target, &positional, &keywords);
        prop_assert!(result.is_ok());
        drop(result);

        prop_assert_eq!(target.refcount(), 1);
        for value in positional.iter().chain(keywords.iter().map(|(_, v)| v)) {
            prop_assert_eq!(value.refcount(), 1);
        }
    }
}
