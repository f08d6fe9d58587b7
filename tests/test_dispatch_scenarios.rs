//! End-to-end call scenarios: interpreted calls against direct dispatch

use nativebridge::interop::{self, decode_oparg};
use nativebridge::objects::protocol::repr;
use nativebridge::objects::{
    bound_method, dict, function, int, string, CodeBuilder, CodeData, CompareOp, DictData,
    FunctionData, Instr, NumberOp, ObjRef, Ref,
};
use nativebridge::runtime::{
    eval_frame, recursion_depth, set_recursion_limit, Frame, DEFAULT_RECURSION_LIMIT,
    STACK_RED_ZONE,
};
use nativebridge::{dispatch_call, ErrorKind, RtResult, Slot};

/// `def sub(a, b): return a - b`
fn sub_code() -> Ref<CodeData> {
    CodeBuilder::new("sub")
        .args(["a", "b"])
        .instrs([
            Instr::LoadFast(0),
            Instr::LoadFast(1),
            Instr::BinaryOp(NumberOp::Subtract),
            Instr::ReturnValue,
        ])
        .build()
}

/// Run module-level code against `globals`
fn run(code: Ref<CodeData>, globals: &Ref<DictData>) -> RtResult<ObjRef> {
    let mut frame = Frame::new(code, globals.clone(), None);
    eval_frame(&mut frame)
}

/// Install a function into `globals` under its code name
fn define(globals: &Ref<DictData>, code: Ref<CodeData>) -> Ref<FunctionData> {
    let name = code.name.clone();
    let f = function(code, globals.clone());
    globals.set_str(&name, f.as_obj().clone());
    f
}

fn forget(globals: &Ref<DictData>, name: &str) {
    globals.remove(&string(name)).unwrap();
}

#[test]
fn test_interpreted_and_direct_calls_agree() {
    let globals = dict();
    let f = define(&globals, sub_code());

    // sub(10, 4) as the interpreter sees it
    let module = CodeBuilder::new("<module>")
        .names(["sub"])
        .consts([int(10), int(4)])
        .instrs([
            Instr::LoadGlobal(0),
            Instr::LoadConst(0),
            Instr::LoadConst(1),
            Instr::CallFunction { na: 2, nk: 0 },
            Instr::ReturnValue,
        ])
        .build();

    let before = interop::stats();
    let interpreted = run(module, &globals).unwrap();
    let mid = interop::stats();

    let (na, nk) = decode_oparg(2);
    let mut args: Vec<Slot> = vec![Some(int(4)), Some(int(10)), Some(f.as_obj().clone())];
    let direct = dispatch_call(&mut args, na, nk).unwrap();
    let after = interop::stats();

    assert_eq!(interpreted.as_int(), Some(6));
    assert_eq!(direct.as_int(), interpreted.as_int());
    assert_eq!(mid.fast_function - before.fast_function, 1);
    assert_eq!(after.fast_function - mid.fast_function, 1);
    assert!(args.iter().all(Option::is_none));

    forget(&globals, "sub");
    assert_eq!(f.as_obj().refcount(), 1);
}

#[test]
fn test_keyword_call_through_interpreter() {
    let globals = dict();
    let f = define(&globals, sub_code());

    // sub(1, b=5)
    let module = CodeBuilder::new("<module>")
        .names(["sub"])
        .consts([int(1), string("b"), int(5)])
        .instrs([
            Instr::LoadGlobal(0),
            Instr::LoadConst(0),
            Instr::LoadConst(1),
            Instr::LoadConst(2),
            Instr::CallFunction { na: 1, nk: 1 },
            Instr::ReturnValue,
        ])
        .build();
    assert_eq!(run(module, &globals).unwrap().as_int(), Some(-4));

    // sub(1, a=5) collides with the positional binding
    let module = CodeBuilder::new("<module>")
        .names(["sub"])
        .consts([int(1), string("a"), int(5)])
        .instrs([
            Instr::LoadGlobal(0),
            Instr::LoadConst(0),
            Instr::LoadConst(1),
            Instr::LoadConst(2),
            Instr::CallFunction { na: 1, nk: 1 },
            Instr::ReturnValue,
        ])
        .build();
    let err = run(module, &globals).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(
        err.to_string(),
        "sub() got multiple values for keyword argument 'a'"
    );

    forget(&globals, "sub");
    assert_eq!(f.as_obj().refcount(), 1);
}

#[test]
fn test_method_call_chain() {
    // "a,b".split(",")
    let module = CodeBuilder::new("<module>")
        .names(["split"])
        .consts([string("a,b"), string(",")])
        .instrs([
            Instr::LoadConst(0),
            Instr::LoadAttr(0),
            Instr::LoadConst(1),
            Instr::CallFunction { na: 1, nk: 0 },
            Instr::ReturnValue,
        ])
        .build();

    let before = interop::stats();
    let parts = run(module, &dict()).unwrap();
    let after = interop::stats();

    assert_eq!(repr(&parts), "['a', 'b']");
    assert_eq!(after.variadic_native - before.variadic_native, 1);
}

#[test]
fn test_builtin_reached_from_module_code() {
    // len((1, 2, 3))
    let module = CodeBuilder::new("<module>")
        .names(["len"])
        .consts([int(1), int(2), int(3)])
        .instrs([
            Instr::LoadGlobal(0),
            Instr::LoadConst(0),
            Instr::LoadConst(1),
            Instr::LoadConst(2),
            Instr::BuildTuple(3),
            Instr::CallFunction { na: 1, nk: 0 },
            Instr::ReturnValue,
        ])
        .build();

    let before = interop::stats();
    assert_eq!(run(module, &dict()).unwrap().as_int(), Some(3));
    assert_eq!(interop::stats().fixed_native - before.fixed_native, 1);
}

#[test]
fn test_recursive_function_through_fast_path() {
    // def fact(n): return 1 if n < 2 else n * fact(n - 1)
    let code = CodeBuilder::new("fact")
        .args(["n"])
        .names(["fact"])
        .consts([int(2), int(1)])
        .instrs([
            Instr::LoadFast(0),
            Instr::LoadConst(0),
            Instr::Compare(CompareOp::Lt),
            Instr::PopJumpIfFalse(6),
            Instr::LoadConst(1),
            Instr::ReturnValue,
            Instr::LoadFast(0),
            Instr::LoadGlobal(0),
            Instr::LoadFast(0),
            Instr::LoadConst(1),
            Instr::BinaryOp(NumberOp::Subtract),
            Instr::CallFunction { na: 1, nk: 0 },
            Instr::BinaryOp(NumberOp::Multiply),
            Instr::ReturnValue,
        ])
        .build();
    let globals = dict();
    let f = define(&globals, code);

    let depth = recursion_depth();
    let before = interop::stats();
    let mut args: Vec<Slot> = vec![Some(int(10)), Some(f.as_obj().clone())];
    assert_eq!(dispatch_call(&mut args, 1, 0).unwrap().as_int(), Some(3_628_800));
    assert_eq!(interop::stats().fast_function - before.fast_function, 10);
    assert_eq!(recursion_depth(), depth);

    forget(&globals, "fact");
    assert_eq!(f.as_obj().refcount(), 1);
}

#[test]
fn test_runaway_recursion_is_contained() {
    let code = CodeBuilder::new("spin")
        .names(["spin"])
        .instrs([
            Instr::LoadGlobal(0),
            Instr::CallFunction { na: 0, nk: 0 },
            Instr::ReturnValue,
        ])
        .build();
    let globals = dict();
    let f = define(&globals, code);

    set_recursion_limit(60);
    let depth = recursion_depth();
    let before = interop::stats();
    let mut args: Vec<Slot> = vec![Some(f.as_obj().clone())];
    let err = dispatch_call(&mut args, 0, 0).unwrap_err();
    set_recursion_limit(DEFAULT_RECURSION_LIMIT);

    assert_eq!(err.kind(), ErrorKind::Recursion);
    assert_eq!(recursion_depth(), depth);
    assert!(interop::stats().failures > before.failures);
    assert!(args[0].is_none());

    forget(&globals, "spin");
    assert_eq!(f.as_obj().refcount(), 1);
}

/// Recurse `spin()` at the default limit; reports the failure kind and
/// whether the depth counter came back to zero
fn spin_at_default_limit() -> (ErrorKind, bool) {
    let code = CodeBuilder::new("spin")
        .names(["spin"])
        .instrs([
            Instr::LoadGlobal(0),
            Instr::CallFunction { na: 0, nk: 0 },
            Instr::ReturnValue,
        ])
        .build();
    let globals = dict();
    let f = define(&globals, code);

    assert_eq!(nativebridge::runtime::recursion_limit(), DEFAULT_RECURSION_LIMIT);
    let mut args: Vec<Slot> = vec![Some(f.as_obj().clone())];
    let err = dispatch_call(&mut args, 0, 0).unwrap_err();
    let restored = recursion_depth() == 0;

    forget(&globals, "spin");
    (err.kind(), restored)
}

#[test]
fn test_default_limit_recursion_on_spawned_thread() {
    let (kind, restored) = std::thread::spawn(spin_at_default_limit).join().unwrap();
    assert_eq!(kind, ErrorKind::Recursion);
    assert!(restored);
}

#[test]
fn test_small_stack_trips_before_the_limit() {
    let (kind, restored) = std::thread::Builder::new()
        .stack_size(STACK_RED_ZONE * 4)
        .spawn(spin_at_default_limit)
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(kind, ErrorKind::Recursion);
    assert!(restored);
}

#[test]
fn test_bound_function_receives_receiver_first() {
    let globals = dict();
    let f = function(sub_code(), globals);
    let method = bound_method(int(10), f.as_obj().clone());

    let before = interop::stats();
    let mut args: Vec<Slot> = vec![Some(int(4)), Some(method.as_obj().clone())];
    assert_eq!(dispatch_call(&mut args, 1, 0).unwrap().as_int(), Some(6));
    let after = interop::stats();

    assert_eq!(after.bound_method - before.bound_method, 1);
    assert_eq!(after.fast_function - before.fast_function, 1);
    assert_eq!(method.as_obj().refcount(), 1);
    assert_eq!(f.as_obj().refcount(), 2);
}

#[test]
fn test_failure_leaves_vector_released() {
    let globals = dict();
    let f = function(sub_code(), globals);
    let lhs = string("text");
    let mut args: Vec<Slot> = vec![
        Some(int(1)),
        Some(lhs.clone()),
        Some(f.as_obj().clone()),
    ];

    let err = dispatch_call(&mut args, 2, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(args.iter().all(Option::is_none));
    assert_eq!(lhs.refcount(), 1);
    assert_eq!(f.as_obj().refcount(), 1);
}
