//! Frame evaluator and argument binding

use tracing::trace;

use super::builtins_lookup;
use super::frame::Frame;
use super::state::{GlobalsScope, RecursionGuard};
use crate::bridge::messages::{
    format_name, GLOBAL_NAME_ERROR_MSG, UNBOUNDFREE_ERROR_MSG, UNBOUNDLOCAL_ERROR_MSG,
};
use crate::error::{RtResult, RuntimeError};
use crate::interop::dispatch_call;
use crate::objects::number::{binary_op, inplace_op};
use crate::objects::protocol::{self, compare, getattr, getiter, is_true};
use crate::objects::{
    dict, list, tuple, CellData, CodeData, CodeFlags, DictData, Instr, ObjRef, Ref, Slot,
    TupleData,
};

fn operand_error(code: &CodeData, what: &str, index: u32) -> RuntimeError {
    RuntimeError::System(format!(
        "{}: {} index {} out of range",
        code.name, what, index
    ))
}

fn name_at(code: &CodeData, index: u32) -> RtResult<&str> {
    code.names
        .get(index as usize)
        .map(|name| &**name)
        .ok_or_else(|| operand_error(code, "name", index))
}

fn load_global(globals: &DictData, name: &str) -> RtResult<ObjRef> {
    if let Some(value) = globals.get_str(name) {
        return Ok(value);
    }
    builtins_lookup(name)
        .ok_or_else(|| RuntimeError::Name(format_name(GLOBAL_NAME_ERROR_MSG, name)))
}

/// Run a prepared frame to completion
///
/// Holds one level of recursion depth and makes the frame's globals the
/// active namespace for the duration. Nested calls recurse through this
/// loop; instruction bodies live in out-of-line helpers.
pub fn eval_frame(frame: &mut Frame) -> RtResult<ObjRef> {
    let _depth = RecursionGuard::enter("")?;
    let _globals = GlobalsScope::push(frame.globals.clone());
    let code = frame.code.clone();
    trace!(event = "eval_frame", code = %code.name, "Evaluating frame");

    let mut pc = 0usize;
    loop {
        let instr = fetch(&code, pc)?;
        pc += 1;
        match instr {
            Instr::CallFunction { na, nk } => {
                call_from_stack(frame, usize::from(na), usize::from(nk))?;
            }
            Instr::ReturnValue => return frame.pop(),
            other => {
                if let Some(target) = step(frame, &code, other)? {
                    pc = target;
                }
            }
        }
    }
}

#[inline(never)]
fn fetch(code: &CodeData, pc: usize) -> RtResult<Instr> {
    code.instructions.get(pc).copied().ok_or_else(|| {
        RuntimeError::System(format!("{}: ran past the last instruction", code.name))
    })
}

/// Hand the call window on top of the value stack to the dispatcher
#[inline(never)]
fn call_from_stack(frame: &mut Frame, na: usize, nk: usize) -> RtResult<()> {
    let window = frame.pop_n(na + 2 * nk + 1)?;
    // Dispatcher expects the most recently pushed value first
    let mut args: Vec<Slot> = window.into_iter().rev().map(Some).collect();
    let result = dispatch_call(&mut args, na, nk)?;
    frame.push(result);
    Ok(())
}

/// Execute one non-call instruction; returns the jump target, if any
#[inline(never)]
fn step(frame: &mut Frame, code: &CodeData, instr: Instr) -> RtResult<Option<usize>> {
    match instr {
        Instr::LoadConst(i) => {
            let value = code
                .consts
                .get(i as usize)
                .cloned()
                .ok_or_else(|| operand_error(code, "constant", i))?;
            frame.push(value);
        }
        Instr::LoadFast(i) => {
            let slot = frame
                .locals
                .get(i as usize)
                .ok_or_else(|| operand_error(code, "local", i))?;
            let value = slot.clone().ok_or_else(|| {
                RuntimeError::UnboundLocal(format_name(
                    UNBOUNDLOCAL_ERROR_MSG,
                    &code.varnames[i as usize],
                ))
            })?;
            frame.push(value);
        }
        Instr::StoreFast(i) => {
            let value = frame.pop()?;
            let slot = frame
                .locals
                .get_mut(i as usize)
                .ok_or_else(|| operand_error(code, "local", i))?;
            let previous = slot.replace(value);
            drop(previous);
        }
        Instr::LoadGlobal(i) => {
            let value = load_global(&frame.globals, name_at(code, i)?)?;
            frame.push(value);
        }
        Instr::StoreGlobal(i) => {
            let value = frame.pop()?;
            frame.globals.set_str(name_at(code, i)?, value);
        }
        Instr::LoadDeref(i) => {
            let cell = frame
                .cells
                .get(i as usize)
                .ok_or_else(|| operand_error(code, "cell", i))?;
            let value = cell.downcast::<CellData>().and_then(CellData::get);
            let value = value.ok_or_else(|| {
                let name = code.freevars.get(i as usize).map_or("?", |n| &**n);
                RuntimeError::Name(format_name(UNBOUNDFREE_ERROR_MSG, name))
            })?;
            frame.push(value);
        }
        Instr::LoadAttr(i) => {
            let obj = frame.pop()?;
            frame.push(getattr(&obj, name_at(code, i)?)?);
        }
        Instr::BinaryOp(op) => {
            let rhs = frame.pop()?;
            let lhs = frame.pop()?;
            frame.push(binary_op(op, &lhs, &rhs)?);
        }
        Instr::InPlaceOp(op) => {
            let rhs = frame.pop()?;
            let lhs = frame.pop()?;
            frame.push(inplace_op(op, &lhs, &rhs)?);
        }
        Instr::Compare(op) => {
            let rhs = frame.pop()?;
            let lhs = frame.pop()?;
            frame.push(compare(op, &lhs, &rhs)?);
        }
        Instr::PopTop => {
            frame.pop()?;
        }
        Instr::BuildTuple(n) => {
            let items = frame.pop_n(n as usize)?;
            frame.push(tuple(items).into_obj());
        }
        Instr::BuildList(n) => {
            let items = frame.pop_n(n as usize)?;
            frame.push(list(items).into_obj());
        }
        Instr::GetIter => {
            let obj = frame.pop()?;
            frame.push(getiter(&obj)?);
        }
        Instr::ForIter(target) => match protocol::next(frame.top()?)? {
            Some(item) => frame.push(item),
            None => {
                frame.pop()?;
                return Ok(Some(target as usize));
            }
        },
        Instr::Jump(target) => return Ok(Some(target as usize)),
        Instr::PopJumpIfFalse(target) => {
            let cond = frame.pop()?;
            if !is_true(&cond) {
                return Ok(Some(target as usize));
            }
        }
        Instr::CallFunction { na, nk } => {
            call_from_stack(frame, usize::from(na), usize::from(nk))?;
        }
        Instr::ReturnValue => {
            return Err(RuntimeError::System(format!(
                "{}: return outside the evaluation loop",
                code.name
            )))
        }
    }
    Ok(None)
}

/// Local slot reserved for `*args` or `**kwargs`
fn collector_slot<'f>(frame: &'f mut Frame, slot: usize, what: &str) -> RtResult<&'f mut Slot> {
    if slot >= frame.locals.len() {
        return Err(RuntimeError::System(format!(
            "{}() has no local slot for {}",
            frame.code.name, what
        )));
    }
    Ok(&mut frame.locals[slot])
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Bind arguments into a fresh frame and evaluate it
///
/// `args` are positionals in call order. Handles `*args`, keywords,
/// `**kwargs`, positional defaults and keyword-only defaults.
pub fn eval_code_ex(
    code: &Ref<CodeData>,
    globals: &Ref<DictData>,
    args: &[ObjRef],
    kwargs: Option<&Ref<DictData>>,
    defaults: Option<&Ref<TupleData>>,
    kwdefaults: Option<&Ref<DictData>>,
    closure: Option<&Ref<TupleData>>,
) -> RtResult<ObjRef> {
    if code.freevars.len() != closure.map_or(0, |c| c.len()) {
        return Err(RuntimeError::System(format!(
            "{}() requires a closure of {} cells",
            code.name,
            code.freevars.len()
        )));
    }
    let mut frame = Frame::new(code.clone(), globals.clone(), closure);
    bind_arguments(&mut frame, args, kwargs, defaults, kwdefaults)?;
    eval_frame(&mut frame)
}

fn bind_arguments(
    frame: &mut Frame,
    args: &[ObjRef],
    kwargs: Option<&Ref<DictData>>,
    defaults: Option<&Ref<TupleData>>,
    kwdefaults: Option<&Ref<DictData>>,
) -> RtResult<()> {
    let code = frame.code.clone();
    let name = &code.name;
    let argcount = code.argcount;
    let total = argcount + code.kwonlyargcount;
    let ndefaults = defaults.map_or(0, |d| d.len());

    let collected_kwargs = match code.varkw_slot() {
        Some(slot) => {
            let collected = dict();
            *collector_slot(frame, slot, "**kwargs")? = Some(collected.as_obj().clone());
            Some(collected)
        }
        None => None,
    };

    for (slot, arg) in frame.locals.iter_mut().zip(args.iter().take(argcount)) {
        *slot = Some(arg.clone());
    }
    match code.varargs_slot() {
        Some(slot) => {
            let extra = args.get(argcount..).unwrap_or_default().to_vec();
            *collector_slot(frame, slot, "*args")? = Some(tuple(extra).into_obj());
        }
        None if args.len() > argcount => {
            let bound = if ndefaults > 0 || code.kwonlyargcount > 0 {
                "at most"
            } else {
                "exactly"
            };
            return Err(RuntimeError::Type(format!(
                "{}() takes {} {} positional argument{} ({} given)",
                name,
                bound,
                argcount,
                plural(argcount),
                args.len()
            )));
        }
        None => {}
    }

    if let Some(kwargs) = kwargs {
        for (key, value) in kwargs.entries() {
            let Some(keyword) = key.as_str() else {
                return Err(RuntimeError::Type(format!("{}() keywords must be strings", name)));
            };
            match code.varnames[..total].iter().position(|v| &**v == keyword) {
                Some(index) => {
                    if frame.locals[index].is_some() {
                        return Err(RuntimeError::Type(format!(
                            "{}() got multiple values for keyword argument '{}'",
                            name, keyword
                        )));
                    }
                    frame.locals[index] = Some(value);
                }
                None => match &collected_kwargs {
                    Some(collected) => collected.set(key, value)?,
                    None => {
                        return Err(RuntimeError::Type(format!(
                            "{}() got an unexpected keyword argument '{}'",
                            name, keyword
                        )))
                    }
                },
            }
        }
    }

    for index in 0..argcount {
        if frame.locals[index].is_some() {
            continue;
        }
        let default = (index + ndefaults)
            .checked_sub(argcount)
            .and_then(|d| defaults.and_then(|defs| defs.get(d)).cloned());
        match default {
            Some(value) => frame.locals[index] = Some(value),
            None => {
                let bound = if ndefaults > 0 || code.flags().contains(CodeFlags::VARARGS) {
                    "at least"
                } else {
                    "exactly"
                };
                let required = argcount - ndefaults.min(argcount);
                return Err(RuntimeError::Type(format!(
                    "{}() takes {} {} positional argument{} ({} given)",
                    name,
                    bound,
                    required,
                    plural(required),
                    args.len().min(argcount)
                )));
            }
        }
    }

    for index in argcount..total {
        if frame.locals[index].is_some() {
            continue;
        }
        let param = &code.varnames[index];
        match kwdefaults.and_then(|d| d.get_str(param)) {
            Some(value) => frame.locals[index] = Some(value),
            None => {
                return Err(RuntimeError::Type(format!(
                    "{}() needs keyword-only argument {}",
                    name, param
                )))
            }
        }
    }
    Ok(())
}
