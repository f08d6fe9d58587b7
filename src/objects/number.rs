//! Number protocol - binary and in-place operators
//!
//! Integers are 64-bit; results that do not fit raise an overflow failure
//! instead of wrapping. Division and modulo floor toward negative infinity.

use super::header::{ObjRef, ObjectType};
use super::list::{list, ListData};
use super::protocol;
use super::scalar::{boolean, float, int, string, StrData};
use super::tuple::{tuple, TupleData};
use crate::error::{RtResult, RuntimeError};

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberOp {
    Add,
    Subtract,
    Multiply,
    TrueDivide,
    FloorDivide,
    Remainder,
    Lshift,
    Rshift,
    And,
    Xor,
    Or,
}

impl NumberOp {
    pub const ALL: [NumberOp; 11] = [
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::TrueDivide,
        Self::FloorDivide,
        Self::Remainder,
        Self::Lshift,
        Self::Rshift,
        Self::And,
        Self::Xor,
        Self::Or,
    ];

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::TrueDivide => "/",
            Self::FloorDivide => "//",
            Self::Remainder => "%",
            Self::Lshift => "<<",
            Self::Rshift => ">>",
            Self::And => "&",
            Self::Xor => "^",
            Self::Or => "|",
        }
    }
}

fn unsupported(op: &str, a: &ObjRef, b: &ObjRef) -> RuntimeError {
    RuntimeError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        a.type_name(),
        b.type_name()
    ))
}

fn overflow() -> RuntimeError {
    RuntimeError::Overflow("integer overflow".into())
}

fn is_int_like(obj: &ObjRef) -> bool {
    matches!(obj.object_type(), ObjectType::Int | ObjectType::Bool)
}

fn is_numeric(obj: &ObjRef) -> bool {
    matches!(
        obj.object_type(),
        ObjectType::Int | ObjectType::Bool | ObjectType::Float
    )
}

/// `a <op> b`
pub fn binary_op(op: NumberOp, a: &ObjRef, b: &ObjRef) -> RtResult<ObjRef> {
    if let (Some(x), Some(y)) = (int_operand(a), int_operand(b)) {
        if matches!(op, NumberOp::And | NumberOp::Xor | NumberOp::Or)
            && a.object_type() == ObjectType::Bool
            && b.object_type() == ObjectType::Bool
        {
            return Ok(boolean(int_op(op, x, y)? != 0));
        }
        return int_result(op, x, y);
    }
    if is_numeric(a) && is_numeric(b) {
        if let (Some(x), Some(y)) = (a.as_float(), b.as_float()) {
            return float_op(op, x, y, a, b);
        }
    }
    sequence_op(op, a, b)
}

/// `a <op>= b`; lists extend in place, everything else rebinds
pub fn inplace_op(op: NumberOp, a: &ObjRef, b: &ObjRef) -> RtResult<ObjRef> {
    if op == NumberOp::Add {
        if let Some(target) = a.downcast::<ListData>() {
            let items = protocol::collect_items(b)?;
            target.extend(items);
            return Ok(a.clone());
        }
    }
    binary_op(op, a, b).map_err(|err| match err {
        RuntimeError::Type(_) if !is_numeric(a) || !is_numeric(b) => {
            unsupported(&format!("{}=", op.symbol()), a, b)
        }
        other => other,
    })
}

fn int_operand(obj: &ObjRef) -> Option<i64> {
    if is_int_like(obj) {
        obj.as_int()
    } else {
        None
    }
}

fn int_result(op: NumberOp, x: i64, y: i64) -> RtResult<ObjRef> {
    if op == NumberOp::TrueDivide {
        if y == 0 {
            return Err(RuntimeError::ZeroDivision("division by zero".into()));
        }
        return Ok(float(x as f64 / y as f64));
    }
    int_op(op, x, y).map(int)
}

fn int_op(op: NumberOp, x: i64, y: i64) -> RtResult<i64> {
    match op {
        NumberOp::Add => x.checked_add(y).ok_or_else(overflow),
        NumberOp::Subtract => x.checked_sub(y).ok_or_else(overflow),
        NumberOp::Multiply => x.checked_mul(y).ok_or_else(overflow),
        NumberOp::FloorDivide => {
            if y == 0 {
                return Err(RuntimeError::ZeroDivision(
                    "integer division or modulo by zero".into(),
                ));
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            Ok(if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q })
        }
        NumberOp::Remainder => {
            if y == 0 {
                return Err(RuntimeError::ZeroDivision(
                    "integer division or modulo by zero".into(),
                ));
            }
            let r = x.checked_rem(y).unwrap_or(0);
            Ok(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
        }
        NumberOp::Lshift => {
            if y < 0 {
                return Err(RuntimeError::Value("negative shift count".into()));
            }
            if x == 0 {
                return Ok(0);
            }
            if y >= 63 {
                return Err(overflow());
            }
            let shifted = x << y;
            if shifted >> y != x {
                return Err(overflow());
            }
            Ok(shifted)
        }
        NumberOp::Rshift => {
            if y < 0 {
                return Err(RuntimeError::Value("negative shift count".into()));
            }
            Ok(if y >= 64 {
                if x < 0 {
                    -1
                } else {
                    0
                }
            } else {
                x >> y
            })
        }
        NumberOp::And => Ok(x & y),
        NumberOp::Xor => Ok(x ^ y),
        NumberOp::Or => Ok(x | y),
        NumberOp::TrueDivide => Err(RuntimeError::System("true division on int path".into())),
    }
}

fn float_op(op: NumberOp, x: f64, y: f64, a: &ObjRef, b: &ObjRef) -> RtResult<ObjRef> {
    let value = match op {
        NumberOp::Add => x + y,
        NumberOp::Subtract => x - y,
        NumberOp::Multiply => x * y,
        NumberOp::TrueDivide => {
            if y == 0.0 {
                return Err(RuntimeError::ZeroDivision("float division by zero".into()));
            }
            x / y
        }
        NumberOp::FloorDivide => {
            if y == 0.0 {
                return Err(RuntimeError::ZeroDivision("float divmod()".into()));
            }
            (x / y).floor()
        }
        NumberOp::Remainder => {
            if y == 0.0 {
                return Err(RuntimeError::ZeroDivision("float modulo".into()));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        _ => return Err(unsupported(op.symbol(), a, b)),
    };
    Ok(float(value))
}

fn repeat_count(obj: &ObjRef) -> Option<usize> {
    int_operand(obj).map(|n| usize::try_from(n).unwrap_or(0))
}

fn sequence_op(op: NumberOp, a: &ObjRef, b: &ObjRef) -> RtResult<ObjRef> {
    match op {
        NumberOp::Add => {
            if let (Some(x), Some(y)) = (a.downcast::<StrData>(), b.downcast::<StrData>()) {
                return Ok(string(&format!("{}{}", x.as_str(), y.as_str())));
            }
            if let (Some(x), Some(y)) = (a.downcast::<TupleData>(), b.downcast::<TupleData>()) {
                let items = x.items().iter().chain(y.items()).cloned().collect();
                return Ok(tuple(items).into_obj());
            }
            if let (Some(x), Some(y)) = (a.downcast::<ListData>(), b.downcast::<ListData>()) {
                let mut items = x.snapshot();
                items.extend(y.snapshot());
                return Ok(list(items).into_obj());
            }
            Err(unsupported(op.symbol(), a, b))
        }
        NumberOp::Multiply => {
            let (seq, count) = match (repeat_count(a), repeat_count(b)) {
                (None, Some(n)) => (a, n),
                (Some(n), None) => (b, n),
                _ => return Err(unsupported(op.symbol(), a, b)),
            };
            if let Some(text) = seq.downcast::<StrData>() {
                return Ok(string(&text.as_str().repeat(count)));
            }
            if let Some(items) = seq.downcast::<TupleData>() {
                let repeated = (0..count).flat_map(|_| items.items().iter().cloned()).collect();
                return Ok(tuple(repeated).into_obj());
            }
            if let Some(items) = seq.downcast::<ListData>() {
                let snapshot = items.snapshot();
                let repeated = (0..count).flat_map(|_| snapshot.iter().cloned()).collect();
                return Ok(list(repeated).into_obj());
            }
            Err(unsupported(op.symbol(), a, b))
        }
        _ => Err(unsupported(op.symbol(), a, b)),
    }
}
