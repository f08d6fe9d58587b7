//! Code objects - decoded instruction stream plus binding metadata

use core::cell::Cell;
use core::fmt;
use core::ops::{BitAnd, BitOr};

use super::header::{payload_type, ObjRef, ObjectType, Ref};
use super::number::NumberOp;
use super::protocol::CompareOp;

/// Code flag word
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CodeFlags(u32);

impl CodeFlags {
    pub const OPTIMIZED: Self = Self(0x0001);
    pub const NEWLOCALS: Self = Self(0x0002);
    pub const VARARGS: Self = Self(0x0004);
    pub const VARKEYWORDS: Self = Self(0x0008);
    pub const NESTED: Self = Self(0x0010);
    pub const NOFREE: Self = Self(0x0040);
    /// Set once a native artifact has been attached to the code object
    pub const COMPILED: Self = Self(0x0100_0000);

    /// Flag set that qualifies a function for the frame fast path
    pub const SIMPLE: Self = Self(Self::OPTIMIZED.0 | Self::NEWLOCALS.0 | Self::NOFREE.0);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Exactly the simple flag set, ignoring the artifact marker
    pub const fn is_simple(self) -> bool {
        self.without(Self::COMPILED).0 == Self::SIMPLE.0
    }
}

impl BitOr for CodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for CodeFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for CodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeFlags({:#x})", self.0)
    }
}

/// Decoded instruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instr {
    LoadConst(u32),
    LoadFast(u32),
    StoreFast(u32),
    LoadGlobal(u32),
    StoreGlobal(u32),
    /// Read the contents of closure cell `i`
    LoadDeref(u32),
    /// Attribute named by `names[i]` of the top of stack
    LoadAttr(u32),
    BinaryOp(NumberOp),
    InPlaceOp(NumberOp),
    Compare(CompareOp),
    PopTop,
    BuildTuple(u32),
    BuildList(u32),
    /// Call with `na` positionals and `nk` keyword pairs on the stack
    CallFunction { na: u8, nk: u8 },
    GetIter,
    /// Advance the iterator on top of stack or pop it and jump
    ForIter(u32),
    Jump(u32),
    PopJumpIfFalse(u32),
    ReturnValue,
}

pub struct CodeData {
    pub name: Box<str>,
    pub argcount: usize,
    pub kwonlyargcount: usize,
    /// Parameters first (positional, keyword-only, `*args`, `**kwargs`), then locals
    pub varnames: Vec<Box<str>>,
    pub freevars: Vec<Box<str>>,
    pub names: Vec<Box<str>>,
    pub consts: Vec<ObjRef>,
    pub instructions: Vec<Instr>,
    flags: Cell<CodeFlags>,
}

payload_type!(CodeData, CODE_TYPE, "code", ObjectType::Code);

impl CodeData {
    #[inline]
    pub fn flags(&self) -> CodeFlags {
        self.flags.get()
    }

    #[inline]
    pub fn nlocals(&self) -> usize {
        self.varnames.len()
    }

    pub fn is_compiled(&self) -> bool {
        self.flags().contains(CodeFlags::COMPILED)
    }

    /// Record that a native artifact now backs this code object
    pub fn mark_compiled(&self) {
        self.flags.set(self.flags() | CodeFlags::COMPILED);
    }

    /// Slot index of `*args`, when present
    pub fn varargs_slot(&self) -> Option<usize> {
        self.flags()
            .contains(CodeFlags::VARARGS)
            .then_some(self.argcount + self.kwonlyargcount)
    }

    /// Slot index of `**kwargs`, when present
    pub fn varkw_slot(&self) -> Option<usize> {
        let base = self.argcount + self.kwonlyargcount;
        self.flags().contains(CodeFlags::VARKEYWORDS).then(|| {
            base + usize::from(self.flags().contains(CodeFlags::VARARGS))
        })
    }
}

/// Builder for code objects
///
/// Flags default to `OPTIMIZED | NEWLOCALS | NOFREE`; free variables clear
/// `NOFREE` and set `NESTED`. `VARARGS` and `VARKEYWORDS` follow
/// [`varargs`](Self::varargs) and [`varkw`](Self::varkw) only, since each
/// needs a local slot.
pub struct CodeBuilder {
    name: String,
    args: Vec<String>,
    kwonly: Vec<String>,
    varargs: Option<String>,
    varkw: Option<String>,
    locals: Vec<String>,
    freevars: Vec<String>,
    names: Vec<String>,
    consts: Vec<ObjRef>,
    instructions: Vec<Instr>,
    extra_flags: CodeFlags,
}

impl CodeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
            kwonly: Vec::new(),
            varargs: None,
            varkw: None,
            locals: Vec::new(),
            freevars: Vec::new(),
            names: Vec::new(),
            consts: Vec::new(),
            instructions: Vec::new(),
            extra_flags: CodeFlags::empty(),
        }
    }

    pub fn args<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn kwonly<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kwonly.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn varargs(mut self, name: &str) -> Self {
        self.varargs = Some(name.to_string());
        self
    }

    pub fn varkw(mut self, name: &str) -> Self {
        self.varkw = Some(name.to_string());
        self
    }

    pub fn locals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locals.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn freevars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.freevars.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn consts(mut self, consts: impl IntoIterator<Item = ObjRef>) -> Self {
        self.consts.extend(consts);
        self
    }

    pub fn flags(mut self, flags: CodeFlags) -> Self {
        self.extra_flags = self.extra_flags | flags;
        self
    }

    pub fn instr(mut self, instr: Instr) -> Self {
        self.instructions.push(instr);
        self
    }

    pub fn instrs(mut self, instrs: impl IntoIterator<Item = Instr>) -> Self {
        self.instructions.extend(instrs);
        self
    }

    pub fn build(self) -> Ref<CodeData> {
        let extra = self
            .extra_flags
            .without(CodeFlags::VARARGS | CodeFlags::VARKEYWORDS);
        let mut flags = CodeFlags::OPTIMIZED | CodeFlags::NEWLOCALS | extra;
        if self.freevars.is_empty() {
            flags = flags | CodeFlags::NOFREE;
        } else {
            flags = flags.without(CodeFlags::NOFREE) | CodeFlags::NESTED;
        }
        if self.varargs.is_some() {
            flags = flags | CodeFlags::VARARGS;
        }
        if self.varkw.is_some() {
            flags = flags | CodeFlags::VARKEYWORDS;
        }

        let argcount = self.args.len();
        let kwonlyargcount = self.kwonly.len();
        let varnames = self
            .args
            .into_iter()
            .chain(self.kwonly)
            .chain(self.varargs)
            .chain(self.varkw)
            .chain(self.locals)
            .map(String::into_boxed_str)
            .collect();

        Ref::new(CodeData {
            name: self.name.into_boxed_str(),
            argcount,
            kwonlyargcount,
            varnames,
            freevars: self.freevars.into_iter().map(String::into_boxed_str).collect(),
            names: self.names.into_iter().map(String::into_boxed_str).collect(),
            consts: self.consts,
            instructions: self.instructions,
            flags: Cell::new(flags),
        })
    }
}
