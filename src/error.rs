//! Runtime failures
//!
//! Every fallible operation in the crate returns [`RtResult`]. A failure
//! raised by a callable travels through dispatch unchanged; the bridge never
//! retries or rewrites it.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::bridge::messages::clip_name;

/// Result alias used across the runtime
pub type RtResult<T> = Result<T, RuntimeError>;

/// Expected shape of a fixed-arity native primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    NoArgs,
    ExactlyOne,
}

/// Failure signaled by runtime operations
#[derive(Debug)]
pub enum RuntimeError {
    /// Fixed-arity primitive reached with the wrong number of positionals
    Arity {
        callable: String,
        expected: Arity,
        given: usize,
    },
    /// Same keyword supplied twice while merging a call's keyword pairs.
    /// `callable` already carries the callable description, e.g. `f()`.
    DuplicateKeyword { callable: String, key: String },
    Type(String),
    Name(String),
    UnboundLocal(String),
    Attribute(String),
    Index(String),
    Key(String),
    Value(String),
    ZeroDivision(String),
    Overflow(String),
    Recursion(String),
    /// Internal inconsistency detected at run time (SystemError)
    System(String),
    /// Artifact could not be opened, measured or mapped
    Io { path: PathBuf, source: io::Error },
    /// Bridge table could not be assembled
    Bridge(String),
    Config(String),
    /// Failure raised by user code, passed through untouched
    Raised { kind: String, message: String },
}

/// Stable numeric codes for failure families, readable from generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    Type = 1,
    Name = 2,
    UnboundLocal = 3,
    Attribute = 4,
    Index = 5,
    Key = 6,
    Value = 7,
    ZeroDivision = 8,
    Overflow = 9,
    Recursion = 10,
    System = 11,
    Io = 12,
    Bridge = 13,
    Config = 14,
    Raised = 15,
    StopIteration = 16,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 16] = [
        Self::Type,
        Self::Name,
        Self::UnboundLocal,
        Self::Attribute,
        Self::Index,
        Self::Key,
        Self::Value,
        Self::ZeroDivision,
        Self::Overflow,
        Self::Recursion,
        Self::System,
        Self::Io,
        Self::Bridge,
        Self::Config,
        Self::Raised,
        Self::StopIteration,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| *kind as u32 == code)
    }

    /// Exception class name the runtime reports for this family
    pub const fn name(self) -> &'static str {
        match self {
            Self::Type => "TypeError",
            Self::Name => "NameError",
            Self::UnboundLocal => "UnboundLocalError",
            Self::Attribute => "AttributeError",
            Self::Index => "IndexError",
            Self::Key => "KeyError",
            Self::Value => "ValueError",
            Self::ZeroDivision => "ZeroDivisionError",
            Self::Overflow => "OverflowError",
            Self::Recursion => "RecursionError",
            Self::System => "SystemError",
            Self::Io => "IOError",
            Self::Bridge => "BridgeError",
            Self::Config => "ConfigError",
            Self::Raised => "Exception",
            Self::StopIteration => "StopIteration",
        }
    }
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Arity { .. } | Self::DuplicateKeyword { .. } | Self::Type(_) => ErrorKind::Type,
            Self::Name(_) => ErrorKind::Name,
            Self::UnboundLocal(_) => ErrorKind::UnboundLocal,
            Self::Attribute(_) => ErrorKind::Attribute,
            Self::Index(_) => ErrorKind::Index,
            Self::Key(_) => ErrorKind::Key,
            Self::Value(_) => ErrorKind::Value,
            Self::ZeroDivision(_) => ErrorKind::ZeroDivision,
            Self::Overflow(_) => ErrorKind::Overflow,
            Self::Recursion(_) => ErrorKind::Recursion,
            Self::System(_) => ErrorKind::System,
            Self::Io { .. } => ErrorKind::Io,
            Self::Bridge(_) => ErrorKind::Bridge,
            Self::Config(_) => ErrorKind::Config,
            Self::Raised { kind, .. } if kind == "StopIteration" => ErrorKind::StopIteration,
            Self::Raised { .. } => ErrorKind::Raised,
        }
    }

    /// Class name of the failure; user-raised failures keep their own
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Raised { kind, .. } => kind,
            other => other.kind().name(),
        }
    }

    /// Build a failure of the given family with a preformatted message
    pub fn with_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Type => Self::Type(message),
            ErrorKind::Name => Self::Name(message),
            ErrorKind::UnboundLocal => Self::UnboundLocal(message),
            ErrorKind::Attribute => Self::Attribute(message),
            ErrorKind::Index => Self::Index(message),
            ErrorKind::Key => Self::Key(message),
            ErrorKind::Value => Self::Value(message),
            ErrorKind::ZeroDivision => Self::ZeroDivision(message),
            ErrorKind::Overflow => Self::Overflow(message),
            ErrorKind::Recursion => Self::Recursion(message),
            ErrorKind::System => Self::System(message),
            ErrorKind::Bridge => Self::Bridge(message),
            ErrorKind::Config => Self::Config(message),
            ErrorKind::Io | ErrorKind::Raised | ErrorKind::StopIteration => Self::Raised {
                kind: kind.name().to_string(),
                message,
            },
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arity {
                callable,
                expected: Arity::NoArgs,
                given,
            } => write!(
                f,
                "{}() takes no arguments ({} given)",
                clip_name(callable),
                given
            ),
            Self::Arity {
                callable,
                expected: Arity::ExactlyOne,
                given,
            } => write!(
                f,
                "{}() takes exactly one argument ({} given)",
                clip_name(callable),
                given
            ),
            Self::DuplicateKeyword { callable, key } => write!(
                f,
                "{} got multiple values for keyword argument '{}'",
                callable, key
            ),
            Self::Io { path, source } => {
                write!(f, "cannot load artifact '{}': {}", path.display(), source)
            }
            Self::Type(msg)
            | Self::Name(msg)
            | Self::UnboundLocal(msg)
            | Self::Attribute(msg)
            | Self::Index(msg)
            | Self::Key(msg)
            | Self::Value(msg)
            | Self::ZeroDivision(msg)
            | Self::Overflow(msg)
            | Self::Recursion(msg)
            | Self::System(msg)
            | Self::Bridge(msg)
            | Self::Config(msg) => f.write_str(msg),
            Self::Raised { message, .. } => f.write_str(message),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
