use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

/// Machine-readable identifier of a fatal compile-time error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    UnknownRelationReference,
    AmbiguousParentType,
    DuplicateDefinition,
}

/// A fatal error that aborts compilation before any DDL is emitted.
///
/// Unlike the non-fatal [`crate::ir::analyzer::RejectionReason`]s, these
/// point at a malformed model the driver cannot route around.
#[derive(Debug)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub type_name: Option<String>,
    pub relation_name: Option<String>,
    pub reason: String,
    pub cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        CompileError {
            kind,
            type_name: None,
            relation_name: None,
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn at(mut self, type_name: impl Into<String>, relation_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self.relation_name = Some(relation_name.into());
        self
    }

    pub fn at_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_ref(), self.reason)?;
        if let Some(t) = &self.type_name {
            write!(f, " (type: {t}")?;
            if let Some(r) = &self.relation_name {
                write!(f, ", relation: {r}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl StdError for CompileError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|c| c.as_ref() as &(dyn StdError + 'static))
    }
}

pub type Result<T, E = CompileError> = core::result::Result<T, E>;
