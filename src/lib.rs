//! Melange compiles a declarative relation-based authorization model
//! (OpenFGA-style) into specialized PostgreSQL functions answering
//! `Check`/`ListObjects`/`ListSubjects`, plus dispatcher functions that
//! route requests to the specializations, semantically equivalent to a
//! direct interpretation of the model against the tuples.
//!
//! ```text
//! Model ──validate──> Ir ──closure──> Closure ──analyze──> Analysis
//!   ──emit (Check, ListObjects, ListSubjects, Dispatcher)──> DDL
//! ```
//!
//! DSL surface parsing, the runtime client executing the emitted SQL, and
//! persistence of the [`inventory::Inventory`] record are all external
//! collaborators; this crate only covers the compiler pipeline itself.

#![forbid(unsafe_code)]
#![allow(clippy::result_large_err)]

pub mod codegen;
pub mod error;
pub mod inventory;
pub mod ir;
pub mod model;
pub mod pipeline;
pub mod value;

use std::sync::OnceLock;

use semver::Version;

pub use error::{CompileError, ErrorKind, Result};
pub use inventory::Inventory;
pub use ir::analyzer::{Rejection, RejectionReason};
pub use model::{Model, RelationDef, RelationExpr, SubjectTypeRef, TypeDef};
pub use pipeline::CompileOutput;

/// Options controlling a single [`compile`] call.
#[derive(Debug, Clone)]
pub struct Options {
    /// Passes the generated SQL through a formatter that splits it into
    /// multiple lines and prettifies indentation and spacing. Defaults to
    /// `false` here: every emitter already writes readable multi-line SQL,
    /// and the DDL embeds dollar-quoted plpgsql bodies that a generic
    /// formatter does not understand (see `pipeline::compile_model`).
    pub format: bool,
    /// Appends a generated-by comment at the end of the emitted DDL.
    pub signature_comment: bool,
    /// When `Some`, emission is skipped (an empty DDL body is returned) if
    /// the model's content checksum matches, and a function-inventory diff
    /// is used to drop no-longer-needed specialized functions first.
    pub previous_inventory: Option<Inventory>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            format: false,
            signature_comment: false,
            previous_inventory: None,
        }
    }
}

/// Compiles `model` into a DDL script plus its function inventory.
///
/// A pure function: no I/O beyond reading `model` and building strings. See
/// `pipeline::compile_model` for the orchestration this delegates to.
pub fn compile(model: &Model, options: &Options) -> Result<CompileOutput> {
    pipeline::compile_model(model, options)
}

/// The codegen version embedded in every [`inventory::Inventory`] record,
/// read once from the crate's own package version.
pub fn codegen_version() -> &'static Version {
    static VERSION: OnceLock<Version> = OnceLock::new();
    VERSION.get_or_init(|| Version::parse(env!("CARGO_PKG_VERSION")).expect("crate version is valid semver"))
}
