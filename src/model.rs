//! The typed input model: types, relations, and userset expression trees.
//!
//! This is the compiler's only input; an external OpenFGA-compatible
//! transformer is responsible for producing it from DSL source.

use enum_as_inner::EnumAsInner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, ErrorKind};

/// A declared object type and its ordered relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TypeDef {
    pub name: String,
    pub relations: Vec<RelationDef>,
}

/// One relation on a [`TypeDef`]: its name, the allowed direct-tuple subject
/// shapes, and the userset expression that defines how the relation is held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RelationDef {
    pub name: String,
    /// Allowed subject shapes on direct tuples naming this relation.
    pub subject_types: Vec<SubjectTypeRef>,
    pub expr: RelationExpr,
}

/// A direct-tuple subject shape: a type, optionally a userset relation on
/// that type, optionally a wildcard allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubjectTypeRef {
    pub subject_type: String,
    /// `Some(r)` means `subject_type#r` usersets are an allowed shape.
    pub relation: Option<String>,
    /// `subject_type:*` is an allowed shape.
    pub wildcard: bool,
}

impl SubjectTypeRef {
    pub fn direct(subject_type: impl Into<String>) -> Self {
        SubjectTypeRef {
            subject_type: subject_type.into(),
            relation: None,
            wildcard: false,
        }
    }

    pub fn wildcard(subject_type: impl Into<String>) -> Self {
        SubjectTypeRef {
            subject_type: subject_type.into(),
            relation: None,
            wildcard: true,
        }
    }

    pub fn userset(subject_type: impl Into<String>, relation: impl Into<String>) -> Self {
        SubjectTypeRef {
            subject_type: subject_type.into(),
            relation: Some(relation.into()),
            wildcard: false,
        }
    }
}

/// The userset expression tree. Maps directly onto the OpenFGA `Userset`
/// variants; recursion in the source model is walked once and folded into
/// the closure engine's normalized fields rather than re-walked per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum_macros::AsRefStr, EnumAsInner, JsonSchema)]
pub enum RelationExpr {
    /// Direct tuples whose subject conforms to `SubjectTypeRef`s.
    This,
    /// Held iff the subject has relation `r` on the same object.
    Computed(String),
    /// Held iff a tupleset hop to an object on which the subject has `r`
    /// succeeds. `tupleset` names a relation on the *same* type whose
    /// subjects point at the parent objects to hop through.
    Ttu { tupleset: String, relation: String },
    Union(Vec<RelationExpr>),
    Intersection(Vec<RelationExpr>),
    Difference {
        base: Box<RelationExpr>,
        subtract: Box<RelationExpr>,
    },
}

/// A fully assembled input model: every declared type, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default, JsonSchema)]
pub struct Model {
    pub types: Vec<TypeDef>,
}

impl Model {
    /// Structural validation only: duplicate names. Dangling relation
    /// references are the Closure Engine's job (it needs the full type
    /// table to resolve TTU target types).
    pub fn validate(&self) -> Result<(), CompileError> {
        let mut seen_types = std::collections::HashSet::new();
        for t in &self.types {
            if !seen_types.insert(t.name.as_str()) {
                return Err(CompileError::new(
                    ErrorKind::DuplicateDefinition,
                    format!("type `{}` is declared more than once", t.name),
                )
                .at_type(t.name.clone()));
            }
            let mut seen_relations = std::collections::HashSet::new();
            for r in &t.relations {
                if !seen_relations.insert(r.name.as_str()) {
                    return Err(CompileError::new(
                        ErrorKind::DuplicateDefinition,
                        format!("relation `{}` is declared more than once on type `{}`", r.name, t.name),
                    )
                    .at(t.name.clone(), r.name.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }
}

impl TypeDef {
    pub fn find_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}
