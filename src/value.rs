//! Subject identity encodings shared by the tuple source contract and the
//! emitted SQL: concrete ids, the wildcard subject (`*`), and userset
//! references (`<id>#<relation>`).

use std::fmt;

pub const WILDCARD_SUBJECT_ID: &str = "*";

/// A parsed `subject_id` column value, per the Glossary's Wildcard/Userset
/// definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubjectRef {
    /// A concrete subject id, e.g. `alice`.
    Id(String),
    /// `*`, matching every concrete id of the declared subject type.
    Wildcard,
    /// `<id>#<relation>`, a userset reference.
    Userset { id: String, relation: String },
}

impl SubjectRef {
    pub fn parse(raw: &str) -> Self {
        if raw == WILDCARD_SUBJECT_ID {
            return SubjectRef::Wildcard;
        }
        if let Some((id, relation)) = raw.split_once('#') {
            return SubjectRef::Userset {
                id: id.to_string(),
                relation: relation.to_string(),
            };
        }
        SubjectRef::Id(raw.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, SubjectRef::Wildcard)
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectRef::Id(id) => write!(f, "{id}"),
            SubjectRef::Wildcard => write!(f, "{WILDCARD_SUBJECT_ID}"),
            SubjectRef::Userset { id, relation } => write!(f, "{id}#{relation}"),
        }
    }
}
