//! The per-compilation function inventory: what got emitted, at what
//! checksum, by which codegen version. The orchestration layer (out of
//! scope for this crate) persists this to decide skip/re-emit.

use semver::Version;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    /// 64 lowercase hex characters: sha256 of the canonical model encoding.
    pub checksum: String,
    pub codegen_version: Version,
    /// Sorted, so two equivalent compilations produce identical inventories
    /// (P2) regardless of declaration order.
    pub function_names: Vec<String>,
}

impl Inventory {
    pub fn new(checksum: String, function_names: Vec<String>) -> Self {
        let mut function_names = function_names;
        function_names.sort();
        function_names.dedup();
        Inventory {
            checksum,
            codegen_version: crate::codegen_version().clone(),
            function_names,
        }
    }

    /// Function names present in `self` but absent from `next` — what a
    /// diff against a new inventory should `DROP FUNCTION IF EXISTS`.
    pub fn dropped_since(&self, next: &Inventory) -> Vec<&str> {
        self.function_names
            .iter()
            .filter(|n| !next.function_names.contains(n))
            .map(|n| n.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_since_finds_removed_functions() {
        let prev = Inventory::new("a".repeat(64), vec!["check_doc_viewer".into(), "check_doc_owner".into()]);
        let next = Inventory::new("b".repeat(64), vec!["check_doc_owner".into()]);
        assert_eq!(prev.dropped_since(&next), vec!["check_doc_viewer"]);
    }

    #[test]
    fn function_names_are_sorted_and_deduped() {
        let inv = Inventory::new("a".repeat(64), vec!["b".into(), "a".into(), "a".into()]);
        assert_eq!(inv.function_names, vec!["a".to_string(), "b".to_string()]);
    }
}
