//! Flat, index-addressed view over a [`crate::model::Model`].
//!
//! Cycles in the implication graph need an arena-or-index representation
//! rather than ownership pointers: relations are stored in a flat ordered
//! sequence and referenced by `(type_index, relation_index)` pairs during
//! closure, rather than by name lookups or owned references into the tree.

pub mod analyzer;
pub mod closure;

use std::collections::HashMap;

use crate::model::{Model, RelationDef, TypeDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelIdx(pub usize);

/// A fully resolved `(type, relation)` address, stable for one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelKey {
    pub type_idx: TypeIdx,
    pub rel_idx: RelIdx,
}

/// Index over a [`Model`] resolving names to [`RelKey`]s and back.
///
/// Built once per compilation and shared by the Closure Engine, Analyzer,
/// and all three SQL emitters, so that what "implied" means never diverges
/// between them (the dominant source of parity bugs per the design notes).
pub struct Ir<'m> {
    model: &'m Model,
    type_index: HashMap<&'m str, TypeIdx>,
}

impl<'m> Ir<'m> {
    pub fn build(model: &'m Model) -> Self {
        let type_index = model
            .types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), TypeIdx(i)))
            .collect();
        Ir { model, type_index }
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    pub fn type_idx(&self, name: &str) -> Option<TypeIdx> {
        self.type_index.get(name).copied()
    }

    pub fn type_def(&self, idx: TypeIdx) -> &'m TypeDef {
        &self.model.types[idx.0]
    }

    pub fn rel_key(&self, type_name: &str, rel_name: &str) -> Option<RelKey> {
        let type_idx = self.type_idx(type_name)?;
        let rel_idx = self
            .type_def(type_idx)
            .relations
            .iter()
            .position(|r| r.name == rel_name)?;
        Some(RelKey {
            type_idx,
            rel_idx: RelIdx(rel_idx),
        })
    }

    pub fn relation_def(&self, key: RelKey) -> &'m RelationDef {
        &self.type_def(key.type_idx).relations[key.rel_idx.0]
    }

    pub fn type_name(&self, idx: TypeIdx) -> &'m str {
        &self.type_def(idx).name
    }

    pub fn relation_name(&self, key: RelKey) -> &'m str {
        &self.relation_def(key).name
    }

    /// Every declared `(type, relation)` pair, in a fixed, name-sorted order.
    ///
    /// Closure traversal over this order (rather than declaration order) is
    /// what makes two equivalent models compile to byte-identical DDL (P2):
    /// declaration order is not a stable input.
    pub fn sorted_rel_keys(&self) -> Vec<RelKey> {
        let mut keys: Vec<RelKey> = self
            .model
            .types
            .iter()
            .enumerate()
            .flat_map(|(ti, t)| {
                t.relations
                    .iter()
                    .enumerate()
                    .map(move |(ri, _)| RelKey {
                        type_idx: TypeIdx(ti),
                        rel_idx: RelIdx(ri),
                    })
            })
            .collect();
        keys.sort_by_key(|k| (self.type_name(*k).to_string(), self.relation_name(*k).to_string()));
        keys
    }
}
