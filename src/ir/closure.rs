//! Relation closure computation over implication, parent-inheritance, and
//! exclusion edges, with cycle detection.
//!
//! Produces, for every declared `(type, relation)`, the set of lower-level
//! pairs that imply it (`satisfies`), any tuple-to-userset parent hops
//! (`parent_edges`), the post-distributive-expansion intersection
//! obligations (`intersection_groups`), and an optional exclusion
//! (`excluded_relation`). This is the single shared source of truth all
//! three SQL emitters consume, so that what "implied" means can never
//! diverge between Check and the two List emitters.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::error::{CompileError, ErrorKind};
use crate::ir::{Ir, RelKey};
use crate::model::RelationExpr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParentEdge {
    pub via_tupleset: String,
    pub target: RelKey,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntersectionMember {
    Relation(RelKey),
    Parent(ParentEdge),
}

#[derive(Debug, Clone, Default)]
pub struct ClosureResult {
    /// Includes `key` itself; the set of `(type, relation)` pairs whose
    /// holding implies `key` holds, closed over `Computed`/`Union` edges.
    pub satisfies: BTreeSet<RelKey>,
    pub parent_edges: Vec<ParentEdge>,
    /// Groups of members that must *all* hold for the group to hold; the
    /// relation holds iff any group holds. Already distributive-expanded.
    pub intersection_groups: Vec<Vec<IntersectionMember>>,
    pub excluded_relation: Option<RelKey>,
    pub recursive: bool,
}

#[derive(Debug, Default)]
pub struct Closure {
    pub by_rel: BTreeMap<RelKey, ClosureResult>,
}

impl Closure {
    pub fn get(&self, key: RelKey) -> &ClosureResult {
        self.by_rel
            .get(&key)
            .expect("closure computed for every declared relation")
    }
}

pub fn compute(ir: &Ir) -> Result<Closure, CompileError> {
    let mut by_rel = BTreeMap::new();
    for key in ir.sorted_rel_keys() {
        let result = compute_one(ir, key)?;
        by_rel.insert(key, result);
    }
    Ok(Closure { by_rel })
}

fn compute_one(ir: &Ir, key: RelKey) -> Result<ClosureResult, CompileError> {
    let mut result = ClosureResult {
        satisfies: BTreeSet::from([key]),
        ..Default::default()
    };
    let rel = ir.relation_def(key);
    walk_top_level(ir, key, &rel.expr, &mut result)?;
    Ok(result)
}

/// Dispatches on the relation's top-level expression shape. `This` needs no
/// work (the identity pair already covers direct tuples); `Computed`/
/// `Union`/`Ttu` feed the implication-closure walk; `Intersection` and
/// `Difference` are recorded as structured obligations rather than closed
/// over, per the design notes ("do not try to emit generic nested SQL").
fn walk_top_level(
    ir: &Ir,
    key: RelKey,
    expr: &RelationExpr,
    result: &mut ClosureResult,
) -> Result<(), CompileError> {
    match expr {
        RelationExpr::This => Ok(()),
        RelationExpr::Computed(_) | RelationExpr::Union(_) | RelationExpr::Ttu { .. } => {
            let mut path = vec![key];
            walk_implication(ir, key, expr, result, &mut path)
        }
        RelationExpr::Intersection(children) => {
            result.intersection_groups = distribute(ir, key, children)?;
            Ok(())
        }
        RelationExpr::Difference { base, subtract } => {
            walk_top_level(ir, key, base, result)?;
            resolve_exclusion(ir, key, subtract, result)
        }
    }
}

/// DFS over `Computed`/`Union`/`Ttu` nodes reachable from `key`'s
/// expression, accumulating `satisfies` and `parent_edges`. A pair revisited
/// within the current path (not merely previously visited overall) is a
/// cycle; it is recorded on the relation and the walk does not re-descend.
fn walk_implication(
    ir: &Ir,
    owner: RelKey,
    expr: &RelationExpr,
    result: &mut ClosureResult,
    path: &mut Vec<RelKey>,
) -> Result<(), CompileError> {
    match expr {
        RelationExpr::This => {}
        RelationExpr::Computed(target_name) => {
            let type_name = ir.type_name(owner.type_idx);
            let target = ir.rel_key(type_name, target_name).ok_or_else(|| {
                CompileError::new(
                    ErrorKind::UnknownRelationReference,
                    format!("relation `{target_name}` referenced by `computed` is not declared on type `{type_name}`"),
                )
                .at(type_name, ir.relation_name(owner))
            })?;
            descend(ir, owner, target, result, path)?;
        }
        RelationExpr::Union(children) => {
            for child in children {
                walk_implication(ir, owner, child, result, path)?;
            }
        }
        RelationExpr::Ttu { tupleset, relation } => {
            let edge = resolve_parent_edge(ir, owner, tupleset, relation)?;
            result.parent_edges.push(edge);
        }
        // Intersection/Difference cannot appear nested inside a Union for
        // this port; see DESIGN.md for the scoping rationale.
        RelationExpr::Intersection(_) | RelationExpr::Difference { .. } => {}
    }
    Ok(())
}

fn descend(
    ir: &Ir,
    owner: RelKey,
    target: RelKey,
    result: &mut ClosureResult,
    path: &mut Vec<RelKey>,
) -> Result<(), CompileError> {
    if path.contains(&target) {
        result.recursive = true;
        return Ok(());
    }
    if result.satisfies.contains(&target) {
        return Ok(());
    }
    result.satisfies.insert(target);
    path.push(target);
    let target_expr = &ir.relation_def(target).expr;
    walk_implication(ir, owner, target_expr, result, path)?;
    path.pop();
    Ok(())
}

/// Resolves a TTU's tupleset to a parent edge. The tupleset names a relation
/// on the *same* type whose `SubjectTypeRef`s must contain exactly one
/// non-wildcard type reference — that reference is the parent type hopped
/// to. Zero or multiple such references make the parent type ambiguous.
fn resolve_parent_edge(
    ir: &Ir,
    owner: RelKey,
    tupleset: &str,
    relation: &str,
) -> Result<ParentEdge, CompileError> {
    let type_name = ir.type_name(owner.type_idx);
    let tupleset_key = ir.rel_key(type_name, tupleset).ok_or_else(|| {
        CompileError::new(
            ErrorKind::UnknownRelationReference,
            format!("tupleset relation `{tupleset}` is not declared on type `{type_name}`"),
        )
        .at(type_name, ir.relation_name(owner))
    })?;
    let tupleset_def = ir.relation_def(tupleset_key);
    let mut concrete_types: Vec<&str> = tupleset_def
        .subject_types
        .iter()
        .filter(|s| !s.wildcard && s.relation.is_none())
        .map(|s| s.subject_type.as_str())
        .collect();
    concrete_types.dedup();
    let target_type_name = match concrete_types.as_slice() {
        [single] => *single,
        _ => {
            return Err(CompileError::new(
                ErrorKind::AmbiguousParentType,
                format!(
                    "tupleset `{tupleset}` on type `{type_name}` must declare exactly one concrete subject type to hop through, found {}",
                    concrete_types.len()
                ),
            )
            .at(type_name, ir.relation_name(owner)));
        }
    };
    let target_type_idx = ir.type_idx(target_type_name).ok_or_else(|| {
        CompileError::new(
            ErrorKind::UnknownRelationReference,
            format!("tupleset `{tupleset}` refers to undeclared type `{target_type_name}`"),
        )
        .at(type_name, ir.relation_name(owner))
    })?;
    let target = ir.rel_key(target_type_name, relation).ok_or_else(|| {
        CompileError::new(
            ErrorKind::UnknownRelationReference,
            format!("relation `{relation}` is not declared on type `{target_type_name}` (target of tupleset `{tupleset}`)"),
        )
        .at(type_name, ir.relation_name(owner))
    })?;
    debug_assert_eq!(target.type_idx, target_type_idx);
    Ok(ParentEdge {
        via_tupleset: tupleset.to_string(),
        target,
    })
}

/// Implements the distributive-law expansion: an `Intersection` child that
/// is itself a `Union` of relations fans the group out, one group per union
/// member, combined with the intersection's other (non-union) members.
/// Nested intersections flatten; `Ttu` members are recorded bound to their
/// parent edge rather than a bare relation key.
fn distribute(
    ir: &Ir,
    owner: RelKey,
    children: &[RelationExpr],
) -> Result<Vec<Vec<IntersectionMember>>, CompileError> {
    let mut fixed: Vec<IntersectionMember> = Vec::new();
    let mut fanned: Vec<Vec<IntersectionMember>> = Vec::new();

    for child in children {
        match child {
            RelationExpr::Computed(name) => {
                fixed.push(IntersectionMember::Relation(resolve_member(ir, owner, name)?));
            }
            RelationExpr::This => {
                fixed.push(IntersectionMember::Relation(owner));
            }
            RelationExpr::Ttu { tupleset, relation } => {
                fixed.push(IntersectionMember::Parent(resolve_parent_edge(
                    ir, owner, tupleset, relation,
                )?));
            }
            RelationExpr::Union(members) => {
                let mut alternatives = Vec::new();
                for m in members {
                    alternatives.push(member_of(ir, owner, m)?);
                }
                fanned.push(alternatives);
            }
            RelationExpr::Intersection(nested) => {
                // Flatten: a nested intersection's own fixed members join
                // ours; any union inside it still fans out independently.
                let nested_groups = distribute(ir, owner, nested)?;
                if nested_groups.len() == 1 {
                    fixed.extend(nested_groups.into_iter().next().unwrap());
                } else {
                    fanned.push(nested_groups.into_iter().flatten().collect());
                }
            }
            RelationExpr::Difference { .. } => {
                // A Difference as an intersection member is outside the
                // documented scenarios for this port; drop it conservatively
                // (caught by the analyzer as unsupported-nested-exclusion).
            }
        }
    }

    if fanned.is_empty() {
        return Ok(vec![fixed]);
    }

    // Cartesian product across fanned union groups, each combined with the
    // fixed members.
    let groups: Vec<Vec<IntersectionMember>> = fanned
        .into_iter()
        .multi_cartesian_product()
        .map(|combo| {
            let mut g = fixed.clone();
            g.extend(combo);
            g
        })
        .collect();
    Ok(groups)
}

fn member_of(ir: &Ir, owner: RelKey, expr: &RelationExpr) -> Result<IntersectionMember, CompileError> {
    match expr {
        RelationExpr::Computed(name) => Ok(IntersectionMember::Relation(resolve_member(ir, owner, name)?)),
        RelationExpr::This => Ok(IntersectionMember::Relation(owner)),
        RelationExpr::Ttu { tupleset, relation } => {
            Ok(IntersectionMember::Parent(resolve_parent_edge(ir, owner, tupleset, relation)?))
        }
        _ => Err(CompileError::new(
            ErrorKind::UnknownRelationReference,
            "union members inside an intersection group must be a relation reference or a tupleset hop",
        )
        .at(ir.type_name(owner.type_idx), ir.relation_name(owner))),
    }
}

fn resolve_member(ir: &Ir, owner: RelKey, name: &str) -> Result<RelKey, CompileError> {
    let type_name = ir.type_name(owner.type_idx);
    ir.rel_key(type_name, name).ok_or_else(|| {
        CompileError::new(
            ErrorKind::UnknownRelationReference,
            format!("relation `{name}` is not declared on type `{type_name}`"),
        )
        .at(type_name, ir.relation_name(owner))
    })
}

/// Resolves a `Difference`'s `subtract` side. Only a direct relation
/// reference is supported; anything more structured is recorded as an
/// unsupported-nested-exclusion by leaving `excluded_relation` unset (the
/// analyzer turns that into the corresponding rejection). Likewise, if the
/// excluded relation's own closure cycles back through `base`'s closure,
/// the exclusion is rejected conservatively rather than guessed at — see
/// the Open Question decision in DESIGN.md.
fn resolve_exclusion(
    ir: &Ir,
    owner: RelKey,
    subtract: &RelationExpr,
    result: &mut ClosureResult,
) -> Result<(), CompileError> {
    let target = match subtract {
        RelationExpr::Computed(name) => resolve_member(ir, owner, name)?,
        _ => return Ok(()),
    };
    if result.satisfies.contains(&target) {
        // The thing we're trying to subtract is itself implied by base:
        // subtracting it would always deny. Conservative: leave unset so
        // the analyzer rejects as unsupported-nested-exclusion rather than
        // silently emitting a relation that can never hold.
        return Ok(());
    }
    result.excluded_relation = Some(target);
    Ok(())
}
