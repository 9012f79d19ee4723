//! Emits `list_objects_<type>_<relation>(p_subject_type, p_subject_id,
//! p_ctx) -> setof text`.
//!
//! Candidates are gathered from every source that could possibly contribute
//! an object id (direct/union/computed tuples, parent-edge hops expressed
//! via the already-specialized target relation's own list function, and
//! every intersection group member), then authoritatively re-validated
//! through the matching `check_<type>_<relation>` function. This guarantees
//! list/check parity (P1) by construction: the frontier only needs to be a
//! superset of the true answer, and `check_*` — which already folds in
//! exclusions via the excluded relation's own closure rather than a bare
//! tuple scan — is the single source of truth for membership.
//!
//! The frontier is a plain `WITH` CTE rather than `WITH RECURSIVE`: each
//! parent-edge hop is resolved by calling a *different* relation's already
//! specialized list function rather than a same-query self-reference, so
//! there is no genuine recursion left for Postgres to perform here — the
//! layering happens across the call graph of specialized functions, which
//! terminates by construction since the Closure Engine already rejects
//! cyclic-recursion before this emitter runs.

use crate::codegen::{check_fn_name, combined_source_sql, list_objects_fn_name, sorted_relation_names, sql_literal, sql_literal_list, subject_match_predicate};
use crate::ir::closure::{Closure, IntersectionMember};
use crate::ir::{analyzer::Analysis, Ir, RelKey};

pub fn emit(ir: &Ir, closure: &Closure, analysis: &Analysis, key: RelKey) -> Option<String> {
    let analyzed = analysis.get(key);
    if !analyzed.can_generate_list {
        return None;
    }
    let c = closure.get(key);

    let type_name = ir.type_name(key.type_idx);
    let fn_name = list_objects_fn_name(ir, key);
    let check_name = check_fn_name(ir, key);

    let satisfying_names = sorted_relation_names(ir, &c.satisfies);
    let mut candidate_sources = vec![format!(
        "SELECT t.object_id FROM {source} t\n    WHERE t.object_type = {obj_type} AND t.relation IN ({rels})\n      AND {subj_pred}",
        source = combined_source_sql(),
        obj_type = sql_literal(type_name),
        rels = sql_literal_list(satisfying_names),
        subj_pred = subject_match_predicate("t"),
    )];

    for edge in &c.parent_edges {
        if !analysis.get(edge.target).can_generate_list {
            continue;
        }
        candidate_sources.push(parent_edge_candidates(ir, type_name, edge));
    }

    for group in &c.intersection_groups {
        for member in group {
            if let Some(sql) = member_candidates(ir, analysis, type_name, member) {
                candidate_sources.push(sql);
            }
        }
    }

    let frontier = candidate_sources.join("\n    UNION\n    ");

    Some(format!(
        "CREATE OR REPLACE FUNCTION {fn_name}(p_subject_type text, p_subject_id text, p_ctx text[] DEFAULT '{{}}')\nRETURNS SETOF text\nLANGUAGE sql\nAS $fn$\n  WITH frontier AS (\n    {frontier}\n  )\n  SELECT DISTINCT f.object_id\n  FROM frontier f\n  WHERE {check_name}(p_subject_type, p_subject_id, f.object_id, p_ctx) = 1;\n$fn$;\n"
    ))
}

fn parent_edge_candidates(ir: &Ir, type_name: &str, edge: &crate::ir::closure::ParentEdge) -> String {
    format!(
        "SELECT pt.object_id FROM {source} pt\n    WHERE pt.object_type = {obj_type} AND pt.relation = {via}\n      AND pt.subject_id IN (SELECT * FROM {target_fn}(p_subject_type, p_subject_id, p_ctx))",
        source = combined_source_sql(),
        obj_type = sql_literal(type_name),
        via = sql_literal(&edge.via_tupleset),
        target_fn = list_objects_fn_name(ir, edge.target),
    )
}

fn member_candidates(ir: &Ir, analysis: &Analysis, type_name: &str, member: &IntersectionMember) -> Option<String> {
    match member {
        IntersectionMember::Relation(k) => {
            if !analysis.get(*k).can_generate_list {
                return None;
            }
            Some(format!(
                "SELECT object_id FROM {}(p_subject_type, p_subject_id, p_ctx)",
                list_objects_fn_name(ir, *k)
            ))
        }
        IntersectionMember::Parent(edge) => {
            if !analysis.get(edge.target).can_generate_list {
                return None;
            }
            Some(parent_edge_candidates(ir, type_name, edge))
        }
    }
}
