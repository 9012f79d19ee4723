//! Emits `check_<type>_<relation>(p_subject_type, p_subject_id, p_object_id,
//! p_ctx) -> integer`, the specialized Check function.
//!
//! Every branch of the behavioral contract in the design document's §4.3
//! maps onto one accumulation step against a `v_result` local: direct match
//! over the relation's closure `satisfies` set, parent edges (TTU hops),
//! intersection groups, and finally an exclusion veto. Because the Closure
//! Engine already folds a `Difference`'s `base` side into the same
//! `satisfies`/`parent_edges`/`intersection_groups` fields used by every
//! other shape, this emitter never special-cases `Difference` beyond
//! applying the veto at the end.

use crate::codegen::{check_fn_name, combined_source_sql, sorted_relation_names, sql_literal, sql_literal_list, subject_match_predicate};
use crate::ir::closure::{Closure, IntersectionMember};
use crate::ir::{analyzer::Analysis, Ir, RelKey};

pub fn emit(ir: &Ir, closure: &Closure, analysis: &Analysis, key: RelKey) -> Option<String> {
    let analyzed = analysis.get(key);
    if !analyzed.can_generate_check {
        return None;
    }
    let c = closure.get(key);
    if !dependencies_specializable(analysis, c) {
        return None;
    }

    let type_name = ir.type_name(key.type_idx);
    let fn_name = check_fn_name(ir, key);

    let satisfying_names = sorted_relation_names(ir, &c.satisfies);
    let direct_predicate = format!(
        "EXISTS (\n    SELECT 1 FROM {source} t\n    WHERE t.object_type = {obj_type} AND t.object_id = p_object_id\n      AND t.relation IN ({rels})\n      AND {subj_pred}\n  )",
        source = combined_source_sql(),
        obj_type = sql_literal(type_name),
        rels = sql_literal_list(satisfying_names),
        subj_pred = subject_match_predicate("t"),
    );

    let mut disjuncts = vec![direct_predicate];
    for edge in &c.parent_edges {
        disjuncts.push(parent_edge_predicate(ir, type_name, edge));
    }
    for group in &c.intersection_groups {
        if group.is_empty() {
            continue;
        }
        let members: Vec<String> = group
            .iter()
            .map(|m| intersection_member_predicate(ir, type_name, m))
            .collect();
        disjuncts.push(format!("(\n    {}\n  )", members.join("\n    AND ")));
    }

    let base_expr = disjuncts.join("\n  OR ");

    let exclusion_clause = c
        .excluded_relation
        .map(|excluded| {
            format!(
                "\n  IF v_result = 1 AND {}(p_subject_type, p_subject_id, p_object_id, p_ctx) = 1 THEN\n    v_result := 0;\n  END IF;\n",
                check_fn_name(ir, excluded)
            )
        })
        .unwrap_or_default();

    Some(format!(
        "CREATE OR REPLACE FUNCTION {fn_name}(p_subject_type text, p_subject_id text, p_object_id text, p_ctx text[] DEFAULT '{{}}')\nRETURNS integer\nLANGUAGE plpgsql\nAS $fn$\nDECLARE\n  v_result integer := 0;\nBEGIN\n  IF {base_expr} THEN\n    v_result := 1;\n  END IF;\n{exclusion_clause}  RETURN v_result;\nEND;\n$fn$;\n"
    ))
}

fn dependencies_specializable(analysis: &Analysis, c: &crate::ir::closure::ClosureResult) -> bool {
    let parent_ok = c.parent_edges.iter().all(|e| analysis.get(e.target).can_generate_check);
    let group_ok = c.intersection_groups.iter().flatten().all(|m| match m {
        IntersectionMember::Relation(k) => analysis.get(*k).can_generate_check,
        IntersectionMember::Parent(e) => analysis.get(e.target).can_generate_check,
    });
    let excl_ok = c
        .excluded_relation
        .map(|k| analysis.get(k).can_generate_check)
        .unwrap_or(true);
    parent_ok && group_ok && excl_ok
}

fn parent_edge_predicate(ir: &Ir, type_name: &str, edge: &crate::ir::closure::ParentEdge) -> String {
    format!(
        "EXISTS (\n    SELECT 1 FROM {source} pt\n    WHERE pt.object_type = {obj_type} AND pt.object_id = p_object_id AND pt.relation = {via}\n      AND {target_fn}(p_subject_type, p_subject_id, pt.subject_id, p_ctx) = 1\n  )",
        source = combined_source_sql(),
        obj_type = sql_literal(type_name),
        via = sql_literal(&edge.via_tupleset),
        target_fn = check_fn_name(ir, edge.target),
    )
}

fn intersection_member_predicate(ir: &Ir, type_name: &str, member: &IntersectionMember) -> String {
    match member {
        IntersectionMember::Relation(k) => format!("{}(p_subject_type, p_subject_id, p_object_id, p_ctx) = 1", check_fn_name(ir, *k)),
        IntersectionMember::Parent(edge) => parent_edge_predicate(ir, type_name, edge),
    }
}
