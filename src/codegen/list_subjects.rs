//! Emits `list_subjects_<type>_<relation>(p_object_id, p_subject_type,
//! p_ctx) -> setof text`.
//!
//! Mirrors [`crate::codegen::list_objects`]: candidates are gathered broadly
//! (direct subjects, a wildcard/userset expansion to every concrete subject
//! id of the requested type known to the tuple source, and parent-edge /
//! intersection-member candidates via lateral calls into the matching
//! `list_subjects_*` function on the hop target), then re-validated through
//! `check_<type>_<relation>` so exclusions — including ones that only
//! become visible through a parent-inherited closure — are honored exactly
//! as Check would honor them (the parity concern called out for this
//! emitter specifically).

use crate::codegen::{check_fn_name, combined_source_sql, list_subjects_fn_name, sorted_relation_names, sql_literal, sql_literal_list};
use crate::ir::closure::{Closure, IntersectionMember};
use crate::ir::{analyzer::Analysis, Ir, RelKey};

pub fn emit(ir: &Ir, closure: &Closure, analysis: &Analysis, key: RelKey) -> Option<String> {
    let analyzed = analysis.get(key);
    if !analyzed.can_generate_list {
        return None;
    }
    let c = closure.get(key);

    let type_name = ir.type_name(key.type_idx);
    let fn_name = list_subjects_fn_name(ir, key);
    let check_name = check_fn_name(ir, key);

    let satisfying_names = sorted_relation_names(ir, &c.satisfies);
    let mut candidate_sources = vec![format!(
        "SELECT t.subject_id FROM {source} t\n    WHERE t.object_type = {obj_type} AND t.object_id = p_object_id\n      AND t.relation IN ({rels})\n      AND t.subject_type = p_subject_type\n      AND t.subject_id NOT LIKE '%#%' AND t.subject_id <> '*'",
        source = combined_source_sql(),
        obj_type = sql_literal(type_name),
        rels = sql_literal_list(satisfying_names),
    )];

    // Wildcard/userset expansion (P5): every concrete subject id of the
    // requested type the tuple source has ever seen becomes a candidate;
    // the final check_* filter below prunes anything not actually held.
    if analyzed.features.contains(crate::ir::analyzer::RelationFeatures::WILDCARD_ALLOWED)
        || analyzed.features.contains(crate::ir::analyzer::RelationFeatures::USERSET_ALLOWED)
    {
        candidate_sources.push(format!(
            "SELECT DISTINCT subj.subject_id FROM {source} subj\n    WHERE subj.subject_type = p_subject_type\n      AND subj.subject_id NOT LIKE '%#%' AND subj.subject_id <> '*'",
            source = combined_source_sql(),
        ));
    }

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
        "CREATE OR REPLACE FUNCTION {fn_name}(p_object_id text, p_subject_type text, p_ctx text[] DEFAULT '{{}}')\nRETURNS SETOF text\nLANGUAGE sql\nAS $fn$\n  WITH frontier AS (\n    {frontier}\n  )\n  SELECT DISTINCT f.subject_id\n  FROM frontier f\n  WHERE {check_name}(p_subject_type, f.subject_id, p_object_id, p_ctx) = 1;\n$fn$;\n"
    ))
}

fn parent_edge_candidates(ir: &Ir, type_name: &str, edge: &crate::ir::closure::ParentEdge) -> String {
    format!(
        "SELECT s FROM {source} pt, LATERAL {target_fn}(pt.subject_id, p_subject_type, p_ctx) AS s\n    WHERE pt.object_type = {obj_type} AND pt.object_id = p_object_id AND pt.relation = {via}",
        source = combined_source_sql(),
        obj_type = sql_literal(type_name),
        via = sql_literal(&edge.via_tupleset),
        target_fn = list_subjects_fn_name(ir, edge.target),
    )
}

fn member_candidates(ir: &Ir, analysis: &Analysis, type_name: &str, member: &IntersectionMember) -> Option<String> {
    match member {
        IntersectionMember::Relation(k) => {
            if !analysis.get(*k).can_generate_list {
                return None;
            }
            Some(format!(
                "SELECT subject_id FROM {}(p_object_id, p_subject_type, p_ctx)",
                list_subjects_fn_name(ir, *k)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::closure;
    use crate::model::*;

    #[test]
    fn emits_wildcard_expansion_for_wildcard_relation() {
        let model = Model {
            types: vec![
                TypeDef {
                    name: "user".into(),
                    relations: vec![],
                },
                TypeDef {
                    name: "doc".into(),
                    relations: vec![RelationDef {
                        name: "viewer".into(),
                        subject_types: vec![SubjectTypeRef::direct("user"), SubjectTypeRef::wildcard("user")],
                        expr: RelationExpr::This,
                    }],
                },
            ],
        };
        let ir = Ir::build(&model);
        let c = closure::compute(&ir).unwrap();
        let a = crate::ir::analyzer::analyze(&ir, &c);
        let viewer = ir.rel_key("doc", "viewer").unwrap();
        let sql = emit(&ir, &c, &a, viewer).unwrap();
        assert!(sql.contains("list_subjects_doc_viewer"));
        assert!(sql.contains("subj.subject_id <> '*'"));
    }
}
