//! Emits the three public dispatcher functions and their `_internal`
//! counterparts. Each is a `CASE` over `(type, relation)` routing to a
//! specialized function; the default branch is deny / empty-set, with **no
//! generic fallback** — an unroutable relation silently and detectably
//! denies rather than falling back to an unsafe interpreter.
//!
//! The public wrapper's job is to normalize the caller's `p_ctx` encoding
//! before it reaches `_internal`: a caller that passes `NULL` (rather than
//! an empty array) for "no contextual tuples" is coalesced to `'{}'` at this
//! single boundary, so `_internal` — and every specialized function it
//! dispatches to — only ever sees a concrete array, never `NULL`.

use crate::codegen::{check_fn_name, list_objects_fn_name, list_subjects_fn_name, sql_literal};
use crate::ir::{analyzer::Analysis, Ir, RelKey};

pub fn emit_check_permission(ir: &Ir, analysis: &Analysis, keys: &[RelKey]) -> String {
    let branches: Vec<String> = keys
        .iter()
        .filter(|k| analysis.get(**k).can_generate_check)
        .map(|k| {
            format!(
                "    WHEN {pair} THEN {fn_name}(p_subject_type, p_subject_id, p_object_id, p_ctx)",
                pair = sql_literal(&format!("{}:{}", ir.type_name(k.type_idx), ir.relation_name(k))),
                fn_name = check_fn_name(ir, *k),
            )
        })
        .collect();

    format!(
        "CREATE OR REPLACE FUNCTION check_permission_internal(p_subject_type text, p_subject_id text, p_relation text, p_object_type text, p_object_id text, p_ctx text[] DEFAULT '{{}}')\nRETURNS integer\nLANGUAGE plpgsql\nAS $fn$\nBEGIN\n  RETURN CASE p_object_type || ':' || p_relation\n{branches}\n    ELSE 0\n  END;\nEND;\n$fn$;\n\nCREATE OR REPLACE FUNCTION check_permission(p_subject_type text, p_subject_id text, p_relation text, p_object_type text, p_object_id text, p_ctx text[] DEFAULT '{{}}')\nRETURNS integer\nLANGUAGE sql\nAS $fn$\n  SELECT check_permission_internal(p_subject_type, p_subject_id, p_relation, p_object_type, p_object_id, COALESCE(p_ctx, '{{}}'::text[]));\n$fn$;\n",
        branches = branches.join("\n")
    )
}

pub fn emit_list_accessible_objects(ir: &Ir, analysis: &Analysis, keys: &[RelKey]) -> String {
    let branches: Vec<String> = keys
        .iter()
        .filter(|k| analysis.get(**k).can_generate_list)
        .map(|k| {
            format!(
                "    WHEN {pair} THEN RETURN QUERY SELECT * FROM {fn_name}(p_subject_type, p_subject_id, p_ctx);",
                pair = sql_literal(&format!("{}:{}", ir.type_name(k.type_idx), ir.relation_name(k))),
                fn_name = list_objects_fn_name(ir, *k),
            )
        })
        .collect();

    format!(
        "CREATE OR REPLACE FUNCTION list_accessible_objects_internal(p_subject_type text, p_subject_id text, p_relation text, p_object_type text, p_ctx text[] DEFAULT '{{}}')\nRETURNS SETOF text\nLANGUAGE plpgsql\nAS $fn$\nBEGIN\n  CASE p_object_type || ':' || p_relation\n{branches}\n    ELSE\n      RETURN;\n  END CASE;\n  RETURN;\nEND;\n$fn$;\n\nCREATE OR REPLACE FUNCTION list_accessible_objects(p_subject_type text, p_subject_id text, p_relation text, p_object_type text, p_ctx text[] DEFAULT '{{}}')\nRETURNS SETOF text\nLANGUAGE sql\nAS $fn$\n  SELECT * FROM list_accessible_objects_internal(p_subject_type, p_subject_id, p_relation, p_object_type, COALESCE(p_ctx, '{{}}'::text[]));\n$fn$;\n",
        branches = branches.join("\n")
    )
}

pub fn emit_list_accessible_subjects(ir: &Ir, analysis: &Analysis, keys: &[RelKey]) -> String {
    let branches: Vec<String> = keys
        .iter()
        .filter(|k| analysis.get(**k).can_generate_list)
        .map(|k| {
            format!(
                "    WHEN {pair} THEN RETURN QUERY SELECT * FROM {fn_name}(p_object_id, p_subject_type, p_ctx);",
                pair = sql_literal(&format!("{}:{}", ir.type_name(k.type_idx), ir.relation_name(k))),
                fn_name = list_subjects_fn_name(ir, *k),
            )
        })
        .collect();

    format!(
        "CREATE OR REPLACE FUNCTION list_accessible_subjects_internal(p_object_type text, p_object_id text, p_relation text, p_subject_type text, p_ctx text[] DEFAULT '{{}}')\nRETURNS SETOF text\nLANGUAGE plpgsql\nAS $fn$\nBEGIN\n  CASE p_object_type || ':' || p_relation\n{branches}\n    ELSE\n      RETURN;\n  END CASE;\n  RETURN;\nEND;\n$fn$;\n\nCREATE OR REPLACE FUNCTION list_accessible_subjects(p_object_type text, p_object_id text, p_relation text, p_subject_type text, p_ctx text[] DEFAULT '{{}}')\nRETURNS SETOF text\nLANGUAGE sql\nAS $fn$\n  SELECT * FROM list_accessible_subjects_internal(p_object_type, p_object_id, p_relation, p_subject_type, COALESCE(p_ctx, '{{}}'::text[]));\n$fn$;\n",
        branches = branches.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::closure;
    use crate::model::*;

    #[test]
    fn dispatcher_omits_non_specializable_branch() {
        let model = Model {
            types: vec![TypeDef {
                name: "doc".into(),
                relations: vec![
                    RelationDef {
                        name: "a".into(),
                        subject_types: vec![],
                        expr: RelationExpr::Computed("b".into()),
                    },
                    RelationDef {
                        name: "b".into(),
                        subject_types: vec![],
                        expr: RelationExpr::Computed("a".into()),
                    },
                    RelationDef {
                        name: "owner".into(),
                        subject_types: vec![SubjectTypeRef::direct("user")],
                        expr: RelationExpr::This,
                    },
                ],
            }],
        };
        let ir = Ir::build(&model);
        let c = closure::compute(&ir).unwrap();
        let a = crate::ir::analyzer::analyze(&ir, &c);
        let keys = ir.sorted_rel_keys();
        let sql = emit_check_permission(&ir, &a, &keys);
        assert!(sql.contains("check_doc_owner"));
        assert!(!sql.contains("check_doc_a"));
        assert!(sql.contains("ELSE 0"));
    }
}
