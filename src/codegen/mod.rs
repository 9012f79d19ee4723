//! Shared SQL-generation helpers consumed by all three emitters and the
//! dispatcher, so that what "a subject matches", "a function is named", or
//! "a contextual tuple is well-formed" means can never diverge between them.

pub mod check;
pub mod dispatcher;
pub mod list_objects;
pub mod list_subjects;

use crate::ir::{Ir, RelKey};

pub fn check_fn_name(ir: &Ir, key: RelKey) -> String {
    format!("check_{}_{}", ir.type_name(key.type_idx), ir.relation_name(key))
}

pub fn list_objects_fn_name(ir: &Ir, key: RelKey) -> String {
    format!("list_objects_{}_{}", ir.type_name(key.type_idx), ir.relation_name(key))
}

pub fn list_subjects_fn_name(ir: &Ir, key: RelKey) -> String {
    format!("list_subjects_{}_{}", ir.type_name(key.type_idx), ir.relation_name(key))
}

/// Relation names for a `satisfies`/group-member set of [`RelKey`]s, sorted
/// by `(type name, relation name)` rather than the `RelKey`s' own `Ord`
/// (declaration index). Declaration order is not a stable key — two models
/// equivalent modulo declaration order must still emit byte-identical
/// `relation IN (...)` lists (P2), so every emitter materializing a set of
/// `RelKey`s into SQL text goes through this helper rather than iterating
/// the set directly.
pub fn sorted_relation_names<'a>(ir: &'a Ir, keys: impl IntoIterator<Item = &'a RelKey>) -> Vec<&'a str> {
    let mut names: Vec<&str> = keys.into_iter().map(|k| ir.relation_name(*k)).collect();
    names.sort_unstable();
    names
}

/// Every emitted function's `p_ctx` parameter is `text[]` (§6): each element
/// is a comma-joined `object_type,object_id,relation,subject_type,subject_id`
/// tuple. This parser is emitted once by the Pipeline Driver ahead of every
/// specialized function and is what lets every emitter's `p_ctx text[]`
/// parameter be unioned into the tuple source as plain rows.
///
/// An element that does not split into exactly five fields is a malformed
/// contextual tuple (§7's "wrong column count" case): it is silently
/// dropped from the result set rather than raising an exception, so a
/// malformed contextual tuple contributes to a deterministic deny, never a
/// runtime error.
pub const CONTEXTUAL_TUPLE_PARSER_DDL: &str = "CREATE OR REPLACE FUNCTION melange_ctx_tuples(p_ctx text[])\nRETURNS TABLE(object_type text, object_id text, relation text, subject_type text, subject_id text)\nLANGUAGE sql\nAS $fn$\n  SELECT parts[1], parts[2], parts[3], parts[4], parts[5]\n  FROM unnest(p_ctx) AS raw_tuple\n  CROSS JOIN LATERAL (SELECT string_to_array(raw_tuple, ',') AS parts) AS s\n  WHERE array_length(parts, 1) = 5;\n$fn$;\n";

/// A subquery producing the union of stored and contextual tuples, visible
/// only for the lifetime of the call (P4): `p_ctx` is a plain `text[]`
/// parameter, parsed fresh by [`CONTEXTUAL_TUPLE_PARSER_DDL`]'s helper
/// function on every call, never written anywhere, so nothing persists
/// after return.
pub fn combined_source_sql() -> &'static str {
    "(SELECT object_type, object_id, relation, subject_type, subject_id FROM melange_tuples\
     \n     UNION ALL\
     \n     SELECT object_type, object_id, relation, subject_type, subject_id FROM melange_ctx_tuples(p_ctx))"
}

/// The subject-matching predicate shared by every emitter: a direct match,
/// a wildcard match, or a userset match resolved by recursing into the
/// public dispatcher (so a userset subject's own closure, including its own
/// exclusions, is honored rather than re-implemented per call site).
pub fn subject_match_predicate(tuple_alias: &str) -> String {
    format!(
        "(\n        ({a}.subject_type = p_subject_type AND {a}.subject_id = p_subject_id)\
         \n        OR ({a}.subject_type = p_subject_type AND {a}.subject_id = '*')\
         \n        OR (\n          {a}.subject_id LIKE '%#%'\
         \n          AND check_permission(p_subject_type, p_subject_id, split_part({a}.subject_id, '#', 2), {a}.subject_type, split_part({a}.subject_id, '#', 1), p_ctx) = 1\
         \n        )\n      )",
        a = tuple_alias
    )
}

/// Escapes a value for embedding as a single-quoted SQL string literal.
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escapes a value for embedding inside a parenthesized `IN (...)` list of
/// string literals.
pub fn sql_literal_list(values: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    values
        .into_iter()
        .map(|v| sql_literal(v.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
