//! Per-relation classification: feature flags and the CanGenerateCheck /
//! CanGenerateList decisions, with rejection reasons for relations that
//! cannot be specialized.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::ir::closure::Closure;
use crate::ir::{Ir, RelKey};
use crate::model::RelationExpr;

bitflags! {
    /// Shape flags for a single relation, independent of whether it ends up
    /// specializable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RelationFeatures: u16 {
        const DIRECT          = 0b0000_0000_0001;
        const COMPUTED        = 0b0000_0000_0010;
        const TTU             = 0b0000_0000_0100;
        const UNION           = 0b0000_0000_1000;
        const INTERSECTION    = 0b0000_0001_0000;
        const DIFFERENCE      = 0b0000_0010_0000;
        const WILDCARD_ALLOWED = 0b0000_0100_0000;
        const USERSET_ALLOWED  = 0b0000_1000_0000;
        const RECURSIVE        = 0b0001_0000_0000;
    }
}

/// The closed set of reasons a relation may be denied specialization.
///
/// `AmbiguousParentType` and `UnknownRelationReference` are part of this set
/// for completeness with the declared taxonomy, but in practice never reach
/// the analyzer: the Closure Engine raises them as fatal `CompileError`s
/// before analysis runs (see DESIGN.md for why the two overlapping error
/// taxonomies in the source material are reconciled this way).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum RejectionReason {
    CyclicRecursion,
    AmbiguousParentType,
    UnknownRelationReference,
    WildcardInForbiddenPosition,
    UnsupportedNestedExclusion,
}

#[derive(Debug, Clone)]
pub struct Rejection {
    pub relation: RelKey,
    pub reason: RejectionReason,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct AnalyzedRelation {
    pub features: RelationFeatures,
    pub can_generate_check: bool,
    pub can_generate_list: bool,
    pub rejection: Option<Rejection>,
}

#[derive(Debug, Default)]
pub struct Analysis {
    pub by_rel: BTreeMap<RelKey, AnalyzedRelation>,
}

impl Analysis {
    pub fn get(&self, key: RelKey) -> &AnalyzedRelation {
        self.by_rel
            .get(&key)
            .expect("analysis computed for every declared relation")
    }

    /// All rejections, in the relation's sorted order, for reporting.
    pub fn rejections(&self) -> Vec<&Rejection> {
        self.by_rel
            .values()
            .filter_map(|a| a.rejection.as_ref())
            .collect()
    }
}

pub fn analyze(ir: &Ir, closure: &Closure) -> Analysis {
    let mut by_rel = BTreeMap::new();
    for key in ir.sorted_rel_keys() {
        by_rel.insert(key, analyze_one(ir, closure, key));
    }
    Analysis { by_rel }
}

fn analyze_one(ir: &Ir, closure: &Closure, key: RelKey) -> AnalyzedRelation {
    let rel = ir.relation_def(key);
    let c = closure.get(key);

    let mut features = RelationFeatures::empty();
    mark_shape(&mut features, &rel.expr);
    if rel.subject_types.iter().any(|s| s.wildcard) {
        features |= RelationFeatures::WILDCARD_ALLOWED;
    }
    if rel.subject_types.iter().any(|s| s.relation.is_some()) {
        features |= RelationFeatures::USERSET_ALLOWED;
    }
    if c.recursive {
        features |= RelationFeatures::RECURSIVE;
    }

    let mut rejection = None;

    if c.recursive {
        rejection = Some(Rejection {
            relation: key,
            reason: RejectionReason::CyclicRecursion,
            detail: format!(
                "relation `{}` on type `{}` re-enters itself through computed/union propagation",
                rel.name,
                ir.type_name(key.type_idx)
            ),
        });
    }

    if rejection.is_none() && matches!(rel.expr, RelationExpr::Difference { .. }) && c.excluded_relation.is_none() {
        rejection = Some(Rejection {
            relation: key,
            reason: RejectionReason::UnsupportedNestedExclusion,
            detail: format!(
                "relation `{}` on type `{}` excludes something other than a direct relation reference, or its exclusion cycles through its own base",
                rel.name,
                ir.type_name(key.type_idx)
            ),
        });
    }

    if rejection.is_none() {
        if let Some(edge) = c.parent_edges.iter().find(|edge| tupleset_allows_wildcard(ir, key, edge)) {
            rejection = Some(Rejection {
                relation: key,
                reason: RejectionReason::WildcardInForbiddenPosition,
                detail: format!(
                    "tupleset `{}` on type `{}` allows a wildcard parent object, which cannot be hopped through",
                    edge.via_tupleset,
                    ir.type_name(key.type_idx)
                ),
            });
        }
    }

    let can_generate_check = rejection.is_none();

    // List materialization is additionally unbounded when the only way to
    // satisfy the relation is a bare wildcard direct tuple with no parent
    // edge to bound the frontier: every possible subject id of that type
    // would need enumerating, not just those present in the tuple source.
    let unbounded_list = can_generate_check
        && matches!(rel.expr, RelationExpr::This)
        && rel.subject_types.iter().all(|s| s.wildcard)
        && !rel.subject_types.is_empty()
        && c.parent_edges.is_empty();

    let can_generate_list = can_generate_check && !unbounded_list;

    AnalyzedRelation {
        features,
        can_generate_check,
        can_generate_list,
        rejection,
    }
}

fn mark_shape(features: &mut RelationFeatures, expr: &RelationExpr) {
    match expr {
        RelationExpr::This => *features |= RelationFeatures::DIRECT,
        RelationExpr::Computed(_) => *features |= RelationFeatures::COMPUTED,
        RelationExpr::Ttu { .. } => *features |= RelationFeatures::TTU,
        RelationExpr::Union(children) => {
            *features |= RelationFeatures::UNION;
            for c in children {
                mark_shape(features, c);
            }
        }
        RelationExpr::Intersection(children) => {
            *features |= RelationFeatures::INTERSECTION;
            for c in children {
                mark_shape(features, c);
            }
        }
        RelationExpr::Difference { base, subtract } => {
            *features |= RelationFeatures::DIFFERENCE;
            mark_shape(features, base);
            mark_shape(features, subtract);
        }
    }
}

fn tupleset_allows_wildcard(ir: &Ir, owner: RelKey, edge: &crate::ir::closure::ParentEdge) -> bool {
    let type_name = ir.type_name(owner.type_idx);
    let Some(tupleset_key) = ir.rel_key(type_name, &edge.via_tupleset) else {
        return false;
    };
    ir.relation_def(tupleset_key)
        .subject_types
        .iter()
        .any(|s| s.wildcard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::closure;
    use crate::model::*;

    #[test]
    fn recursive_relation_rejected() {
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
                ],
            }],
        };
        let ir = Ir::build(&model);
        let c = closure::compute(&ir).unwrap();
        let analysis = analyze(&ir, &c);
        let a = ir.rel_key("doc", "a").unwrap();
        let analyzed = analysis.get(a);
        assert!(!analyzed.can_generate_check);
        assert_eq!(analyzed.rejection.as_ref().unwrap().reason, RejectionReason::CyclicRecursion);
    }

    #[test]
    fn unbounded_pure_wildcard_list_rejected() {
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
                        subject_types: vec![SubjectTypeRef::wildcard("user")],
                        expr: RelationExpr::This,
                    }],
                },
            ],
        };
        let ir = Ir::build(&model);
        let c = closure::compute(&ir).unwrap();
        let analysis = analyze(&ir, &c);
        let viewer = ir.rel_key("doc", "viewer").unwrap();
        let analyzed = analysis.get(viewer);
        assert!(analyzed.can_generate_check);
        assert!(!analyzed.can_generate_list);
    }

    #[test]
    fn wildcard_tupleset_parent_is_rejected() {
        let model = Model {
            types: vec![
                TypeDef {
                    name: "user".into(),
                    relations: vec![],
                },
                TypeDef {
                    name: "org".into(),
                    relations: vec![RelationDef {
                        name: "member".into(),
                        subject_types: vec![SubjectTypeRef::direct("user")],
                        expr: RelationExpr::This,
                    }],
                },
                TypeDef {
                    name: "repo".into(),
                    relations: vec![
                        RelationDef {
                            name: "org".into(),
                            subject_types: vec![SubjectTypeRef::direct("org"), SubjectTypeRef::wildcard("org")],
                            expr: RelationExpr::This,
                        },
                        RelationDef {
                            name: "reader".into(),
                            subject_types: vec![],
                            expr: RelationExpr::Ttu {
                                tupleset: "org".into(),
                                relation: "member".into(),
                            },
                        },
                    ],
                },
            ],
        };
        let ir = Ir::build(&model);
        let c = closure::compute(&ir).unwrap();
        let analysis = analyze(&ir, &c);
        let reader = ir.rel_key("repo", "reader").unwrap();
        let analyzed = analysis.get(reader);
        assert!(!analyzed.can_generate_check);
        assert_eq!(
            analyzed.rejection.as_ref().unwrap().reason,
            RejectionReason::WildcardInForbiddenPosition
        );
    }

    #[test]
    fn exclusion_subtract_cycling_through_base_is_rejected() {
        // can_review: can_read but not can_read — the subtract side is
        // already in base's own closure, so conservatively reject rather
        // than emit a relation that could never hold.
        let model = Model {
            types: vec![
                TypeDef {
                    name: "user".into(),
                    relations: vec![],
                },
                TypeDef {
                    name: "doc".into(),
                    relations: vec![
                        RelationDef {
                            name: "can_read".into(),
                            subject_types: vec![SubjectTypeRef::direct("user")],
                            expr: RelationExpr::This,
                        },
                        RelationDef {
                            name: "can_review".into(),
                            subject_types: vec![],
                            expr: RelationExpr::Difference {
                                base: Box::new(RelationExpr::Computed("can_read".into())),
                                subtract: Box::new(RelationExpr::Computed("can_read".into())),
                            },
                        },
                    ],
                },
            ],
        };
        let ir = Ir::build(&model);
        let c = closure::compute(&ir).unwrap();
        let analysis = analyze(&ir, &c);
        let can_review = ir.rel_key("doc", "can_review").unwrap();
        let analyzed = analysis.get(can_review);
        assert!(!analyzed.can_generate_check);
        assert_eq!(
            analyzed.rejection.as_ref().unwrap().reason,
            RejectionReason::UnsupportedNestedExclusion
        );
    }

    #[test]
    fn ordinary_direct_relation_is_fully_specializable() {
        let model = Model {
            types: vec![
                TypeDef {
                    name: "user".into(),
                    relations: vec![],
                },
                TypeDef {
                    name: "doc".into(),
                    relations: vec![RelationDef {
                        name: "owner".into(),
                        subject_types: vec![SubjectTypeRef::direct("user")],
                        expr: RelationExpr::This,
                    }],
                },
            ],
        };
        let ir = Ir::build(&model);
        let c = closure::compute(&ir).unwrap();
        let analysis = analyze(&ir, &c);
        let owner = ir.rel_key("doc", "owner").unwrap();
        let analyzed = analysis.get(owner);
        assert!(analyzed.can_generate_check);
        assert!(analyzed.can_generate_list);
        assert!(analyzed.features.contains(RelationFeatures::DIRECT));
    }
}
