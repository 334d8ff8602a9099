//! Rewrites caller predicates into [`CanonicalNode`] trees.
//!
//! ## Flow
//!
//! ```text
//! normalize()
//!   └─ predicate()
//!        ├─ Logical      → And / Or of normalized sides
//!        ├─ Not          → normalized operand, negated (De Morgan pushdown)
//!        ├─ Compare      → operand() on both sides
//!        │                   ├─ field  vs constant   → Compare (swapped if needed)
//!        │                   ├─ predicate vs bool    → predicate, maybe negated
//!        │                   └─ anything else        → InvalidComparisonShape
//!        ├─ MethodCall   → Like / In when whitelisted, else constant folding
//!        ├─ bool field   → Compare(field, Eq, true)
//!        └─ Conditional / statements → UnsupportedConstruct
//! ```

use crate::canonical::{CanonicalNode, LikeMode};
use crate::error::{CompileError, CompileResult};
use crate::eval;
use crate::literal::{FieldRef, Folded, Literal};
use crate::raw::{CompareOp, LogicalOp, RawNode};

/// Deepest predicate tree accepted; normalization and folding recurse per level.
pub const MAX_PREDICATE_DEPTH: usize = 256;

/// Stateless predicate normalizer. Cheap to create and safe to share.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

/// One side of a comparison after normalization.
#[derive(Debug)]
enum Operand {
    Field(FieldRef),
    Literal(Literal),
    Predicate(CanonicalNode),
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalizes one Where-clause predicate.
    pub fn normalize(&self, node: &RawNode) -> CompileResult<CanonicalNode> {
        let depth = node.depth();
        if depth > MAX_PREDICATE_DEPTH {
            return Err(CompileError::unsupported(
                format!("predicate nests {depth} levels, the limit is {MAX_PREDICATE_DEPTH}"),
                "<nested predicate>",
            ));
        }
        let canonical = self.predicate(node)?;
        tracing::debug!(predicate = %node, canonical = %canonical, "normalized predicate");
        Ok(canonical)
    }

    fn predicate(&self, node: &RawNode) -> CompileResult<CanonicalNode> {
        match node {
            RawNode::Logical { op, left, right } => {
                let left = self.predicate(left)?;
                let right = self.predicate(right)?;
                Ok(match op {
                    LogicalOp::And => CanonicalNode::and(left, right),
                    LogicalOp::Or => CanonicalNode::or(left, right),
                })
            }
            RawNode::Not(inner) => Ok(self.predicate(inner)?.negate()),
            RawNode::Compare { op, left, right } => self.compare(*op, left, right, node),
            RawNode::MethodCall { .. } => match self.method_predicate(node)? {
                Some(predicate) => Ok(predicate),
                None => self.constant_predicate(node),
            },
            RawNode::Conditional { .. } => Err(CompileError::unsupported(
                "a conditional cannot stand as a sub-predicate",
                node,
            )),
            RawNode::Other(kind) => Err(CompileError::unsupported(
                format!("{} is not allowed in a predicate", kind.name()),
                node,
            )),
            _ => match field_ref(node)? {
                // A bare boolean field reads as `field == true`.
                Some(field) => Ok(CanonicalNode::Compare {
                    field,
                    op: CompareOp::Eq,
                    value: Literal::Bool(true),
                }),
                None => match node {
                    RawNode::Convert { operand, .. } => self.predicate(operand),
                    _ => self.constant_predicate(node),
                },
            },
        }
    }

    /// A sub-predicate that never reads the record has no canonical shape.
    fn constant_predicate(&self, node: &RawNode) -> CompileResult<CanonicalNode> {
        let value = eval::fold(node)?;
        Err(CompileError::invalid_shape(
            format!("predicate does not reference the record (always {value})"),
            node,
        ))
    }

    fn compare(
        &self,
        op: CompareOp,
        left: &RawNode,
        right: &RawNode,
        node: &RawNode,
    ) -> CompileResult<CanonicalNode> {
        let left = self.operand(left)?;
        let right = self.operand(right)?;

        match (left, right) {
            (Operand::Field(field), Operand::Literal(value)) => {
                Ok(CanonicalNode::Compare { field, op, value })
            }
            (Operand::Literal(value), Operand::Field(field)) => Ok(CanonicalNode::Compare {
                field,
                op: op.mirror(),
                value,
            }),
            (Operand::Field(_), Operand::Field(_)) => Err(CompileError::invalid_shape(
                "both sides are field references",
                node,
            )),
            (Operand::Literal(_), Operand::Literal(_)) => Err(CompileError::invalid_shape(
                "both sides are constants",
                node,
            )),
            (Operand::Predicate(predicate), Operand::Literal(value))
            | (Operand::Literal(value), Operand::Predicate(predicate)) => {
                self.bool_compare(op, predicate, value, node)
            }
            (Operand::Predicate(_), _) | (_, Operand::Predicate(_)) => {
                Err(CompileError::invalid_shape(
                    "a boolean sub-predicate can only be compared with a bool constant",
                    node,
                ))
            }
        }
    }

    /// `pred == true`, `pred != false` keep the predicate; the other two
    /// combinations negate it.
    fn bool_compare(
        &self,
        op: CompareOp,
        predicate: CanonicalNode,
        value: Literal,
        node: &RawNode,
    ) -> CompileResult<CanonicalNode> {
        let Some(expected) = value.as_bool() else {
            return Err(CompileError::invalid_shape(
                format!("boolean sub-predicate compared with {}", value.value_type()),
                node,
            ));
        };
        let keep = match op {
            CompareOp::Eq => expected,
            CompareOp::Ne => !expected,
            _ => {
                return Err(CompileError::invalid_shape(
                    format!("operator {} is not defined for booleans", op.symbol()),
                    node,
                ));
            }
        };
        Ok(if keep { predicate } else { predicate.negate() })
    }

    fn operand(&self, node: &RawNode) -> CompileResult<Operand> {
        if let Some(field) = field_ref(node)? {
            return Ok(Operand::Field(field));
        }
        if !node.references_record() {
            return match eval::fold(node)? {
                Folded::Scalar(value) => Ok(Operand::Literal(value)),
                Folded::Collection(_) => Err(CompileError::unsupported(
                    "a collection cannot be used as a comparison operand",
                    node,
                )),
            };
        }

        match strip_conversions(node) {
            inner @ (RawNode::Compare { .. } | RawNode::Logical { .. } | RawNode::Not(_)) => {
                self.predicate(inner).map(Operand::Predicate)
            }
            inner @ RawNode::MethodCall { .. } => match self.method_predicate(inner)? {
                Some(predicate) => Ok(Operand::Predicate(predicate)),
                None => Err(not_foldable(inner)),
            },
            // Ternaries, arithmetic and calls over the record cannot be folded.
            inner => Err(not_foldable(inner)),
        }
    }

    /// Recognizes `field.Contains|StartsWith|EndsWith(pattern[, ignore_case])`
    /// and `collection.Contains(field)`.
    fn method_predicate(&self, node: &RawNode) -> CompileResult<Option<CanonicalNode>> {
        let RawNode::MethodCall { target, name, args } = node else {
            return Ok(None);
        };

        if let Some(mode) = LikeMode::from_method_name(name) {
            if let Some(field) = field_ref(target)? {
                return self.like(field, mode, args, node).map(Some);
            }
        }

        if LikeMode::from_method_name(name) == Some(LikeMode::Contains) && args.len() == 1 {
            if let Some(field) = field_ref(&args[0])? {
                return self.membership(field, target, node).map(Some);
            }
        }

        Ok(None)
    }

    fn like(
        &self,
        field: FieldRef,
        mode: LikeMode,
        args: &[RawNode],
        node: &RawNode,
    ) -> CompileResult<CanonicalNode> {
        let (pattern, flag) = match args {
            [pattern] => (pattern, None),
            [pattern, flag] => (pattern, Some(flag)),
            _ => {
                return Err(CompileError::unsupported(
                    format!(
                        "{} expects a pattern and an optional ignore-case flag",
                        mode.method_name()
                    ),
                    node,
                ));
            }
        };

        let pattern = match eval::fold_scalar(pattern)? {
            Literal::String(s) => s,
            Literal::Null(_) => {
                return Err(CompileError::unsupported("pattern must not be null", node));
            }
            other => {
                return Err(CompileError::unsupported(
                    format!("pattern must be a string, found {}", other.value_type()),
                    node,
                ));
            }
        };

        let ignore_case = match flag {
            None => false,
            Some(flag) => eval::fold_scalar(flag)?.as_bool().ok_or_else(|| {
                CompileError::unsupported("ignore-case flag must be a bool", node)
            })?,
        };

        Ok(CanonicalNode::Like {
            field,
            pattern,
            mode,
            ignore_case,
            negate: false,
        })
    }

    fn membership(
        &self,
        field: FieldRef,
        collection: &RawNode,
        node: &RawNode,
    ) -> CompileResult<CanonicalNode> {
        match eval::fold(collection)? {
            Folded::Collection(values) => Ok(CanonicalNode::In {
                field,
                values,
                negate: false,
            }),
            // `"abc".Contains(r.Name)` is neither form; it only folds.
            Folded::Scalar(_) => Err(not_foldable(node)),
        }
    }
}

/// Convenience wrapper around [`Normalizer::normalize`].
pub fn normalize(node: &RawNode) -> CompileResult<CanonicalNode> {
    Normalizer::new().normalize(node)
}

/// The folding error for a subtree that reads the record.
fn not_foldable(node: &RawNode) -> CompileError {
    eval::fold(node).err().unwrap_or_else(|| {
        CompileError::non_constant("subtree references the record parameter", node)
    })
}

fn strip_conversions(node: &RawNode) -> &RawNode {
    match node {
        RawNode::Convert { operand, .. } => strip_conversions(operand),
        _ => node,
    }
}

fn is_record_path(node: &RawNode) -> bool {
    match strip_conversions(node) {
        RawNode::Parameter => true,
        RawNode::Member { target, .. } => is_record_path(target),
        _ => false,
    }
}

/// Resolves `node` to a field reference when it is exactly one member hop
/// off the record parameter. Deeper member chains are rejected.
fn field_ref(node: &RawNode) -> CompileResult<Option<FieldRef>> {
    let RawNode::Member { target, name } = strip_conversions(node) else {
        return Ok(None);
    };
    match strip_conversions(target) {
        RawNode::Parameter => Ok(Some(FieldRef::new(name.clone()))),
        inner if is_record_path(inner) => Err(CompileError::unsupported(
            "sub-document queries unsupported",
            node,
        )),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::*;
    use crate::literal::ValueType;
    use crate::raw::StatementKind;

    fn norm(node: RawNode) -> CanonicalNode {
        normalize(&node).unwrap()
    }

    #[test]
    fn test_and_of_compares() {
        let p = field("Name").equals("a").and(field("Age").gt(10));
        assert_eq!(
            norm(p),
            CanonicalNode::and(
                CanonicalNode::compare("Name", CompareOp::Eq, "a"),
                CanonicalNode::compare("Age", CompareOp::Gt, 10),
            )
        );
    }

    #[test]
    fn test_field_on_right_is_swapped() {
        assert_eq!(
            norm(lit(10).lt(field("Age"))),
            CanonicalNode::compare("Age", CompareOp::Gt, 10)
        );
        assert_eq!(
            norm(lit(10).gte(field("Age"))),
            CanonicalNode::compare("Age", CompareOp::Lte, 10)
        );
    }

    #[test]
    fn test_null_compare_keeps_typed_null() {
        assert_eq!(
            norm(field("Age").equals(typed_null(ValueType::Integer))),
            CanonicalNode::compare("Age", CompareOp::Eq, Literal::Null(ValueType::Integer))
        );
    }

    #[test]
    fn test_membership_and_its_negation() {
        assert_eq!(
            norm(list(["a", "b"]).contains(field("Name"))),
            CanonicalNode::in_set("Name", vec!["a".into(), "b".into()], false)
        );
        assert_eq!(
            norm(!list(["a", "b"]).contains(field("Name"))),
            CanonicalNode::in_set("Name", vec!["a".into(), "b".into()], true)
        );
    }

    #[test]
    fn test_like_compared_with_false_matches_negation() {
        let expected = CanonicalNode::like("Name", "x", LikeMode::Contains, true);
        assert_eq!(norm(field("Name").contains("x").equals(false)), expected);
        assert_eq!(norm(!field("Name").contains("x")), expected);
        assert_eq!(norm(field("Name").contains("x").not_equals(true)), expected);
        assert_eq!(
            norm(lit(true).equals(field("Name").contains("x"))),
            expected.clone().negate()
        );
    }

    #[test]
    fn test_like_with_ignore_case_flag() {
        let node = norm(field("Name").like_ignore_case("starts_with", "Ab"));
        assert_eq!(
            node,
            CanonicalNode::Like {
                field: FieldRef::new("Name"),
                pattern: "Ab".to_string(),
                mode: LikeMode::StartsWith,
                ignore_case: true,
                negate: false,
            }
        );
    }

    #[test]
    fn test_empty_pattern_is_legal_but_null_is_not() {
        assert_eq!(
            norm(field("Name").ends_with("")),
            CanonicalNode::like("Name", "", LikeMode::EndsWith, false)
        );
        let err = normalize(&field("Name").ends_with(null())).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    }

    #[test]
    fn test_not_inverts_operators() {
        let p = !(field("Age").gt(10).or(field("Name").not_equals("a")));
        assert_eq!(
            norm(p),
            CanonicalNode::and(
                CanonicalNode::compare("Age", CompareOp::Lte, 10),
                CanonicalNode::compare("Name", CompareOp::Eq, "a"),
            )
        );
    }

    #[test]
    fn test_bare_bool_field_reads_as_true() {
        assert_eq!(
            norm(!field("Active").nullable()),
            CanonicalNode::compare("Active", CompareOp::Ne, true)
        );
        assert_eq!(
            norm(field("Active").and(field("Age").lte(3))),
            CanonicalNode::and(
                CanonicalNode::compare("Active", CompareOp::Eq, true),
                CanonicalNode::compare("Age", CompareOp::Lte, 3),
            )
        );
    }

    #[test]
    fn test_constants_fold_inside_comparisons() {
        let limit = captured("limit", Literal::Integer(5));
        assert_eq!(
            norm(field("Age").gt(limit * 2 + 1)),
            CanonicalNode::compare("Age", CompareOp::Gt, 11)
        );
        assert_eq!(
            norm(field("Kind").as_enum("Kind").equals(lit(2).as_enum("Kind"))),
            CanonicalNode::compare("Kind", CompareOp::Eq, 2)
        );
        assert_eq!(
            norm(field("Tier").equals(cond(lit(1).gt(0), "gold", "silver"))),
            CanonicalNode::compare("Tier", CompareOp::Eq, "gold")
        );
    }

    #[test]
    fn test_field_to_field_is_invalid_shape() {
        let err = normalize(&field("Age").gt(field("Height"))).unwrap_err();
        assert!(matches!(err, CompileError::InvalidComparisonShape { .. }));
        assert_eq!(err.subtree(), "r.Age > r.Height");
    }

    #[test]
    fn test_constant_to_constant_is_invalid_shape() {
        let err = normalize(&lit(1).equals(1)).unwrap_err();
        assert!(matches!(err, CompileError::InvalidComparisonShape { .. }));
        let err = normalize(&lit(true)).unwrap_err();
        assert!(matches!(err, CompileError::InvalidComparisonShape { .. }));
    }

    #[test]
    fn test_arbitrary_method_on_record_is_not_foldable() {
        let err = normalize(&field("Name").call("ToUpper", vec![]).equals("A")).unwrap_err();
        assert!(matches!(err, CompileError::NonConstantFoldable { .. }));
        let err = normalize(&field("Name").call("IsValid", vec![])).unwrap_err();
        assert!(matches!(err, CompileError::NonConstantFoldable { .. }));
    }

    #[test]
    fn test_sub_document_access_is_unsupported() {
        let err = normalize(&field("Address").member("City").equals("Oslo")).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
        assert_eq!(err.reason(), "sub-document queries unsupported");
    }

    #[test]
    fn test_conditional_sub_predicate_is_unsupported() {
        let p = cond(field("Active"), field("Age").gt(1), field("Age").lt(1));
        let err = normalize(&p).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    }

    #[test]
    fn test_statements_are_unsupported() {
        let p = field("Age").gt(1).and(statement(StatementKind::TryCatch));
        let err = normalize(&p).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    }

    #[test]
    fn test_contains_on_scalar_target_is_not_foldable() {
        let err = normalize(&lit("abc").contains(field("Name"))).unwrap_err();
        assert!(matches!(err, CompileError::NonConstantFoldable { .. }));
        assert_eq!(err.subtree(), r#""abc".Contains(r.Name)"#);

        let captured_target = captured("prefix", Literal::from("abc")).contains(field("Name"));
        let err = normalize(&captured_target).unwrap_err();
        assert!(matches!(err, CompileError::NonConstantFoldable { .. }));
    }

    #[test]
    fn test_excessive_nesting_is_unsupported() {
        let mut node = field("Active");
        for _ in 0..MAX_PREDICATE_DEPTH {
            node = not(node);
        }
        let err = normalize(&node).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));

        let mut shallow = field("Active");
        for _ in 0..10 {
            shallow = not(shallow);
        }
        assert_eq!(norm(shallow), norm(field("Active")));
    }

    #[test]
    fn test_collection_operand_is_unsupported() {
        let err = normalize(&field("Name").equals(list(["a"]))).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    }

    #[test]
    fn test_idempotent_on_canonical_input() {
        let canonical = norm(
            field("Name")
                .starts_with("x")
                .or(!list([Literal::from(1), Literal::null()]).contains(field("Age")))
                .and(field("Score").lte(2.5)),
        );
        assert_eq!(norm(canonical.to_raw()), canonical);
    }
}
