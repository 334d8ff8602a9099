//! The canonical, negation-free predicate shape consumed by every backend.

use crate::literal::{FieldRef, Literal};
use crate::raw::{CompareOp, LogicalOp, RawNode};
use std::fmt;

/// How a [`CanonicalNode::Like`] pattern is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeMode {
    Contains,
    StartsWith,
    EndsWith,
}

impl LikeMode {
    /// Accepts both `PascalCase` and `snake_case` method spellings.
    pub fn from_method_name(name: &str) -> Option<Self> {
        match name {
            "Contains" | "contains" => Some(LikeMode::Contains),
            "StartsWith" | "starts_with" => Some(LikeMode::StartsWith),
            "EndsWith" | "ends_with" => Some(LikeMode::EndsWith),
            _ => None,
        }
    }

    pub fn method_name(self) -> &'static str {
        match self {
            LikeMode::Contains => "Contains",
            LikeMode::StartsWith => "StartsWith",
            LikeMode::EndsWith => "EndsWith",
        }
    }
}

/// Restricted predicate AST.
///
/// Invariants:
/// - there is no `Not`; negation lives in inverted operators and `negate` flags
/// - every leaf has exactly one field operand and constant operand(s)
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalNode {
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: Literal,
    },
    In {
        field: FieldRef,
        values: Vec<Literal>,
        negate: bool,
    },
    Like {
        field: FieldRef,
        pattern: String,
        mode: LikeMode,
        ignore_case: bool,
        negate: bool,
    },
    And(Box<CanonicalNode>, Box<CanonicalNode>),
    Or(Box<CanonicalNode>, Box<CanonicalNode>),
}

impl CanonicalNode {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Literal>) -> Self {
        CanonicalNode::Compare {
            field: FieldRef::new(field),
            op,
            value: value.into(),
        }
    }

    pub fn in_set(field: impl Into<String>, values: Vec<Literal>, negate: bool) -> Self {
        CanonicalNode::In {
            field: FieldRef::new(field),
            values,
            negate,
        }
    }

    pub fn like(
        field: impl Into<String>,
        pattern: impl Into<String>,
        mode: LikeMode,
        negate: bool,
    ) -> Self {
        CanonicalNode::Like {
            field: FieldRef::new(field),
            pattern: pattern.into(),
            mode,
            ignore_case: false,
            negate,
        }
    }

    pub fn and(left: CanonicalNode, right: CanonicalNode) -> Self {
        CanonicalNode::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: CanonicalNode, right: CanonicalNode) -> Self {
        CanonicalNode::Or(Box::new(left), Box::new(right))
    }

    /// Logical complement, pushed down to the leaves (De Morgan).
    pub fn negate(self) -> Self {
        match self {
            CanonicalNode::And(l, r) => CanonicalNode::or(l.negate(), r.negate()),
            CanonicalNode::Or(l, r) => CanonicalNode::and(l.negate(), r.negate()),
            CanonicalNode::Compare { field, op, value } => CanonicalNode::Compare {
                field,
                op: op.inverse(),
                value,
            },
            CanonicalNode::In {
                field,
                values,
                negate,
            } => CanonicalNode::In {
                field,
                values,
                negate: !negate,
            },
            CanonicalNode::Like {
                field,
                pattern,
                mode,
                ignore_case,
                negate,
            } => CanonicalNode::Like {
                field,
                pattern,
                mode,
                ignore_case,
                negate: !negate,
            },
        }
    }

    /// Every field referenced by the predicate, in left-to-right order.
    pub fn fields(&self) -> Vec<&FieldRef> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a FieldRef>) {
        match self {
            CanonicalNode::Compare { field, .. }
            | CanonicalNode::In { field, .. }
            | CanonicalNode::Like { field, .. } => out.push(field),
            CanonicalNode::And(l, r) | CanonicalNode::Or(l, r) => {
                l.collect_fields(out);
                r.collect_fields(out);
            }
        }
    }

    /// Renders the canonical node back into an equivalent caller tree.
    /// Normalizing the result yields `self` again.
    pub fn to_raw(&self) -> RawNode {
        let field_node = |field: &FieldRef| RawNode::Member {
            target: Box::new(RawNode::Parameter),
            name: field.0.clone(),
        };
        let negated = |node: RawNode, negate: bool| {
            if negate {
                RawNode::Not(Box::new(node))
            } else {
                node
            }
        };

        match self {
            CanonicalNode::Compare { field, op, value } => RawNode::Compare {
                op: *op,
                left: Box::new(field_node(field)),
                right: Box::new(RawNode::Constant(value.clone())),
            },
            CanonicalNode::In {
                field,
                values,
                negate,
            } => {
                let call = RawNode::MethodCall {
                    target: Box::new(RawNode::Collection(
                        values.iter().cloned().map(RawNode::Constant).collect(),
                    )),
                    name: "Contains".to_string(),
                    args: vec![field_node(field)],
                };
                negated(call, *negate)
            }
            CanonicalNode::Like {
                field,
                pattern,
                mode,
                ignore_case,
                negate,
            } => {
                let mut args = vec![RawNode::Constant(Literal::String(pattern.clone()))];
                if *ignore_case {
                    args.push(RawNode::Constant(Literal::Bool(true)));
                }
                let call = RawNode::MethodCall {
                    target: Box::new(field_node(field)),
                    name: mode.method_name().to_string(),
                    args,
                };
                negated(call, *negate)
            }
            CanonicalNode::And(l, r) => RawNode::Logical {
                op: LogicalOp::And,
                left: Box::new(l.to_raw()),
                right: Box::new(r.to_raw()),
            },
            CanonicalNode::Or(l, r) => RawNode::Logical {
                op: LogicalOp::Or,
                left: Box::new(l.to_raw()),
                right: Box::new(r.to_raw()),
            },
        }
    }
}

impl fmt::Display for CanonicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalNode::Compare { field, op, value } => {
                write!(f, "Compare({field}, {op:?}, {value})")
            }
            CanonicalNode::In {
                field,
                values,
                negate,
            } => {
                write!(f, "In({field}, [")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "], negate={negate})")
            }
            CanonicalNode::Like {
                field,
                pattern,
                mode,
                ignore_case,
                negate,
            } => write!(
                f,
                "Like({field}, {pattern:?}, {mode:?}, ignore_case={ignore_case}, negate={negate})"
            ),
            CanonicalNode::And(l, r) => write!(f, "And({l}, {r})"),
            CanonicalNode::Or(l, r) => write!(f, "Or({l}, {r})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negate_pushes_through_and_or() {
        let node = CanonicalNode::and(
            CanonicalNode::compare("Age", CompareOp::Gt, 10),
            CanonicalNode::or(
                CanonicalNode::in_set("Name", vec!["a".into()], false),
                CanonicalNode::like("Name", "x", LikeMode::Contains, true),
            ),
        );
        let expected = CanonicalNode::or(
            CanonicalNode::compare("Age", CompareOp::Lte, 10),
            CanonicalNode::and(
                CanonicalNode::in_set("Name", vec!["a".into()], true),
                CanonicalNode::like("Name", "x", LikeMode::Contains, false),
            ),
        );
        assert_eq!(node.clone().negate(), expected);
        assert_eq!(node.clone().negate().negate(), node);
    }

    #[test]
    fn test_display() {
        let node = CanonicalNode::and(
            CanonicalNode::compare("Name", CompareOp::Eq, "a"),
            CanonicalNode::in_set("Age", vec![Literal::Integer(1), Literal::null()], true),
        );
        assert_eq!(
            node.to_string(),
            r#"And(Compare(Name, Eq, "a"), In(Age, [1, null], negate=true))"#
        );
    }

    #[test]
    fn test_to_raw_renders_negated_like() {
        let node = CanonicalNode::like("Name", "x", LikeMode::StartsWith, true);
        assert_eq!(node.to_raw().to_string(), r#"!r.Name.StartsWith("x")"#);
        assert_eq!(node.fields()[0].name(), "Name");
    }
}
