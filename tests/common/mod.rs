//! Strategies shared by the property tests.

use filter_dispatcher::canonical::{CanonicalNode, LikeMode};
use filter_dispatcher::literal::{FieldRef, Literal};
use filter_dispatcher::raw::CompareOp;
use proptest::prelude::*;
use proptest::sample::select;

pub const FIELDS: [&str; 4] = ["Name", "Age", "Score", "Active"];

pub fn literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        Just(Literal::null()),
        (-3i64..4).prop_map(Literal::Integer),
        select(vec![-1.5, 0.0, 2.5]).prop_map(Literal::Float),
        any::<bool>().prop_map(Literal::Bool),
        "[aAbc.*]{0,2}".prop_map(Literal::String),
    ]
}

fn compare_op() -> impl Strategy<Value = CompareOp> {
    select(vec![
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Gt,
        CompareOp::Gte,
        CompareOp::Lt,
        CompareOp::Lte,
    ])
}

fn like_mode() -> impl Strategy<Value = LikeMode> {
    select(vec![LikeMode::Contains, LikeMode::StartsWith, LikeMode::EndsWith])
}

fn leaf() -> impl Strategy<Value = CanonicalNode> {
    let field = || select(FIELDS.to_vec());
    prop_oneof![
        (field(), compare_op(), literal())
            .prop_map(|(field, op, value)| CanonicalNode::compare(field, op, value)),
        (field(), prop::collection::vec(literal(), 0..4), any::<bool>())
            .prop_map(|(field, values, negate)| CanonicalNode::in_set(field, values, negate)),
        (field(), "[aAbc.*?%]{0,2}", like_mode(), any::<bool>(), any::<bool>()).prop_map(
            |(field, pattern, mode, ignore_case, negate)| CanonicalNode::Like {
                field: FieldRef::new(field),
                pattern,
                mode,
                ignore_case,
                negate,
            }
        ),
    ]
}

/// Arbitrary canonical predicates over [`FIELDS`].
pub fn canonical() -> impl Strategy<Value = CanonicalNode> {
    leaf().prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| CanonicalNode::and(l, r)),
            (inner.clone(), inner).prop_map(|(l, r)| CanonicalNode::or(l, r)),
        ]
    })
}
