//! Constant evaluator.
//!
//! Folds a closed subtree (one that never reads the record parameter) into a
//! [`Folded`] value. The grammar is deliberately small: literals,
//! collections, arithmetic and concatenation, bitwise ops, comparisons and
//! logic between constants, ternaries, conversion wrappers, a handful of
//! string built-ins and captured values. Anything else is reported as
//! [`CompileError::NonConstantFoldable`].

use crate::error::{CompileError, CompileResult};
use crate::literal::{Folded, Literal, ValueType};
use crate::raw::{ArithOp, CompareOp, Conversion, LogicalOp, RawNode, StatementKind};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Folds `node` into a literal or a literal collection.
pub fn fold(node: &RawNode) -> CompileResult<Folded> {
    if let RawNode::Constant(lit) = node {
        return Ok(Folded::Scalar(lit.clone()));
    }
    if let Some(kind) = find_statement(node) {
        return Err(CompileError::unsupported(
            format!("{} is not allowed in a predicate", kind.name()),
            node,
        ));
    }
    if node.references_record() {
        return Err(CompileError::non_constant(
            "subtree references the record parameter",
            node,
        ));
    }

    let folded = match node {
        RawNode::Captured(captured) => captured
            .resolve()
            .map_err(|reason| CompileError::non_constant(reason, node))?,
        RawNode::Collection(items) => Folded::Collection(
            items
                .iter()
                .map(fold_scalar)
                .collect::<CompileResult<Vec<_>>>()?,
        ),
        _ => Folded::Scalar(eval_scalar(node)?),
    };
    tracing::trace!(subtree = %node, value = %folded, "folded constant");
    Ok(folded)
}

/// Folds `node` and requires a single literal.
pub fn fold_scalar(node: &RawNode) -> CompileResult<Literal> {
    match fold(node)? {
        Folded::Scalar(lit) => Ok(lit),
        Folded::Collection(_) => Err(CompileError::unsupported(
            "a collection cannot be used as a scalar value",
            node,
        )),
    }
}

fn find_statement(node: &RawNode) -> Option<StatementKind> {
    match node {
        RawNode::Other(kind) => Some(*kind),
        RawNode::Parameter | RawNode::Constant(_) | RawNode::Captured(_) => None,
        RawNode::Member { target, .. } => find_statement(target),
        RawNode::Collection(items) => items.iter().find_map(find_statement),
        RawNode::Compare { left, right, .. }
        | RawNode::Logical { left, right, .. }
        | RawNode::Arithmetic { left, right, .. } => {
            find_statement(left).or_else(|| find_statement(right))
        }
        RawNode::Not(inner) | RawNode::Negate(inner) => find_statement(inner),
        RawNode::Convert { operand, .. } => find_statement(operand),
        RawNode::MethodCall { target, args, .. } => {
            find_statement(target).or_else(|| args.iter().find_map(find_statement))
        }
        RawNode::Conditional {
            condition,
            then,
            otherwise,
        } => find_statement(condition)
            .or_else(|| find_statement(then))
            .or_else(|| find_statement(otherwise)),
    }
}

// `node` is known to be closed and statement-free here.
fn eval_scalar(node: &RawNode) -> CompileResult<Literal> {
    match node {
        RawNode::Constant(lit) => Ok(lit.clone()),
        RawNode::Captured(_) | RawNode::Collection(_) => fold_scalar(node),
        RawNode::Compare { op, left, right } => {
            let l = fold_scalar(left)?;
            let r = fold_scalar(right)?;
            compare(*op, &l, &r, node).map(Literal::Bool)
        }
        RawNode::Logical { op, left, right } => {
            let l = fold_bool(left)?;
            match (op, l) {
                (LogicalOp::And, false) => Ok(Literal::Bool(false)),
                (LogicalOp::Or, true) => Ok(Literal::Bool(true)),
                _ => fold_bool(right).map(Literal::Bool),
            }
        }
        RawNode::Not(inner) => match fold_scalar(inner)? {
            Literal::Bool(b) => Ok(Literal::Bool(!b)),
            Literal::Null(ValueType::Bool | ValueType::Any) => Ok(Literal::Null(ValueType::Bool)),
            other => Err(CompileError::non_constant(
                format!("operator ! not defined for {}", other.value_type()),
                node,
            )),
        },
        RawNode::Negate(inner) => match fold_scalar(inner)? {
            Literal::Integer(n) => n
                .checked_neg()
                .map(Literal::Integer)
                .ok_or_else(|| CompileError::non_constant("integer overflow", node)),
            Literal::Float(x) => Ok(Literal::Float(-x)),
            Literal::Null(ty) => Ok(Literal::Null(ty)),
            other => Err(CompileError::non_constant(
                format!("unary - not defined for {}", other.value_type()),
                node,
            )),
        },
        RawNode::Arithmetic { op, left, right } => {
            let l = fold_scalar(left)?;
            let r = fold_scalar(right)?;
            arithmetic(*op, l, r, node)
        }
        RawNode::Convert { operand, to } => convert(fold_scalar(operand)?, to, node),
        RawNode::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if fold_bool(condition)? {
                fold_scalar(then)
            } else {
                fold_scalar(otherwise)
            }
        }
        RawNode::MethodCall { target, name, args } => call(target, name, args, node),
        RawNode::Member { target, name } => member(fold(target)?, name, node),
        RawNode::Parameter | RawNode::Other(_) => Err(CompileError::non_constant(
            "not a constant expression",
            node,
        )),
    }
}

fn fold_bool(node: &RawNode) -> CompileResult<bool> {
    match fold_scalar(node)? {
        Literal::Bool(b) => Ok(b),
        other => Err(CompileError::non_constant(
            format!("expected a bool, found {}", other.value_type()),
            node,
        )),
    }
}

fn order(l: &Literal, r: &Literal) -> Option<Ordering> {
    match (l, r) {
        (Literal::Integer(a), Literal::Integer(b)) => Some(a.cmp(b)),
        (Literal::Integer(a), Literal::Float(b)) => (*a as f64).partial_cmp(b),
        (Literal::Float(a), Literal::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Literal::Float(a), Literal::Float(b)) => a.partial_cmp(b),
        (Literal::String(a), Literal::String(b)) => Some(a.cmp(b)),
        (Literal::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
        (Literal::DateTime(a), Literal::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Lifted comparison: null equals only null and orders against nothing.
fn compare(op: CompareOp, l: &Literal, r: &Literal, node: &RawNode) -> CompileResult<bool> {
    if l.is_null() || r.is_null() {
        let both = l.is_null() && r.is_null();
        return Ok(match op {
            CompareOp::Eq => both,
            CompareOp::Ne => !both,
            _ => false,
        });
    }
    let ordering = order(l, r).ok_or_else(|| {
        CompileError::non_constant(
            format!("cannot compare {} with {}", l.value_type(), r.value_type()),
            node,
        )
    })?;
    Ok(match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Lte => ordering != Ordering::Greater,
    })
}

fn plain_text(lit: &Literal) -> String {
    match lit {
        Literal::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn arithmetic(op: ArithOp, l: Literal, r: Literal, node: &RawNode) -> CompileResult<Literal> {
    let undefined = |l: &Literal, r: &Literal| {
        CompileError::non_constant(
            format!(
                "operator {} not defined for {} and {}",
                op.symbol(),
                l.value_type(),
                r.value_type()
            ),
            node,
        )
    };

    match (&l, &r) {
        (Literal::Null(a), Literal::Null(b)) => {
            let ty = if *a == ValueType::Any { *b } else { *a };
            return Ok(Literal::Null(ty));
        }
        (Literal::Null(_), other) | (other, Literal::Null(_)) => {
            return Ok(Literal::Null(other.value_type()));
        }
        _ => {}
    }

    match (&l, &r) {
        (Literal::String(_), _) | (_, Literal::String(_)) if op == ArithOp::Add => {
            Ok(Literal::String(plain_text(&l) + &plain_text(&r)))
        }
        (Literal::Integer(a), Literal::Integer(b)) => integer_op(op, *a, *b, node),
        (Literal::Integer(_) | Literal::Float(_), Literal::Integer(_) | Literal::Float(_)) => {
            let a = as_f64(&l);
            let b = as_f64(&r);
            match op {
                ArithOp::Add => Ok(Literal::Float(a + b)),
                ArithOp::Sub => Ok(Literal::Float(a - b)),
                ArithOp::Mul => Ok(Literal::Float(a * b)),
                ArithOp::Div => Ok(Literal::Float(a / b)),
                ArithOp::Rem => Ok(Literal::Float(a % b)),
                _ => Err(undefined(&l, &r)),
            }
        }
        (Literal::Bool(a), Literal::Bool(b)) => match op {
            ArithOp::BitAnd => Ok(Literal::Bool(*a & *b)),
            ArithOp::BitOr => Ok(Literal::Bool(*a | *b)),
            ArithOp::BitXor => Ok(Literal::Bool(*a ^ *b)),
            _ => Err(undefined(&l, &r)),
        },
        _ => Err(undefined(&l, &r)),
    }
}

fn as_f64(lit: &Literal) -> f64 {
    match lit {
        Literal::Integer(n) => *n as f64,
        Literal::Float(x) => *x,
        _ => f64::NAN,
    }
}

fn integer_op(op: ArithOp, a: i64, b: i64, node: &RawNode) -> CompileResult<Literal> {
    let overflow = || CompileError::non_constant("integer overflow", node);
    let value = match op {
        ArithOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        ArithOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        ArithOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        ArithOp::Div | ArithOp::Rem if b == 0 => {
            return Err(CompileError::non_constant("division by zero", node));
        }
        ArithOp::Div => a.checked_div(b).ok_or_else(overflow)?,
        ArithOp::Rem => a.checked_rem(b).ok_or_else(overflow)?,
        ArithOp::BitAnd => a & b,
        ArithOp::BitOr => a | b,
        ArithOp::BitXor => a ^ b,
        ArithOp::Shl | ArithOp::Shr => {
            let shift = u32::try_from(b)
                .ok()
                .filter(|s| *s < 64)
                .ok_or_else(|| CompileError::non_constant("shift amount out of range", node))?;
            if op == ArithOp::Shl {
                a << shift
            } else {
                a >> shift
            }
        }
    };
    Ok(Literal::Integer(value))
}

fn convert(value: Literal, to: &Conversion, node: &RawNode) -> CompileResult<Literal> {
    let invalid = |value: &Literal, target: &str| {
        CompileError::non_constant(
            format!("cannot convert {} to {target}", value.value_type()),
            node,
        )
    };

    match to {
        Conversion::Nullable => Ok(value),
        Conversion::Enum(name) => match value {
            Literal::Integer(_) | Literal::String(_) | Literal::Null(_) => Ok(value),
            other => Err(invalid(&other, name)),
        },
        Conversion::Cast(ty) => match (value, ty) {
            (Literal::Null(_), ty) => Ok(Literal::Null(*ty)),
            (value, ValueType::Any) => Ok(value),
            (Literal::Integer(n), ValueType::Float) => Ok(Literal::Float(n as f64)),
            (Literal::Float(x), ValueType::Integer) => {
                if x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
                    Ok(Literal::Integer(x.trunc() as i64))
                } else {
                    Err(CompileError::non_constant("integer overflow", node))
                }
            }
            (Literal::String(s), ValueType::DateTime) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Literal::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| CompileError::non_constant(format!("invalid datetime: {e}"), node)),
            (value, ty) if value.value_type() == *ty => Ok(value),
            (value, ty) => Err(invalid(&value, ty.name())),
        },
    }
}

fn call(target: &RawNode, name: &str, args: &[RawNode], node: &RawNode) -> CompileResult<Literal> {
    let target = fold(target)?;
    let args = args
        .iter()
        .map(fold_scalar)
        .collect::<CompileResult<Vec<_>>>()?;
    let unknown = || CompileError::non_constant(format!("unknown method `{name}`"), node);

    match target {
        Folded::Collection(items) => match (name, args.as_slice()) {
            ("Contains" | "contains", [needle]) => {
                let mut found = false;
                for item in &items {
                    if compare(CompareOp::Eq, item, needle, node)? {
                        found = true;
                        break;
                    }
                }
                Ok(Literal::Bool(found))
            }
            _ => Err(unknown()),
        },
        Folded::Scalar(Literal::Null(_)) => Err(CompileError::non_constant(
            format!("method `{name}` called on null"),
            node,
        )),
        Folded::Scalar(Literal::String(s)) => match (name, args.as_slice()) {
            ("Contains" | "contains", [Literal::String(p)]) => Ok(Literal::Bool(s.contains(p.as_str()))),
            ("StartsWith" | "starts_with", [Literal::String(p)]) => {
                Ok(Literal::Bool(s.starts_with(p.as_str())))
            }
            ("EndsWith" | "ends_with", [Literal::String(p)]) => {
                Ok(Literal::Bool(s.ends_with(p.as_str())))
            }
            ("ToUpper" | "to_upper" | "to_uppercase", []) => Ok(Literal::String(s.to_uppercase())),
            ("ToLower" | "to_lower" | "to_lowercase", []) => Ok(Literal::String(s.to_lowercase())),
            ("Trim" | "trim", []) => Ok(Literal::String(s.trim().to_string())),
            _ => Err(unknown()),
        },
        Folded::Scalar(_) => Err(unknown()),
    }
}

fn member(target: Folded, name: &str, node: &RawNode) -> CompileResult<Literal> {
    let length = match (&target, name) {
        (Folded::Scalar(Literal::String(s)), "Length" | "len") => s.chars().count(),
        (Folded::Collection(items), "Length" | "Count" | "len") => items.len(),
        _ => {
            return Err(CompileError::non_constant(
                format!("unknown member `{name}`"),
                node,
            ));
        }
    };
    i64::try_from(length)
        .map(Literal::Integer)
        .map_err(|_| CompileError::non_constant("length out of range", node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::*;

    fn scalar(node: RawNode) -> Literal {
        fold_scalar(&node).unwrap()
    }

    #[test]
    fn test_arithmetic_and_concatenation() {
        assert_eq!(scalar((lit(1) + 2) * 3), Literal::Integer(9));
        assert_eq!(scalar(lit(7) / 2), Literal::Integer(3));
        assert_eq!(scalar(lit(7) / 2.0), Literal::Float(3.5));
        assert_eq!(scalar(lit("a") + 1), Literal::String("a1".to_string()));
        assert_eq!(scalar(lit(6).bit_and(3)), Literal::Integer(2));
        assert_eq!(scalar(lit(1).shl(4)), Literal::Integer(16));
        assert_eq!(scalar(-lit(5)), Literal::Integer(-5));
    }

    #[test]
    fn test_null_propagates_with_type() {
        assert_eq!(
            scalar(typed_null(ValueType::Integer) + 1),
            Literal::Null(ValueType::Integer)
        );
        assert_eq!(
            scalar(null().cast(ValueType::String)),
            Literal::Null(ValueType::String)
        );
        assert_eq!(scalar(lit(3).nullable()), Literal::Integer(3));
    }

    #[test]
    fn test_overflow_and_division_by_zero_fail() {
        let err = fold(&(lit(i64::MAX) + 1)).unwrap_err();
        assert!(matches!(err, CompileError::NonConstantFoldable { .. }));
        let err = fold(&(lit(1) / 0)).unwrap_err();
        assert_eq!(err.reason(), "division by zero");
    }

    #[test]
    fn test_float_to_integer_cast_range() {
        assert_eq!(scalar(lit(-2.75).cast(ValueType::Integer)), Literal::Integer(-2));
        assert_eq!(
            scalar(lit(i64::MIN as f64).cast(ValueType::Integer)),
            Literal::Integer(i64::MIN)
        );
        // 2^63 is the first float past i64::MAX
        let err = fold(&lit(9_223_372_036_854_775_808.0).cast(ValueType::Integer)).unwrap_err();
        assert_eq!(err.reason(), "integer overflow");
        let err = fold(&lit(f64::NAN).cast(ValueType::Integer)).unwrap_err();
        assert_eq!(err.reason(), "integer overflow");
    }

    #[test]
    fn test_conditional_and_comparison() {
        assert_eq!(scalar(cond(lit(2).gt(1), "yes", "no")), Literal::from("yes"));
        assert_eq!(scalar(null().equals(null())), Literal::Bool(true));
        assert_eq!(scalar(lit(1).lt(null())), Literal::Bool(false));
        assert_eq!(scalar(lit(1).equals(1.0)), Literal::Bool(true));
    }

    #[test]
    fn test_collections_and_builtins() {
        assert_eq!(
            fold(&list(["a", "b"])).unwrap(),
            Folded::Collection(vec![Literal::from("a"), Literal::from("b")])
        );
        assert_eq!(scalar(list(["a", "b"]).contains("b")), Literal::Bool(true));
        assert_eq!(scalar(lit(" Ab ").call("Trim", vec![]).call("ToUpper", vec![])), Literal::from("AB"));
        assert_eq!(scalar(lit("héllo").member("Length")), Literal::Integer(5));
        assert_eq!(scalar(list([1, 2, 3]).member("Count")), Literal::Integer(3));
    }

    #[test]
    fn test_captured_values() {
        assert_eq!(scalar(captured("limit", Literal::Integer(4)) * 2), Literal::Integer(8));
        let err = fold(&captured_fn("broken", || Err("db offline".to_string()))).unwrap_err();
        assert!(matches!(err, CompileError::NonConstantFoldable { .. }));
        assert_eq!(err.reason(), "db offline");
        assert_eq!(err.subtree(), "$broken");
    }

    #[test]
    fn test_record_reference_is_not_foldable() {
        let node = field("Name").call("ToUpper", vec![]);
        let err = fold(&node).unwrap_err();
        assert!(matches!(err, CompileError::NonConstantFoldable { .. }));
        assert_eq!(err.subtree(), "r.Name.ToUpper()");
    }

    #[test]
    fn test_statements_are_unsupported() {
        let err = fold(&(lit(1) + statement(StatementKind::Loop))).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConstruct { .. }));
    }

    #[test]
    fn test_unknown_method_is_not_foldable() {
        let err = fold(&lit("x").call("Frobnicate", vec![])).unwrap_err();
        assert!(matches!(err, CompileError::NonConstantFoldable { .. }));
    }
}
