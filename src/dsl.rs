//! Constructor functions for building [`RawNode`] predicates in code.
//!
//! ```ignore
//! use filter_dispatcher::dsl::*;
//!
//! // r => r.Name == "a" && r.Age > 10
//! let p = field("Name").equals("a").and(field("Age").gt(10));
//! // r => !["a", "b"].Contains(r.Name)
//! let q = !list(["a", "b"]).contains(field("Name"));
//! ```

use crate::literal::{Folded, Literal, ValueType};
use crate::raw::{ArithOp, Captured, CompareOp, Conversion, LogicalOp, RawNode, StatementKind};
use chrono::{DateTime, Utc};
use std::ops;

/// The record parameter itself.
pub fn param() -> RawNode {
    RawNode::Parameter
}

/// `r.<name>`
pub fn field(name: impl Into<String>) -> RawNode {
    RawNode::Member {
        target: Box::new(RawNode::Parameter),
        name: name.into(),
    }
}

pub fn lit(value: impl Into<Literal>) -> RawNode {
    RawNode::Constant(value.into())
}

pub fn null() -> RawNode {
    RawNode::Constant(Literal::null())
}

pub fn typed_null(ty: ValueType) -> RawNode {
    RawNode::Constant(Literal::Null(ty))
}

/// A collection literal of constants.
pub fn list<I, T>(items: I) -> RawNode
where
    I: IntoIterator<Item = T>,
    T: Into<Literal>,
{
    RawNode::Collection(items.into_iter().map(|item| lit(item)).collect())
}

/// A collection literal of arbitrary (foldable) expressions.
pub fn collection(items: impl IntoIterator<Item = RawNode>) -> RawNode {
    RawNode::Collection(items.into_iter().collect())
}

pub fn captured(name: impl Into<String>, value: impl Into<Folded>) -> RawNode {
    RawNode::Captured(Captured::value(name, value))
}

pub fn captured_fn<F>(name: impl Into<String>, f: F) -> RawNode
where
    F: Fn() -> Result<Folded, String> + Send + Sync + 'static,
{
    RawNode::Captured(Captured::thunk(name, f))
}

pub fn not(node: RawNode) -> RawNode {
    RawNode::Not(Box::new(node))
}

pub fn and(left: RawNode, right: RawNode) -> RawNode {
    logical(LogicalOp::And, left, right)
}

pub fn or(left: RawNode, right: RawNode) -> RawNode {
    logical(LogicalOp::Or, left, right)
}

/// Left-folds the predicates with AND; `None` when empty.
pub fn all(nodes: impl IntoIterator<Item = RawNode>) -> Option<RawNode> {
    nodes.into_iter().reduce(and)
}

/// Left-folds the predicates with OR; `None` when empty.
pub fn any(nodes: impl IntoIterator<Item = RawNode>) -> Option<RawNode> {
    nodes.into_iter().reduce(or)
}

pub fn cond(
    condition: impl Into<RawNode>,
    then: impl Into<RawNode>,
    otherwise: impl Into<RawNode>,
) -> RawNode {
    RawNode::Conditional {
        condition: Box::new(condition.into()),
        then: Box::new(then.into()),
        otherwise: Box::new(otherwise.into()),
    }
}

/// A statement construct; always rejected by the compiler.
pub fn statement(kind: StatementKind) -> RawNode {
    RawNode::Other(kind)
}

fn logical(op: LogicalOp, left: RawNode, right: RawNode) -> RawNode {
    RawNode::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

impl RawNode {
    fn compare(self, op: CompareOp, other: impl Into<RawNode>) -> RawNode {
        RawNode::Compare {
            op,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    fn arithmetic(self, op: ArithOp, other: impl Into<RawNode>) -> RawNode {
        RawNode::Arithmetic {
            op,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    pub fn equals(self, other: impl Into<RawNode>) -> RawNode {
        self.compare(CompareOp::Eq, other)
    }

    pub fn not_equals(self, other: impl Into<RawNode>) -> RawNode {
        self.compare(CompareOp::Ne, other)
    }

    pub fn gt(self, other: impl Into<RawNode>) -> RawNode {
        self.compare(CompareOp::Gt, other)
    }

    pub fn gte(self, other: impl Into<RawNode>) -> RawNode {
        self.compare(CompareOp::Gte, other)
    }

    pub fn lt(self, other: impl Into<RawNode>) -> RawNode {
        self.compare(CompareOp::Lt, other)
    }

    pub fn lte(self, other: impl Into<RawNode>) -> RawNode {
        self.compare(CompareOp::Lte, other)
    }

    pub fn and(self, other: RawNode) -> RawNode {
        and(self, other)
    }

    pub fn or(self, other: RawNode) -> RawNode {
        or(self, other)
    }

    pub fn bit_and(self, other: impl Into<RawNode>) -> RawNode {
        self.arithmetic(ArithOp::BitAnd, other)
    }

    pub fn bit_or(self, other: impl Into<RawNode>) -> RawNode {
        self.arithmetic(ArithOp::BitOr, other)
    }

    pub fn bit_xor(self, other: impl Into<RawNode>) -> RawNode {
        self.arithmetic(ArithOp::BitXor, other)
    }

    pub fn shl(self, other: impl Into<RawNode>) -> RawNode {
        self.arithmetic(ArithOp::Shl, other)
    }

    pub fn shr(self, other: impl Into<RawNode>) -> RawNode {
        self.arithmetic(ArithOp::Shr, other)
    }

    pub fn member(self, name: impl Into<String>) -> RawNode {
        RawNode::Member {
            target: Box::new(self),
            name: name.into(),
        }
    }

    pub fn call(self, name: impl Into<String>, args: Vec<RawNode>) -> RawNode {
        RawNode::MethodCall {
            target: Box::new(self),
            name: name.into(),
            args,
        }
    }

    /// `self.Contains(arg)`: a substring test on a string field, or a
    /// membership test when `self` is a collection and `arg` a field.
    pub fn contains(self, arg: impl Into<RawNode>) -> RawNode {
        self.call("Contains", vec![arg.into()])
    }

    pub fn starts_with(self, pattern: impl Into<RawNode>) -> RawNode {
        self.call("StartsWith", vec![pattern.into()])
    }

    pub fn ends_with(self, pattern: impl Into<RawNode>) -> RawNode {
        self.call("EndsWith", vec![pattern.into()])
    }

    /// Case-insensitive variant of `Contains`/`StartsWith`/`EndsWith`.
    pub fn like_ignore_case(self, method: &str, pattern: impl Into<RawNode>) -> RawNode {
        self.call(method, vec![pattern.into(), lit(true)])
    }

    pub fn nullable(self) -> RawNode {
        self.convert(Conversion::Nullable)
    }

    pub fn as_enum(self, name: impl Into<String>) -> RawNode {
        self.convert(Conversion::Enum(name.into()))
    }

    pub fn cast(self, ty: ValueType) -> RawNode {
        self.convert(Conversion::Cast(ty))
    }

    fn convert(self, to: Conversion) -> RawNode {
        RawNode::Convert {
            operand: Box::new(self),
            to,
        }
    }
}

impl ops::Not for RawNode {
    type Output = RawNode;

    fn not(self) -> RawNode {
        not(self)
    }
}

impl ops::Neg for RawNode {
    type Output = RawNode;

    fn neg(self) -> RawNode {
        RawNode::Negate(Box::new(self))
    }
}

macro_rules! arith_ops {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl<T: Into<RawNode>> ops::$trait<T> for RawNode {
                type Output = RawNode;

                fn $method(self, rhs: T) -> RawNode {
                    self.arithmetic(ArithOp::$op, rhs)
                }
            }
        )*
    };
}

arith_ops! {
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Rem::rem => Rem,
}

impl From<Literal> for RawNode {
    fn from(value: Literal) -> Self {
        RawNode::Constant(value)
    }
}

impl From<&str> for RawNode {
    fn from(value: &str) -> Self {
        lit(value)
    }
}

impl From<String> for RawNode {
    fn from(value: String) -> Self {
        lit(value)
    }
}

impl From<i64> for RawNode {
    fn from(value: i64) -> Self {
        lit(value)
    }
}

impl From<i32> for RawNode {
    fn from(value: i32) -> Self {
        lit(value)
    }
}

impl From<f64> for RawNode {
    fn from(value: f64) -> Self {
        lit(value)
    }
}

impl From<bool> for RawNode {
    fn from(value: bool) -> Self {
        lit(value)
    }
}

impl From<DateTime<Utc>> for RawNode {
    fn from(value: DateTime<Utc>) -> Self {
        lit(value)
    }
}
