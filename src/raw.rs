//! The caller-facing predicate tree.
//!
//! A [`RawNode`] tree is built once per Where-clause (through [`crate::dsl`]
//! or the text [`crate::parser`]) and never mutated. It is deliberately
//! wider than what can be compiled: the normalizer decides what is accepted.

use crate::literal::{Folded, Literal, ValueType};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Comparison operators, shared with the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,  // ==
    Ne,  // !=
    Gt,  // >
    Gte, // >=
    Lt,  // <
    Lte, // <=
}

impl CompareOp {
    /// Operator to use when the operands trade places (`5 < r.Age` is `r.Age > 5`).
    pub fn mirror(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::Ne => CompareOp::Ne,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
        }
    }

    /// Logical complement (`!(a > b)` is `a <= b`).
    pub fn inverse(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Gt => CompareOp::Lte,
            CompareOp::Gte => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Gte,
            CompareOp::Lte => CompareOp::Gt,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

/// Arithmetic, concatenation and bitwise operators of the constant grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
            ArithOp::BitAnd => "&",
            ArithOp::BitOr => "|",
            ArithOp::BitXor => "^",
            ArithOp::Shl => "<<",
            ArithOp::Shr => ">>",
        }
    }

    pub(crate) fn precedence(self) -> u8 {
        match self {
            ArithOp::BitOr => 4,
            ArithOp::BitXor => 5,
            ArithOp::BitAnd => 6,
            ArithOp::Shl | ArithOp::Shr => 9,
            ArithOp::Add | ArithOp::Sub => 10,
            ArithOp::Mul | ArithOp::Div | ArithOp::Rem => 11,
        }
    }
}

/// Value-preserving wrappers the host may put around operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    Nullable,
    Enum(String),
    Cast(ValueType),
}

/// Statement-level constructs that can never appear in a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Loop,
    TryCatch,
    Dynamic,
    Assignment,
    Switch,
    Goto,
    Label,
    Block,
}

impl StatementKind {
    pub fn name(self) -> &'static str {
        match self {
            StatementKind::Loop => "loop",
            StatementKind::TryCatch => "try/catch",
            StatementKind::Dynamic => "dynamic dispatch",
            StatementKind::Assignment => "assignment",
            StatementKind::Switch => "switch",
            StatementKind::Goto => "goto",
            StatementKind::Label => "label",
            StatementKind::Block => "block",
        }
    }
}

type CaptureFn = dyn Fn() -> Result<Folded, String> + Send + Sync;

#[derive(Clone)]
enum CapturedValue {
    Value(Folded),
    Thunk(Arc<CaptureFn>),
}

/// An opaque value injected by the embedding application: either an already
/// known constant or a closure producing one when the predicate is folded.
#[derive(Clone)]
pub struct Captured {
    name: String,
    value: CapturedValue,
}

impl Captured {
    pub fn value(name: impl Into<String>, value: impl Into<Folded>) -> Self {
        Self {
            name: name.into(),
            value: CapturedValue::Value(value.into()),
        }
    }

    pub fn thunk<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Result<Folded, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            value: CapturedValue::Thunk(Arc::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produces the captured value. A panicking closure is reported as an error.
    pub fn resolve(&self) -> Result<Folded, String> {
        match &self.value {
            CapturedValue::Value(folded) => Ok(folded.clone()),
            CapturedValue::Thunk(f) => match panic::catch_unwind(AssertUnwindSafe(|| f())) {
                Ok(result) => result,
                Err(payload) => Err(panic_message(payload.as_ref())),
            },
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("captured value panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("captured value panicked: {s}")
    } else {
        "captured value panicked".to_string()
    }
}

impl PartialEq for Captured {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        match (&self.value, &other.value) {
            (CapturedValue::Value(a), CapturedValue::Value(b)) => a == b,
            (CapturedValue::Thunk(a), CapturedValue::Thunk(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            CapturedValue::Value(v) => f
                .debug_struct("Captured")
                .field("name", &self.name)
                .field("value", v)
                .finish(),
            CapturedValue::Thunk(_) => f
                .debug_struct("Captured")
                .field("name", &self.name)
                .field("value", &"<closure>")
                .finish(),
        }
    }
}

/// Caller-supplied predicate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum RawNode {
    /// The record under test.
    Parameter,
    /// Property access; a field reference when `target` is the parameter.
    Member { target: Box<RawNode>, name: String },
    Constant(Literal),
    Captured(Captured),
    /// Array/set literal.
    Collection(Vec<RawNode>),
    Compare {
        op: CompareOp,
        left: Box<RawNode>,
        right: Box<RawNode>,
    },
    Logical {
        op: LogicalOp,
        left: Box<RawNode>,
        right: Box<RawNode>,
    },
    Not(Box<RawNode>),
    /// Unary minus.
    Negate(Box<RawNode>),
    Arithmetic {
        op: ArithOp,
        left: Box<RawNode>,
        right: Box<RawNode>,
    },
    Convert {
        operand: Box<RawNode>,
        to: Conversion,
    },
    MethodCall {
        target: Box<RawNode>,
        name: String,
        args: Vec<RawNode>,
    },
    Conditional {
        condition: Box<RawNode>,
        then: Box<RawNode>,
        otherwise: Box<RawNode>,
    },
    Other(StatementKind),
}

impl RawNode {
    /// Whether any part of this subtree reads the record parameter.
    pub fn references_record(&self) -> bool {
        match self {
            RawNode::Parameter => true,
            RawNode::Constant(_) | RawNode::Captured(_) | RawNode::Other(_) => false,
            RawNode::Member { target, .. } => target.references_record(),
            RawNode::Collection(items) => items.iter().any(RawNode::references_record),
            RawNode::Compare { left, right, .. }
            | RawNode::Logical { left, right, .. }
            | RawNode::Arithmetic { left, right, .. } => {
                left.references_record() || right.references_record()
            }
            RawNode::Not(inner) | RawNode::Negate(inner) => inner.references_record(),
            RawNode::Convert { operand, .. } => operand.references_record(),
            RawNode::MethodCall { target, args, .. } => {
                target.references_record() || args.iter().any(RawNode::references_record)
            }
            RawNode::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.references_record()
                    || then.references_record()
                    || otherwise.references_record()
            }
        }
    }

    /// Number of nodes on the longest root-to-leaf path. Walks with an
    /// explicit stack so arbitrarily deep trees can be measured.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending: Vec<(&RawNode, usize)> = vec![(self, 1)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            let next = level + 1;
            match node {
                RawNode::Parameter
                | RawNode::Constant(_)
                | RawNode::Captured(_)
                | RawNode::Other(_) => {}
                RawNode::Member { target, .. } => pending.push((&**target, next)),
                RawNode::Collection(items) => pending.extend(items.iter().map(|item| (item, next))),
                RawNode::Compare { left, right, .. }
                | RawNode::Logical { left, right, .. }
                | RawNode::Arithmetic { left, right, .. } => {
                    pending.push((&**left, next));
                    pending.push((&**right, next));
                }
                RawNode::Not(inner) | RawNode::Negate(inner) => pending.push((&**inner, next)),
                RawNode::Convert { operand, .. } => pending.push((&**operand, next)),
                RawNode::MethodCall { target, args, .. } => {
                    pending.push((&**target, next));
                    pending.extend(args.iter().map(|arg| (arg, next)));
                }
                RawNode::Conditional {
                    condition,
                    then,
                    otherwise,
                } => {
                    pending.push((&**condition, next));
                    pending.push((&**then, next));
                    pending.push((&**otherwise, next));
                }
            }
        }
        deepest
    }

    fn precedence(&self) -> u8 {
        match self {
            RawNode::Conditional { .. } => 1,
            RawNode::Logical { op: LogicalOp::Or, .. } => 2,
            RawNode::Logical { op: LogicalOp::And, .. } => 3,
            RawNode::Arithmetic { op, .. } => op.precedence(),
            RawNode::Compare {
                op: CompareOp::Eq | CompareOp::Ne,
                ..
            } => 7,
            RawNode::Compare { .. } => 8,
            RawNode::Not(_) | RawNode::Negate(_) => 12,
            _ => 13,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }

    fn fmt_binary(
        &self,
        f: &mut fmt::Formatter<'_>,
        left: &RawNode,
        symbol: &str,
        right: &RawNode,
    ) -> fmt::Result {
        let prec = self.precedence();
        left.fmt_child(f, prec)?;
        write!(f, " {symbol} ")?;
        right.fmt_child(f, prec + 1)
    }
}

// Rendered in the predicate text syntax; used to describe offending subtrees.
impl fmt::Display for RawNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawNode::Parameter => f.write_str("r"),
            RawNode::Member { target, name } => {
                target.fmt_child(f, 13)?;
                write!(f, ".{name}")
            }
            RawNode::Constant(lit) => write!(f, "{lit}"),
            RawNode::Captured(c) => write!(f, "${}", c.name()),
            RawNode::Collection(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            RawNode::Compare { op, left, right } => self.fmt_binary(f, left, op.symbol(), right),
            RawNode::Logical { op, left, right } => {
                let symbol = match op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                self.fmt_binary(f, left, symbol, right)
            }
            RawNode::Arithmetic { op, left, right } => {
                self.fmt_binary(f, left, op.symbol(), right)
            }
            RawNode::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_child(f, 12)
            }
            RawNode::Negate(inner) => {
                f.write_str("-")?;
                inner.fmt_child(f, 12)
            }
            RawNode::Convert { operand, to } => match to {
                Conversion::Nullable => write!(f, "nullable({operand})"),
                Conversion::Enum(name) => write!(f, "enum<{name}>({operand})"),
                Conversion::Cast(ty) => write!(f, "cast<{ty}>({operand})"),
            },
            RawNode::MethodCall { target, name, args } => {
                target.fmt_child(f, 13)?;
                write!(f, ".{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            RawNode::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.fmt_child(f, 2)?;
                f.write_str(" ? ")?;
                then.fmt_child(f, 2)?;
                f.write_str(" : ")?;
                otherwise.fmt_child(f, 1)
            }
            RawNode::Other(kind) => write!(f, "<{}>", kind.name()),
        }
    }
}
