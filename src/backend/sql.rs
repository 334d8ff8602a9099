//! Relational renderer producing sea-query expressions.

use super::FilterBuilder;
use crate::canonical::LikeMode;
use crate::error::{CompileError, CompileResult};
use crate::literal::{FieldRef, Literal};
use crate::raw::CompareOp;
use crate::schema::RecordSchema;
use sea_query::{Asterisk, Expr, Func, Iden, LikeExpr, PostgresQueryBuilder, SelectStatement, SimpleExpr, Value};

/// Represents a table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Builds `WHERE` expressions for one table.
#[derive(Debug, Clone, Copy)]
pub struct SqlFilterBuilder<'a> {
    schema: RecordSchema<'a>,
    table: &'a str,
}

impl<'a> SqlFilterBuilder<'a> {
    pub fn new(schema: RecordSchema<'a>, table: &'a str) -> Self {
        Self { schema, table }
    }

    /// Renders `SELECT * FROM <table> [WHERE <filter>]` for PostgreSQL.
    pub fn to_sql(&self, filter: Option<SimpleExpr>) -> String {
        let mut select = SelectStatement::new();
        select.column(Asterisk).from(TableName(self.table.to_string()));
        if let Some(filter) = filter {
            select.and_where(filter);
        }
        select.to_string(PostgresQueryBuilder)
    }

    /// Convert a Literal to sea-query Value
    fn literal_to_value(&self, literal: &Literal) -> CompileResult<Value> {
        match literal {
            Literal::String(s) => Ok(Value::String(Some(Box::new(s.clone())))),
            Literal::Integer(n) => Ok(Value::BigInt(Some(*n))),
            Literal::Float(x) if x.is_finite() => Ok(Value::Double(Some(*x))),
            Literal::Bool(b) => Ok(Value::Bool(Some(*b))),
            Literal::DateTime(dt) => Ok(Value::ChronoDateTimeUtc(Some(Box::new(*dt)))),
            Literal::Float(_) | Literal::Null(_) => {
                Err(CompileError::backend_value(self.backend_name(), literal))
            }
        }
    }
}

fn column(field: &str) -> Expr {
    Expr::col(ColumnName(field.to_string()))
}

/// Escapes the LIKE metacharacters `%`, `_` and the escape character itself.
fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl FilterBuilder for SqlFilterBuilder<'_> {
    type Filter = SimpleExpr;

    fn backend_name(&self) -> &'static str {
        "relational"
    }

    fn storage_name(&self, field: &FieldRef) -> CompileResult<String> {
        self.schema.storage_name(field)
    }

    fn always(&self, value: bool) -> SimpleExpr {
        Expr::val(value).into()
    }

    fn exists(&self, field: &str, present: bool) -> SimpleExpr {
        if present {
            column(field).is_not_null()
        } else {
            column(field).is_null()
        }
    }

    fn compare(&self, field: &str, op: CompareOp, value: &Literal) -> CompileResult<SimpleExpr> {
        let col = column(field);
        let val = self.literal_to_value(value)?;

        let expr = match op {
            CompareOp::Eq => col.eq(val),
            CompareOp::Ne => col.ne(val),
            CompareOp::Gt => col.gt(val),
            CompareOp::Gte => col.gte(val),
            CompareOp::Lt => col.lt(val),
            CompareOp::Lte => col.lte(val),
        };
        Ok(expr)
    }

    fn in_set(&self, field: &str, values: &[Literal], negate: bool) -> CompileResult<SimpleExpr> {
        let in_values: Vec<Value> = values
            .iter()
            .map(|v| self.literal_to_value(v))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(if negate {
            column(field).is_not_in(in_values)
        } else {
            column(field).is_in(in_values)
        })
    }

    fn pattern(
        &self,
        field: &str,
        pattern: &str,
        mode: LikeMode,
        ignore_case: bool,
        negate: bool,
    ) -> CompileResult<SimpleExpr> {
        let escaped = escape_like(pattern);
        let escaped = if ignore_case { escaped.to_lowercase() } else { escaped };
        let like = match mode {
            LikeMode::Contains => format!("%{escaped}%"),
            LikeMode::StartsWith => format!("{escaped}%"),
            LikeMode::EndsWith => format!("%{escaped}"),
        };
        let like = LikeExpr::new(like).escape('\\');
        let target = if ignore_case {
            Expr::expr(Func::lower(column(field)))
        } else {
            column(field)
        };
        Ok(if negate {
            target.not_like(like)
        } else {
            target.like(like)
        })
    }

    fn and(&self, left: SimpleExpr, right: SimpleExpr) -> SimpleExpr {
        left.and(right)
    }

    fn or(&self, left: SimpleExpr, right: SimpleExpr) -> SimpleExpr {
        left.or(right)
    }
}
