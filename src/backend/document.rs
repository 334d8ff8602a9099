//! Document-store renderer producing MongoDB-style filter documents.

use super::FilterBuilder;
use crate::canonical::LikeMode;
use crate::error::{CompileError, CompileResult};
use crate::literal::{FieldRef, Literal};
use crate::raw::CompareOp;
use crate::schema::RecordSchema;
use chrono::SecondsFormat;
use serde_json::{json, Map, Number, Value};

/// Builds filter documents such as `{"age": {"$gt": 10}}`.
#[derive(Debug, Clone, Copy)]
pub struct DocumentFilterBuilder<'a> {
    schema: RecordSchema<'a>,
}

impl<'a> DocumentFilterBuilder<'a> {
    pub fn new(schema: RecordSchema<'a>) -> Self {
        Self { schema }
    }

    fn value(&self, literal: &Literal) -> CompileResult<Value> {
        match literal {
            Literal::Null(_) => Ok(Value::Null),
            Literal::String(s) => Ok(Value::String(s.clone())),
            Literal::Integer(n) => Ok(Value::from(*n)),
            Literal::Float(x) => Number::from_f64(*x)
                .map(Value::Number)
                .ok_or_else(|| CompileError::backend_value(self.backend_name(), literal)),
            Literal::Bool(b) => Ok(Value::Bool(*b)),
            // Extended JSON date.
            Literal::DateTime(dt) => {
                Ok(json!({ "$date": dt.to_rfc3339_opts(SecondsFormat::Millis, true) }))
            }
        }
    }
}

/// `{ <field>: <condition> }`
fn field_condition(field: &str, condition: Value) -> Value {
    let mut doc = Map::new();
    doc.insert(field.to_string(), condition);
    Value::Object(doc)
}

fn operator(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "$eq",
        CompareOp::Ne => "$ne",
        CompareOp::Gt => "$gt",
        CompareOp::Gte => "$gte",
        CompareOp::Lt => "$lt",
        CompareOp::Lte => "$lte",
    }
}

impl FilterBuilder for DocumentFilterBuilder<'_> {
    type Filter = Value;

    fn backend_name(&self) -> &'static str {
        "document store"
    }

    fn storage_name(&self, field: &FieldRef) -> CompileResult<String> {
        self.schema.storage_name(field)
    }

    fn always(&self, value: bool) -> Value {
        json!({ "$expr": value })
    }

    fn exists(&self, field: &str, present: bool) -> Value {
        let op = if present { "$ne" } else { "$eq" };
        field_condition(field, json!({ op: null }))
    }

    fn compare(&self, field: &str, op: CompareOp, value: &Literal) -> CompileResult<Value> {
        let value = self.value(value)?;
        Ok(field_condition(field, json!({ operator(op): value })))
    }

    fn in_set(&self, field: &str, values: &[Literal], negate: bool) -> CompileResult<Value> {
        let values = values
            .iter()
            .map(|v| self.value(v))
            .collect::<CompileResult<Vec<_>>>()?;
        let op = if negate { "$nin" } else { "$in" };
        Ok(field_condition(field, json!({ op: values })))
    }

    fn pattern(
        &self,
        field: &str,
        pattern: &str,
        mode: LikeMode,
        ignore_case: bool,
        negate: bool,
    ) -> CompileResult<Value> {
        let escaped = regex::escape(pattern);
        let regex = match mode {
            LikeMode::Contains => escaped,
            LikeMode::StartsWith => format!("^{escaped}"),
            LikeMode::EndsWith => format!("{escaped}$"),
        };
        let mut condition = json!({ "$regex": regex });
        if ignore_case {
            condition["$options"] = json!("i");
        }
        if negate {
            condition = json!({ "$not": condition });
        }
        Ok(field_condition(field, condition))
    }

    fn and(&self, left: Value, right: Value) -> Value {
        json!({ "$and": [left, right] })
    }

    fn or(&self, left: Value, right: Value) -> Value {
        json!({ "$or": [left, right] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CanonicalNode;
    use crate::schema::IdentityResolver;

    fn build(node: CanonicalNode) -> Value {
        let schema = RecordSchema::new(&IdentityResolver, "Person");
        DocumentFilterBuilder::new(schema).build(&node).unwrap()
    }

    #[test]
    fn test_compare_null_table() {
        let null = Literal::null();
        assert_eq!(
            build(CanonicalNode::compare("Age", CompareOp::Eq, null.clone())),
            json!({ "Age": { "$eq": null } })
        );
        assert_eq!(
            build(CanonicalNode::compare("Age", CompareOp::Ne, null.clone())),
            json!({ "Age": { "$ne": null } })
        );
        for op in [CompareOp::Gt, CompareOp::Gte, CompareOp::Lt, CompareOp::Lte] {
            assert_eq!(
                build(CanonicalNode::compare("Age", op, null.clone())),
                json!({ "$expr": false })
            );
        }
    }

    #[test]
    fn test_compare_value_table() {
        assert_eq!(
            build(CanonicalNode::compare("Age", CompareOp::Ne, 3)),
            json!({ "$or": [{ "Age": { "$eq": null } }, { "Age": { "$ne": 3 } }] })
        );
        assert_eq!(
            build(CanonicalNode::compare("Age", CompareOp::Gte, 3)),
            json!({ "Age": { "$gte": 3 } })
        );
        assert_eq!(
            build(CanonicalNode::compare("Age", CompareOp::Lt, 3)),
            json!({ "$and": [{ "Age": { "$ne": null } }, { "Age": { "$lt": 3 } }] })
        );
    }

    #[test]
    fn test_like_escapes_regex() {
        assert_eq!(
            build(CanonicalNode::like("Name", "a.b", LikeMode::StartsWith, false)),
            json!({ "Name": { "$regex": "^a\\.b" } })
        );
        let node = CanonicalNode::Like {
            field: FieldRef::new("Name"),
            pattern: "x".to_string(),
            mode: LikeMode::EndsWith,
            ignore_case: true,
            negate: true,
        };
        assert_eq!(
            build(node),
            json!({ "$or": [
                { "Name": { "$eq": null } },
                { "Name": { "$not": { "$regex": "x$", "$options": "i" } } }
            ] })
        );
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let schema = RecordSchema::new(&IdentityResolver, "Person");
        let node = CanonicalNode::compare("Score", CompareOp::Gt, f64::NAN);
        let err = DocumentFilterBuilder::new(schema).build(&node).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedBackendValue { .. }));
    }
}
