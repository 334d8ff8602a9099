//! Search-engine renderer producing Elasticsearch query DSL.
//!
//! AND becomes `bool.filter`, OR becomes `bool.should` with
//! `minimum_should_match: 1`, and negations become `bool.must_not`. The
//! optional [`flatten`] pass merges nested boolean nodes of the same kind.

use super::FilterBuilder;
use crate::canonical::LikeMode;
use crate::error::{CompileError, CompileResult};
use crate::literal::{FieldRef, Literal};
use crate::raw::CompareOp;
use crate::schema::RecordSchema;
use chrono::SecondsFormat;
use serde_json::{json, Map, Number, Value};

#[derive(Debug, Clone, Copy)]
pub struct SearchFilterBuilder<'a> {
    schema: RecordSchema<'a>,
    flatten: bool,
}

impl<'a> SearchFilterBuilder<'a> {
    /// Creates a builder with flattening enabled.
    pub fn new(schema: RecordSchema<'a>) -> Self {
        Self {
            schema,
            flatten: true,
        }
    }

    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
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
            Literal::DateTime(dt) => Ok(Value::String(
                dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
        }
    }
}

fn must_not(query: Value) -> Value {
    json!({ "bool": { "must_not": [query] } })
}

/// Escapes the wildcard metacharacters `*`, `?` and `\`.
fn escape_wildcard(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl FilterBuilder for SearchFilterBuilder<'_> {
    type Filter = Value;

    fn backend_name(&self) -> &'static str {
        "search engine"
    }

    fn storage_name(&self, field: &FieldRef) -> CompileResult<String> {
        self.schema.storage_name(field)
    }

    fn always(&self, value: bool) -> Value {
        if value {
            json!({ "match_all": {} })
        } else {
            json!({ "match_none": {} })
        }
    }

    fn exists(&self, field: &str, present: bool) -> Value {
        let exists = json!({ "exists": { "field": field } });
        if present {
            exists
        } else {
            must_not(exists)
        }
    }

    fn compare(&self, field: &str, op: CompareOp, value: &Literal) -> CompileResult<Value> {
        let value = self.value(value)?;
        let bound = match op {
            CompareOp::Eq => return Ok(json!({ "term": { field: value } })),
            CompareOp::Ne => return Ok(must_not(json!({ "term": { field: value } }))),
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        };
        Ok(json!({ "range": { field: { bound: value } } }))
    }

    fn in_set(&self, field: &str, values: &[Literal], negate: bool) -> CompileResult<Value> {
        let values = values
            .iter()
            .map(|v| self.value(v))
            .collect::<CompileResult<Vec<_>>>()?;
        let terms = json!({ "terms": { field: values } });
        Ok(if negate { must_not(terms) } else { terms })
    }

    fn pattern(
        &self,
        field: &str,
        pattern: &str,
        mode: LikeMode,
        ignore_case: bool,
        negate: bool,
    ) -> CompileResult<Value> {
        let query = match mode {
            LikeMode::StartsWith => json!({
                "prefix": { field: { "value": pattern, "case_insensitive": ignore_case } }
            }),
            LikeMode::EndsWith | LikeMode::Contains => {
                let escaped = escape_wildcard(pattern);
                let value = if mode == LikeMode::EndsWith {
                    format!("*{escaped}")
                } else {
                    format!("*{escaped}*")
                };
                json!({
                    "wildcard": { field: { "value": value, "case_insensitive": ignore_case } }
                })
            }
        };
        Ok(if negate { must_not(query) } else { query })
    }

    fn and(&self, left: Value, right: Value) -> Value {
        json!({ "bool": { "filter": [left, right] } })
    }

    fn or(&self, left: Value, right: Value) -> Value {
        json!({ "bool": { "should": [left, right], "minimum_should_match": 1 } })
    }

    fn finish(&self, filter: Value) -> Value {
        if self.flatten {
            flatten(filter)
        } else {
            filter
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BoolKind {
    /// `{"bool": {"filter": [...]}}`
    All,
    /// `{"bool": {"should": [...], "minimum_should_match": 1}}`
    Any,
}

fn bool_kind(body: &Map<String, Value>) -> Option<BoolKind> {
    match body.len() {
        1 if body.get("filter").is_some_and(Value::is_array) => Some(BoolKind::All),
        2 if body.get("minimum_should_match") == Some(&json!(1))
            && body.get("should").is_some_and(Value::is_array) =>
        {
            Some(BoolKind::Any)
        }
        _ => None,
    }
}

/// Children of a bool node that is purely an AND or purely an OR.
fn bool_children(query: &Value) -> Option<(BoolKind, &Vec<Value>)> {
    let object = query.as_object()?;
    if object.len() != 1 {
        return None;
    }
    let body = object.get("bool")?.as_object()?;
    let kind = bool_kind(body)?;
    let clause = match kind {
        BoolKind::All => "filter",
        BoolKind::Any => "should",
    };
    body.get(clause)?.as_array().map(|children| (kind, children))
}

/// Merges nested AND-into-AND and OR-into-OR bool nodes and unwraps
/// single-child ones. Matching semantics are unchanged.
pub fn flatten(query: Value) -> Value {
    let Value::Object(mut object) = query else {
        return query;
    };
    let Some(Value::Object(mut body)) = object.remove("bool") else {
        return Value::Object(object);
    };

    let kind = bool_kind(&body);
    for clause in ["filter", "should", "must", "must_not"] {
        let Some(Value::Array(children)) = body.remove(clause) else {
            continue;
        };
        let mut merged = Vec::with_capacity(children.len());
        for child in children.into_iter().map(flatten) {
            let splice_kind = match clause {
                "filter" => Some(BoolKind::All),
                "should" if kind == Some(BoolKind::Any) => Some(BoolKind::Any),
                _ => None,
            };
            match (splice_kind, bool_children(&child)) {
                (Some(expected), Some((found, grandchildren))) if expected == found => {
                    merged.extend(grandchildren.iter().cloned());
                }
                _ => merged.push(child),
            }
        }
        body.insert(clause.to_string(), Value::Array(merged));
    }

    object.insert("bool".to_string(), Value::Object(body));
    let query = Value::Object(object);
    match bool_children(&query) {
        Some((_, children)) if children.len() == 1 => children[0].clone(),
        _ => query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CanonicalNode;
    use crate::schema::IdentityResolver;

    fn build(node: &CanonicalNode, flatten: bool) -> Value {
        let schema = RecordSchema::new(&IdentityResolver, "Person");
        SearchFilterBuilder::new(schema)
            .with_flatten(flatten)
            .build(node)
            .unwrap()
    }

    #[test]
    fn test_compare_renderings() {
        assert_eq!(
            build(&CanonicalNode::compare("Age", CompareOp::Eq, Literal::null()), true),
            json!({ "bool": { "must_not": [{ "exists": { "field": "Age" } }] } })
        );
        assert_eq!(
            build(&CanonicalNode::compare("Age", CompareOp::Gt, 10), true),
            json!({ "range": { "Age": { "gt": 10 } } })
        );
        assert_eq!(
            build(&CanonicalNode::compare("Age", CompareOp::Lte, 10), true),
            json!({ "bool": { "filter": [
                { "exists": { "field": "Age" } },
                { "range": { "Age": { "lte": 10 } } }
            ] } })
        );
    }

    #[test]
    fn test_wildcard_escaping() {
        assert_eq!(escape_wildcard(r"a*b?c\d"), r"a\*b\?c\\d");
        assert_eq!(
            build(&CanonicalNode::like("Name", "a*", LikeMode::Contains, false), true),
            json!({ "wildcard": { "Name": { "value": "*a\\**", "case_insensitive": false } } })
        );
        assert_eq!(
            build(&CanonicalNode::like("Name", "ab", LikeMode::StartsWith, false), true),
            json!({ "prefix": { "Name": { "value": "ab", "case_insensitive": false } } })
        );
    }

    #[test]
    fn test_flatten_merges_nested_and() {
        let node = CanonicalNode::and(
            CanonicalNode::and(
                CanonicalNode::compare("A", CompareOp::Eq, 1),
                CanonicalNode::compare("B", CompareOp::Eq, 2),
            ),
            CanonicalNode::compare("C", CompareOp::Eq, 3),
        );
        assert_eq!(
            build(&node, true),
            json!({ "bool": { "filter": [
                { "term": { "A": 1 } },
                { "term": { "B": 2 } },
                { "term": { "C": 3 } }
            ] } })
        );
        assert_eq!(
            build(&node, false),
            json!({ "bool": { "filter": [
                { "bool": { "filter": [{ "term": { "A": 1 } }, { "term": { "B": 2 } }] } },
                { "term": { "C": 3 } }
            ] } })
        );
    }

    #[test]
    fn test_flatten_keeps_or_inside_and() {
        let node = CanonicalNode::and(
            CanonicalNode::or(
                CanonicalNode::compare("A", CompareOp::Eq, 1),
                CanonicalNode::or(
                    CanonicalNode::compare("B", CompareOp::Eq, 2),
                    CanonicalNode::compare("C", CompareOp::Eq, 3),
                ),
            ),
            CanonicalNode::compare("D", CompareOp::Eq, 4),
        );
        assert_eq!(
            build(&node, true),
            json!({ "bool": { "filter": [
                { "bool": { "should": [
                    { "term": { "A": 1 } },
                    { "term": { "B": 2 } },
                    { "term": { "C": 3 } }
                ], "minimum_should_match": 1 } },
                { "term": { "D": 4 } }
            ] } })
        );
    }

    #[test]
    fn test_flatten_unwraps_single_child() {
        let query = json!({ "bool": { "filter": [{ "term": { "A": 1 } }] } });
        assert_eq!(flatten(query), json!({ "term": { "A": 1 } }));
        let negated = json!({ "bool": { "must_not": [{ "term": { "A": 1 } }] } });
        assert_eq!(flatten(negated.clone()), negated);
    }
}
