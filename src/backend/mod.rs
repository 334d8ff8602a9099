//! Backend filter builders.
//!
//! The null/negation truth tables live in [`FilterBuilder::build`] and are
//! shared by every backend; a backend only supplies the handful of native
//! primitives they are expressed in. This keeps the semantics identical no
//! matter which store a predicate is rendered for.
//!
//! | op       | value = null | value ≠ null                          |
//! |----------|--------------|---------------------------------------|
//! | Eq       | absent       | equals                                |
//! | Ne       | present      | absent OR not-equals                  |
//! | Gt, Gte  | always-false | greater(-or-equal)                    |
//! | Lt, Lte  | always-false | present AND less(-or-equal)           |

pub mod document;
pub mod search;
pub mod sql;

use crate::canonical::{CanonicalNode, LikeMode};
use crate::error::CompileResult;
use crate::literal::{FieldRef, Literal};
use crate::raw::CompareOp;

pub use document::DocumentFilterBuilder;
pub use search::SearchFilterBuilder;
pub use sql::SqlFilterBuilder;

/// Renders canonical predicates into one store's native filter type.
pub trait FilterBuilder {
    type Filter: Clone + std::fmt::Debug;

    /// Short backend name used in error messages.
    fn backend_name(&self) -> &'static str;

    /// Resolves a record property to the store's field name.
    fn storage_name(&self, field: &FieldRef) -> CompileResult<String>;

    /// A filter matching every record (`true`) or none (`false`).
    fn always(&self, value: bool) -> Self::Filter;

    /// Field present (non-null) when `present`, absent or null otherwise.
    fn exists(&self, field: &str, present: bool) -> Self::Filter;

    /// Plain comparison against a non-null value.
    fn compare(&self, field: &str, op: CompareOp, value: &Literal) -> CompileResult<Self::Filter>;

    /// Plain (non-)membership in a non-empty set of non-null values.
    fn in_set(&self, field: &str, values: &[Literal], negate: bool) -> CompileResult<Self::Filter>;

    /// Plain (non-)match of a non-empty pattern.
    fn pattern(
        &self,
        field: &str,
        pattern: &str,
        mode: LikeMode,
        ignore_case: bool,
        negate: bool,
    ) -> CompileResult<Self::Filter>;

    fn and(&self, left: Self::Filter, right: Self::Filter) -> Self::Filter;

    fn or(&self, left: Self::Filter, right: Self::Filter) -> Self::Filter;

    /// Post-processing applied to a complete filter; identity by default.
    fn finish(&self, filter: Self::Filter) -> Self::Filter {
        filter
    }

    /// Renders a complete canonical predicate.
    fn build(&self, node: &CanonicalNode) -> CompileResult<Self::Filter> {
        let filter = self.render(node)?;
        tracing::debug!(backend = self.backend_name(), predicate = %node, "built native filter");
        Ok(self.finish(filter))
    }

    /// AND-combines independently built filters. A single filter passes
    /// through untouched; `None` when there is nothing to combine.
    fn combine(&self, filters: Vec<Self::Filter>) -> Option<Self::Filter> {
        if filters.len() <= 1 {
            return filters.into_iter().next();
        }
        filters
            .into_iter()
            .reduce(|acc, filter| self.and(acc, filter))
            .map(|combined| self.finish(combined))
    }

    /// Renders one node without the final post-processing pass.
    fn render(&self, node: &CanonicalNode) -> CompileResult<Self::Filter> {
        match node {
            CanonicalNode::And(l, r) => Ok(self.and(self.render(l)?, self.render(r)?)),
            CanonicalNode::Or(l, r) => Ok(self.or(self.render(l)?, self.render(r)?)),
            CanonicalNode::Compare { field, op, value } => {
                let field = self.storage_name(field)?;
                self.render_compare(&field, *op, value)
            }
            CanonicalNode::In {
                field,
                values,
                negate,
            } => {
                let field = self.storage_name(field)?;
                self.render_in(&field, values, *negate)
            }
            CanonicalNode::Like {
                field,
                pattern,
                mode,
                ignore_case,
                negate,
            } => {
                let field = self.storage_name(field)?;
                self.render_like(&field, pattern, *mode, *ignore_case, *negate)
            }
        }
    }

    fn render_compare(
        &self,
        field: &str,
        op: CompareOp,
        value: &Literal,
    ) -> CompileResult<Self::Filter> {
        if value.is_null() {
            return Ok(match op {
                CompareOp::Eq => self.exists(field, false),
                CompareOp::Ne => self.exists(field, true),
                CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
                    self.always(false)
                }
            });
        }

        let plain = self.compare(field, op, value)?;
        Ok(match op {
            CompareOp::Eq | CompareOp::Gt | CompareOp::Gte => plain,
            CompareOp::Ne => self.or(self.exists(field, false), plain),
            // Gt/Gte carry no presence guard.
            CompareOp::Lt | CompareOp::Lte => self.and(self.exists(field, true), plain),
        })
    }

    fn render_in(
        &self,
        field: &str,
        values: &[Literal],
        negate: bool,
    ) -> CompileResult<Self::Filter> {
        let has_null = values.iter().any(Literal::is_null);
        let non_null: Vec<Literal> = values.iter().filter(|v| !v.is_null()).cloned().collect();

        Ok(match (has_null, non_null.is_empty(), negate) {
            // empty
            (false, true, _) => self.always(negate),
            // null only
            (true, true, _) => self.exists(field, negate),
            // non-null only
            (false, false, false) => self.in_set(field, &non_null, false)?,
            (false, false, true) => {
                self.or(self.exists(field, false), self.in_set(field, &non_null, true)?)
            }
            // mixed
            (true, false, false) => {
                self.or(self.exists(field, false), self.in_set(field, &non_null, false)?)
            }
            (true, false, true) => {
                self.and(self.exists(field, true), self.in_set(field, &non_null, true)?)
            }
        })
    }

    fn render_like(
        &self,
        field: &str,
        pattern: &str,
        mode: LikeMode,
        ignore_case: bool,
        negate: bool,
    ) -> CompileResult<Self::Filter> {
        if pattern.is_empty() {
            return Ok(self.exists(field, !negate));
        }
        let matched = self.pattern(field, pattern, mode, ignore_case, negate)?;
        Ok(if negate {
            self.or(self.exists(field, false), matched)
        } else {
            matched
        })
    }
}
