//! Independently normalized where-clauses, AND-combined at build time.

use crate::backend::FilterBuilder;
use crate::canonical::CanonicalNode;
use crate::error::CompileResult;
use crate::normalizer::Normalizer;
use crate::raw::RawNode;

/// One canonical predicate per where-clause, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilterSet {
    clauses: Vec<CanonicalNode>,
}

impl QueryFilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes and appends a where-clause. On error the set is unchanged.
    pub fn push(&mut self, predicate: &RawNode) -> CompileResult<&mut Self> {
        let clause = Normalizer::new().normalize(predicate)?;
        self.clauses.push(clause);
        Ok(self)
    }

    pub fn from_predicates<'a, I>(predicates: I) -> CompileResult<Self>
    where
        I: IntoIterator<Item = &'a RawNode>,
    {
        let mut set = Self::new();
        for predicate in predicates {
            set.push(predicate)?;
        }
        Ok(set)
    }

    pub fn clauses(&self) -> &[CanonicalNode] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Builds every clause with `builder` and AND-combines the results.
    /// `None` when no clause was added; a single clause passes through.
    pub fn build<B: FilterBuilder>(&self, builder: &B) -> CompileResult<Option<B::Filter>> {
        let filters = self
            .clauses
            .iter()
            .map(|clause| builder.build(clause))
            .collect::<CompileResult<Vec<_>>>()?;
        tracing::debug!(
            backend = builder.backend_name(),
            clauses = filters.len(),
            "combining where-clauses"
        );
        Ok(builder.combine(filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DocumentFilterBuilder, SearchFilterBuilder};
    use crate::dsl::{field, list};
    use crate::error::CompileError;
    use crate::schema::{IdentityResolver, RecordSchema};
    use serde_json::json;

    #[test]
    fn test_empty_set_builds_nothing() {
        let set = QueryFilterSet::new();
        let schema = RecordSchema::new(&IdentityResolver, "Person");
        assert!(set.is_empty());
        assert_eq!(set.build(&DocumentFilterBuilder::new(schema)).unwrap(), None);
    }

    #[test]
    fn test_single_clause_passes_through() {
        let mut set = QueryFilterSet::new();
        set.push(&field("Age").gt(10)).unwrap();
        let schema = RecordSchema::new(&IdentityResolver, "Person");
        assert_eq!(
            set.build(&DocumentFilterBuilder::new(schema)).unwrap(),
            Some(json!({ "Age": { "$gt": 10 } }))
        );
    }

    #[test]
    fn test_clauses_are_and_combined() {
        let set = QueryFilterSet::from_predicates(&[
            field("Age").gt(10),
            list(["a", "b"]).contains(field("Name")),
            field("Score").gte(1.5),
        ])
        .unwrap();
        assert_eq!(set.len(), 3);

        let schema = RecordSchema::new(&IdentityResolver, "Person");
        assert_eq!(
            set.build(&DocumentFilterBuilder::new(schema)).unwrap(),
            Some(json!({ "$and": [
                { "$and": [{ "Age": { "$gt": 10 } }, { "Name": { "$in": ["a", "b"] } }] },
                { "Score": { "$gte": 1.5 } }
            ] }))
        );
        // flattening applies to the combined filter
        assert_eq!(
            set.build(&SearchFilterBuilder::new(schema)).unwrap(),
            Some(json!({ "bool": { "filter": [
                { "range": { "Age": { "gt": 10 } } },
                { "terms": { "Name": ["a", "b"] } },
                { "range": { "Score": { "gte": 1.5 } } }
            ] } }))
        );
    }

    #[test]
    fn test_failed_push_leaves_set_unchanged() {
        let mut set = QueryFilterSet::new();
        set.push(&field("Age").gt(10)).unwrap();
        let err = set.push(&field("Age").equals(field("Height"))).unwrap_err();
        assert!(matches!(err, CompileError::InvalidComparisonShape { .. }));
        assert_eq!(set.len(), 1);
    }
}
