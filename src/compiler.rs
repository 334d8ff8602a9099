//! Ties configuration, schema mapping and the three renderers together.

use crate::backend::{DocumentFilterBuilder, SearchFilterBuilder, SqlFilterBuilder};
use crate::canonical::CanonicalNode;
use crate::config::{CompilerConfig, ConfigError, SchemaMapping};
use crate::error::CompileResult;
use crate::filter_set::QueryFilterSet;
use crate::raw::RawNode;
use crate::schema::RecordSchema;
use serde_json::Value;

/// Every rendering of one set of where-clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilters {
    pub clauses: Vec<CanonicalNode>,
    pub document: Option<Value>,
    pub search: Option<Value>,
    /// Complete `SELECT` statement.
    pub sql: String,
}

#[derive(Debug, Clone)]
pub struct FilterCompiler {
    config: CompilerConfig,
    schema: SchemaMapping,
}

impl FilterCompiler {
    pub fn new(config: CompilerConfig, schema: SchemaMapping) -> Self {
        Self { config, schema }
    }

    /// Loads the schema mapping named by the configuration.
    pub fn from_config(config: CompilerConfig) -> Result<Self, ConfigError> {
        let schema = config.load_schema()?;
        Ok(Self::new(config, schema))
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn schema_mapping(&self) -> &SchemaMapping {
        &self.schema
    }

    fn record_schema(&self) -> RecordSchema<'_> {
        RecordSchema::new(&self.schema, &self.config.record_type)
    }

    pub fn document_builder(&self) -> DocumentFilterBuilder<'_> {
        DocumentFilterBuilder::new(self.record_schema())
    }

    pub fn search_builder(&self) -> SearchFilterBuilder<'_> {
        SearchFilterBuilder::new(self.record_schema()).with_flatten(self.config.flatten_search_filters)
    }

    pub fn sql_builder(&self) -> SqlFilterBuilder<'_> {
        SqlFilterBuilder::new(self.record_schema(), &self.config.sql_table)
    }

    /// Normalizes every predicate and renders the combined filter for each
    /// backend.
    pub fn compile(&self, predicates: &[RawNode]) -> CompileResult<CompiledFilters> {
        let set = QueryFilterSet::from_predicates(predicates)?;

        let document = set.build(&self.document_builder())?;
        let search = set.build(&self.search_builder())?;
        let sql_builder = self.sql_builder();
        let sql = sql_builder.to_sql(set.build(&sql_builder)?);

        Ok(CompiledFilters {
            clauses: set.clauses().to_vec(),
            document,
            search,
            sql,
        })
    }
}
