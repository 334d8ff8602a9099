//! Field resolution: record property names → storage field names.

use crate::error::{CompileError, CompileResult};
use crate::literal::FieldRef;

/// Maps `(record type, property)` to the name the store uses.
///
/// Implementations are read-only during compilation and shared across
/// threads.
pub trait FieldResolver: Send + Sync {
    fn resolve(&self, record_type: &str, property: &str) -> Option<String>;
}

impl<F> FieldResolver for F
where
    F: Fn(&str, &str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, record_type: &str, property: &str) -> Option<String> {
        self(record_type, property)
    }
}

/// Uses property names as storage names unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl FieldResolver for IdentityResolver {
    fn resolve(&self, _record_type: &str, property: &str) -> Option<String> {
        Some(property.to_string())
    }
}

/// A resolver bound to one record type, as used by the filter builders.
#[derive(Clone, Copy)]
pub struct RecordSchema<'a> {
    resolver: &'a dyn FieldResolver,
    record_type: &'a str,
}

impl<'a> RecordSchema<'a> {
    pub fn new(resolver: &'a dyn FieldResolver, record_type: &'a str) -> Self {
        Self {
            resolver,
            record_type,
        }
    }

    pub fn storage_name(&self, field: &FieldRef) -> CompileResult<String> {
        self.resolver
            .resolve(self.record_type, field.name())
            .ok_or_else(|| CompileError::unresolved_field(self.record_type, field.name()))
    }
}

impl std::fmt::Debug for RecordSchema<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSchema")
            .field("record_type", &self.record_type)
            .finish_non_exhaustive()
    }
}
