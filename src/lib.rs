//! Compiles record predicates into native filters for a document store, a
//! search engine and a relational database, with identical null and
//! negation semantics on every backend.
//!
//! ```text
//! text ──lexer/parser──┐
//!                      ├─> RawNode ─normalizer─> CanonicalNode ─FilterBuilder─> native filter
//! dsl  ────────────────┘
//! ```

pub mod backend;
pub mod canonical;
pub mod compiler;
pub mod config;
pub mod dsl;
pub mod error;
pub mod eval;
pub mod filter_set;
pub mod lexer;
pub mod literal;
pub mod normalizer;
pub mod parser;
pub mod raw;
pub mod schema;
pub mod token;

pub use backend::{DocumentFilterBuilder, FilterBuilder, SearchFilterBuilder, SqlFilterBuilder};
pub use canonical::{CanonicalNode, LikeMode};
pub use compiler::{CompiledFilters, FilterCompiler};
pub use config::{CompilerConfig, ConfigError, SchemaMapping};
pub use error::{CompileError, CompileResult};
pub use filter_set::QueryFilterSet;
pub use literal::{FieldRef, Literal, ValueType};
pub use normalizer::{normalize, Normalizer};
pub use parser::{parse_predicate, parse_predicates, ParseError};
pub use raw::{CompareOp, RawNode};
pub use schema::{FieldResolver, IdentityResolver, RecordSchema};
