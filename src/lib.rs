//! Imports graph fragments into an embedded SQLite property graph, resolving
//! relationships whose endpoints arrive in later fragments.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod bench_utils;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fragment;
pub mod identity;
pub mod materializer;
pub mod pending;
pub mod registrar;
pub mod report;
pub mod resolver;
pub mod safety;
pub mod source;
pub mod store;
pub mod value;

pub use crate::config::{ConfigError, ConfigOverrides, ImportConfig};
pub use crate::engine::ImportEngine;
pub use crate::errors::GraphImportError;
pub use crate::fragment::{Graph, Node, Relationship, SchemaDeclaration};
pub use crate::identity::{Index, Key};
pub use crate::materializer::{Materialized, NodePolicy};
pub use crate::report::{Counters, FragmentReport, ImportStatistics, write_unresolved_keys};
pub use crate::resolver::ResolveOutcome;
pub use crate::store::{GraphStore, NodeHandle, RelationshipHandle, SqliteStore, StoreConfig};
pub use crate::value::{Properties, PropertyValue, Scalar};
