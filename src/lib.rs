// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # kgstore
//!
//! A minimal knowledge graph of `(subject, predicate, object)` triples,
//! persisted as one file per graph and safe to share between concurrent
//! readers and writers in one process.
//!
//! ## Architecture
//!
//! - **Graph store** (`graph::index`): nodes plus mirrored outgoing/incoming adjacency maps behind one `RwLock`
//! - **Triple queries** (`graph::query`): label lookups, wildcard search, entity description
//! - **Codec** (`store::codec`): bincode or JSON encoding of the whole graph
//! - **File transactions** (`store::file`): per-path locked read, write and read-modify-write
//! - **Engine** (`engine`): stateless per-call operations on graph files
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//! use kgstore::engine::{Engine, EngineConfig};
//!
//! let engine = Engine::new(EngineConfig::default());
//! let path = Path::new("knowledge_graph.kg");
//! engine.insert(path, "Paris", "is_capital_of", "France", false).unwrap();
//! let found = engine.find(path, "PARIS", "", "", false).unwrap();
//! assert_eq!(found[0].subject, "Paris");
//! ```

pub mod engine;
pub mod error;
pub mod graph;
pub mod store;
