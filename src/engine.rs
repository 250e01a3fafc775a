//! Engine facade: the per-call operation surface over graph files.
//!
//! Every method is one self-contained transaction on the file it is given.
//! Queries run a shared-lock read, mutations a `modify` transaction. No graph
//! is cached between calls.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, KgError, KgResult};
use crate::graph::index::KnowledgeGraph;
use crate::graph::query::TripleQuery;
use crate::graph::{Triple, labels_match};
use crate::store::{CodecProfile, FileLockRegistry, GraphFiles};

/// Configuration for the kgstore engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wire format of graph files.
    pub codec: CodecProfile,
    /// Whether label matching distinguishes case when the caller does not say.
    pub case_sensitive: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            codec: CodecProfile::Binary,
            case_sensitive: false,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> KgResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::ConfigRead {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content).map_err(|message| {
            EngineError::ConfigParse {
                path: path.display().to_string(),
                message,
            }
            .into()
        })
    }

    /// Apply command-line overrides. `None` keeps the loaded value.
    pub fn with_overrides(
        mut self,
        codec: Option<CodecProfile>,
        case_sensitive: Option<bool>,
    ) -> Self {
        if let Some(codec) = codec {
            self.codec = codec;
        }
        if let Some(case_sensitive) = case_sensitive {
            self.case_sensitive = case_sensitive;
        }
        self
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

/// Triples mentioning one entity, split by the entity's role.
///
/// A self-referencing triple appears in both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityDescription {
    pub entity: String,
    pub as_subject: Vec<Triple>,
    pub as_object: Vec<Triple>,
}

impl EntityDescription {
    /// Partition `triples` by whether `entity` is their subject or object.
    pub fn from_triples(entity: &str, triples: Vec<Triple>, case_sensitive: bool) -> Self {
        let mut description = EntityDescription {
            entity: entity.to_string(),
            ..Default::default()
        };
        for triple in triples {
            let is_object = labels_match(&triple.object, entity, case_sensitive);
            if labels_match(&triple.subject, entity, case_sensitive) {
                if is_object {
                    description.as_object.push(triple.clone());
                }
                description.as_subject.push(triple);
            } else if is_object {
                description.as_object.push(triple);
            }
        }
        description
    }

    pub fn is_empty(&self) -> bool {
        self.as_subject.is_empty() && self.as_object.is_empty()
    }
}

/// Summary statistics for one graph file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInfo {
    pub codec: CodecProfile,
    pub node_count: usize,
    pub edge_count: usize,
    pub predicate_count: usize,
    pub current_id: i64,
}

impl std::fmt::Display for GraphInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "kgstore graph info")?;
        writeln!(f, "  codec:       {}", self.codec)?;
        writeln!(f, "  nodes:       {}", self.node_count)?;
        writeln!(f, "  triples:     {}", self.edge_count)?;
        writeln!(f, "  predicates:  {}", self.predicate_count)?;
        writeln!(f, "  next id:     {}", self.current_id)?;
        Ok(())
    }
}

/// The kgstore engine.
///
/// Cheap to clone; clones share the file lock registry.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
    files: GraphFiles,
}

impl Engine {
    /// Create an engine with its own lock registry.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_locks(config, Arc::new(FileLockRegistry::new()))
    }

    /// Create an engine coordinating with every other user of `locks`.
    pub fn with_locks(config: EngineConfig, locks: Arc<FileLockRegistry>) -> Self {
        tracing::debug!(codec = %config.codec, case_sensitive = config.case_sensitive, "initializing kgstore engine");
        let files = GraphFiles::with_locks(config.codec, locks);
        Self { config, files }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn files(&self) -> &GraphFiles {
        &self.files
    }

    /// Record a triple in the graph file at `path`, creating the file if needed.
    ///
    /// Every component must be non-empty.
    pub fn insert(
        &self,
        path: &Path,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> KgResult<()> {
        validate(subject, predicate, object)?;
        self.files.modify::<_, _, KgError>(path, |kg| {
            kg.insert_triple(subject, predicate, object, case_sensitive)?;
            Ok(())
        })?;
        tracing::info!(path = %path.display(), subject, predicate, object, "inserted triple");
        Ok(())
    }

    /// Remove a triple. Returns `false` if the graph holds no such triple.
    pub fn remove(
        &self,
        path: &Path,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> KgResult<bool> {
        let removed = self.files.modify::<_, _, KgError>(path, |kg| {
            Ok(kg.remove_triple(subject, predicate, object, case_sensitive))
        })?;
        if removed {
            tracing::info!(path = %path.display(), subject, predicate, object, "removed triple");
        } else {
            tracing::debug!(path = %path.display(), subject, predicate, object, "no triple to remove");
        }
        Ok(removed)
    }

    /// Triples matching the filters; an empty filter matches anything.
    pub fn find(
        &self,
        path: &Path,
        subject: &str,
        predicate: &str,
        object: &str,
        case_sensitive: bool,
    ) -> KgResult<Vec<Triple>> {
        let kg = self.load(path)?;
        Ok(kg.find_triples(subject, predicate, object, case_sensitive))
    }

    /// Triples in which `entity` is the subject or the object.
    pub fn describe(&self, path: &Path, entity: &str, case_sensitive: bool) -> KgResult<Vec<Triple>> {
        let kg = self.load(path)?;
        Ok(kg.describe_entity(entity, case_sensitive))
    }

    /// [`Engine::describe`] split into the subject and object roles.
    pub fn describe_grouped(
        &self,
        path: &Path,
        entity: &str,
        case_sensitive: bool,
    ) -> KgResult<EntityDescription> {
        let triples = self.describe(path, entity, case_sensitive)?;
        Ok(EntityDescription::from_triples(entity, triples, case_sensitive))
    }

    /// Labels of the predicates pointing from `from` to `to`.
    ///
    /// Empty when either entity is unknown or no edge joins them.
    pub fn relations_between(
        &self,
        path: &Path,
        from: &str,
        to: &str,
        case_sensitive: bool,
    ) -> KgResult<Vec<String>> {
        let kg = self.load(path)?;
        Ok(kg
            .predicates_from_to(from, to, case_sensitive)
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.label)
            .collect())
    }

    /// Labels of every labelled node.
    pub fn list_nodes(&self, path: &Path) -> KgResult<Vec<String>> {
        Ok(self.load(path)?.list_nodes())
    }

    /// Distinct predicate labels.
    pub fn list_predicates(&self, path: &Path) -> KgResult<BTreeSet<String>> {
        Ok(self.load(path)?.list_all_predicates())
    }

    pub fn query_by_subject(
        &self,
        path: &Path,
        subject: &str,
        case_sensitive: bool,
    ) -> KgResult<Option<BTreeMap<String, Vec<String>>>> {
        Ok(self.load(path)?.query_by_subject(subject, case_sensitive))
    }

    pub fn query_by_object(
        &self,
        path: &Path,
        object: &str,
        case_sensitive: bool,
    ) -> KgResult<Option<BTreeMap<String, Vec<String>>>> {
        Ok(self.load(path)?.query_by_object(object, case_sensitive))
    }

    pub fn query_by_predicate(
        &self,
        path: &Path,
        predicate: &str,
        case_sensitive: bool,
    ) -> KgResult<Option<Vec<(String, String)>>> {
        Ok(self.load(path)?.query_by_predicate(predicate, case_sensitive))
    }

    /// Counts for the graph stored at `path`.
    pub fn info(&self, path: &Path) -> KgResult<GraphInfo> {
        let kg = self.load(path)?;
        Ok(GraphInfo {
            codec: self.config.codec,
            node_count: kg.node_count(),
            edge_count: kg.edge_count(),
            predicate_count: kg.list_all_predicates().len(),
            current_id: kg.current_id(),
        })
    }

    /// Read the whole graph stored at `path`.
    pub fn load(&self, path: &Path) -> KgResult<KnowledgeGraph> {
        Ok(self.files.read(path)?)
    }
}

fn validate(subject: &str, predicate: &str, object: &str) -> Result<(), EngineError> {
    for (component, value) in [
        ("subject", subject),
        ("predicate", predicate),
        ("object", object),
    ] {
        if value.is_empty() {
            return Err(EngineError::InvalidTriple { component });
        }
    }
    Ok(())
}
