//! Locked whole-file transactions on graph files.
//!
//! A graph file always holds one complete encoded graph. Three transactions
//! are offered:
//!
//! - [`GraphFiles::read`]: shared lock, decode
//! - [`GraphFiles::write`]: exclusive lock, replace the file with an encoded graph
//! - [`GraphFiles::modify`]: exclusive lock held across decode, mutate, encode and rewrite
//!
//! A file that does not exist yet, or exists with zero length, reads as an
//! empty graph. A file that cannot be decoded is an error and is never
//! overwritten by `modify`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::StoreError;
use crate::graph::index::KnowledgeGraph;

use super::StoreResult;
use super::codec::CodecProfile;
use super::lock::FileLockRegistry;

/// Graph file access through one codec and one lock registry.
///
/// Cloning is cheap and clones share the registry, so they exclude each other.
#[derive(Debug, Clone, Default)]
pub struct GraphFiles {
    codec: CodecProfile,
    locks: Arc<FileLockRegistry>,
}

impl GraphFiles {
    /// File access with its own lock registry.
    pub fn new(codec: CodecProfile) -> Self {
        Self::with_locks(codec, Arc::new(FileLockRegistry::new()))
    }

    /// File access coordinating with every other holder of `locks`.
    pub fn with_locks(codec: CodecProfile, locks: Arc<FileLockRegistry>) -> Self {
        Self { codec, locks }
    }

    pub fn codec(&self) -> CodecProfile {
        self.codec
    }

    pub fn locks(&self) -> &Arc<FileLockRegistry> {
        &self.locks
    }

    /// Load the graph stored at `path` under a shared lock.
    pub fn read(&self, path: &Path) -> StoreResult<KnowledgeGraph> {
        let lock = self.locks.lock_for(path);
        let _guard = lock.read();

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "graph file missing, reading as empty");
                return Ok(KnowledgeGraph::new());
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let bytes = read_all(&mut file, path)?;
        let graph = self.decode_or_empty(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "read graph file"
        );
        Ok(graph)
    }

    /// Replace the contents of `path` with `graph` under an exclusive lock.
    ///
    /// The graph is encoded before the file is touched, so an encode failure
    /// leaves the previous contents in place.
    pub fn write(&self, path: &Path, graph: &KnowledgeGraph) -> StoreResult<()> {
        let bytes = self.codec.encode(graph)?;

        let lock = self.locks.lock_for(path);
        let _guard = lock.write();

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_data())
            .map_err(|e| StoreError::io(path, e))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote graph file");
        Ok(())
    }

    /// Read, mutate and rewrite the graph at `path` as one exclusive transaction.
    ///
    /// No other transaction on the same path (through the same registry) can
    /// interleave between the read and the rewrite. If decoding fails, or
    /// `mutate` returns an error, the file is left exactly as it was.
    pub fn modify<F, T, E>(&self, path: &Path, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&KnowledgeGraph) -> Result<T, E>,
        E: From<StoreError>,
    {
        let lock = self.locks.lock_for(path);
        let _guard = lock.write();

        // `file` is declared after `_guard`, so it is closed before the lock is released.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        let bytes = read_all(&mut file, path)?;
        let graph = self.decode_or_empty(&bytes)?;

        let value = mutate(&graph)?;

        let encoded = self.codec.encode(&graph)?;
        rewrite(&mut file, &encoded).map_err(|e| StoreError::io(path, e))?;
        tracing::debug!(
            path = %path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            bytes = encoded.len(),
            "modified graph file"
        );
        Ok(value)
    }

    fn decode_or_empty(&self, bytes: &[u8]) -> StoreResult<KnowledgeGraph> {
        match self.codec.decode(bytes) {
            Err(StoreError::EmptyInput) => Ok(KnowledgeGraph::new()),
            other => other,
        }
    }
}

fn read_all(file: &mut File, path: &Path) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| StoreError::io(path, e))?;
    Ok(bytes)
}

fn rewrite(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(bytes)?;
    file.sync_data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::query::TripleQuery;
    use crate::graph::Triple;
    use std::thread;

    const PROFILES: [CodecProfile; 2] = [CodecProfile::Binary, CodecProfile::Json];

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = GraphFiles::default();
        let graph = files.read(&dir.path().join("absent.kg")).unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn zero_length_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.kg");
        std::fs::write(&path, b"").unwrap();
        for profile in PROFILES {
            assert!(GraphFiles::new(profile).read(&path).unwrap().is_empty());
        }
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        for profile in PROFILES {
            let path = dir.path().join(format!("graph.{profile}"));
            let files = GraphFiles::new(profile);
            let kg = KnowledgeGraph::new();
            kg.insert_triple("Paris", "is_capital_of", "France", false)
                .unwrap();
            files.write(&path, &kg).unwrap();

            let back = files.read(&path).unwrap();
            assert_eq!(
                back.triples(),
                vec![Triple::new("Paris", "is_capital_of", "France")]
            );
        }
    }

    #[test]
    fn write_replaces_longer_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shrink.kg");
        let files = GraphFiles::new(CodecProfile::Json);

        let big = KnowledgeGraph::new();
        for i in 0..20 {
            big.insert_triple(&format!("s{i}"), "p", &format!("o{i}"), true)
                .unwrap();
        }
        files.write(&path, &big).unwrap();
        files.write(&path, &KnowledgeGraph::new()).unwrap();

        assert!(files.read(&path).unwrap().is_empty());
    }

    #[test]
    fn modify_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.kg");
        let files = GraphFiles::default();

        files
            .modify::<_, _, StoreError>(&path, |kg| {
                kg.insert_triple("a", "r", "b", false).unwrap();
                Ok(())
            })
            .unwrap();

        assert!(path.exists());
        assert_eq!(files.read(&path).unwrap().triples().len(), 1);
    }

    #[test]
    fn modify_returns_closure_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value.kg");
        let files = GraphFiles::default();
        let count = files
            .modify::<_, _, StoreError>(&path, |kg| {
                kg.new_labeled_node("x");
                Ok(kg.node_count())
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn failed_closure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.kg");
        let files = GraphFiles::default();
        let kg = KnowledgeGraph::new();
        kg.insert_triple("a", "r", "b", false).unwrap();
        files.write(&path, &kg).unwrap();
        let before = std::fs::read(&path).unwrap();

        let result = files.modify::<_, (), StoreError>(&path, |kg| {
            kg.insert_triple("c", "r", "d", false).unwrap();
            Err(StoreError::Encode {
                message: "refused".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn corrupt_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.kg");
        std::fs::write(&path, b"This is not valid graph data").unwrap();
        let files = GraphFiles::default();

        assert!(matches!(files.read(&path), Err(StoreError::Decode { .. })));
        let result = files.modify::<_, (), StoreError>(&path, |_| Ok(()));
        assert!(matches!(result, Err(StoreError::Decode { .. })));
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"This is not valid graph data"
        );
    }

    #[test]
    fn unreadable_path_is_an_io_error_not_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        for profile in PROFILES {
            let files = GraphFiles::new(profile);
            match files.read(dir.path()) {
                Err(StoreError::Io { path, .. }) => {
                    assert_eq!(path, dir.path().display().to_string());
                }
                Err(other) => panic!("expected an io error, got {other}"),
                Ok(_) => panic!("reading a directory succeeded"),
            }

            let modify = files.modify::<_, (), StoreError>(dir.path(), |_| Ok(()));
            assert!(matches!(modify, Err(StoreError::Io { .. })), "{profile}");
        }
    }

    #[test]
    fn concurrent_modify_loses_no_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concurrent.kg");
        let files = GraphFiles::default();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let files = files.clone();
                let path = path.clone();
                thread::spawn(move || {
                    files
                        .modify::<_, _, StoreError>(&path, |kg| {
                            kg.insert_triple(
                                &format!("Subject{i}"),
                                &format!("predicate{i}"),
                                &format!("Object{i}"),
                                false,
                            )
                            .unwrap();
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let kg = files.read(&path).unwrap();
        assert_eq!(kg.triples().len(), 10);
        for i in 0..10 {
            let found = kg.find_triples(&format!("Subject{i}"), "", "", false);
            assert_eq!(found.len(), 1, "missing Subject{i}");
        }
    }

    #[test]
    fn clones_share_locks() {
        let files = GraphFiles::default();
        let clone = files.clone();
        assert!(Arc::ptr_eq(files.locks(), clone.locks()));
        let separate = GraphFiles::default();
        assert!(!Arc::ptr_eq(files.locks(), separate.locks()));
    }
}
