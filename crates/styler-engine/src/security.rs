//! Path and resource validation applied before any file is read or
//! written. The engine never executes file content, performs no dynamic
//! loading, and writes outputs atomically (temp file + persist) so a
//! crash can never leave a half-written `.java` file behind.

use crate::config::SecurityPolicy;
use crate::engine::ErrorKind;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A per-file rejection from the gate. The message deliberately carries
/// only the offending path, not resolver internals.
#[derive(Debug)]
pub struct GateError {
    pub kind: ErrorKind,
    pub message: String,
}

pub struct SecurityGate {
    roots: Vec<PathBuf>,
    max_file_size: u64,
}

impl SecurityGate {
    /// Canonicalizes the allow-listed roots. An empty allow-list falls
    /// back to the current working directory.
    pub fn new(policy: &SecurityPolicy, max_file_size: u64) -> std::io::Result<Self> {
        let mut roots = Vec::new();
        if policy.allowed_roots.is_empty() {
            roots.push(std::env::current_dir()?.canonicalize()?);
        } else {
            for root in &policy.allowed_roots {
                roots.push(root.canonicalize()?);
            }
        }
        debug!(?roots, "security gate initialized");
        Ok(Self {
            roots,
            max_file_size,
        })
    }

    /// Validates an input path: canonical (symlinks resolved), inside an
    /// allowed root, and within the size limit — checked before reading.
    pub fn check_input(&self, path: &Path) -> Result<PathBuf, GateError> {
        let canonical = path.canonicalize().map_err(|_| GateError {
            kind: ErrorKind::FileNotFound,
            message: format!("file not found: {}", path.display()),
        })?;
        self.check_allowed(&canonical)?;
        let metadata = std::fs::metadata(&canonical).map_err(|_| GateError {
            kind: ErrorKind::FileNotFound,
            message: format!("file not found: {}", path.display()),
        })?;
        if metadata.len() > self.max_file_size {
            return Err(GateError {
                kind: ErrorKind::FileTooLarge,
                message: format!(
                    "file exceeds size limit ({} > {} bytes)",
                    metadata.len(),
                    self.max_file_size
                ),
            });
        }
        Ok(canonical)
    }

    /// Output paths are validated like inputs (the file must already
    /// exist for in-place formatting; its directory anchors the check).
    pub fn check_output(&self, path: &Path) -> Result<PathBuf, GateError> {
        let parent = path.parent().unwrap_or(Path::new("."));
        let canonical_parent = parent.canonicalize().map_err(|_| GateError {
            kind: ErrorKind::FileNotFound,
            message: format!("directory not found: {}", parent.display()),
        })?;
        self.check_allowed(&canonical_parent)?;
        let file_name = path.file_name().ok_or_else(|| GateError {
            kind: ErrorKind::PathDenied,
            message: format!("not a file path: {}", path.display()),
        })?;
        Ok(canonical_parent.join(file_name))
    }

    fn check_allowed(&self, canonical: &Path) -> Result<(), GateError> {
        if self.roots.iter().any(|root| canonical.starts_with(root)) {
            Ok(())
        } else {
            Err(GateError {
                kind: ErrorKind::PathDenied,
                message: format!("path is outside allowed roots: {}", canonical.display()),
            })
        }
    }

    /// Atomic in-place write: a temp file in the destination directory is
    /// written, flushed, synced, and renamed over the target.
    pub fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let validated = self
            .check_output(path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::PermissionDenied, e.message))?;
        let dir = validated.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&validated)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SecurityPolicy;

    fn gate_for(dir: &Path, max: u64) -> SecurityGate {
        SecurityGate::new(
            &SecurityPolicy {
                allowed_roots: vec![dir.to_path_buf()],
            },
            max,
        )
        .unwrap()
    }

    #[test]
    fn rejects_paths_outside_roots() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let outside = other.path().join("Foo.java");
        std::fs::write(&outside, "class Foo {}").unwrap();

        let gate = gate_for(dir.path(), 1024);
        let err = gate.check_input(&outside).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PathDenied);
    }

    #[test]
    fn rejects_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let gate = gate_for(dir.path(), 1024);
        let err = gate.check_input(&dir.path().join("Missing.java")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileNotFound);
    }

    #[test]
    fn rejects_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Big.java");
        std::fs::write(&path, "x".repeat(100)).unwrap();

        let gate = gate_for(dir.path(), 10);
        let err = gate.check_input(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileTooLarge);
    }

    #[test]
    fn accepts_and_canonicalizes_valid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Ok.java");
        std::fs::write(&path, "class Ok {}").unwrap();

        let gate = gate_for(dir.path(), 1024);
        let canonical = gate.check_input(&path).unwrap();
        assert!(canonical.is_absolute());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Out.java");
        std::fs::write(&path, "old").unwrap();

        let gate = gate_for(dir.path(), 1024);
        gate.write_atomic(&path, b"new contents").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new contents");
    }
}
