//! Quarantine store: the review area for files that failed the leak gate.
//!
//! Depositing is idempotent. If a file of the same name is already present
//! the deposit is a no-op with a warning, and the original is left where it
//! is: nothing is ever overwritten or deleted to make room. The destination
//! name is claimed atomically, so this also holds for concurrent deposits.

use crate::config::QuarantineMode;
use crate::error::SheetError;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a deposit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deposit {
    Moved(PathBuf),
    Copied(PathBuf),
    /// A same-named file was already quarantined; the source is untouched.
    AlreadyPresent(PathBuf),
}

impl Deposit {
    pub fn path(&self) -> &Path {
        match self {
            Deposit::Moved(p) | Deposit::Copied(p) | Deposit::AlreadyPresent(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuarantineStore {
    dir: PathBuf,
    mode: QuarantineMode,
}

impl QuarantineStore {
    pub fn new(dir: impl Into<PathBuf>, mode: QuarantineMode) -> Self {
        Self {
            dir: dir.into(),
            mode,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Place `source` in the store according to the configured mode.
    pub fn deposit(&self, source: &Path) -> Result<Deposit, SheetError> {
        let failed = |e: std::io::Error| SheetError::QuarantineFailed {
            path: source.to_path_buf(),
            dir: self.dir.clone(),
            source: e,
        };

        let name = source.file_name().ok_or_else(|| {
            failed(std::io::Error::new(
                ErrorKind::InvalidInput,
                "source has no file name",
            ))
        })?;
        std::fs::create_dir_all(&self.dir).map_err(failed)?;
        let dest = self.dir.join(name);

        // Every path below claims `dest` atomically (hard link or
        // create_new), so two deposits of the same name cannot both win.
        let claimed = match self.mode {
            QuarantineMode::Copy => copy_new(source, &dest).map(|()| Deposit::Copied(dest.clone())),
            QuarantineMode::Move => match std::fs::hard_link(source, &dest) {
                Ok(()) => Ok(Deposit::Moved(dest.clone())),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
                // Cross-device or no link support: copy instead.
                Err(_) => copy_new(source, &dest).map(|()| Deposit::Moved(dest.clone())),
            },
        };

        match claimed {
            Ok(deposit) => {
                if let Deposit::Moved(_) = deposit {
                    std::fs::remove_file(source).map_err(failed)?;
                    info!("Moved {} to {}", source.display(), dest.display());
                } else {
                    info!("Copied {} to {}", source.display(), dest.display());
                }
                Ok(deposit)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!(
                    "{} is already quarantined; leaving {} in place",
                    dest.display(),
                    source.display()
                );
                Ok(Deposit::AlreadyPresent(dest))
            }
            Err(e) => Err(failed(e)),
        }
    }
}

/// Copy into a destination that must not exist yet. A partial copy is
/// removed again.
fn copy_new(source: &Path, dest: &Path) -> std::io::Result<()> {
    let mut input = File::open(source)?;
    let mut output = OpenOptions::new().write(true).create_new(true).open(dest)?;
    let copied = std::io::copy(&mut input, &mut output).and_then(|_| output.sync_all());
    if let Err(e) = copied {
        let _ = std::fs::remove_file(dest);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, b"PK\x03\x04data").unwrap();
        p
    }

    #[test]
    fn test_move() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path(), "a.xlsx");
        let store = QuarantineStore::new(tmp.path().join("q"), QuarantineMode::Move);
        let d = store.deposit(&src).unwrap();
        assert_eq!(d, Deposit::Moved(tmp.path().join("q/a.xlsx")));
        assert!(!src.exists());
        assert!(d.path().exists());
    }

    #[test]
    fn test_copy_keeps_original() {
        let tmp = tempfile::tempdir().unwrap();
        let src = source(tmp.path(), "a.xlsx");
        let store = QuarantineStore::new(tmp.path().join("q"), QuarantineMode::Copy);
        let d = store.deposit(&src).unwrap();
        assert!(matches!(d, Deposit::Copied(_)));
        assert!(src.exists());
    }

    #[test]
    fn test_redeposit_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = QuarantineStore::new(tmp.path().join("q"), QuarantineMode::Move);
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("a.xlsx"), b"older").unwrap();

        let src = source(tmp.path(), "a.xlsx");
        let d = store.deposit(&src).unwrap();
        assert!(matches!(d, Deposit::AlreadyPresent(_)));
        // Neither copy is lost.
        assert!(src.exists());
        assert_eq!(std::fs::read(store.dir().join("a.xlsx")).unwrap(), b"older");
    }

    #[test]
    fn test_concurrent_deposits_keep_first_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let store = QuarantineStore::new(tmp.path().join("q"), QuarantineMode::Move);
        let sources: Vec<PathBuf> = (0..8)
            .map(|i| {
                let dir = tmp.path().join(format!("upload{i}"));
                std::fs::create_dir_all(&dir).unwrap();
                let p = dir.join("same.xlsx");
                std::fs::write(&p, format!("PK\x03\x04 upload {i}")).unwrap();
                p
            })
            .collect();

        let store = &store;
        let deposits: Vec<Deposit> = std::thread::scope(|scope| {
            let handles: Vec<_> = sources
                .iter()
                .map(|src| scope.spawn(move || store.deposit(src).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let moved: Vec<usize> = deposits
            .iter()
            .enumerate()
            .filter(|(_, d)| matches!(d, Deposit::Moved(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(moved.len(), 1, "exactly one deposit claims the name");
        let winner = moved[0];
        // The quarantined copy is the winner's, and every loser is untouched.
        let kept = std::fs::read_to_string(store.dir().join("same.xlsx")).unwrap();
        assert!(kept.ends_with(&format!("upload {winner}")));
        for (i, src) in sources.iter().enumerate() {
            assert_eq!(src.exists(), i != winner);
        }
    }

    #[test]
    fn test_copy_onto_existing_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = QuarantineStore::new(tmp.path().join("q"), QuarantineMode::Copy);
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("a.xlsx"), b"older").unwrap();

        let src = source(tmp.path(), "a.xlsx");
        assert!(matches!(store.deposit(&src).unwrap(), Deposit::AlreadyPresent(_)));
        assert_eq!(std::fs::read(store.dir().join("a.xlsx")).unwrap(), b"older");
    }

    #[test]
    fn test_missing_source_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = QuarantineStore::new(tmp.path().join("q"), QuarantineMode::Copy);
        let err = store.deposit(&tmp.path().join("nope.xlsx")).unwrap_err();
        assert!(matches!(err, SheetError::QuarantineFailed { .. }));
    }
}
