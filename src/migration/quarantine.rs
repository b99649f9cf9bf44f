//! Moving the persistent store aside so the service starts cold.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files moved out of the spool directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quarantine {
    pub dir: PathBuf,
    pub moved: usize,
}

/// Move every entry of `spool` into `spool/<archive>/<label>`.
///
/// The archive directory itself and every path in `keep` stay in place.
/// Nothing is deleted. A missing spool directory quarantines nothing.
pub fn quarantine(spool: &Path, archive: &str, label: &str, keep: &[&Path]) -> io::Result<Quarantine> {
    let archive_root = spool.join(archive);
    let dir = archive_root.join(label);

    let entries = match fs::read_dir(spool) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Quarantine { dir, moved: 0 }),
        Err(e) => return Err(e),
    };

    let mut moved = 0;
    for entry in entries {
        let path = entry?.path();
        if path == archive_root || keep.iter().any(|k| *k == path) {
            continue;
        }
        if moved == 0 {
            fs::create_dir_all(&dir)?;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        fs::rename(&path, dir.join(name))?;
        tracing::debug!(from = ?path, to = ?dir, "Quarantined store file");
        moved += 1;
    }

    Ok(Quarantine { dir, moved })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_everything_but_archive_and_kept_paths() {
        let spool = tempfile::tempdir().unwrap();
        let root = spool.path();
        fs::write(root.join("schema.DAT"), "s").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/x"), "x").unwrap();
        fs::write(root.join("keep.backup"), "b").unwrap();
        fs::create_dir(root.join("archive")).unwrap();

        let keep = root.join("keep.backup");
        let q = quarantine(root, "archive", "ejabberd@old-1", &[keep.as_path()]).unwrap();

        assert_eq!(q.moved, 2);
        assert_eq!(q.dir, root.join("archive/ejabberd@old-1"));
        assert!(q.dir.join("schema.DAT").is_file());
        assert!(q.dir.join("sub/x").is_file());
        assert!(keep.is_file());
        assert!(!root.join("schema.DAT").exists());
    }

    #[test]
    fn empty_or_missing_spool_moves_nothing() {
        let spool = tempfile::tempdir().unwrap();
        let q = quarantine(spool.path(), "archive", "l", &[]).unwrap();
        assert_eq!(q.moved, 0);
        assert!(!q.dir.exists());

        let missing = spool.path().join("absent");
        assert_eq!(quarantine(&missing, "archive", "l", &[]).unwrap().moved, 0);
    }
}
