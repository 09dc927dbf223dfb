use std::path::{Path, PathBuf};

/// Flat files kept next to the database (config, json mirror).
pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
    fn delete(&self, ident: &str) -> std::io::Result<()>;
}

#[derive(Clone, Debug)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        Ok(BackendLocal { base_dir: path })
    }

    fn path(&self, ident: &str) -> PathBuf {
        self.base_dir.join(ident)
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        std::fs::metadata(self.path(ident)).is_ok()
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(ident))
    }

    /// Readers never see a half written file: data goes to a temp file which is renamed over.
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        let temp_path = self
            .base_dir
            .join(format!(".{:08x}-{ident}", rand::random::<u32>()));

        if let Err(err) = std::fs::write(&temp_path, data) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err);
        }

        std::fs::rename(&temp_path, self.path(ident))
    }

    fn delete(&self, ident: &str) -> std::io::Result<()> {
        match std::fs::remove_file(self.path(ident)) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(tmp.path().join("nested")).unwrap();

        assert!(!store.exists("a.json"));
        store.write("a.json", b"[1]").unwrap();
        assert!(store.exists("a.json"));
        assert_eq!(store.read("a.json").unwrap(), b"[1]");

        store.write("a.json", b"[2]").unwrap();
        assert_eq!(store.read("a.json").unwrap(), b"[2]");

        store.delete("a.json").unwrap();
        assert!(!store.exists("a.json"));
        // deleting twice is fine
        store.delete("a.json").unwrap();

        // no temp files left behind
        let leftovers = std::fs::read_dir(&store.base_dir).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
