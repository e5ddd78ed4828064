//! Sizes of the objects already stored under a root's prefix

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to list the store: {0}")]
    Io(#[from] std::io::Error),
    #[error("Prefix {0:?} escapes the store")]
    BadPrefix(String),
}

/// Lists the sizes of objects stored under a prefix
pub trait PrefixLister {
    fn list_sizes(&self, prefix: &str) -> impl Future<Output = Result<Vec<u64>, StoreError>>;
}

/// Total bytes stored under `prefix`
pub async fn accumulated_size(
    lister: &impl PrefixLister,
    prefix: &str,
) -> Result<u64, StoreError> {
    let sizes = lister.list_sizes(prefix).await?;
    let total = sizes.iter().copied().fold(0, u64::saturating_add);
    log::debug!("{} objects, {total} bytes under {prefix:?}", sizes.len());
    Ok(total)
}

/// A store that is just a local directory
///
/// Prefixes are relative paths under the base directory. Every regular file
/// below the prefix counts, at any depth; a prefix with nothing there yet lists
/// as empty.
#[derive(Debug, Clone)]
pub struct DirLister {
    base: PathBuf,
}

impl DirLister {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, prefix: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(prefix);
        if !rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StoreError::BadPrefix(prefix.to_string()));
        }
        Ok(self.base.join(rel))
    }
}

impl PrefixLister for DirLister {
    async fn list_sizes(&self, prefix: &str) -> Result<Vec<u64>, StoreError> {
        let mut sizes = vec![];
        let mut dirs = vec![self.resolve(prefix)?];
        while let Some(dir) = dirs.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    dirs.push(entry.path());
                } else if meta.is_file() {
                    sizes.push(meta.len());
                }
            }
        }
        Ok(sizes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_prefix_cannot_escape() {
        let lister = DirLister::new("/srv/store");
        assert!(matches!(
            lister.resolve("../etc"),
            Err(StoreError::BadPrefix(_))
        ));
        assert!(matches!(
            lister.resolve("/etc"),
            Err(StoreError::BadPrefix(_))
        ));
        assert_eq!(
            lister.resolve("raw/bafyroot").unwrap(),
            PathBuf::from("/srv/store/raw/bafyroot")
        );
    }

    #[tokio::test]
    async fn test_missing_prefix_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let lister = DirLister::new(dir.path());
        assert_eq!(accumulated_size(&lister, "nothing/here").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nested_files_are_summed() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("raw/root");
        std::fs::create_dir_all(prefix.join("uploader")).unwrap();
        std::fs::write(prefix.join("a.car"), vec![0; 10]).unwrap();
        std::fs::write(prefix.join("uploader/b.car"), vec![0; 32]).unwrap();
        std::fs::write(dir.path().join("raw/other.car"), vec![0; 1000]).unwrap();

        let lister = DirLister::new(dir.path());
        let mut sizes = lister.list_sizes("raw/root").await.unwrap();
        sizes.sort();
        assert_eq!(sizes, vec![10, 32]);
        assert_eq!(accumulated_size(&lister, "raw/root").await.unwrap(), 42);
    }
}
