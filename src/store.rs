//! Filesystem blob store and artifact naming.
//!
//! [`FsBlobStore`] is the reference [`BlobStore`]: artifacts land in one
//! directory, written through a temp file in the same directory and renamed
//! into place, so a reader never sees a half-written PNG.

use crate::error::{PrintfitError, ProviderError};
use crate::providers::BlobStore;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

const MAX_SLUG_LEN: usize = 48;

/// File-name friendly slug for a prompt: lowercase ASCII alphanumerics
/// joined by `-`, at most 48 chars, `print` when nothing is left.
pub fn artifact_slug(prompt: &str) -> String {
    let lower = prompt.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lower, "-");
    let mut slug: String = slug.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "print".to_string()
    } else {
        slug
    }
}

/// Blob store writing into a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PrintfitError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| PrintfitError::OutputWriteFailed {
            path: root.clone(),
            source: e,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write through a temp file and return the canonical path of the result.
    fn write_atomic(root: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let target = root.join(name);
        let mut tmp = tempfile::NamedTempFile::new_in(root)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(std::fs::canonicalize(&target).unwrap_or(target))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ProviderError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return Err(ProviderError::new("fs", format!("refusing blob name '{name}'")));
        }
        let root = self.root.clone();
        let owned_name = name.to_string();
        let path =
            tokio::task::spawn_blocking(move || Self::write_atomic(&root, &owned_name, &bytes))
                .await
                .map_err(|e| ProviderError::new("fs", format!("write task panicked: {e}")))?
                .map_err(|e| ProviderError::new("fs", format!("{name}: {e}")))?;

        debug!("Stored {} ({}) at {}", name, content_type, path.display());
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_basic() {
        assert_eq!(artifact_slug("A Fox, in the Snow!"), "a-fox-in-the-snow");
        assert_eq!(artifact_slug("   "), "print");
        assert_eq!(artifact_slug("日本"), "print");
    }

    #[test]
    fn slug_is_capped_without_trailing_dash() {
        let long = "word ".repeat(30);
        let slug = artifact_slug(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[tokio::test]
    async fn fs_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("out")).unwrap();
        let url = store.put("a-1.png", vec![1, 2, 3], "image/png").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("a-1.png"));
        let written = std::fs::read(store.root().join("a-1.png")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fs_store_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        assert!(store.put("../x.png", vec![], "image/png").await.is_err());
        assert!(store.put("", vec![], "image/png").await.is_err());
    }

    #[tokio::test]
    async fn fs_store_url_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        let store = FsBlobStore::new(dir.path().join("out").join("..").join("out")).unwrap();
        let url = store.put("b-0.png", vec![7], "image/png").await.unwrap();
        let path = PathBuf::from(url.trim_start_matches("file://"));
        assert!(path.is_absolute());
        assert!(!url.contains(".."), "got {url}");
        assert_eq!(std::fs::read(path).unwrap(), vec![7]);
    }
}
