//! Input resolution: turn a user-supplied path or URL into raw image bytes.
//!
//! Nothing here validates the bytes as an image. That is the normaliser's
//! job, and it deliberately tolerates bytes it cannot parse.

use crate::error::PrintfitError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL.
pub async fn read_input(input: &str, timeout_secs: u64) -> Result<Vec<u8>, PrintfitError> {
    if is_url(input) {
        fetch_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, PrintfitError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PrintfitError::FileNotFound { path })
        }
        Err(e) => Err(PrintfitError::Internal(format!(
            "Failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// GET a URL and return the body.
pub async fn fetch_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, PrintfitError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PrintfitError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            format!("timed out after {timeout_secs}s")
        } else {
            e.to_string()
        };
        PrintfitError::DownloadFailed {
            url: url.to_string(),
            reason,
        }
    })?;

    if !response.status().is_success() {
        return Err(PrintfitError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PrintfitError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/cat.png"));
        assert!(is_url("http://example.com/cat.png"));
        assert!(!is_url("/tmp/cat.png"));
        assert!(!is_url("cat.png"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"abc").unwrap();
        let bytes = read_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = read_input("/definitely/not/here.png", 5).await.unwrap_err();
        assert!(matches!(err, PrintfitError::FileNotFound { .. }));
    }
}
