//! On-disk robots.txt cache
//!
//! One file per domain holding the raw robots.txt body. The file's modification
//! time is the fetch time, so a cache directory survives process restarts.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RobotsDiskCache {
    dir: PathBuf,
}

impl RobotsDiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache file for a domain: `{dir}/{domain}_robots.txt`
    ///
    /// `:` is replaced by `_` so authorities with a port yield portable file names.
    pub fn path_for(&self, domain: &str) -> PathBuf {
        self.dir
            .join(format!("{}_robots.txt", domain.replace(':', "_")))
    }

    /// Reads a cached body and its fetch time, or `None` if there is no usable file
    pub async fn load(&self, domain: &str) -> Option<(String, DateTime<Utc>)> {
        let path = self.path_for(domain);

        let modified = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.modified().ok()?,
            Err(_) => return None,
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Some((body, DateTime::<Utc>::from(modified))),
            Err(e) => {
                tracing::warn!("Unreadable robots cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Writes (or truncates to) the body for a domain, creating the directory if needed
    pub async fn store(&self, domain: &str, body: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(domain), body).await
    }
}
