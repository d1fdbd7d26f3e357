use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::models::{ListingType, Site};

/// Last fully processed result page, one file per site and listing type
#[derive(Debug, Clone)]
pub struct PageCursor {
    path: PathBuf,
}

impl PageCursor {
    pub fn new(dir: &Path, site: Site, listing_type: &ListingType) -> Self {
        let path = dir.join(format!("{}_{}.cursor", site.slug(), listing_type.code));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no page has been completed yet
    pub async fn load(&self) -> Result<Option<u32>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let content = content.trim();
                content
                    .parse()
                    .map(Some)
                    .map_err(|_| ScrapeError::parse("page cursor", content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn store(&self, page: u32) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&self.path, page.to_string()).await?;
        debug!("Cursor {} now at page {}", self.path.display(), page);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(dir: &Path) -> PageCursor {
        let listing_type = ListingType::resolve(Site::WgGesucht, "0").unwrap();
        PageCursor::new(dir, Site::WgGesucht, &listing_type)
    }

    #[tokio::test]
    async fn test_missing_file_means_no_progress() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = cursor(dir.path());
        assert_eq!(cursor.load().await.unwrap(), None);
        assert!(cursor.path().ends_with("wg_gesucht_0.cursor"));
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = cursor(&dir.path().join("state"));
        cursor.store(7).await.unwrap();
        assert_eq!(cursor.load().await.unwrap(), Some(7));
        cursor.store(8).await.unwrap();
        assert_eq!(cursor.load().await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn test_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = cursor(dir.path());
        tokio::fs::write(cursor.path(), "seven").await.unwrap();
        assert!(matches!(cursor.load().await, Err(ScrapeError::Parse { .. })));
    }
}
