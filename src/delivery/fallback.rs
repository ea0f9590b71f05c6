use crate::error::Result;
use crate::metadata::MetadataRecord;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Out-of-band delivery through a well-known file
///
/// The file always holds the latest record as JSON. Identical consecutive
/// records are written once.
#[derive(Debug)]
pub struct FileBridge {
    path: PathBuf,
    last_written: Mutex<Option<String>>,
}

impl FileBridge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the file with `record`; `Ok(false)` when it already holds it
    pub async fn write(&self, record: &MetadataRecord) -> Result<bool> {
        let payload = serde_json::to_string_pretty(record)?;

        let mut last = self.last_written.lock().await;
        if last.as_deref() == Some(payload.as_str()) {
            log::debug!("File bridge already holds this record, skipping");
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, payload.as_bytes()).await?;
        log::info!("Wrote context to file bridge {}", self.path.display());

        *last = Some(payload);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = FileBridge::new(dir.path().join("bridge").join("plm_context.json"));
        let record = MetadataRecord::new("file:///a.html").with_plm_id("P123456-7890");

        assert!(bridge.write(&record).await.unwrap());
        assert!(!bridge.write(&record).await.unwrap());

        let stored: MetadataRecord =
            serde_json::from_str(&std::fs::read_to_string(bridge.path()).unwrap()).unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = FileBridge::new(dir.path().join("plm_context.json"));

        bridge.write(&MetadataRecord::new("u").with_plm_id("P111111-1111")).await.unwrap();
        bridge.write(&MetadataRecord::new("u").with_plm_id("P222222-2222")).await.unwrap();

        let content = std::fs::read_to_string(bridge.path()).unwrap();
        assert!(content.contains("P222222-2222"));
        assert!(!content.contains("P111111-1111"));
    }
}
