//! Beatmap acquisition by online id.
//!
//! Files are looked up in a local folder first (`<folder>/<id>.osu`) and
//! downloaded otherwise. Downloads are written back to the folder so the next
//! fetch of the same id stays local.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::FetchError;

/// Raw content of a `.osu` file.
#[derive(Debug, Clone)]
pub struct BeatmapFile {
    beatmap_id: u32,
    bytes: Arc<[u8]>,
}

impl BeatmapFile {
    pub fn new(beatmap_id: u32, bytes: Vec<u8>) -> Self {
        Self {
            beatmap_id,
            bytes: Arc::from(bytes),
        }
    }

    pub fn beatmap_id(&self) -> u32 {
        self.beatmap_id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MD5 of the file content, lower-case hex.
    pub fn md5(&self) -> String {
        format!("{:x}", md5::compute(&self.bytes))
    }
}

/// Fetch-by-id capability consumed by the difficulty cache.
#[async_trait]
pub trait BeatmapSource: Send + Sync {
    async fn fetch(&self, beatmap_id: u32) -> Result<BeatmapFile, FetchError>;
}

/// Local folder backed by a remote download endpoint.
#[derive(Debug, Clone)]
pub struct BeatmapStore {
    folder: PathBuf,
    download_url: String,
    client: reqwest::Client,
}

impl BeatmapStore {
    /// `download_url` must contain an `{id}` placeholder.
    pub fn new(folder: impl Into<PathBuf>, download_url: impl Into<String>) -> Self {
        Self::with_client(folder, download_url, reqwest::Client::new())
    }

    pub fn with_client(
        folder: impl Into<PathBuf>,
        download_url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            folder: folder.into(),
            download_url: download_url.into(),
            client,
        }
    }

    /// Get the path for a beatmap file given its id.
    pub fn beatmap_path(&self, beatmap_id: u32) -> PathBuf {
        self.folder.join(format!("{}.osu", beatmap_id))
    }

    async fn read_local(&self, beatmap_id: u32) -> Result<Option<Vec<u8>>, FetchError> {
        let path = self.beatmap_path(beatmap_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => {
                log::warn!("FETCH: Ignoring empty local file {:?}", path);
                Ok(None)
            }
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FetchError::Io {
                beatmap_id,
                reason: e.to_string(),
            }),
        }
    }

    async fn download(&self, beatmap_id: u32) -> Result<Vec<u8>, FetchError> {
        let url = self.download_url.replace("{id}", &beatmap_id.to_string());
        let download_error = |e: reqwest::Error| FetchError::Download {
            beatmap_id,
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(download_error)?;
        let bytes = response.bytes().await.map_err(download_error)?;

        if bytes.is_empty() {
            return Err(FetchError::Empty(beatmap_id));
        }

        Ok(bytes.to_vec())
    }

    /// Saves a downloaded file. Failures only cost a future re-download.
    async fn save_local(&self, beatmap_id: u32, bytes: &[u8]) {
        let path = self.beatmap_path(beatmap_id);
        let result = async {
            tokio::fs::create_dir_all(&self.folder).await?;
            tokio::fs::write(&path, bytes).await
        }
        .await;

        if let Err(e) = result {
            log::warn!("FETCH: Failed to save beatmap {:?}: {}", path, e);
        }
    }
}

#[async_trait]
impl BeatmapSource for BeatmapStore {
    async fn fetch(&self, beatmap_id: u32) -> Result<BeatmapFile, FetchError> {
        if let Some(bytes) = self.read_local(beatmap_id).await? {
            log::info!("FETCH: Retrieved {}'s file from disk", beatmap_id);
            return Ok(BeatmapFile::new(beatmap_id, bytes));
        }

        log::info!("FETCH: Downloading beatmap ({})", beatmap_id);
        let bytes = self.download(beatmap_id).await?;
        self.save_local(beatmap_id, &bytes).await;

        Ok(BeatmapFile::new(beatmap_id, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_folder(name: &str) -> PathBuf {
        let folder = std::env::temp_dir().join(format!("diffcalc-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&folder);
        folder
    }

    // Nothing listens on the discard port, so every download fails fast.
    const UNREACHABLE_URL: &str = "http://127.0.0.1:9/osu/{id}";

    #[test]
    fn test_md5_of_content() {
        let file = BeatmapFile::new(1, b"hello".to_vec());
        assert_eq!(file.md5(), "5d41402abc4b2a76b9719d911017c592");
    }

    #[tokio::test]
    async fn test_local_file_is_preferred() {
        let folder = scratch_folder("local");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("42.osu"), b"osu file format v14").unwrap();

        let store = BeatmapStore::new(&folder, UNREACHABLE_URL);
        let file = store.fetch(42).await.unwrap();
        assert_eq!(file.beatmap_id(), 42);
        assert_eq!(file.bytes(), b"osu file format v14");

        std::fs::remove_dir_all(&folder).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_and_failed_download() {
        let folder = scratch_folder("missing");
        let store = BeatmapStore::new(&folder, UNREACHABLE_URL);

        let err = store.fetch(7).await.unwrap_err();
        assert!(matches!(err, FetchError::Download { beatmap_id: 7, .. }));
    }

    #[tokio::test]
    async fn test_empty_local_file_is_not_used() {
        let folder = scratch_folder("empty");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("3.osu"), b"").unwrap();

        let store = BeatmapStore::new(&folder, UNREACHABLE_URL);
        assert!(store.fetch(3).await.is_err());

        std::fs::remove_dir_all(&folder).unwrap();
    }
}
