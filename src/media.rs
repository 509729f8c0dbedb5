//! Binary media boundary plus a directory-backed reference store.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempPath};

use crate::error::MediaError;
use crate::http::{HttpClient, RequestOptions};
use crate::store::RecordId;

pub type MediaId = u64;

pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const INDEX_FILE: &str = "media.json";

/// A fetched image waiting to be stored. The temp file is removed on drop.
#[derive(Debug)]
pub struct DownloadedFile {
    pub path: TempPath,
    pub source_url: String,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn download(&self, url: &str) -> Result<DownloadedFile, MediaError>;
    async fn store(
        &self,
        file: DownloadedFile,
        filename: &str,
        mime: &str,
        owner: RecordId,
    ) -> Result<MediaId, MediaError>;
    async fn set_representative_image(&self, record: RecordId, media: MediaId) -> Result<(), MediaError>;
}

fn re_unsafe_chars() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap())
}

/// Basename of the URL path, query and fragment dropped, reduced to a
/// filesystem-safe name. Falls back to `image` when nothing usable is left.
pub fn filename_from_url(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let base = path.rsplit('/').next().unwrap_or_default();
    let decoded = html_escape::decode_html_entities(base);
    let safe = re_unsafe_chars().replace_all(&decoded, "-");
    let safe = safe.trim_matches(|c| c == '-' || c == '.');
    if safe.is_empty() {
        "image".to_string()
    } else {
        safe.to_string()
    }
}

/// MIME type from the file extension, else the download's Content-Type,
/// else a generic binary type.
pub fn mime_for(filename: &str, content_type: Option<&str>) -> String {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let by_ext = match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "avif" => Some("image/avif"),
        _ => None,
    };
    if let Some(m) = by_ext {
        return m.to_string();
    }
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .unwrap_or("application/octet-stream")
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub id: MediaId,
    pub owner: RecordId,
    pub filename: String,
    pub mime: String,
    pub source_url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MediaIndex {
    #[serde(default)]
    next_id: MediaId,
    #[serde(default)]
    entries: Vec<MediaEntry>,
    /// record id -> representative media id
    #[serde(default)]
    representative: BTreeMap<RecordId, MediaId>,
}

/// Stores images as `{id}-{filename}` under one directory with a
/// `media.json` index next to them.
pub struct DirMediaStore {
    dir: PathBuf,
    http: Arc<dyn HttpClient>,
    timeout: Duration,
    index: Mutex<MediaIndex>,
}

impl DirMediaStore {
    pub fn open(dir: impl AsRef<Path>, http: Arc<dyn HttpClient>) -> Result<Self, MediaError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let index = match fs::read_to_string(dir.join(INDEX_FILE)) {
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| MediaError::Store(format!("unreadable media index: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MediaIndex::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            dir,
            http,
            timeout: DOWNLOAD_TIMEOUT,
            index: Mutex::new(index),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, MediaIndex>, MediaError> {
        self.index
            .lock()
            .map_err(|_| MediaError::Store("media index lock poisoned".into()))
    }

    fn save_index(&self, index: &MediaIndex) -> Result<(), MediaError> {
        let bytes = serde_json::to_vec_pretty(index)
            .map_err(|e| MediaError::Store(format!("media index encode: {e}")))?;
        fs::write(self.dir.join(INDEX_FILE), bytes)?;
        Ok(())
    }

    pub fn entries(&self) -> Vec<MediaEntry> {
        self.lock().map(|i| i.entries.clone()).unwrap_or_default()
    }

    pub fn representative_of(&self, record: RecordId) -> Option<MediaEntry> {
        let index = self.lock().ok()?;
        let media = index.representative.get(&record)?;
        index.entries.iter().find(|e| e.id == *media).cloned()
    }

    pub fn path_of(&self, entry: &MediaEntry) -> PathBuf {
        self.dir.join(format!("{}-{}", entry.id, entry.filename))
    }
}

#[async_trait]
impl MediaStore for DirMediaStore {
    async fn download(&self, url: &str) -> Result<DownloadedFile, MediaError> {
        let download_err = |reason: String| MediaError::Download {
            url: url.to_string(),
            reason,
        };
        let resp = self
            .http
            .get(url, &RequestOptions::with_timeout(self.timeout))
            .await
            .map_err(|e| download_err(e.to_string()))?;
        if !resp.is_success() {
            return Err(download_err(format!("status code {}", resp.status)));
        }
        if resp.body.is_empty() {
            return Err(download_err("empty body".into()));
        }

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&resp.body)?;
        tmp.flush()?;
        Ok(DownloadedFile {
            path: tmp.into_temp_path(),
            source_url: url.to_string(),
            content_type: resp.content_type,
        })
    }

    async fn store(
        &self,
        file: DownloadedFile,
        filename: &str,
        mime: &str,
        owner: RecordId,
    ) -> Result<MediaId, MediaError> {
        let mut index = self.lock()?;
        let id = index.next_id + 1;
        let dest = self.dir.join(format!("{id}-{filename}"));
        file.path
            .persist(&dest)
            .map_err(|e| MediaError::Store(format!("{}: {}", dest.display(), e.error)))?;

        index.next_id = id;
        index.entries.push(MediaEntry {
            id,
            owner,
            filename: filename.to_string(),
            mime: mime.to_string(),
            source_url: file.source_url,
        });
        self.save_index(&index)?;
        tracing::debug!(target: "media", id, owner, path = %dest.display(), "media stored");
        Ok(id)
    }

    async fn set_representative_image(&self, record: RecordId, media: MediaId) -> Result<(), MediaError> {
        let mut index = self.lock()?;
        if !index.entries.iter().any(|e| e.id == media) {
            return Err(MediaError::Store(format!("unknown media id {media}")));
        }
        index.representative.insert(record, media);
        self.save_index(&index)
    }
}
