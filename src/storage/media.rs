//! Media gallery catalog
//!
//! Scans the gallery directory for images and videos and merges each file
//! with its overlay entry (`hidden`, `order`, `caption`). The overlay is a
//! JSON map stored next to the files; view and download counters come from
//! a [`MediaCounterStore`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::counters::{InMemoryMediaCounters, MediaCounterStore, MediaEvent};
use crate::error::AppError;

/// Captions longer than this are truncated on save
pub const MAX_CAPTION_LENGTH: usize = 240;

pub const DEFAULT_PAGE_SIZE: usize = 30;
pub const MAX_PAGE_SIZE: usize = 80;

/// Served extensions and their content types
const ALLOWED_EXTENSIONS: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
];

/// Content type for a gallery filename, `None` when the extension is not served
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .iter()
        .find(|(allowed, _)| *allowed == ext)
        .map(|(_, content_type)| *content_type)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video/") {
            Self::Video
        } else {
            Self::Image
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Overlay entry for one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaMeta {
    pub hidden: bool,
    pub order: i64,
    pub caption: String,
}

/// Partial overlay update; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaMetaUpdate {
    pub hidden: Option<bool>,
    pub order: Option<i64>,
    pub caption: Option<String>,
}

/// One gallery file as listed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub caption: String,
    pub order: i64,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub views: u64,
    pub downloads: u64,
}

/// Raw listing parameters as they arrive in the query string
///
/// Unparseable numbers fall back to their defaults instead of rejecting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaQuery {
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSort {
    Name,
    Oldest,
    Newest,
}

impl MediaSort {
    /// Anything other than `name` or `oldest` sorts newest first
    pub fn parse(value: &str) -> Self {
        match value {
            "name" => Self::Name,
            "oldest" => Self::Oldest,
            _ => Self::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Oldest => "oldest",
            Self::Newest => "newest",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Normalized filters, echoed back to the caller
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MediaFilters {
    #[serde(rename = "type")]
    pub media_type: String,
    pub search: String,
    pub sort: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaPage {
    pub items: Vec<MediaItem>,
    pub pagination: Pagination,
    pub filters: MediaFilters,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaStats {
    pub total_media: usize,
    pub total_views: u64,
    pub total_downloads: u64,
}

/// Zip archive spooled to an anonymous temp file, rewound to the start,
/// and the names it contains
#[derive(Debug)]
pub struct MediaBundle {
    pub file: std::fs::File,
    pub len: u64,
    pub included: Vec<String>,
}

/// Open gallery file ready to stream
#[derive(Debug)]
pub struct MediaFile {
    pub file: tokio::fs::File,
    pub len: u64,
    pub content_type: &'static str,
}

fn parse_number(raw: Option<&str>, fallback: i64) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(fallback)
}

/// Filter, sort and optionally paginate a listing.
///
/// The requested sort is applied first, then a stable sort on `order`, so
/// `order` ascending is the primary key and the requested sort breaks ties.
pub fn apply_query(items: Vec<MediaItem>, query: &MediaQuery, paginate: bool) -> MediaPage {
    let media_type = query
        .media_type
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "all".to_string());
    let search = query
        .search
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .unwrap_or_default();
    let sort = MediaSort::parse(
        &query
            .sort
            .as_deref()
            .map(|value| value.trim().to_lowercase())
            .unwrap_or_default(),
    );
    let page = parse_number(query.page.as_deref(), 1).max(1) as usize;
    let page_size = parse_number(query.page_size.as_deref(), DEFAULT_PAGE_SIZE as i64)
        .clamp(1, MAX_PAGE_SIZE as i64) as usize;

    let kind = MediaKind::parse(&media_type);
    let mut filtered: Vec<MediaItem> = items
        .into_iter()
        .filter(|item| kind.is_none_or(|kind| item.kind == kind))
        .filter(|item| {
            search.is_empty()
                || item.name.to_lowercase().contains(&search)
                || item.caption.to_lowercase().contains(&search)
        })
        .collect();

    match sort {
        MediaSort::Name => filtered.sort_by_key(|item| item.name.to_lowercase()),
        MediaSort::Oldest => filtered.sort_by_key(|item| item.created_at),
        MediaSort::Newest => filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
    filtered.sort_by_key(|item| item.order);

    let total = filtered.len();
    let items = if paginate {
        filtered
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect()
    } else {
        filtered
    };

    MediaPage {
        items,
        pagination: Pagination {
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size).max(1),
        },
        filters: MediaFilters {
            media_type,
            search,
            sort: sort.as_str().to_string(),
        },
    }
}

fn io_error(err: std::io::Error) -> AppError {
    AppError::Internal(err.into())
}

/// Gallery catalog over one directory
pub struct MediaCatalog {
    /// Directory scanned for gallery files
    root: PathBuf,
    /// Overlay filename inside `root`
    meta_file: String,
    counters: Arc<dyn MediaCounterStore>,
    /// Serializes overlay read-modify-write cycles
    overlay_lock: Mutex<()>,
}

impl MediaCatalog {
    pub fn new(
        root: impl Into<PathBuf>,
        meta_file: impl Into<String>,
        counters: Arc<dyn MediaCounterStore>,
    ) -> Self {
        Self {
            root: root.into(),
            meta_file: meta_file.into(),
            counters,
            overlay_lock: Mutex::new(()),
        }
    }

    /// Catalog with fresh in-memory counters
    pub fn in_memory(root: impl Into<PathBuf>, meta_file: impl Into<String>) -> Self {
        Self::new(root, meta_file, Arc::new(InMemoryMediaCounters::new()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn overlay_path(&self) -> PathBuf {
        self.root.join(&self.meta_file)
    }

    /// Read the overlay; a missing or malformed file reads as empty and
    /// malformed entries are skipped individually.
    async fn load_overlay(&self) -> BTreeMap<String, MediaMeta> {
        let Ok(raw) = tokio::fs::read_to_string(self.overlay_path()).await else {
            return BTreeMap::new();
        };

        let Ok(serde_json::Value::Object(entries)) = serde_json::from_str(&raw) else {
            tracing::warn!(path = %self.overlay_path().display(), "Ignoring malformed media overlay");
            return BTreeMap::new();
        };

        entries
            .into_iter()
            .filter_map(|(name, value)| {
                serde_json::from_value::<MediaMeta>(value)
                    .ok()
                    .map(|meta| (name, meta))
            })
            .collect()
    }

    /// Replace the overlay file atomically
    async fn save_overlay(&self, overlay: &BTreeMap<String, MediaMeta>) -> Result<(), AppError> {
        let json = serde_json::to_vec_pretty(overlay).map_err(|e| AppError::Internal(e.into()))?;
        let root = self.root.clone();
        let target = self.overlay_path();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = tempfile::NamedTempFile::new_in(&root)?;
            file.write_all(&json)?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(io_error)
    }

    /// Path and content type of a served file directly inside the root.
    ///
    /// `None` for separators, parent references, unknown extensions,
    /// symlinks leading outside the root and anything that is not a file.
    async fn resolve(&self, name: &str) -> Option<(PathBuf, &'static str)> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return None,
        }
        if name.contains('\\') {
            return None;
        }

        let content_type = content_type_for(name)?;
        let root = tokio::fs::canonicalize(&self.root).await.ok()?;
        let path = tokio::fs::canonicalize(root.join(name)).await.ok()?;
        if path.parent() != Some(root.as_path()) {
            return None;
        }

        let metadata = tokio::fs::metadata(&path).await.ok()?;
        metadata.is_file().then_some((path, content_type))
    }

    /// List gallery files in case-insensitive name order.
    ///
    /// A missing root is an empty gallery.
    pub async fn list(&self, include_hidden: bool) -> Result<Vec<MediaItem>, AppError> {
        let is_dir = tokio::fs::metadata(&self.root)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Ok(Vec::new());
        }

        let overlay = self.load_overlay().await;
        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(io_error)?;
        let mut files = Vec::new();

        while let Some(entry) = dir.next_entry().await.map_err(io_error)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(content_type) = content_type_for(&name) else {
                continue;
            };
            let metadata = entry.metadata().await.map_err(io_error)?;
            if !metadata.is_file() {
                continue;
            }
            files.push((name, content_type, metadata));
        }

        files.sort_by_key(|(name, _, _)| name.to_lowercase());

        let mut items = Vec::with_capacity(files.len());
        for (name, content_type, metadata) in files {
            let meta = overlay.get(&name).cloned().unwrap_or_default();
            if meta.hidden && !include_hidden {
                continue;
            }

            let counters = self.counters.get(&name).await;
            items.push(MediaItem {
                url: format!("/media/{}", urlencoding::encode(&name)),
                kind: MediaKind::from_content_type(content_type),
                caption: meta.caption,
                order: meta.order,
                hidden: meta.hidden,
                created_at: metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_default(),
                size_bytes: metadata.len(),
                views: counters.views,
                downloads: counters.downloads,
                name,
            });
        }

        Ok(items)
    }

    /// List then filter, sort and paginate
    pub async fn query(
        &self,
        include_hidden: bool,
        query: &MediaQuery,
    ) -> Result<MediaPage, AppError> {
        let items = self.list(include_hidden).await?;
        Ok(apply_query(items, query, true))
    }

    /// Totals over every file, hidden ones included
    pub async fn stats(&self) -> Result<MediaStats, AppError> {
        let items = self.list(true).await?;
        Ok(MediaStats {
            total_media: items.len(),
            total_views: items.iter().map(|item| item.views).sum(),
            total_downloads: items.iter().map(|item| item.downloads).sum(),
        })
    }

    /// Merge `update` into the overlay entry of an existing file.
    ///
    /// # Errors
    /// - `Validation` for an empty name
    /// - `NotFound` when the file does not exist in the gallery
    pub async fn update_meta(
        &self,
        name: &str,
        update: MediaMetaUpdate,
    ) -> Result<MediaMeta, AppError> {
        self.update_meta_with(name, update, |_| async { Ok(()) }).await
    }

    /// [`MediaCatalog::update_meta`], then `commit` with the saved entry
    /// while the overlay is still locked. When `commit` fails the previous
    /// overlay is written back and its error returned.
    pub async fn update_meta_with<F, Fut>(
        &self,
        name: &str,
        update: MediaMetaUpdate,
        commit: F,
    ) -> Result<MediaMeta, AppError>
    where
        F: FnOnce(MediaMeta) -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Invalid media name"));
        }
        if self.resolve(name).await.is_none() {
            return Err(AppError::not_found("Media not found"));
        }

        let _guard = self.overlay_lock.lock().await;
        let mut overlay = self.load_overlay().await;
        let current = overlay.get(name).cloned().unwrap_or_default();

        let updated = MediaMeta {
            hidden: update.hidden.unwrap_or(current.hidden),
            order: update.order.unwrap_or(current.order),
            caption: update
                .caption
                .unwrap_or(current.caption)
                .chars()
                .take(MAX_CAPTION_LENGTH)
                .collect(),
        };

        let previous = overlay.clone();
        overlay.insert(name.to_string(), updated.clone());
        self.save_overlay(&overlay).await?;

        if let Err(error) = commit(updated.clone()).await {
            if let Err(restore_error) = self.save_overlay(&previous).await {
                tracing::error!(media = %name, error = %restore_error, "Failed to restore media overlay");
            }
            return Err(error);
        }

        tracing::info!(media = %name, hidden = updated.hidden, order = updated.order, "Media metadata updated");
        Ok(updated)
    }

    /// Count a view or download of a served gallery file.
    ///
    /// # Errors
    /// - `Validation` for an empty name or an unknown event kind
    /// - `NotFound` when no served file has that name
    pub async fn record_event(&self, name: &str, event: &str) -> Result<(), AppError> {
        let name = name.trim();
        let event = MediaEvent::parse(event)
            .filter(|_| !name.is_empty())
            .ok_or_else(|| AppError::validation("Invalid media event"))?;

        if self.resolve(name).await.is_none() {
            return Err(AppError::not_found("Media not found"));
        }

        self.count(name, event).await;
        Ok(())
    }

    async fn count(&self, name: &str, event: MediaEvent) {
        self.counters.increment(name, event).await;
        crate::metrics::MEDIA_EVENTS_TOTAL
            .with_label_values(&[event.as_str()])
            .inc();
    }

    /// Zip the requested files that still exist, skipping vanished ones
    pub async fn bundle(&self, items: &[MediaItem]) -> Result<MediaBundle, AppError> {
        let mut files = Vec::with_capacity(items.len());
        for item in items {
            if let Some((path, _)) = self.resolve(&item.name).await {
                files.push((item.name.clone(), path));
            }
        }

        tokio::task::spawn_blocking(move || -> anyhow::Result<MediaBundle> {
            let mut writer = zip::ZipWriter::new(tempfile::tempfile()?);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            let mut included = Vec::with_capacity(files.len());

            for (name, path) in files {
                // Removed between resolve and open
                let Ok(mut source) = std::fs::File::open(&path) else {
                    continue;
                };
                writer.start_file(name.as_str(), options)?;
                std::io::copy(&mut source, &mut writer)?;
                included.push(name);
            }

            let mut file = writer.finish()?;
            file.flush()?;
            let len = file.seek(SeekFrom::End(0))?;
            file.seek(SeekFrom::Start(0))?;
            Ok(MediaBundle {
                file,
                len,
                included,
            })
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(AppError::Internal)
    }

    /// Bundle the filtered public listing without pagination and count a
    /// download for every file in the archive
    pub async fn download_all(&self, query: &MediaQuery) -> Result<MediaBundle, AppError> {
        let items = self.list(false).await?;
        let page = apply_query(items, query, false);
        let bundle = self.bundle(&page.items).await?;

        for name in &bundle.included {
            self.count(name, MediaEvent::Download).await;
        }

        tracing::info!(files = bundle.included.len(), bytes = bundle.len, "Media bundle built");
        Ok(bundle)
    }

    /// Open one gallery file.
    ///
    /// # Errors
    /// `NotFound` for unknown names and paths escaping the root
    pub async fn read(&self, name: &str) -> Result<MediaFile, AppError> {
        let (path, content_type) = self
            .resolve(name.trim())
            .await
            .ok_or_else(|| AppError::not_found("Media not found"))?;

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => AppError::not_found("Media not found"),
                _ => io_error(err),
            })?;
        let len = file.metadata().await.map_err(io_error)?.len();

        Ok(MediaFile {
            file,
            len,
            content_type,
        })
    }
}
