//! Media gallery storage
//!
//! Handles:
//! - Directory scan and overlay metadata (hidden, order, caption)
//! - View/download counters
//! - Zip bundles and single-file reads

mod counters;
mod media;

pub use counters::{InMemoryMediaCounters, MediaCounterStore, MediaCounters, MediaEvent};
pub use media::{
    DEFAULT_PAGE_SIZE, MAX_CAPTION_LENGTH, MAX_PAGE_SIZE, MediaBundle, MediaCatalog, MediaFile,
    MediaFilters, MediaItem, MediaKind, MediaMeta, MediaMetaUpdate, MediaPage, MediaQuery,
    MediaSort, MediaStats, Pagination, apply_query, content_type_for,
};
