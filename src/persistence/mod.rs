//! Scene import/export
//!
//! Features:
//! - JSON scene format shared with the web editor
//! - Lenient import (missing fields defaulted, numbers coerced)
//! - Slugified export file names

pub mod scene_file;
pub mod slug;

pub use scene_file::{
    BarRecord, ExportError, ImportError, PlaceholderRecord, SceneFile, SpawnerRecord,
};
pub use slug::{export_file_name, slugify};
