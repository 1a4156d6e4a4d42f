//! Evidence materialization: turns stored evidence paths into inline images.
//!
//! A missing, unreadable or out-of-root file never fails a report. It only
//! yields an evidence block without an image and an `Unknown` orientation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::stream::{self, StreamExt};
use image::ImageReader;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::models::Evidence;

/// Segment older uploads stored in front of the real relative path.
const LEGACY_PREFIX: &str = "evidencias/";
const DEFAULT_MIME: &str = "image/jpeg";

/// Advisory aspect-ratio classification of an evidence photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
    Square,
    Unknown,
}

impl Orientation {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Self::Horizontal
        } else if height > width {
            Self::Vertical
        } else {
            Self::Square
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
            Self::Square => "square",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedEvidence {
    pub evidence_id: i64,
    /// `data:{mime};base64,{payload}`; absent when the file was not readable.
    pub data_uri: Option<String>,
    pub orientation: Orientation,
}

impl MaterializedEvidence {
    pub fn missing(evidence_id: i64) -> Self {
        Self {
            evidence_id,
            data_uri: None,
            orientation: Orientation::Unknown,
        }
    }
}

/// Clean a stored path: unify separators, drop leading separators and the
/// legacy `evidencias/` segment.
pub fn normalize_stored_path(stored: &str) -> String {
    let unified = stored.trim().replace('\\', "/");
    let relative = unified.trim_start_matches('/');
    relative
        .strip_prefix(LEGACY_PREFIX)
        .unwrap_or(relative)
        .to_string()
}

/// Resolve a stored evidence path under `root`.
///
/// Returns `None` when the path is empty or would leave the root, either
/// lexically (`..`) or through a symlink once the file exists.
pub fn resolve_in_root(root: &Path, stored: &str) -> Option<PathBuf> {
    let relative = normalize_stored_path(stored);

    let mut clean = PathBuf::new();
    for component in Path::new(&relative).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }

    let resolved = root.join(clean);
    if let (Ok(real_root), Ok(real_path)) = (root.canonicalize(), resolved.canonicalize()) {
        if !real_path.starts_with(&real_root) {
            return None;
        }
    }
    Some(resolved)
}

/// MIME type of an evidence file: by extension first, then by content.
pub fn detect_mime_type(path: &Path, bytes: &[u8]) -> String {
    if let Some(mime) = mime_guess::from_path(path).first() {
        if mime.type_() == mime_guess::mime::IMAGE {
            return mime.essence_str().to_string();
        }
    }
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => DEFAULT_MIME.to_string(),
    }
}

pub fn detect_orientation(bytes: &[u8]) -> Orientation {
    let dimensions = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());
    match dimensions {
        Some((width, height)) => Orientation::from_dimensions(width, height),
        None => Orientation::Unknown,
    }
}

pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Materialize one evidence item. Blocking; reads the whole file.
pub fn materialize(root: &Path, evidence: &Evidence) -> MaterializedEvidence {
    let Some(path) = resolve_in_root(root, &evidence.file_path) else {
        log::warn!(
            "Evidence {} has an unusable path '{}'",
            evidence.id,
            evidence.file_path
        );
        return MaterializedEvidence::missing(evidence.id);
    };

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!(
                "Evidence {} file {} not readable: {}",
                evidence.id,
                path.display(),
                e
            );
            return MaterializedEvidence::missing(evidence.id);
        }
    };

    let mime_type = detect_mime_type(&path, &bytes);
    MaterializedEvidence {
        evidence_id: evidence.id,
        data_uri: Some(to_data_uri(&mime_type, &bytes)),
        orientation: detect_orientation(&bytes),
    }
}

/// Reads evidence files from the storage root with a bounded number of
/// concurrent reads.
#[derive(Debug, Clone)]
pub struct EvidenceMaterializer {
    root: Arc<PathBuf>,
    concurrency: usize,
}

impl EvidenceMaterializer {
    pub fn new(root: impl Into<PathBuf>, concurrency: usize) -> Self {
        Self {
            root: Arc::new(root.into()),
            concurrency: concurrency.max(1),
        }
    }

    /// Materialize every item, keyed by evidence id.
    pub async fn materialize_all(
        &self,
        evidence: Vec<Evidence>,
    ) -> HashMap<i64, MaterializedEvidence> {
        let results: Vec<MaterializedEvidence> = stream::iter(evidence.into_iter().map(|item| {
            let root = Arc::clone(&self.root);
            async move {
                let id = item.id;
                match tokio::task::spawn_blocking(move || materialize(&root, &item)).await {
                    Ok(materialized) => materialized,
                    Err(e) => {
                        log::error!("Evidence {} read task failed: {}", id, e);
                        MaterializedEvidence::missing(id)
                    }
                }
            }
        }))
        .buffered(self.concurrency)
        .collect()
        .await;

        results
            .into_iter()
            .map(|m| (m.evidence_id, m))
            .collect()
    }
}
