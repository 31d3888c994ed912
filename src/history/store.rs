use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::HistoryItem;
use crate::services::types::LandmarkDetails;

/// Most entries kept. Each entry carries an inline preview image, so the
/// list is kept short.
pub const HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Bounded list of past scans, newest first, at most one entry per place name.
pub struct HistoryStore {
    path: Option<PathBuf>,
    items: Vec<HistoryItem>,
    capacity: usize,
}

impl HistoryStore {
    /// Load the history file at `path`. A missing file is an empty history;
    /// an unreadable one is logged and replaced on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match load(&path) {
            Ok(mut items) => {
                items.truncate(HISTORY_CAPACITY);
                items
            }
            Err(e) => {
                warn!("Failed to load history from {}: {}", path.display(), e);
                Vec::new()
            }
        };
        debug!("History loaded: {} entries", items.len());

        Self {
            path: Some(path),
            items,
            capacity: HISTORY_CAPACITY,
        }
    }

    /// History that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            items: Vec::new(),
            capacity: HISTORY_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self.items.truncate(self.capacity);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Put a scan at the front, dropping any older entry with the same name
    /// and anything beyond capacity, then persist.
    pub fn record(
        &mut self,
        id: Uuid,
        name: &str,
        details: &LandmarkDetails,
        image_src: &str,
    ) -> Result<&HistoryItem, HistoryError> {
        self.items.retain(|item| item.name != name);
        self.items.insert(
            0,
            HistoryItem {
                id,
                timestamp: now_millis(),
                name: name.to_string(),
                description: details.description.clone(),
                image_src: image_src.to_string(),
                sources: details.sources.clone(),
                map_info: details.map_info.clone(),
                nearby_places: details.nearby_places.clone(),
            },
        );
        self.items.truncate(self.capacity);

        self.save()?;
        Ok(&self.items[0])
    }

    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.items.clear();
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn save(&self) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.items)?;
        // Write beside the target and rename so a crash never leaves half a file.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, path)?;
        Ok(())
    }
}

fn load(path: &Path) -> Result<Vec<HistoryItem>, HistoryError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
