// ============================================================================
// PICK HISTORY: recently picked colors and recently opened images
// ============================================================================

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::color::ColorSample;
use crate::error::HistoryError;
use crate::storage::KeyValueStore;

pub const COLOR_KEY: &str = "colorHistory";
pub const IMAGE_KEY: &str = "imageHistory";

pub const MAX_COLORS: usize = 15;
pub const MAX_IMAGES: usize = 8;

/// Sizes the lists are cut down to when a save is rejected by the store.
pub const FALLBACK_COLORS: usize = 10;
pub const FALLBACK_IMAGES: usize = 5;

/// A recently opened image, kept as a small JPEG thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHistoryEntry {
    pub name: String,
    /// JPEG bytes, longest side at most [`crate::io::THUMBNAIL_MAX_SIDE`].
    /// Stored as a `data:image/jpeg;base64,` URL.
    #[serde(rename = "data", with = "data_url")]
    pub thumbnail: Vec<u8>,
    /// Creation time in milliseconds; identifies the entry.
    pub timestamp: u64,
}

mod data_url {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    const PREFIX: &str = "data:image/jpeg;base64,";

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}{}", PREFIX, STANDARD.encode(bytes)))
    }

    /// Accepts any `data:<mime>;base64,` URL as well as bare base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let payload = text
            .split_once(";base64,")
            .map_or(text.as_str(), |(_, payload)| payload);
        STANDARD.decode(payload).map_err(D::Error::custom)
    }
}

/// Which lists a history operation touched. The UI refreshes those.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryChange {
    pub colors: bool,
    pub images: bool,
}

impl HistoryChange {
    pub const NONE: HistoryChange = HistoryChange {
        colors: false,
        images: false,
    };
    pub const COLORS: HistoryChange = HistoryChange {
        colors: true,
        images: false,
    };
    pub const IMAGES: HistoryChange = HistoryChange {
        colors: false,
        images: true,
    };
    pub const BOTH: HistoryChange = HistoryChange {
        colors: true,
        images: true,
    };

    pub fn any(self) -> bool {
        self.colors || self.images
    }

    pub fn union(self, other: HistoryChange) -> HistoryChange {
        HistoryChange {
            colors: self.colors || other.colors,
            images: self.images || other.images,
        }
    }
}

/// Result of writing both lists to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// First write failed; the lists were truncated and the retry went through.
    SavedAfterTruncation,
    /// Both writes failed. History lives on in memory for this session only.
    Unsaved,
}

/// Bounded, most-recent-first color and image lists backed by a [`KeyValueStore`].
pub struct HistoryStore<S: KeyValueStore> {
    store: S,
    colors: Vec<ColorSample>,
    images: Vec<ImageHistoryEntry>,
}

impl<S: KeyValueStore> HistoryStore<S> {
    /// Wrap `store` and load whatever history it holds.
    pub fn open(store: S) -> Self {
        let mut history = Self {
            store,
            colors: Vec::new(),
            images: Vec::new(),
        };
        history.load();
        history
    }

    pub fn colors(&self) -> &[ColorSample] {
        &self.colors
    }

    pub fn images(&self) -> &[ImageHistoryEntry] {
        &self.images
    }

    pub fn color(&self, hex: &str) -> Option<&ColorSample> {
        self.colors.iter().find(|c| c.hex == hex)
    }

    pub fn image(&self, timestamp: u64) -> Option<&ImageHistoryEntry> {
        self.images.iter().find(|e| e.timestamp == timestamp)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Timestamp for a new image entry: wall-clock milliseconds, bumped past the
    /// newest existing entry so identities stay unique.
    pub fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.images
            .iter()
            .map(|e| e.timestamp.saturating_add(1))
            .max()
            .map_or(now, |next| next.max(now))
    }

    // ------------------------------------------------------------------------
    //  Mutations
    // ------------------------------------------------------------------------

    /// Prepend `sample` unless its hex is already present. A duplicate changes
    /// nothing and writes nothing.
    pub fn add_color(&mut self, sample: ColorSample) -> HistoryChange {
        if self.colors.iter().any(|c| c.hex == sample.hex) {
            return HistoryChange::NONE;
        }
        self.colors.insert(0, sample);
        self.colors.truncate(MAX_COLORS);
        HistoryChange::COLORS.union(self.save_change())
    }

    pub fn delete_color(&mut self, hex: &str) -> HistoryChange {
        if let Some(idx) = self.colors.iter().position(|c| c.hex == hex) {
            self.colors.remove(idx);
        }
        HistoryChange::COLORS.union(self.save_change())
    }

    pub fn add_image(&mut self, entry: ImageHistoryEntry) -> HistoryChange {
        self.images.insert(0, entry);
        self.images.truncate(MAX_IMAGES);
        HistoryChange::IMAGES.union(self.save_change())
    }

    pub fn delete_image(&mut self, timestamp: u64) -> HistoryChange {
        self.images.retain(|e| e.timestamp != timestamp);
        HistoryChange::IMAGES.union(self.save_change())
    }

    fn save_change(&mut self) -> HistoryChange {
        match self.save() {
            SaveOutcome::SavedAfterTruncation => HistoryChange::BOTH,
            SaveOutcome::Saved | SaveOutcome::Unsaved => HistoryChange::NONE,
        }
    }

    // ------------------------------------------------------------------------
    //  Persistence
    // ------------------------------------------------------------------------

    /// Replace both lists with what the store holds. A record that cannot be read
    /// or decoded leaves its list empty; the error is logged and startup goes on.
    pub fn load(&mut self) {
        self.colors = match self.read_record::<ColorSample>(COLOR_KEY) {
            Ok(colors) => normalize_colors(colors),
            Err(e) => {
                log_warn!("Color history discarded: {}", e);
                Vec::new()
            }
        };
        self.images = match self.read_record::<ImageHistoryEntry>(IMAGE_KEY) {
            Ok(mut images) => {
                images.truncate(MAX_IMAGES);
                images
            }
            Err(e) => {
                log_warn!("Image history discarded: {}", e);
                Vec::new()
            }
        };
        log_info!(
            "History loaded: {} colors, {} images",
            self.colors.len(),
            self.images.len()
        );
    }

    /// Write both lists. If the store rejects the write, cut the lists down to
    /// [`FALLBACK_COLORS`] / [`FALLBACK_IMAGES`], wipe the store and try once more.
    /// A second failure is logged and swallowed.
    pub fn save(&mut self) -> SaveOutcome {
        let err = match self.write_records() {
            Ok(()) => return SaveOutcome::Saved,
            Err(e) => e,
        };
        log_warn!("History save failed ({}), truncating and retrying", err);

        self.colors.truncate(FALLBACK_COLORS);
        self.images.truncate(FALLBACK_IMAGES);
        if let Err(e) = self.store.clear() {
            log_warn!("Clearing history storage failed: {}", e);
        }

        match self.write_records() {
            Ok(()) => SaveOutcome::SavedAfterTruncation,
            Err(e) => {
                log_err!("History retry save failed, keeping in memory only: {}", e);
                SaveOutcome::Unsaved
            }
        }
    }

    fn read_record<T: serde::de::DeserializeOwned>(
        &self,
        key: &'static str,
    ) -> Result<Vec<T>, HistoryError> {
        match self.store.get(key)? {
            Some(text) => {
                serde_json::from_str(&text).map_err(|source| HistoryError::Corrupt { key, source })
            }
            None => Ok(Vec::new()),
        }
    }

    fn write_records(&mut self) -> Result<(), HistoryError> {
        let colors = serde_json::to_string(&self.colors).map_err(HistoryError::Encode)?;
        let images = serde_json::to_string(&self.images).map_err(HistoryError::Encode)?;
        self.store.set(COLOR_KEY, &colors)?;
        self.store.set(IMAGE_KEY, &images)?;
        Ok(())
    }
}

/// Drop entries whose hex disagrees with their channels, keep the first of any
/// duplicate hex, and cap the length.
fn normalize_colors(colors: Vec<ColorSample>) -> Vec<ColorSample> {
    let mut out: Vec<ColorSample> = Vec::with_capacity(colors.len().min(MAX_COLORS));
    for color in colors {
        if out.len() == MAX_COLORS {
            break;
        }
        if color.is_consistent() && !out.iter().any(|c| c.hex == color.hex) {
            out.push(color);
        }
    }
    out
}
