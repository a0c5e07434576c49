//! Persisted user preferences
//!
//! Only the transport tag is stored. A missing or unrecognized value reads
//! as the store's default tag.

use crate::error::PreferenceError;
use moveecho_core::TransportTag;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub trait PreferenceStore: Send + Sync {
    /// Current transport tag; never fails
    fn transport_tag(&self) -> TransportTag;

    fn set_transport_tag(&self, tag: TransportTag) -> Result<(), PreferenceError>;
}

fn resolve(raw: Option<&str>, default: TransportTag) -> TransportTag {
    match raw {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|e| {
            debug!(value = value, error = %e, "Unrecognized transport preference");
            default
        }),
    }
}

/// Preferences held in memory for the life of the process
#[derive(Debug)]
pub struct MemoryPreferences {
    raw: RwLock<Option<String>>,
    default: TransportTag,
}

impl Default for MemoryPreferences {
    fn default() -> Self {
        Self::new(TransportTag::default())
    }
}

impl MemoryPreferences {
    pub fn new(default: TransportTag) -> Self {
        Self {
            raw: RwLock::new(None),
            default,
        }
    }

    /// Stores an arbitrary raw value, as another writer of the store might
    pub fn set_raw(&self, value: impl Into<String>) {
        *self.raw.write() = Some(value.into());
    }
}

impl PreferenceStore for MemoryPreferences {
    fn transport_tag(&self) -> TransportTag {
        resolve(self.raw.read().as_deref(), self.default)
    }

    fn set_transport_tag(&self, tag: TransportTag) -> Result<(), PreferenceError> {
        *self.raw.write() = Some(tag.as_str().to_string());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transport_type: Option<String>,
}

/// Preferences stored in a small YAML file.
///
/// The file is read on every query, so changes made by another process
/// (such as `moveecho set-transport`) apply to the next sample.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
    default: TransportTag,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>, default: TransportTag) -> Self {
        Self {
            path: path.into(),
            default,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<PreferenceFile, PreferenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_yaml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PreferenceFile::default()),
            Err(source) => Err(PreferenceError::Io {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}

impl PreferenceStore for FilePreferences {
    fn transport_tag(&self) -> TransportTag {
        match self.load() {
            Ok(file) => resolve(file.transport_type.as_deref(), self.default),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable preferences, using default");
                self.default
            }
        }
    }

    fn set_transport_tag(&self, tag: TransportTag) -> Result<(), PreferenceError> {
        let mut file = self.load().unwrap_or_default();
        file.transport_type = Some(tag.as_str().to_string());

        let contents = serde_yaml::to_string(&file)?;
        std::fs::write(&self.path, contents).map_err(|source| PreferenceError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        debug!(path = %self.path.display(), transport = %tag, "Transport preference saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_defaults_to_car() {
        let prefs = MemoryPreferences::default();
        assert_eq!(prefs.transport_tag(), TransportTag::Car);

        prefs.set_transport_tag(TransportTag::Bike).unwrap();
        assert_eq!(prefs.transport_tag(), TransportTag::Bike);
    }

    #[test]
    fn test_unrecognized_value_falls_back() {
        let prefs = MemoryPreferences::new(TransportTag::Walking);
        prefs.set_raw("skateboard");
        assert_eq!(prefs.transport_tag(), TransportTag::Walking);

        prefs.set_raw("TRUCK");
        assert_eq!(prefs.transport_tag(), TransportTag::Truck);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.yaml");
        let prefs = FilePreferences::new(&path, TransportTag::Car);

        assert_eq!(prefs.transport_tag(), TransportTag::Car);

        prefs.set_transport_tag(TransportTag::Motorcycle).unwrap();
        assert_eq!(prefs.transport_tag(), TransportTag::Motorcycle);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("transport_type: motorcycle"));
    }

    #[test]
    fn test_corrupt_file_reads_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.yaml");
        std::fs::write(&path, "transport_type: [unclosed").unwrap();

        let prefs = FilePreferences::new(&path, TransportTag::Bike);
        assert_eq!(prefs.transport_tag(), TransportTag::Bike);

        // Writing replaces the unreadable file
        prefs.set_transport_tag(TransportTag::Truck).unwrap();
        assert_eq!(prefs.transport_tag(), TransportTag::Truck);
    }
}
