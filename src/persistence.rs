//! Persistence layer for relevance and training records.
//!
//! Supports both JSON (human-readable) and bincode (efficient binary) formats.
//! Every record carries a format version and is validated after decoding, so a
//! damaged or hand-edited file surfaces as [`RankTunerError::CorruptPersistedState`]
//! instead of being read blindly.

use crate::error::{RankTunerError, Result};
use bincode::{Decode, Encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Current on-disk record version.
pub const RECORD_VERSION: u32 = 1;

/// Upper bound on bytes a bincode record may claim while decoding.
const MAX_DECODE_BYTES: usize = 64 * 1024 * 1024;

/// Save format for records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    #[default]
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SaveFormat::Json,
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json, // Default to JSON
        }
    }

    /// File extension used when naming new records.
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Json => "json",
            SaveFormat::Bincode => "bin",
        }
    }

    /// Parse a format name (`json` or `bincode`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(SaveFormat::Json),
            "bin" | "bincode" => Some(SaveFormat::Bincode),
            _ => None,
        }
    }
}

/// A record that can be written to and read back from disk.
pub trait PersistedRecord: Serialize + DeserializeOwned + Encode + Decode<()> {
    /// Format version stored in the record.
    fn version(&self) -> u32;

    /// Structural checks run after decoding. The message becomes the
    /// `reason` of a `CorruptPersistedState` error.
    fn validate(&self) -> std::result::Result<(), String>;
}

/// Save a record, choosing the format from the file extension.
pub fn save_record<T: PersistedRecord>(record: &T, path: &Path) -> Result<()> {
    let format = SaveFormat::from_path(path);
    save_record_with_format(record, path, format)
}

/// Save a record with a specific format.
fn save_record_with_format<T: PersistedRecord>(
    record: &T,
    path: &Path,
    format: SaveFormat,
) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RankTunerError::io(parent, e))?;
        }
    }

    let data = match format {
        SaveFormat::Json => serde_json::to_string_pretty(record)
            .map_err(|e| RankTunerError::Serialization(e.to_string()))?
            .into_bytes(),
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            bincode::encode_to_vec(record, config)
                .map_err(|e| RankTunerError::Serialization(e.to_string()))?
        }
    };

    // Write beside the target and rename over it, so an interrupted save
    // leaves the previous record intact.
    let tmp = temp_path(path);
    fs::write(&tmp, &data).map_err(|e| RankTunerError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(RankTunerError::io(path, e));
    }

    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Load a record, returning `None` when the file does not exist yet.
pub fn load_record<T: PersistedRecord>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let format = SaveFormat::from_path(path);
    load_record_with_format(path, format).map(Some)
}

/// Load a record with a specific format. The file must exist.
pub fn load_record_with_format<T: PersistedRecord>(path: &Path, format: SaveFormat) -> Result<T> {
    let data = fs::read(path).map_err(|e| RankTunerError::io(path, e))?;

    let record: T = match format {
        SaveFormat::Json => {
            let json_str =
                String::from_utf8(data).map_err(|e| RankTunerError::corrupt(path, e.to_string()))?;
            serde_json::from_str(&json_str).map_err(|e| RankTunerError::corrupt(path, e.to_string()))?
        }
        SaveFormat::Bincode => {
            let config = bincode::config::standard().with_limit::<MAX_DECODE_BYTES>();
            let (record, read): (T, usize) = bincode::decode_from_slice(&data, config)
                .map_err(|e| RankTunerError::corrupt(path, e.to_string()))?;
            if read != data.len() {
                return Err(RankTunerError::corrupt(
                    path,
                    format!("{} trailing bytes after record", data.len() - read),
                ));
            }
            record
        }
    };

    if record.version() != RECORD_VERSION {
        return Err(RankTunerError::corrupt(
            path,
            format!(
                "unsupported record version {} (expected {})",
                record.version(),
                RECORD_VERSION
            ),
        ));
    }
    record
        .validate()
        .map_err(|reason| RankTunerError::corrupt(path, reason))?;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize, Encode, Decode)]
    struct Sample {
        version: u32,
        values: Vec<u32>,
    }

    impl PersistedRecord for Sample {
        fn version(&self) -> u32 {
            self.version
        }

        fn validate(&self) -> std::result::Result<(), String> {
            if self.values.is_empty() {
                return Err("no values".to_string());
            }
            Ok(())
        }
    }

    fn sample() -> Sample {
        Sample {
            version: RECORD_VERSION,
            values: vec![3, 1, 4],
        }
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/sample.json");

        save_record(&sample(), &path).unwrap();
        assert!(path.is_file());

        let loaded: Sample = load_record(&path).unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_save_and_load_bincode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.bin");

        save_record(&sample(), &path).unwrap();
        let loaded: Sample = load_record(&path).unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded: Option<Sample> = load_record(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        fs::write(&path, "3\nuiuc housing\n").unwrap();

        let result: Result<Option<Sample>> = load_record(&path);
        assert!(matches!(
            result,
            Err(RankTunerError::CorruptPersistedState { .. })
        ));
    }

    #[test]
    fn test_bincode_oversized_length_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.bin");
        // version 1, then a values length claiming 2^40 entries
        let mut bytes = vec![1u8, 253];
        bytes.extend_from_slice(&(1u64 << 40).to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        let result: Result<Option<Sample>> = load_record(&path);
        assert!(matches!(
            result,
            Err(RankTunerError::CorruptPersistedState { .. })
        ));
    }

    #[test]
    fn test_save_replaces_existing_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        save_record(&sample(), &path).unwrap();

        let updated = Sample {
            version: RECORD_VERSION,
            values: vec![2, 7],
        };
        save_record(&updated, &path).unwrap();

        let loaded: Sample = load_record(&path).unwrap().unwrap();
        assert_eq!(loaded, updated);
        assert!(!temp_path(&path).exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_wrong_version_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        fs::write(&path, r#"{"version": 99, "values": [1]}"#).unwrap();

        let result: Result<Option<Sample>> = load_record(&path);
        assert!(matches!(
            result,
            Err(RankTunerError::CorruptPersistedState { .. })
        ));
    }

    #[test]
    fn test_validation_failure_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        fs::write(&path, r#"{"version": 1, "values": []}"#).unwrap();

        match load_record::<Sample>(&path) {
            Err(RankTunerError::CorruptPersistedState { reason, .. }) => {
                assert_eq!(reason, "no values")
            }
            other => panic!("expected corrupt state, got {:?}", other),
        }
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            SaveFormat::from_path(Path::new("uiuc_relevance.json")),
            SaveFormat::Json
        );
        assert_eq!(
            SaveFormat::from_path(Path::new("bm25_ranker.bin")),
            SaveFormat::Bincode
        );
        assert_eq!(SaveFormat::from_path(Path::new("test")), SaveFormat::Json);
        assert_eq!(SaveFormat::parse("BINCODE"), Some(SaveFormat::Bincode));
        assert_eq!(SaveFormat::parse("yaml"), None);
    }
}
