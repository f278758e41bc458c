//! Final output artifacts of a completed run.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tmf921_core::{GeneratedIntent, InputIntent, ValidationStatus};

pub const RESULTS_FILE: &str = "tmf921_dataset.json";
pub const FALLBACK_FILE: &str = "fallback_intents.json";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub generation_date: DateTime<Utc>,
    pub completion_date: DateTime<Utc>,
    pub start_index: usize,
    pub end_index: usize,
    pub total: usize,
    pub valid: usize,
    pub fallback: usize,
    pub invalid: usize,
    pub provider: String,
}

/// The full result collection as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub metadata: DatasetMetadata,
    pub results: Vec<GeneratedIntent>,
}

impl Dataset {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OutputError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// One entry of the fallback list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackEntry {
    pub source_id: u64,
    pub text: String,
    pub diagnostics: Vec<String>,
}

/// Entries for every `fallback` result, in result order.
pub fn fallback_entries(results: &[GeneratedIntent], intents: &[InputIntent]) -> Vec<FallbackEntry> {
    let texts: HashMap<u64, &str> = intents.iter().map(|i| (i.id, i.text.as_str())).collect();
    results
        .iter()
        .filter(|r| r.validation_status == ValidationStatus::Fallback)
        .map(|r| FallbackEntry {
            source_id: r.source_id,
            text: texts.get(&r.source_id).copied().unwrap_or_default().to_string(),
            diagnostics: r.diagnostics.clone(),
        })
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let io_error = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let file = fs::File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(io_error)?;
    Ok(())
}

/// Write the dataset and the fallback list into `output_dir`.
///
/// The fallback file is always written, possibly as an empty list.
pub fn write_outputs(
    output_dir: &Path,
    dataset: &Dataset,
    fallbacks: &[FallbackEntry],
) -> Result<(PathBuf, PathBuf), OutputError> {
    let results_path = output_dir.join(RESULTS_FILE);
    let fallback_path = output_dir.join(FALLBACK_FILE);
    write_json(&results_path, dataset)?;
    write_json(&fallback_path, &fallbacks)?;
    Ok((results_path, fallback_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(id: u64, status: ValidationStatus) -> GeneratedIntent {
        GeneratedIntent {
            source_id: id,
            structured_document: json!({"id": id}),
            validation_status: status,
            diagnostics: if status == ValidationStatus::Valid {
                Vec::new()
            } else {
                vec!["[structural] \"name\" is a required property at /".to_string()]
            },
            provider_used: "mock".to_string(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_fallback_entries_filter_and_text() {
        let intents = vec![InputIntent::new(1, "first"), InputIntent::new(2, "second")];
        let results = vec![
            result(1, ValidationStatus::Valid),
            result(2, ValidationStatus::Fallback),
        ];
        let entries = fallback_entries(&results, &intents);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_id, 2);
        assert_eq!(entries[0].text, "second");
        assert_eq!(entries[0].diagnostics.len(), 1);
    }

    #[test]
    fn test_outputs_written_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let dataset = Dataset {
            metadata: DatasetMetadata {
                generation_date: now,
                completion_date: now,
                start_index: 0,
                end_index: 1,
                total: 1,
                valid: 1,
                fallback: 0,
                invalid: 0,
                provider: "groq".to_string(),
            },
            results: vec![result(1, ValidationStatus::Valid)],
        };

        let (results_path, fallback_path) = write_outputs(dir.path(), &dataset, &[]).unwrap();

        assert_eq!(Dataset::from_file(&results_path).unwrap(), dataset);
        let fallbacks: Vec<FallbackEntry> =
            serde_json::from_str(&fs::read_to_string(fallback_path).unwrap()).unwrap();
        assert!(fallbacks.is_empty());
    }
}
