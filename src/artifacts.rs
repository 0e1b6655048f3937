//! Persistence of trained artifacts.
//!
//! Each artifact is a bincode-encoded envelope carrying a kind tag and a
//! format version ahead of the payload, so serving refuses files written for
//! a different artifact or by an incompatible build. Reads are bounded by
//! the file length, so a corrupt length prefix fails instead of allocating.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::engine::{SimilarityTable, SvdModel};
use crate::error::{AppError, AppResult};
use crate::models::Catalog;

pub const FORMAT_VERSION: u32 = 1;

pub const CATALOG_FILE: &str = "catalog.bin";
pub const SIMILARITY_FILE: &str = "similarity.bin";
pub const RATING_MODEL_FILE: &str = "rating_model.bin";

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

/// Values that can be written as a standalone artifact
pub trait Artifact: Serialize + DeserializeOwned {
    const KIND: &'static str;
}

impl Artifact for Catalog {
    const KIND: &'static str = "catalog";
}

impl Artifact for SimilarityTable {
    const KIND: &'static str = "similarity_table";
}

impl Artifact for SvdModel {
    const KIND: &'static str = "rating_model";
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    kind: &'a str,
    version: u32,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Header {
    kind: String,
    version: u32,
}

/// Writes `value` to `path` through a temporary file and a rename.
pub fn save<T: Artifact>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        let envelope = EnvelopeRef {
            kind: T::KIND,
            version: FORMAT_VERSION,
            payload: value,
        };
        bincode_options()
            .serialize_into(&mut writer, &envelope)
            .map_err(|e| AppError::Internal(format!("Failed to encode {}: {}", T::KIND, e)))?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;

    tracing::info!(kind = T::KIND, path = %path.display(), "Saved artifact");
    Ok(())
}

fn load_error<T: Artifact, E: std::fmt::Display>(path: &Path, e: E) -> AppError {
    AppError::ArtifactLoad(format!("{} ({}): {}", T::KIND, path.display(), e))
}

/// Reads an artifact, failing on a missing, corrupt or mismatched file.
pub fn load<T: Artifact>(path: &Path) -> AppResult<T> {
    let file = File::open(path).map_err(|e| load_error::<T, _>(path, e))?;
    let limit = file.metadata().map_err(|e| load_error::<T, _>(path, e))?.len();
    let mut reader = BufReader::new(file);

    let header: Header = bincode_options()
        .with_limit(limit)
        .deserialize_from(&mut reader)
        .map_err(|e| load_error::<T, _>(path, e))?;
    if header.kind != T::KIND {
        return Err(AppError::ArtifactLoad(format!(
            "{} holds a {} artifact, expected {}",
            path.display(),
            header.kind,
            T::KIND
        )));
    }
    if header.version != FORMAT_VERSION {
        return Err(AppError::ArtifactLoad(format!(
            "{} has format version {}, expected {}",
            path.display(),
            header.version,
            FORMAT_VERSION
        )));
    }

    let value: T = bincode_options()
        .with_limit(limit)
        .deserialize_from(&mut reader)
        .map_err(|e| load_error::<T, _>(path, e))?;
    tracing::info!(kind = T::KIND, path = %path.display(), "Loaded artifact");
    Ok(value)
}

/// Locations of the three artifacts inside an artifacts directory
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub catalog: PathBuf,
    pub similarity: PathBuf,
    pub rating_model: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            catalog: dir.join(CATALOG_FILE),
            similarity: dir.join(SIMILARITY_FILE),
            rating_model: dir.join(RATING_MODEL_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{RatingPredictor, SimilarityParams, SvdParams};
    use crate::models::{Interaction, Item};
    use chrono::{DateTime, Utc};

    fn items() -> Vec<Item> {
        vec![
            Item {
                id: 1,
                title: "Toy Story".to_string(),
                year: Some(1995),
                tags: vec!["Animation".to_string(), "Comedy".to_string()],
            },
            Item {
                id: 2,
                title: "Jumanji".to_string(),
                year: Some(1995),
                tags: vec!["Adventure".to_string(), "Comedy".to_string()],
            },
        ]
    }

    #[test]
    fn test_catalog_round_trip_rebuilds_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CATALOG_FILE);
        let catalog = Catalog::new(items());

        save(&path, &catalog).unwrap();
        let loaded: Catalog = load(&path).unwrap();

        assert_eq!(loaded, catalog);
        assert_eq!(loaded.id_for_title("Jumanji"), Some(2));
    }

    #[test]
    fn test_similarity_round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SIMILARITY_FILE);
        let table = SimilarityTable::fit(&items(), &SimilarityParams::default());

        save(&path, &table).unwrap();
        let loaded: SimilarityTable = load(&path).unwrap();

        assert_eq!(loaded.similarity(1, 2), table.similarity(1, 2));
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_rating_model_round_trip_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RATING_MODEL_FILE);
        let timestamp = DateTime::<Utc>::from_timestamp(978300760, 0).unwrap();
        let ratings: Vec<Interaction> = [(1, 1, 5), (1, 2, 3), (2, 1, 4)]
            .into_iter()
            .map(|(user_id, item_id, rating)| Interaction {
                user_id,
                item_id,
                rating,
                timestamp,
            })
            .collect();
        let params = SvdParams {
            n_factors: 4,
            n_epochs: 3,
            ..SvdParams::default()
        };
        let model = SvdModel::fit(&ratings, &params).unwrap();

        save(&path, &model).unwrap();
        let loaded: SvdModel = load(&path).unwrap();

        for (user, item) in [(1, 1), (2, 2), (9, 1), (9, 9)] {
            assert_eq!(loaded.predict(user, item), model.predict(user, item));
        }
    }

    #[test]
    fn test_missing_file_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load::<Catalog>(&dir.path().join(CATALOG_FILE));
        assert!(matches!(result, Err(AppError::ArtifactLoad(_))));
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CATALOG_FILE);
        save(&path, &Catalog::new(items())).unwrap();

        let result = load::<SimilarityTable>(&path);
        assert!(matches!(result, Err(AppError::ArtifactLoad(_))));
    }

    #[test]
    fn test_corrupt_length_prefix_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CATALOG_FILE);
        save(&path, &Catalog::new(items())).unwrap();

        // kind (8 + 7) + version (4) + item count (8) + first id (4)
        let title_len_at = 8 + Catalog::KIND.len() + 4 + 8 + 4;
        let mut bytes = fs::read(&path).unwrap();
        bytes[title_len_at..title_len_at + 8].copy_from_slice(&(1u64 << 40).to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        let result = load::<Catalog>(&path);
        assert!(matches!(result, Err(AppError::ArtifactLoad(_))));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SIMILARITY_FILE);
        save(&path, &SimilarityTable::fit(&items(), &SimilarityParams::default())).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let result = load::<SimilarityTable>(&path);
        assert!(matches!(result, Err(AppError::ArtifactLoad(_))));
    }
}
