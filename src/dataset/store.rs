//! Dataset Providers
//!
//! The query engine never touches the filesystem itself; it asks a
//! [`DatasetProvider`] for an immutable snapshot of a dataset and runs over that.
//!
//! - [`MemoryProvider`]: in-process map, used by tests and embedders
//! - [`DatasetStore`]: directory-backed registry, one `<id>.json` file per dataset
//!
//! Both guard their maps with Tokio's async RwLock; loaded datasets are handed out
//! as `Arc<Dataset>` so concurrent queries share one snapshot without copying.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::dataset::error::{DatasetError, DatasetResult};
use crate::dataset::types::{Dataset, DatasetInfo, DatasetKind, Records};

/// Words of the query language that cannot be used as dataset ids
pub const RESERVED_WORDS: &[&str] = &[
    "In", "dataset", "find", "all", "show", "and", "or", "sort", "by", "entries", "the", "of",
    "whose", "greater", "less", "than", "equal", "to", "includes", "include", "begins", "begin",
    "ends", "end", "is", "does", "not", "with",
];

/// Source of record collections for the query engine
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Load the dataset registered under `id` with the given kind.
    ///
    /// A dataset that exists under `id` with a different kind is reported as not found.
    async fn load_dataset(&self, id: &str, kind: DatasetKind) -> DatasetResult<Arc<Dataset>>;

    /// Summaries of every registered dataset, ordered by id
    async fn list_datasets(&self) -> Vec<DatasetInfo>;
}

/// Check that `id` can name a dataset: non-empty, no whitespace, no `_`,
/// no path separators and not a reserved query word.
pub fn validate_id(id: &str) -> DatasetResult<()> {
    let reason = if id.trim().is_empty() {
        Some("is empty")
    } else if id.chars().any(char::is_whitespace) {
        Some("contains whitespace")
    } else if id.contains('_') {
        Some("contains an underscore")
    } else if id.contains('/') || id.contains('\\') || id.starts_with('.') {
        Some("is not a valid file name")
    } else if RESERVED_WORDS.contains(&id) {
        Some("is a reserved word")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(DatasetError::InvalidId {
            id: id.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn lookup(
    datasets: &HashMap<String, Arc<Dataset>>,
    id: &str,
    kind: DatasetKind,
) -> DatasetResult<Arc<Dataset>> {
    datasets
        .get(id)
        .filter(|dataset| dataset.kind() == kind)
        .cloned()
        .ok_or_else(|| DatasetError::NotFound(id.to_string()))
}

fn sorted_infos(datasets: &HashMap<String, Arc<Dataset>>) -> Vec<DatasetInfo> {
    let mut infos: Vec<DatasetInfo> = datasets.values().map(|d| d.info()).collect();
    infos.sort_by(|a, b| a.id.cmp(&b.id));
    infos
}

/// In-memory provider
#[derive(Default)]
pub struct MemoryProvider {
    datasets: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a dataset
    pub async fn insert(&self, dataset: Dataset) {
        let mut datasets = self.datasets.write().await;
        datasets.insert(dataset.id.clone(), Arc::new(dataset));
    }
}

#[async_trait]
impl DatasetProvider for MemoryProvider {
    async fn load_dataset(&self, id: &str, kind: DatasetKind) -> DatasetResult<Arc<Dataset>> {
        let datasets = self.datasets.read().await;
        lookup(&datasets, id, kind)
    }

    async fn list_datasets(&self) -> Vec<DatasetInfo> {
        let datasets = self.datasets.read().await;
        sorted_infos(&datasets)
    }
}

/// Directory-backed dataset registry
pub struct DatasetStore {
    data_dir: PathBuf,
    datasets: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl DatasetStore {
    /// Open (or create) a store rooted at `data_dir`, loading every dataset file in it
    pub async fn open(data_dir: impl Into<PathBuf>) -> DatasetResult<Self> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir).await?;

        let datasets = Self::load_all(&data_dir).await?;
        tracing::info!(
            data_dir = %data_dir.display(),
            datasets = datasets.len(),
            "Opened dataset store"
        );

        Ok(Self {
            data_dir,
            datasets: RwLock::new(datasets),
        })
    }

    /// Load all dataset files from directory
    async fn load_all(dir: &Path) -> DatasetResult<HashMap<String, Arc<Dataset>>> {
        let mut datasets = HashMap::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().map(|e| e == "json").unwrap_or(false) {
                continue;
            }

            match Self::load_file(&path).await {
                Ok(dataset) => {
                    datasets.insert(dataset.id.clone(), Arc::new(dataset));
                }
                Err(e) => {
                    tracing::warn!("Skipping dataset file {:?}: {}", path, e);
                }
            }
        }

        Ok(datasets)
    }

    async fn load_file(path: &Path) -> DatasetResult<Dataset> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn dataset_path(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", id))
    }

    /// Register a new dataset and persist it
    pub async fn add_dataset(&self, id: &str, records: Records) -> DatasetResult<DatasetInfo> {
        validate_id(id)?;

        let mut datasets = self.datasets.write().await;
        if datasets.contains_key(id) {
            return Err(DatasetError::AlreadyExists(id.to_string()));
        }
        if records.is_empty() {
            return Err(DatasetError::Empty(id.to_string()));
        }

        let dataset = Dataset::new(id, records);
        let bytes = serde_json::to_vec(&dataset)?;
        tokio::fs::write(self.dataset_path(id), bytes).await?;

        let info = dataset.info();
        datasets.insert(id.to_string(), Arc::new(dataset));

        tracing::info!(
            dataset_id = %info.id,
            kind = %info.kind,
            rows = info.num_rows,
            "Added dataset"
        );
        Ok(info)
    }

    /// Remove a dataset and its file
    pub async fn remove_dataset(&self, id: &str) -> DatasetResult<()> {
        validate_id(id)?;

        let mut datasets = self.datasets.write().await;
        if !datasets.contains_key(id) {
            return Err(DatasetError::NotFound(id.to_string()));
        }

        // The cache entry goes only once the file is gone, so a failed delete leaves both.
        match tokio::fs::remove_file(self.dataset_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        datasets.remove(id);

        tracing::info!(dataset_id = %id, "Removed dataset");
        Ok(())
    }
}

#[async_trait]
impl DatasetProvider for DatasetStore {
    async fn load_dataset(&self, id: &str, kind: DatasetKind) -> DatasetResult<Arc<Dataset>> {
        let datasets = self.datasets.read().await;
        lookup(&datasets, id, kind)
    }

    async fn list_datasets(&self) -> Vec<DatasetInfo> {
        let datasets = self.datasets.read().await;
        sorted_infos(&datasets)
    }
}
