//! Region file fetching: static metadata, static arrays and `topo.json`.
//!
//! `topo.json` is large, so it goes through a local disk cache keyed by
//! region id. Static metadata and arrays are small and read directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use district_core::{RegionConfig, StaticFile, StaticMetadata, TypedArray};

use crate::error::{StoreError, StoreResult};
use crate::store::ObjectStore;

pub const TOPOLOGY_FILE: &str = "topo.json";
pub const STATIC_METADATA_FILE: &str = "static-metadata.json";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Decoded static arrays, in the same order as the metadata lists them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticData {
    pub demographics: Vec<TypedArray>,
    /// Parent-index arrays, fine to coarse like `StaticMetadata::geo_levels`.
    pub geo_levels: Vec<TypedArray>,
    pub voting: Vec<TypedArray>,
}

impl StaticData {
    /// Parent-index arrays ordered coarsest first.
    pub fn levels_coarse_to_fine(&self) -> Vec<&TypedArray> {
        self.geo_levels.iter().rev().collect()
    }

    pub fn byte_len(&self) -> usize {
        self.demographics
            .iter()
            .chain(&self.geo_levels)
            .chain(&self.voting)
            .map(TypedArray::byte_len)
            .sum()
    }
}

/// Everything about a region except its topology.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionData {
    pub region: RegionConfig,
    pub metadata: StaticMetadata,
    pub data: StaticData,
}

pub struct RegionFetcher {
    store: Arc<dyn ObjectStore>,
    cache_dir: PathBuf,
}

impl RegionFetcher {
    pub fn new(store: Arc<dyn ObjectStore>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub async fn static_metadata(&self, region: &RegionConfig) -> StoreResult<StaticMetadata> {
        let bytes = self.store.get(&region.file_uri(STATIC_METADATA_FILE)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn static_data(
        &self,
        region: &RegionConfig,
        metadata: &StaticMetadata,
    ) -> StoreResult<StaticData> {
        Ok(StaticData {
            demographics: self.static_files(region, &metadata.demographics).await?,
            geo_levels: self.static_files(region, &metadata.geo_levels).await?,
            voting: self.static_files(region, &metadata.voting).await?,
        })
    }

    async fn static_files(
        &self,
        region: &RegionConfig,
        files: &[StaticFile],
    ) -> StoreResult<Vec<TypedArray>> {
        let mut arrays = Vec::with_capacity(files.len());
        for file in files {
            let bytes = self.store.get(&region.file_uri(&file.file_name)).await?;
            let array =
                TypedArray::decode(file, &bytes).map_err(|source| StoreError::StaticFile {
                    file: file.file_name.clone(),
                    source,
                })?;
            arrays.push(array);
        }
        Ok(arrays)
    }

    /// Static metadata plus every static array for a region.
    pub async fn region_data(&self, region: &RegionConfig) -> StoreResult<RegionData> {
        let metadata = self.static_metadata(region).await?;
        let data = self.static_data(region, &metadata).await?;
        debug!(
            region = %region.id,
            bytes = data.byte_len(),
            "static data fetched"
        );
        Ok(RegionData {
            region: region.clone(),
            metadata,
            data,
        })
    }

    /// Where a region's `topo.json` lives in the disk cache.
    pub fn cached_topology_path(&self, region_id: &str) -> PathBuf {
        self.cache_dir.join(region_id).join(TOPOLOGY_FILE)
    }

    /// Make sure `topo.json` is on local disk, downloading it on a miss.
    ///
    /// Downloads land in a temporary file that is renamed into place, so a
    /// crash never leaves a truncated cache entry behind.
    pub async fn topology_path(&self, region: &RegionConfig) -> StoreResult<PathBuf> {
        let path = self.cached_topology_path(&region.id);
        if tokio::fs::try_exists(&path).await? {
            debug!(region = %region.id, path = %path.display(), "topology cache hit");
            return Ok(path);
        }

        let bytes = self.store.get(&region.file_uri(TOPOLOGY_FILE)).await?;
        let dir = self.cache_dir.join(&region.id);
        tokio::fs::create_dir_all(&dir).await?;
        let tmp = dir.join(format!(
            "{TOPOLOGY_FILE}.{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!(
            region = %region.id,
            bytes = bytes.len(),
            path = %path.display(),
            "topology downloaded to cache"
        );
        Ok(path)
    }

    pub async fn topology_bytes(&self, region: &RegionConfig) -> StoreResult<Vec<u8>> {
        let path = self.topology_path(region).await?;
        Ok(tokio::fs::read(path).await?)
    }
}

impl std::fmt::Debug for RegionFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionFetcher")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::MemoryStore;

    fn test_region() -> RegionConfig {
        RegionConfig {
            id: "pa".into(),
            name: "Pennsylvania".into(),
            region_code: "PA".into(),
            country_code: "US".into(),
            s3_uri: "s3://regions/US/PA/".into(),
            layer_size_in_bytes: 0,
            archived: false,
            hidden: false,
        }
    }

    fn test_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let metadata = r#"{
            "demographics": [{"id": "population", "fileName": "population.buf", "bytesPerElement": 2}],
            "geoLevels": [{"id": "county", "fileName": "county.buf", "bytesPerElement": 1}],
            "geoLevelHierarchy": [{"id": "block"}, {"id": "county"}]
        }"#;
        store.insert("s3://regions/US/PA/static-metadata.json", metadata.as_bytes().to_vec());
        store.insert("s3://regions/US/PA/population.buf", vec![10u8, 0, 20, 0, 30, 0]);
        store.insert("s3://regions/US/PA/county.buf", vec![0u8, 0, 1]);
        store.insert("s3://regions/US/PA/topo.json", b"{\"type\":\"Topology\"}".to_vec());
        store
    }

    #[tokio::test]
    async fn fetches_metadata_and_static_arrays() {
        let fetcher = RegionFetcher::new(test_store(), std::env::temp_dir());
        let data = fetcher.region_data(&test_region()).await.unwrap();

        assert_eq!(data.metadata.base_level_id(), Some("block"));
        assert_eq!(data.data.demographics, vec![TypedArray::U16(vec![10, 20, 30])]);
        assert_eq!(data.data.geo_levels, vec![TypedArray::U8(vec![0, 0, 1])]);
        assert!(data.data.voting.is_empty());
        assert_eq!(data.data.byte_len(), 9);
    }

    #[tokio::test]
    async fn misaligned_static_file_is_an_error() {
        let store = test_store();
        store.insert("s3://regions/US/PA/population.buf", vec![1u8, 2, 3]);
        let fetcher = RegionFetcher::new(store, std::env::temp_dir());

        let err = fetcher.region_data(&test_region()).await.unwrap_err();
        assert!(matches!(err, StoreError::StaticFile { .. }));
    }

    #[tokio::test]
    async fn topology_is_downloaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store();
        let fetcher = RegionFetcher::new(store.clone(), dir.path());
        let region = test_region();

        let path = fetcher.topology_path(&region).await.unwrap();
        assert_eq!(path, dir.path().join("pa").join("topo.json"));
        let again = fetcher.topology_bytes(&region).await.unwrap();
        assert_eq!(again, b"{\"type\":\"Topology\"}");
        assert_eq!(store.request_count("s3://regions/US/PA/topo.json"), 1);

        // No temporary files left behind.
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("pa"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("topo.json")]);
    }

    #[tokio::test]
    async fn missing_topology_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RegionFetcher::new(Arc::new(MemoryStore::new()), dir.path());
        let err = fetcher.topology_path(&test_region()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!dir.path().join("pa").join("topo.json").exists());
    }
}
