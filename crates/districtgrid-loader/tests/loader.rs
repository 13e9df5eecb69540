//! Loading regions from an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use district_core::RegionConfig;
use districtgrid_loader::{LoaderError, RegionStatus, TopologyLoader};
use districtgrid_topology::testing::{publish, test_region_config};
use districtgrid_topology::{MemoryStore, RegionFetcher};

const FAST: Duration = Duration::from_millis(5);

fn region(id: &str, archived: bool) -> RegionConfig {
    RegionConfig {
        id: id.to_string(),
        s3_uri: format!("s3://test-bucket/regions/{id}/"),
        archived,
        ..test_region_config()
    }
}

fn test_loader(store: Arc<MemoryStore>, dir: &std::path::Path) -> TopologyLoader {
    let fetcher = Arc::new(RegionFetcher::new(store, dir));
    TopologyLoader::new(fetcher, FAST, Duration::from_millis(20))
}

async fn wait_healthy(loader: &TopologyLoader) {
    for _ in 0..200 {
        if loader.readiness().await.healthy {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("loader never became healthy: {:?}", loader.readiness().await);
}

#[tokio::test]
async fn archived_regions_load_before_start_returns() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let (old, new) = (region("old", true), region("new", false));
    publish(&store, &old);
    publish(&store, &new);

    let loader = test_loader(store, dir.path());
    loader.start(&[new.clone(), old.clone()]).await;
    assert_eq!(loader.status("old").await, Some(RegionStatus::Loaded));

    wait_healthy(&loader).await;
    let data = loader.region_data("new").await.unwrap();
    assert_eq!(data.region.id, "new");
    assert_eq!(data.data.demographics.len(), 1);
    assert!(dir.path().join("new").join("topo.json").exists());
    assert!(dir.path().join("old").join("topo.json").exists());
}

#[tokio::test]
async fn failed_fetches_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pa = region("pa", false);
    publish(&store, &pa);
    let metadata_uri = pa.file_uri("static-metadata.json");
    store.fail_next(metadata_uri.clone(), 2);

    let loader = test_loader(store.clone(), dir.path());
    loader.start(&[pa]).await;
    wait_healthy(&loader).await;
    assert_eq!(store.request_count(&metadata_uri), 3);
}

#[tokio::test]
async fn missing_region_keeps_readiness_unhealthy() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let pa = region("pa", false);
    publish(&store, &pa);

    let loader = test_loader(store.clone(), dir.path());
    loader.start(&[pa, region("ghost", false)]).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    let report = loader.readiness().await;
    assert!(!report.healthy);
    assert_eq!(report.regions["pa"], RegionStatus::Loaded);
    assert_eq!(report.regions["ghost"], RegionStatus::Loading);
    assert_eq!(report.waiting(), vec!["ghost"]);
    assert!(store.request_count("s3://test-bucket/regions/ghost/static-metadata.json") > 1);

    loader.shutdown().await;
}

#[tokio::test]
async fn regions_added_later_load_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let late = region("late", false);
    publish(&store, &late);

    let loader = test_loader(store, dir.path());
    loader.start(&[]).await;
    assert!(loader.readiness().await.healthy);
    assert!(loader.region_data("late").await.is_none());
    assert_eq!(loader.status("late").await, None);

    let data = loader.get_or_load(&late).await.unwrap();
    assert_eq!(data.metadata.geo_level_hierarchy.len(), 2);
    assert_eq!(loader.status("late").await, Some(RegionStatus::Loaded));
    assert!(matches!(
        loader.wait_loaded("nope").await,
        Err(LoaderError::UnknownRegion(_))
    ));
}

#[tokio::test]
async fn waiting_callers_are_released_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(test_loader(Arc::new(MemoryStore::new()), dir.path()));

    let waiter = {
        let loader = loader.clone();
        tokio::spawn(async move { loader.get_or_load(&region("ghost", false)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    loader.shutdown().await;

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(LoaderError::ShuttingDown)));
}
