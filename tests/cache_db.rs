pub mod test_utils;

use mapsight_core::cache_db::{CacheDb, OverlayCacheKey};
use mapsight_core::region::Region;
use mapsight_core::QualifiedName;
use tempdir::TempDir;

#[test]
fn basic() {
    let cache_dir = TempDir::new("cache_db-basic").unwrap();
    println!("cache dir: {:?}", cache_dir.path());

    let cache_db = CacheDb::open(cache_dir.path().to_str().unwrap()).unwrap();
    let raster = QualifiedName::new("elevation", "PERMANENT");
    let region = test_utils::elevation_region();
    let key = OverlayCacheKey::new(&raster, "rev1", &region);

    assert_eq!(
        cache_db
            .get_overlay_or_compute(&key, || Ok(vec![1, 2, 3]))
            .unwrap(),
        vec![1, 2, 3]
    );
    // it should be saved in the cache
    assert_eq!(
        cache_db
            .get_overlay_or_compute(&key, || panic!("Should not be called"))
            .unwrap(),
        vec![1, 2, 3]
    );

    // a new revision or another grid is a different entry
    let other_revision = OverlayCacheKey::new(&raster, "rev2", &region);
    let other_region = OverlayCacheKey::new(
        &raster,
        "rev1",
        &Region::new(35.7, 35.6, -78.6, -79.0, 0.01, 0.01).unwrap(),
    );
    for key in [&other_revision, &other_region] {
        assert_eq!(
            cache_db
                .get_overlay_or_compute(key, || Ok(vec![9]))
                .unwrap(),
            vec![9]
        );
    }
    cache_db.flush().unwrap();

    // survives a restart
    drop(cache_db);
    let cache_db = CacheDb::open(cache_dir.path().to_str().unwrap()).unwrap();
    assert_eq!(
        cache_db
            .get_overlay_or_compute(&key, || panic!("Should not be called"))
            .unwrap(),
        vec![1, 2, 3]
    );

    // test clear cache
    cache_db.clear().unwrap();
    assert_eq!(
        cache_db
            .get_overlay_or_compute(&key, || Ok(vec![4]))
            .unwrap(),
        vec![4]
    );
}

#[test]
fn failed_compute_is_not_cached() {
    let cache_dir = TempDir::new("cache_db-failed_compute").unwrap();
    let cache_db = CacheDb::open(cache_dir.path().to_str().unwrap()).unwrap();
    let key = OverlayCacheKey::new(
        &QualifiedName::new("elevation", "PERMANENT"),
        "rev1",
        &test_utils::elevation_region(),
    );
    assert!(cache_db
        .get_overlay_or_compute(&key, || Err(anyhow::anyhow!("boom")))
        .is_err());
    assert_eq!(
        cache_db
            .get_overlay_or_compute(&key, || Ok(vec![7]))
            .unwrap(),
        vec![7]
    );
}
