#![allow(dead_code)]

use mapsight_core::raster::RasterMap;
use mapsight_core::region::Region;
use mapsight_core::utils;
use mapsight_core::vector::{AttributeTable, AttributeValue, Column, ColumnType, VectorMap};
use mapsight_core::Session;
use geo_types::line_string;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempdir::TempDir;

static INIT_LOGGER: Once = Once::new();

pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

// A small patch of North Carolina, lon/lat.
pub const NORTH: f64 = 35.80;
pub const SOUTH: f64 = 35.60;
pub const EAST: f64 = -78.60;
pub const WEST: f64 = -79.00;
pub const RES: f64 = 0.005;

pub fn elevation_region() -> Region {
    Region::new(NORTH, SOUTH, EAST, WEST, RES, RES).unwrap()
}

/// A single hill centered in the region, 50m at the rim to 150m at the top.
pub fn elevation_raster() -> RasterMap {
    let center_x = (EAST + WEST) / 2.0;
    let center_y = (NORTH + SOUTH) / 2.0;
    RasterMap::from_fn(elevation_region(), |x, y| {
        let d2 = (x - center_x).powi(2) + (y - center_y).powi(2);
        (50.0 + 100.0 * (-d2 / 0.01).exp()) as f32
    })
}

pub fn roads() -> (VectorMap, AttributeTable) {
    let mut vector = VectorMap::new();
    vector.push(
        Some(1),
        line_string![(x: -78.95, y: 35.65), (x: -78.80, y: 35.70), (x: -78.65, y: 35.75)],
    );
    vector.push(
        Some(2),
        line_string![(x: -78.90, y: 35.78), (x: -78.85, y: 35.62)],
    );
    vector.push(
        Some(3),
        line_string![(x: -78.70, y: 35.61), (x: -78.62, y: 35.79)],
    );
    let mut attributes = AttributeTable::new(vec![
        Column {
            name: "name".to_string(),
            column_type: ColumnType::Text,
        },
        Column {
            name: "lanes".to_string(),
            column_type: ColumnType::Integer,
        },
        Column {
            name: "speed".to_string(),
            column_type: ColumnType::Real,
        },
    ]);
    attributes
        .insert(
            1,
            vec![
                AttributeValue::Text("I-40".to_string()),
                AttributeValue::Integer(4),
                AttributeValue::Real(104.5),
            ],
        )
        .unwrap();
    attributes
        .insert(
            2,
            vec![
                AttributeValue::Text("US-1".to_string()),
                AttributeValue::Integer(2),
                AttributeValue::Null,
            ],
        )
        .unwrap();
    attributes
        .insert(
            3,
            vec![
                AttributeValue::Null,
                AttributeValue::Integer(2),
                AttributeValue::Real(72.0),
            ],
        )
        .unwrap();
    (vector, attributes)
}

/// A scratch location with `elevation` (raster) and `roadsmajor` (vector
/// with attributes) in PERMANENT, and a session opened on `mapset`.
pub struct SampleLocation {
    pub temp_dir: TempDir,
    pub session: Arc<Session>,
}

impl SampleLocation {
    pub fn new(name: &str) -> Self {
        Self::with_mapset(name, "user1")
    }

    pub fn with_mapset(name: &str, mapset: &str) -> Self {
        init_logger();
        let temp_dir = TempDir::new(name).unwrap();
        let location_dir = temp_dir.path().to_str().unwrap().to_string();
        {
            let permanent = Session::open(&location_dir, "PERMANENT").unwrap();
            permanent
                .write_raster("elevation", &elevation_raster())
                .unwrap();
            let (vector, attributes) = roads();
            permanent
                .write_vector("roadsmajor", &vector, Some(&attributes))
                .unwrap();
            permanent.set_region(elevation_region()).unwrap();
        }
        let session = Arc::new(Session::open(&location_dir, mapset).unwrap());
        SampleLocation { temp_dir, session }
    }

    pub fn location_dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Files produced by a test. Every recorded path is removed on drop, so a
/// failing assertion does not leave artifacts behind.
#[derive(Default)]
pub struct Artifacts {
    paths: Vec<PathBuf>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<P: AsRef<Path>>(&mut self, path: P) -> PathBuf {
        let path = path.as_ref().to_path_buf();
        self.paths.push(path.clone());
        path
    }

    /// Removes every recorded file that exists. Safe to call repeatedly.
    pub fn cleanup(&self) {
        for path in &self.paths {
            if let Err(e) = utils::remove_file_if_exists(path) {
                eprintln!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

impl Drop for Artifacts {
    fn drop(&mut self) {
        self.cleanup();
    }
}
