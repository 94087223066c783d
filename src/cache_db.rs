use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use std::cmp::Ordering;
use std::path::Path;

use crate::region::Region;
use crate::session::QualifiedName;
use crate::utils;

// TODO: entries are never evicted; rasters that get rewritten leave their old
// overlays behind until `clear` is called.

pub const TARGET_VERSION: i32 = 1;

fn open_db(cache_dir: &str, file_name: &str, sql: &str) -> Result<Connection> {
    debug!("opening cache db for {}", file_name);
    std::fs::create_dir_all(cache_dir)?;
    let mut conn = Connection::open(Path::new(cache_dir).join(file_name))?;

    let tx = conn.transaction()?;
    let version = utils::db::init_metadata_and_get_version(&tx)?;
    let target_version = TARGET_VERSION;
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            // it is only a cache, throw it away
            tx.execute("DROP TABLE IF EXISTS overlay_cache;", ())?;
            utils::db::set_version_in_metadata(&tx, target_version)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }

    tx.execute(sql, [])?;
    tx.commit()?;
    Ok(conn)
}

/// Identifies one rendered raster overlay: which dataset, which content,
/// which grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayCacheKey {
    pub raster: QualifiedName,
    pub revision: String,
    pub region_key: String,
}

impl OverlayCacheKey {
    pub fn new(raster: &QualifiedName, revision: &str, region: &Region) -> Self {
        OverlayCacheKey {
            raster: raster.clone(),
            revision: revision.to_string(),
            region_key: region.cache_key(),
        }
    }

    fn to_db_key(&self) -> String {
        format!("{}#{}#{}", self.raster, self.revision, self.region_key)
    }
}

pub struct CacheDb {
    conn: Connection,
}

impl CacheDb {
    pub fn open(cache_dir: &str) -> Result<CacheDb> {
        let conn = open_db(
            cache_dir,
            "cache.db",
            "CREATE TABLE IF NOT EXISTS `overlay_cache` (
                        key TEXT PRIMARY KEY NOT NULL UNIQUE,
                        data BLOB NOT NULL
                    );",
        )?;
        Ok(CacheDb { conn })
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }

    fn get_overlay(&self, key: &OverlayCacheKey) -> Result<Option<Vec<u8>>> {
        let mut query = self
            .conn
            .prepare("SELECT data FROM `overlay_cache` WHERE key = ?1;")?;
        Ok(query
            .query_row((key.to_db_key(),), |row| row.get(0))
            .optional()?)
    }

    fn set_overlay(&self, key: &OverlayCacheKey, data: &[u8]) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO `overlay_cache` (key, data) VALUES (?1, ?2)",
            (key.to_db_key(), data),
        )?;
        Ok(())
    }

    pub fn get_overlay_or_compute<F>(&self, key: &OverlayCacheKey, f: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        match self.get_overlay(key)? {
            Some(data) => {
                debug!("[cache_db] overlay hit: {}", key.raster);
                Ok(data)
            }
            None => {
                let data = f()?;
                self.set_overlay(key, &data)?;
                Ok(data)
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM overlay_cache;", [])?;
        Ok(())
    }
}
