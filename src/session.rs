use anyhow::Result;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use crate::cache_db::CacheDb;
use crate::error::{DatasetKind, MapError};
use crate::location_db::{LocationDb, SelectResult, Setting, PERMANENT_MAPSET};
use crate::modules;
use crate::raster::RasterMap;
use crate::region::Region;
use crate::utils;
use crate::vector::{AttributeTable, VectorMap};

/// `name@mapset`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub name: String,
    pub mapset: String,
}

impl QualifiedName {
    pub fn new(name: &str, mapset: &str) -> Self {
        QualifiedName {
            name: name.to_string(),
            mapset: mapset.to_string(),
        }
    }

    /// Splits `name@mapset`; the mapset part is optional.
    pub fn split(full_name: &str) -> (&str, Option<&str>) {
        match full_name.split_once('@') {
            Some((name, mapset)) => (name, Some(mapset)),
            None => (full_name, None),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.mapset)
    }
}

/* The engine state shared by everything that touches a location: which mapset
we write to, where unqualified names are looked up, and which computational
region is active.

The active region is the top of the temporary region stack when there is
one, otherwise the region saved for the current mapset. Temporary regions are
only ever pushed through `use_temp_region`, whose guard pops them again, so
the saved region is never touched while a temporary one is active. */
pub struct Session {
    location_dir: PathBuf,
    mapset: String,
    db: Mutex<LocationDb>,
    cache_db: Mutex<CacheDb>,
    temp_regions: Mutex<Vec<Region>>,
}

impl Session {
    pub fn open(location_dir: &str, mapset: &str) -> Result<Session> {
        if !utils::is_legal_name(mapset) {
            bail!("<{}> is not a legal mapset name", mapset);
        }
        std::fs::create_dir_all(location_dir)?;
        let mut db = LocationDb::open(location_dir)?;
        db.with_txn(|txn| {
            txn.ensure_mapset(PERMANENT_MAPSET)?;
            txn.ensure_mapset(mapset)
        })?;
        let cache_dir = Path::new(location_dir).join(".cache");
        let cache_db = CacheDb::open(&cache_dir.to_string_lossy())?;
        info!("session opened: location={} mapset={}", location_dir, mapset);
        Ok(Session {
            location_dir: PathBuf::from(location_dir),
            mapset: mapset.to_string(),
            db: Mutex::new(db),
            cache_db: Mutex::new(cache_db),
            temp_regions: Mutex::new(Vec::new()),
        })
    }

    pub fn location_dir(&self) -> &Path {
        &self.location_dir
    }

    pub fn mapset(&self) -> &str {
        &self.mapset
    }

    /// Mapsets searched for unqualified names, in order.
    pub fn search_path(&self) -> Vec<String> {
        let mut path = vec![self.mapset.clone()];
        if self.mapset != PERMANENT_MAPSET {
            path.push(PERMANENT_MAPSET.to_string());
        }
        path
    }

    fn db(&self) -> MutexGuard<'_, LocationDb> {
        self.db.lock().unwrap()
    }

    pub fn with_db_txn<F, O>(&self, f: F) -> Result<O>
    where
        F: FnOnce(&mut crate::location_db::Txn) -> Result<O>,
    {
        self.db().with_txn(f)
    }

    pub fn with_cache_db<F, O>(&self, f: F) -> Result<O>
    where
        F: FnOnce(&CacheDb) -> Result<O>,
    {
        let cache_db = self.cache_db.lock().unwrap();
        f(&cache_db)
    }

    pub fn setting_with_default<T: FromStr>(&self, setting: Setting, default: T) -> T
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        self.db().get_setting_with_default(setting, default)
    }

    pub fn set_setting<T: ToString>(&self, setting: Setting, value: T) -> Result<()> {
        self.db().set_setting(setting, value)
    }

    /// Resolves `name` or `name@mapset`. A qualified name is only looked up
    /// in its own mapset; an unqualified one walks the search path.
    pub fn find(&self, kind: DatasetKind, full_name: &str) -> Result<Option<QualifiedName>> {
        let (name, mapset) = QualifiedName::split(full_name);
        if !utils::is_legal_name(name) {
            return Ok(None);
        }
        let candidates = match mapset {
            Some(mapset) => vec![mapset.to_string()],
            None => self.search_path(),
        };
        self.with_db_txn(|txn| {
            for mapset in candidates {
                if txn.dataset_exists(kind, &mapset, name)? {
                    return Ok(Some(QualifiedName::new(name, &mapset)));
                }
            }
            Ok(None)
        })
    }

    pub fn find_raster(&self, full_name: &str) -> Result<Option<QualifiedName>> {
        self.find(DatasetKind::Raster, full_name)
    }

    pub fn find_vector(&self, full_name: &str) -> Result<Option<QualifiedName>> {
        self.find(DatasetKind::Vector, full_name)
    }

    /// Like `find`, but a missing dataset is a `MapError::NotFound`.
    pub fn resolve(&self, kind: DatasetKind, full_name: &str) -> Result<QualifiedName> {
        match self.find(kind, full_name)? {
            Some(qualified_name) => Ok(qualified_name),
            None => Err(MapError::not_found(kind, full_name).into()),
        }
    }

    pub fn list(&self, kind: DatasetKind) -> Result<Vec<QualifiedName>> {
        let search_path = self.search_path();
        self.with_db_txn(|txn| {
            let mut result = Vec::new();
            for mapset in &search_path {
                for name in txn.list_datasets(kind, mapset)? {
                    result.push(QualifiedName::new(&name, mapset));
                }
            }
            Ok(result)
        })
    }

    fn check_writable_name(name: &str) -> Result<()> {
        if utils::is_legal_name(name) {
            Ok(())
        } else {
            Err(MapError::InvalidName(name.to_string()).into())
        }
    }

    /// Writes into the current mapset, replacing any map of the same name.
    pub fn write_raster(&self, name: &str, raster: &RasterMap) -> Result<QualifiedName> {
        Self::check_writable_name(name)?;
        self.with_db_txn(|txn| txn.put_raster(&self.mapset, name, raster))?;
        Ok(QualifiedName::new(name, &self.mapset))
    }

    pub fn read_raster(&self, raster: &QualifiedName) -> Result<RasterMap> {
        self.with_db_txn(|txn| txn.get_raster(&raster.mapset, &raster.name))?
            .ok_or_else(|| MapError::not_found(DatasetKind::Raster, &raster.to_string()).into())
    }

    /// Header region and content revision.
    pub fn raster_header(&self, raster: &QualifiedName) -> Result<(Region, String)> {
        self.with_db_txn(|txn| txn.get_raster_header(&raster.mapset, &raster.name))?
            .ok_or_else(|| MapError::not_found(DatasetKind::Raster, &raster.to_string()).into())
    }

    pub fn write_vector(
        &self,
        name: &str,
        vector: &VectorMap,
        attributes: Option<&AttributeTable>,
    ) -> Result<QualifiedName> {
        Self::check_writable_name(name)?;
        self.with_db_txn(|txn| txn.put_vector(&self.mapset, name, vector, attributes))?;
        Ok(QualifiedName::new(name, &self.mapset))
    }

    pub fn read_vector(&self, vector: &QualifiedName) -> Result<VectorMap> {
        self.with_db_txn(|txn| txn.get_vector(&vector.mapset, &vector.name))?
            .ok_or_else(|| MapError::not_found(DatasetKind::Vector, &vector.to_string()).into())
    }

    pub fn read_attributes(&self, vector: &QualifiedName) -> Result<Option<AttributeTable>> {
        self.with_db_txn(|txn| txn.get_attributes(&vector.mapset, &vector.name))
    }

    pub fn select_attributes(
        &self,
        vector: &QualifiedName,
        columns: Option<&str>,
        where_clause: Option<&str>,
    ) -> Result<SelectResult> {
        self.with_db_txn(|txn| {
            txn.select_attributes(&vector.mapset, &vector.name, columns, where_clause)
        })
    }

    /// Only maps in the current mapset can be removed.
    pub fn remove(&self, kind: DatasetKind, name: &str) -> Result<bool> {
        let mapset = self.mapset.clone();
        self.with_db_txn(|txn| txn.remove_dataset(kind, &mapset, name))
    }

    /// The active computational region.
    pub fn region(&self) -> Result<Region> {
        if let Some(region) = self.temp_regions.lock().unwrap().last() {
            return Ok(*region);
        }
        let mapset = self.mapset.clone();
        let saved = self.with_db_txn(|txn| {
            Ok(match txn.get_region(&mapset)? {
                Some(region) => Some(region),
                None => txn.get_region(PERMANENT_MAPSET)?,
            })
        })?;
        Ok(saved.unwrap_or_else(Region::world))
    }

    /// Changes the active region: the innermost temporary region if one is
    /// in use, the mapset's saved region otherwise.
    pub fn set_region(&self, region: Region) -> Result<()> {
        region.validate()?;
        let mut temp_regions = self.temp_regions.lock().unwrap();
        match temp_regions.last_mut() {
            Some(top) => {
                debug!("[session] temporary region updated");
                *top = region;
            }
            None => {
                drop(temp_regions);
                let mapset = self.mapset.clone();
                self.with_db_txn(|txn| txn.set_region(&mapset, &region))?;
                debug!("[session] saved region of mapset {} updated", mapset);
            }
        }
        Ok(())
    }

    /// Starts a temporary region, initialized from the active one. Changes
    /// made through `set_region` while the guard lives are discarded when it
    /// is dropped.
    pub fn use_temp_region(&self) -> Result<TempRegion<'_>> {
        let current = self.region()?;
        let mut temp_regions = self.temp_regions.lock().unwrap();
        temp_regions.push(current);
        let depth = temp_regions.len();
        debug!("[session] temporary region pushed, depth={}", depth);
        Ok(TempRegion {
            session: self,
            depth,
        })
    }

    pub fn temp_region_depth(&self) -> usize {
        self.temp_regions.lock().unwrap().len()
    }

    /// Runs an engine module by name, e.g.
    /// `run_module("g.region", &[("raster", "elevation")])`. Returns the
    /// module's text output.
    pub fn run_module(&self, name: &str, params: &[(&str, &str)]) -> Result<String> {
        modules::run(self, name, params)
    }
}

/// Scoped override of the computational region. Dropping it restores the
/// region that was active before `Session::use_temp_region`.
pub struct TempRegion<'a> {
    session: &'a Session,
    depth: usize,
}

impl TempRegion<'_> {
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for TempRegion<'_> {
    fn drop(&mut self) {
        // never panic here, we may already be unwinding
        let mut temp_regions = match self.session.temp_regions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if temp_regions.len() >= self.depth {
            temp_regions.truncate(self.depth - 1);
            debug!("[session] temporary region popped, depth={}", self.depth - 1);
        } else {
            warn!(
                "[session] temporary region at depth {} already gone",
                self.depth
            );
        }
    }
}
