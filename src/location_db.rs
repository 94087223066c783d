use anyhow::Result;
use chrono::Utc;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Transaction};
use sha1::{Digest, Sha1};
use std::cmp::Ordering;
use std::error::Error;
use std::path::Path;
use std::str::FromStr;

use crate::colors::ColorRamp;
use crate::error::DatasetKind;
use crate::raster::RasterMap;
use crate::region::Region;
use crate::utils::{self, db::quote_identifier};
use crate::vector::{AttributeTable, AttributeValue, Column, VectorMap};

/* The location database. One file per location, every mapset lives in it.

Dataset payloads are stored as zstd compressed blobs next to a small header
(region / color ramp for rasters) so that lookups and region computations
never need to touch the cell data. `revision` is the sha1 of the payload and
is what render caches key on.

Vector attributes are real SQL tables (one per vector, named
`attr@<mapset>@<name>`) so that `v.db.select` can hand user supplied
`where` clauses straight to SQLite. */

pub const PERMANENT_MAPSET: &str = "PERMANENT";

#[allow(clippy::type_complexity)]
fn open_db_and_run_migration(
    location_dir: &str,
    file_name: &str,
    migrations: &[&dyn Fn(&Transaction) -> Result<()>],
) -> Result<Connection> {
    debug!("open and run migration for {}", file_name);
    let mut conn = rusqlite::Connection::open(Path::new(location_dir).join(file_name))?;
    let tx = conn.transaction()?;

    let version = utils::db::init_metadata_and_get_version(&tx)? as usize;
    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for (i, f) in migrations.iter().enumerate().skip(version) {
                info!("running migration for version: {}", i + 1);
                f(&tx)?;
            }
            utils::db::set_version_in_metadata(&tx, target_version as i32)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(conn)
}

fn dataset_table(kind: DatasetKind) -> &'static str {
    match kind {
        DatasetKind::Raster => "raster",
        DatasetKind::Vector => "vector",
    }
}

// `@` never appears in a legal name, so distinct (mapset, name) pairs get
// distinct tables.
fn attribute_table_name(mapset: &str, name: &str) -> String {
    format!("attr@{}@{}", mapset, name)
}

fn revision_of(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Result of an attribute query: column names plus rows in query order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<AttributeValue>>,
}

pub struct Txn<'a> {
    db_txn: rusqlite::Transaction<'a>,
}

impl Txn<'_> {
    pub fn ensure_mapset(&self, mapset: &str) -> Result<()> {
        if !utils::is_legal_name(mapset) {
            bail!("<{}> is not a legal mapset name", mapset);
        }
        self.db_txn
            .execute("INSERT OR IGNORE INTO mapset (name) VALUES (?1);", (mapset,))?;
        Ok(())
    }

    pub fn mapset_exists(&self, mapset: &str) -> Result<bool> {
        Ok(self
            .db_txn
            .query_row("SELECT 1 FROM mapset WHERE name = ?1;", (mapset,), |_| Ok(()))
            .optional()?
            .is_some())
    }

    pub fn list_mapsets(&self) -> Result<Vec<String>> {
        let mut query = self.db_txn.prepare("SELECT name FROM mapset ORDER BY name;")?;
        let mut mapsets = Vec::new();
        for row in query.query_map((), |row| row.get(0))? {
            mapsets.push(row?);
        }
        Ok(mapsets)
    }

    pub fn dataset_exists(&self, kind: DatasetKind, mapset: &str, name: &str) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE mapset = ?1 AND name = ?2;",
            dataset_table(kind)
        );
        Ok(self
            .db_txn
            .query_row(&sql, (mapset, name), |_| Ok(()))
            .optional()?
            .is_some())
    }

    pub fn list_datasets(&self, kind: DatasetKind, mapset: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT name FROM {} WHERE mapset = ?1 ORDER BY name;",
            dataset_table(kind)
        );
        let mut query = self.db_txn.prepare(&sql)?;
        let mut names = Vec::new();
        for row in query.query_map((mapset,), |row| row.get(0))? {
            names.push(row?);
        }
        Ok(names)
    }

    pub fn remove_dataset(&mut self, kind: DatasetKind, mapset: &str, name: &str) -> Result<bool> {
        info!("Removing {} map: {}@{}", kind, name, mapset);
        let sql = format!(
            "DELETE FROM {} WHERE mapset = ?1 AND name = ?2;",
            dataset_table(kind)
        );
        let changes = self.db_txn.execute(&sql, (mapset, name))?;
        if kind == DatasetKind::Vector {
            self.db_txn.execute(
                &format!(
                    "DROP TABLE IF EXISTS {};",
                    quote_identifier(&attribute_table_name(mapset, name))
                ),
                (),
            )?;
        }
        Ok(changes == 1)
    }

    /// Returns the new revision.
    pub fn put_raster(&mut self, mapset: &str, name: &str, raster: &RasterMap) -> Result<String> {
        let mut data = Vec::new();
        raster.serialize(&mut data)?;
        let revision = revision_of(&data);
        info!("Writing raster map: {}@{} revision={}", name, mapset, revision);
        self.db_txn.execute(
            "INSERT OR REPLACE INTO raster (mapset, name, header, color_ramp, revision, created_at, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            (
                mapset,
                name,
                raster.header.to_shell_string(),
                raster.color_ramp.as_ref(),
                &revision,
                Utc::now().timestamp(),
                data,
            ),
        )?;
        Ok(revision)
    }

    /// Header region and revision, without decoding any cells.
    pub fn get_raster_header(&self, mapset: &str, name: &str) -> Result<Option<(Region, String)>> {
        let row: Option<(String, String)> = self
            .db_txn
            .query_row(
                "SELECT header, revision FROM raster WHERE mapset = ?1 AND name = ?2;",
                (mapset, name),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((header, revision)) => Ok(Some((Region::parse_shell_string(&header)?, revision))),
        }
    }

    pub fn get_raster(&self, mapset: &str, name: &str) -> Result<Option<RasterMap>> {
        let mut query = self.db_txn.prepare(
            "SELECT header, color_ramp, data FROM raster WHERE mapset = ?1 AND name = ?2;",
        )?;
        query
            .query_row((mapset, name), |row| {
                let f = || {
                    let header = Region::parse_shell_string(row.get_ref(0)?.as_str()?)?;
                    let color_ramp = ColorRamp::from_str(row.get_ref(1)?.as_str()?)?;
                    let data = row.get_ref(2)?.as_blob()?;
                    RasterMap::deserialize(data, header, color_ramp)
                };
                Ok(f())
            })
            .optional()?
            .transpose()
    }

    /// Returns the new revision. Replaces any previous attribute table.
    pub fn put_vector(
        &mut self,
        mapset: &str,
        name: &str,
        vector: &VectorMap,
        attributes: Option<&AttributeTable>,
    ) -> Result<String> {
        let mut data = Vec::new();
        vector.serialize(&mut data)?;
        let revision = revision_of(&data);
        info!(
            "Writing vector map: {}@{} revision={} features={}",
            name,
            mapset,
            revision,
            vector.features.len()
        );
        self.db_txn.execute(
            "INSERT OR REPLACE INTO vector (mapset, name, has_table, revision, created_at, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            (
                mapset,
                name,
                attributes.is_some(),
                &revision,
                Utc::now().timestamp(),
                data,
            ),
        )?;

        let table = quote_identifier(&attribute_table_name(mapset, name));
        self.db_txn
            .execute(&format!("DROP TABLE IF EXISTS {};", table), ())?;
        if let Some(attributes) = attributes {
            let mut column_defs = vec!["cat INTEGER PRIMARY KEY".to_string()];
            for column in &attributes.columns {
                if !utils::is_legal_name(&column.name) || column.name.eq_ignore_ascii_case("cat") {
                    bail!("<{}> is not a legal column name", column.name);
                }
                column_defs.push(format!(
                    "{} {}",
                    quote_identifier(&column.name),
                    column.column_type
                ));
            }
            self.db_txn.execute(
                &format!("CREATE TABLE {} ({});", table, column_defs.join(", ")),
                (),
            )?;
            let placeholders = (1..=attributes.columns.len() + 1)
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let mut insert = self
                .db_txn
                .prepare(&format!("INSERT INTO {} VALUES ({});", table, placeholders))?;
            for (cat, values) in &attributes.rows {
                let row = std::iter::once(rusqlite::types::Value::Integer(*cat))
                    .chain(values.iter().map(rusqlite::types::Value::from));
                insert.execute(params_from_iter(row))?;
            }
        }
        Ok(revision)
    }

    pub fn get_vector_revision(&self, mapset: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .db_txn
            .query_row(
                "SELECT revision FROM vector WHERE mapset = ?1 AND name = ?2;",
                (mapset, name),
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn get_vector(&self, mapset: &str, name: &str) -> Result<Option<VectorMap>> {
        let mut query = self
            .db_txn
            .prepare("SELECT data FROM vector WHERE mapset = ?1 AND name = ?2;")?;
        query
            .query_row((mapset, name), |row| {
                let f = || VectorMap::deserialize(row.get_ref(0)?.as_blob()?);
                Ok(f())
            })
            .optional()?
            .transpose()
    }

    pub fn has_attribute_table(&self, mapset: &str, name: &str) -> Result<bool> {
        let has_table: Option<bool> = self
            .db_txn
            .query_row(
                "SELECT has_table FROM vector WHERE mapset = ?1 AND name = ?2;",
                (mapset, name),
                |row| row.get(0),
            )
            .optional()?;
        Ok(has_table.unwrap_or(false))
    }

    /// Runs `SELECT <columns> FROM <table> [WHERE <where>]` on the attribute
    /// table of a vector. `columns` and `where_clause` are raw SQL.
    pub fn select_attributes(
        &self,
        mapset: &str,
        name: &str,
        columns: Option<&str>,
        where_clause: Option<&str>,
    ) -> Result<SelectResult> {
        if !self.has_attribute_table(mapset, name)? {
            bail!(
                "Database connection not defined for vector map <{}@{}>",
                name,
                mapset
            );
        }
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.unwrap_or("*"),
            quote_identifier(&attribute_table_name(mapset, name))
        );
        if let Some(where_clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        debug!("[select_attributes] {}", sql);
        let mut query = self.db_txn.prepare(&sql)?;
        let column_names: Vec<String> = query.column_names().into_iter().map(String::from).collect();
        let column_count = column_names.len();
        let mut rows = query.query(())?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(AttributeValue::from(row.get_ref(i)?));
            }
            result.push(values);
        }
        Ok(SelectResult {
            columns: column_names,
            rows: result,
        })
    }

    /// The full attribute table, typed by the declared column types.
    pub fn get_attributes(&self, mapset: &str, name: &str) -> Result<Option<AttributeTable>> {
        if !self.has_attribute_table(mapset, name)? {
            return Ok(None);
        }
        let table = quote_identifier(&attribute_table_name(mapset, name));
        let mut columns = Vec::new();
        {
            let mut query = self
                .db_txn
                .prepare(&format!("SELECT name, type FROM pragma_table_info('{}');", attribute_table_name(mapset, name)))?;
            for row in query.query_map((), |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))? {
                let (column_name, column_type) = row?;
                if column_name == "cat" {
                    continue;
                }
                columns.push(Column {
                    name: column_name,
                    column_type: column_type.parse()?,
                });
            }
        }
        let mut attributes = AttributeTable::new(columns);
        let mut query = self
            .db_txn
            .prepare(&format!("SELECT * FROM {} ORDER BY cat;", table))?;
        let column_count = query.column_count();
        let mut rows = query.query(())?;
        while let Some(row) = rows.next()? {
            let cat: i64 = row.get(0)?;
            let mut values = Vec::with_capacity(column_count - 1);
            for i in 1..column_count {
                values.push(AttributeValue::from(row.get_ref(i)?));
            }
            attributes.insert(cat, values)?;
        }
        Ok(Some(attributes))
    }

    pub fn get_region(&self, mapset: &str) -> Result<Option<Region>> {
        let region: Option<String> = self
            .db_txn
            .query_row(
                "SELECT region FROM region WHERE mapset = ?1;",
                (mapset,),
                |row| row.get(0),
            )
            .optional()?;
        region.map(|r| Region::parse_shell_string(&r)).transpose()
    }

    pub fn set_region(&mut self, mapset: &str, region: &Region) -> Result<()> {
        region.validate()?;
        self.db_txn.execute(
            "INSERT OR REPLACE INTO region (mapset, region) VALUES (?1, ?2);",
            (mapset, region.to_shell_string()),
        )?;
        Ok(())
    }
}

pub struct LocationDb {
    conn: Connection,
}

impl LocationDb {
    pub fn open(location_dir: &str) -> Result<LocationDb> {
        let conn = open_db_and_run_migration(
            location_dir,
            "location.db",
            &[&|tx| {
                let sql = "
                CREATE TABLE mapset (
                    name              TEXT    PRIMARY KEY
                                              NOT NULL
                                              UNIQUE
                );
                CREATE TABLE raster (
                    mapset            TEXT    NOT NULL,
                    name              TEXT    NOT NULL,
                    header            TEXT    NOT NULL, -- region, shell style
                    color_ramp        TEXT    NOT NULL,
                    revision          TEXT    NOT NULL,
                    created_at        INTEGER NOT NULL,
                    data              BLOB    NOT NULL,
                    PRIMARY KEY (mapset, name)
                );
                CREATE TABLE vector (
                    mapset            TEXT    NOT NULL,
                    name              TEXT    NOT NULL,
                    has_table         INTEGER NOT NULL,
                    revision          TEXT    NOT NULL,
                    created_at        INTEGER NOT NULL,
                    data              BLOB    NOT NULL,
                    PRIMARY KEY (mapset, name)
                );
                CREATE TABLE region (
                    mapset            TEXT    PRIMARY KEY
                                              NOT NULL
                                              UNIQUE,
                    region            TEXT    NOT NULL
                );
                CREATE TABLE setting (
                    key               TEXT    PRIMARY KEY
                                              NOT NULL
                                              UNIQUE,
                    value             TEXT
                );
                ";
                for s in sql_split::split(sql) {
                    tx.execute(&s, ())?;
                }
                Ok(())
            }],
        )?;
        Ok(LocationDb { conn })
    }

    pub fn with_txn<F, O>(&mut self, f: F) -> Result<O>
    where
        F: FnOnce(&mut Txn) -> Result<O>,
    {
        let mut txn = Txn {
            db_txn: self.conn.transaction()?,
        };
        let output = f(&mut txn)?;
        txn.db_txn.commit()?;
        Ok(output)
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }

    fn get_setting<T: FromStr>(&mut self, setting: Setting) -> Result<Option<T>>
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        let mut query = self.conn.prepare("SELECT value FROM setting WHERE key = ?1;")?;
        let result: Option<String> = query
            .query_row([setting.to_db_key()], |row| row.get(0))
            .optional()?;
        match result {
            None => Ok(None),
            Some(s) => {
                let v = FromStr::from_str(&s)?;
                Ok(Some(v))
            }
        }
    }

    pub fn get_setting_with_default<T: FromStr>(&mut self, setting: Setting, default: T) -> T
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        match self.get_setting(setting) {
            Ok(v) => v,
            Err(error) => {
                warn!(
                    "[location_db.get_setting_with_default] setting:{:?}, error:{}",
                    setting, error
                );
                None
            }
        }
        .unwrap_or(default)
    }

    pub fn set_setting<T: ToString>(&mut self, setting: Setting, value: T) -> Result<()> {
        let sql = "INSERT OR REPLACE INTO setting (key, value) VALUES (?1, ?2);";
        self.conn
            .execute(sql, (setting.to_db_key(), value.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Setting {
    /// Leaflet tile URL template of the basemap.
    BasemapUrl,
    BasemapAttribution,
    /// Default opacity of raster overlays, 0.0 - 1.0.
    RasterOpacity,
    /// Longest side, in pixels, of a rendered raster overlay.
    MaxOverlaySize,
}

impl Setting {
    fn to_db_key(self) -> &'static str {
        match self {
            Self::BasemapUrl => "BASEMAP_URL",
            Self::BasemapAttribution => "BASEMAP_ATTRIBUTION",
            Self::RasterOpacity => "RASTER_OPACITY",
            Self::MaxOverlaySize => "MAX_OVERLAY_SIZE",
        }
    }
}
