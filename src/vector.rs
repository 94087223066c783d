use anyhow::Result;
use geo_types::{Coord, Geometry, LineString, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::raster::ZSTD_COMPRESS_LEVEL;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Category, the key into the attribute table.
    pub cat: Option<i64>,
    pub geometry: Geometry<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorMap {
    pub features: Vec<Feature>,
}

/// Bounding box as (west, south, east, north).
pub type Bounds = (f64, f64, f64, f64);

impl VectorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cat: Option<i64>, geometry: impl Into<Geometry<f64>>) {
        self.features.push(Feature {
            cat,
            geometry: geometry.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for feature in &self.features {
            visit_coords(&feature.geometry, &mut |c| {
                bounds = Some(match bounds {
                    None => (c.x, c.y, c.x, c.y),
                    Some((w, s, e, n)) => (w.min(c.x), s.min(c.y), e.max(c.x), n.max(c.y)),
                });
            });
        }
        bounds
    }

    /// GeoJSON `FeatureCollection`; properties come from the attribute row
    /// matching each feature's category.
    pub fn to_geojson(&self, attributes: Option<&AttributeTable>) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|feature| {
                let mut properties = Map::new();
                if let Some(cat) = feature.cat {
                    properties.insert("cat".to_string(), json!(cat));
                    if let Some(table) = attributes {
                        if let Some(row) = table.rows.get(&cat) {
                            for (column, value) in table.columns.iter().zip(row) {
                                properties.insert(column.name.clone(), value.to_json());
                            }
                        }
                    }
                }
                json!({
                    "type": "Feature",
                    "properties": properties,
                    "geometry": geometry_to_geojson(&feature.geometry),
                })
            })
            .collect();
        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }

    pub fn serialize<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut encoder = zstd::Encoder::new(&mut writer, ZSTD_COMPRESS_LEVEL)?.auto_finish();
        serde_json::to_writer(&mut encoder, self)?;
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: R) -> Result<Self> {
        let decoder = zstd::Decoder::new(reader)?;
        Ok(serde_json::from_reader(decoder)?)
    }
}

fn visit_coords(geometry: &Geometry<f64>, f: &mut dyn FnMut(&Coord<f64>)) {
    match geometry {
        Geometry::Point(p) => f(&p.0),
        Geometry::Line(l) => {
            f(&l.start);
            f(&l.end);
        }
        Geometry::LineString(ls) => ls.0.iter().for_each(f),
        Geometry::Polygon(p) => visit_polygon(p, f),
        Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| f(&p.0)),
        Geometry::MultiLineString(mls) => mls.0.iter().flat_map(|ls| ls.0.iter()).for_each(f),
        Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|p| visit_polygon(p, &mut *f)),
        Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| visit_coords(g, &mut *f)),
        Geometry::Rect(r) => {
            f(&r.min());
            f(&r.max());
        }
        Geometry::Triangle(t) => {
            f(&t.0);
            f(&t.1);
            f(&t.2);
        }
    }
}

fn visit_polygon(polygon: &Polygon<f64>, f: &mut dyn FnMut(&Coord<f64>)) {
    polygon.exterior().0.iter().for_each(&mut *f);
    for interior in polygon.interiors() {
        interior.0.iter().for_each(&mut *f);
    }
}

fn position(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn line_positions(ls: &LineString<f64>) -> Value {
    Value::Array(ls.0.iter().map(position).collect())
}

fn polygon_positions(p: &Polygon<f64>) -> Value {
    let mut rings = vec![line_positions(p.exterior())];
    rings.extend(p.interiors().iter().map(line_positions));
    Value::Array(rings)
}

pub fn geometry_to_geojson(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": position(&p.0)}),
        Geometry::Line(l) => json!({
            "type": "LineString",
            "coordinates": [position(&l.start), position(&l.end)],
        }),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": line_positions(ls)}),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": polygon_positions(p)}),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| position(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(line_positions).collect::<Vec<_>>(),
        }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_positions).collect::<Vec<_>>(),
        }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(geometry_to_geojson).collect::<Vec<_>>(),
        }),
        Geometry::Rect(r) => json!({"type": "Polygon", "coordinates": polygon_positions(&r.to_polygon())}),
        Geometry::Triangle(t) => json!({"type": "Polygon", "coordinates": polygon_positions(&t.to_polygon())}),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl AttributeValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(i) => json!(i),
            Self::Real(r) => json!(r),
            Self::Text(s) => json!(s),
        }
    }
}

// `Null` prints as nothing.
impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Real(r) => write!(f, "{}", r),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&AttributeValue> for rusqlite::types::Value {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Null => rusqlite::types::Value::Null,
            AttributeValue::Integer(i) => rusqlite::types::Value::Integer(*i),
            AttributeValue::Real(r) => rusqlite::types::Value::Real(*r),
            AttributeValue::Text(s) => rusqlite::types::Value::Text(s.clone()),
        }
    }
}

impl From<rusqlite::types::ValueRef<'_>> for AttributeValue {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match value {
            ValueRef::Null => AttributeValue::Null,
            ValueRef::Integer(i) => AttributeValue::Integer(i),
            ValueRef::Real(r) => AttributeValue::Real(r),
            ValueRef::Text(t) => AttributeValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => AttributeValue::Text(hex::encode(b)),
        }
    }
}

/// Attribute rows keyed by category; the `cat` column is implicit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeTable {
    pub columns: Vec<Column>,
    pub rows: BTreeMap<i64, Vec<AttributeValue>>,
}

impl AttributeTable {
    pub fn new(columns: Vec<Column>) -> Self {
        AttributeTable {
            columns,
            rows: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, cat: i64, values: Vec<AttributeValue>) -> Result<()> {
        if values.len() != self.columns.len() {
            bail!(
                "attribute row for cat {} has {} values, table has {} columns",
                cat,
                values.len(),
                self.columns.len()
            );
        }
        self.rows.insert(cat, values);
        Ok(())
    }
}
