use anyhow::Result;
use geo_types::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, Point, Polygon};
use gpx::read;
use kml::{Kml, KmlReader};
use std::{fs::File, io::BufReader};

use crate::vector::{AttributeTable, AttributeValue, Column, ColumnType, VectorMap};

/// Collects imported features; categories are assigned in reading order
/// starting at 1, each with a `name` and `source` attribute.
struct Importer {
    vector: VectorMap,
    attributes: AttributeTable,
    next_cat: i64,
}

impl Importer {
    fn new() -> Self {
        Importer {
            vector: VectorMap::new(),
            attributes: AttributeTable::new(vec![
                Column {
                    name: "name".to_string(),
                    column_type: ColumnType::Text,
                },
                Column {
                    name: "source".to_string(),
                    column_type: ColumnType::Text,
                },
            ]),
            next_cat: 1,
        }
    }

    fn add(&mut self, geometry: Geometry<f64>, name: Option<&str>, source: &str) -> Result<()> {
        let cat = self.next_cat;
        self.next_cat += 1;
        self.vector.push(Some(cat), geometry);
        self.attributes.insert(
            cat,
            vec![
                name.map_or(AttributeValue::Null, |name| {
                    AttributeValue::Text(name.to_string())
                }),
                AttributeValue::Text(source.to_string()),
            ],
        )
    }

    fn finish(self) -> Result<(VectorMap, AttributeTable)> {
        if self.vector.is_empty() {
            bail!("No data found");
        }
        Ok((self.vector, self.attributes))
    }
}

/// Tracks and routes become lines, waypoints become points.
pub fn load_gpx(file_path: &str) -> Result<(VectorMap, AttributeTable)> {
    let gpx_data = read(BufReader::new(File::open(file_path)?))?;
    let mut importer = Importer::new();

    for track in &gpx_data.tracks {
        let mut lines: Vec<LineString<f64>> = track
            .segments
            .iter()
            .map(|segment| segment.linestring())
            .filter(|line| line.0.len() >= 2)
            .collect();
        let geometry = match lines.len() {
            0 => continue,
            1 => Geometry::LineString(lines.remove(0)),
            _ => Geometry::MultiLineString(MultiLineString::new(lines)),
        };
        importer.add(geometry, track.name.as_deref(), "track")?;
    }
    for route in &gpx_data.routes {
        let line = route.linestring();
        if line.0.len() >= 2 {
            importer.add(Geometry::LineString(line), route.name.as_deref(), "route")?;
        }
    }
    for waypoint in &gpx_data.waypoints {
        importer.add(
            Geometry::Point(waypoint.point()),
            waypoint.name.as_deref(),
            "waypoint",
        )?;
    }
    info!(
        "[import_data] gpx {}: {} features",
        file_path,
        importer.next_cat - 1
    );
    importer.finish()
}

fn kml_coord(coord: &kml::types::Coord<f64>) -> Coord<f64> {
    Coord {
        x: coord.x,
        y: coord.y,
    }
}

fn kml_line(coords: &[kml::types::Coord<f64>]) -> LineString<f64> {
    coords.iter().map(kml_coord).collect()
}

fn kml_geometry(geometry: &kml::types::Geometry<f64>) -> Option<Geometry<f64>> {
    use kml::types::Geometry as KmlGeometry;
    match geometry {
        KmlGeometry::Point(p) => Some(Geometry::Point(Point::from(kml_coord(&p.coord)))),
        KmlGeometry::LineString(l) => Some(Geometry::LineString(kml_line(&l.coords))),
        KmlGeometry::LinearRing(r) => Some(Geometry::LineString(kml_line(&r.coords))),
        KmlGeometry::Polygon(p) => Some(Geometry::Polygon(Polygon::new(
            kml_line(&p.outer.coords),
            p.inner.iter().map(|ring| kml_line(&ring.coords)).collect(),
        ))),
        KmlGeometry::MultiGeometry(m) => {
            let parts: Vec<Geometry<f64>> = m.geometries.iter().filter_map(kml_geometry).collect();
            if parts.is_empty() {
                None
            } else {
                Some(Geometry::GeometryCollection(GeometryCollection::from(parts)))
            }
        }
        _ => None,
    }
}

/// Every placemark with a supported geometry becomes one feature.
pub fn load_kml(file_path: &str) -> Result<(VectorMap, AttributeTable)> {
    let kml_data =
        KmlReader::<_, f64>::from_reader(BufReader::new(File::open(file_path)?)).read()?;
    let mut importer = Importer::new();
    let mut skipped = 0;
    for placemark in flatten_kml(vec![kml_data])
        .into_iter()
        .filter_map(|k| match k {
            Kml::Placemark(p) => Some(p),
            _ => None,
        })
    {
        match placemark.geometry.as_ref().and_then(kml_geometry) {
            Some(geometry) => importer.add(geometry, placemark.name.as_deref(), "placemark")?,
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(
            "[import_data] kml {}: {} placemarks without usable geometry",
            file_path, skipped
        );
    }
    importer.finish()
}

fn flatten_kml(kml: Vec<Kml>) -> Vec<Kml> {
    kml.into_iter()
        .flat_map(|k| match k {
            Kml::KmlDocument(d) => flatten_kml(d.elements),
            Kml::Document { attrs: _, elements } => flatten_kml(elements),
            Kml::Folder { attrs: _, elements } => flatten_kml(elements),
            k => vec![k],
        })
        .collect()
}
