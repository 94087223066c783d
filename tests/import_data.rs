pub mod test_utils;

use geo_types::Geometry;
use mapsight_core::import_data;
use mapsight_core::vector::AttributeValue;
use test_utils::SampleLocation;

fn text(value: &str) -> AttributeValue {
    AttributeValue::Text(value.to_string())
}

#[test]
fn load_gpx() {
    let (vector, attributes) = import_data::load_gpx("./tests/data/durham_walk.gpx").unwrap();
    // the one point track is dropped
    assert_eq!(vector.features.len(), 4);

    let kinds: Vec<(Option<i64>, &str)> = vector
        .features
        .iter()
        .map(|f| {
            let kind = match f.geometry {
                Geometry::Point(_) => "point",
                Geometry::LineString(_) => "line",
                Geometry::MultiLineString(_) => "multiline",
                _ => "other",
            };
            (f.cat, kind)
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            (Some(1), "multiline"),
            (Some(2), "line"),
            (Some(3), "point"),
            (Some(4), "point"),
        ]
    );
    assert_eq!(
        attributes.rows.get(&1),
        Some(&vec![text("Morning walk"), text("track")])
    );
    assert_eq!(
        attributes.rows.get(&4),
        Some(&vec![text("Overlook"), text("waypoint")])
    );

    let (west, south, east, north) = vector.bounds().unwrap();
    assert_eq!((west, south, east, north), (-78.8002, 35.7001, -78.7704, 35.7203));
}

#[test]
fn load_kml() {
    let (vector, attributes) = import_data::load_kml("./tests/data/parks.kml").unwrap();
    assert_eq!(vector.features.len(), 3);
    assert!(matches!(vector.features[0].geometry, Geometry::Point(_)));
    assert!(matches!(vector.features[1].geometry, Geometry::LineString(_)));
    match &vector.features[2].geometry {
        Geometry::Polygon(polygon) => assert_eq!(polygon.exterior().0.len(), 5),
        other => panic!("unexpected geometry: {:?}", other),
    }
    assert_eq!(
        attributes.rows.get(&1),
        Some(&vec![text("Visitor center"), text("placemark")])
    );
}

#[test]
fn missing_file() {
    assert!(import_data::load_gpx("./tests/data/does_not_exist.gpx").is_err());
    assert!(import_data::load_kml("./tests/data/does_not_exist.kml").is_err());
}

#[test]
fn imported_vector_is_queryable() {
    let location = SampleLocation::new("import_data-queryable");
    let session = &location.session;
    let (vector, attributes) = import_data::load_gpx("./tests/data/durham_walk.gpx").unwrap();
    session
        .write_vector("walk", &vector, Some(&attributes))
        .unwrap();
    let output = session
        .run_module(
            "v.db.select",
            &[("map", "walk"), ("where", "source = 'waypoint'"), ("flags", "c")],
        )
        .unwrap();
    assert_eq!(output, "3|Trailhead|waypoint\n4|Overlook|waypoint\n");
}
