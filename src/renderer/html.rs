use serde_json::{json, Value};

/// One overlay as it is embedded in the page.
pub enum PageLayer {
    Image {
        name: String,
        /// `data:` URI of the rendered overlay.
        data_uri: String,
        /// (west, south, east, north)
        bounds: (f64, f64, f64, f64),
        opacity: f64,
    },
    GeoJson {
        name: String,
        data: Value,
    },
}

impl PageLayer {
    fn to_json(&self) -> Value {
        match self {
            PageLayer::Image {
                name,
                data_uri,
                bounds: (west, south, east, north),
                opacity,
            } => json!({
                "kind": "image",
                "name": name,
                "url": data_uri,
                "bounds": [[south, west], [north, east]],
                "opacity": opacity,
            }),
            PageLayer::GeoJson { name, data } => json!({
                "kind": "geojson",
                "name": name,
                "data": data,
            }),
        }
    }
}

pub struct PageOptions<'a> {
    pub title: &'a str,
    pub width: &'a str,
    pub height: &'a str,
    pub basemap_url: &'a str,
    pub basemap_attribution: &'a str,
    /// (west, south, east, north) of the computational region.
    pub bounds: (f64, f64, f64, f64),
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8" />
  <title>__TITLE__</title>
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" crossorigin="" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js" crossorigin=""></script>
  <style>
    html, body { margin: 0; padding: 0; }
    #map { width: __WIDTH__; height: __HEIGHT__; }
  </style>
</head>
<body>
  <div id="map"></div>
  <script>
    const config = __CONFIG__;
    const map = L.map('map');
    const basemap = L.tileLayer(config.basemap.url, {
      attribution: config.basemap.attribution,
      maxZoom: 19
    }).addTo(map);
    const overlays = {};
    for (const layer of config.layers) {
      let leafletLayer;
      if (layer.kind === 'image') {
        leafletLayer = L.imageOverlay(layer.url, layer.bounds, { opacity: layer.opacity });
      } else {
        leafletLayer = L.geoJSON(layer.data, {
          onEachFeature: function (feature, l) {
            const props = feature.properties || {};
            const rows = Object.keys(props).map(function (k) {
              return '<tr><th>' + k + '</th><td>' + (props[k] === null ? '' : props[k]) + '</td></tr>';
            });
            if (rows.length > 0) {
              l.bindPopup('<table>' + rows.join('') + '</table>');
            }
          }
        });
      }
      leafletLayer.addTo(map);
      overlays[layer.name] = leafletLayer;
    }
    L.control.layers({ 'Basemap': basemap }, overlays).addTo(map);
    L.control.scale().addTo(map);
    map.fitBounds(config.bounds);
  </script>
</body>
</html>
"#;

/// Escapes the title for use as HTML text.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Builds the self-contained Leaflet document. Layers keep their order; the
/// last one added is drawn on top.
pub fn render_page(options: &PageOptions, layers: &[PageLayer]) -> String {
    let (west, south, east, north) = options.bounds;
    let config = json!({
        "basemap": {
            "url": options.basemap_url,
            "attribution": options.basemap_attribution,
        },
        "bounds": [[south, west], [north, east]],
        "layers": layers.iter().map(PageLayer::to_json).collect::<Vec<_>>(),
    });
    // a literal `</script>` inside the data would end the script element
    let config = config.to_string().replace("</", "<\\/");

    PAGE_TEMPLATE
        .replace("__TITLE__", &escape_html(options.title))
        .replace("__WIDTH__", &escape_html(options.width))
        .replace("__HEIGHT__", &escape_html(options.height))
        .replace("__CONFIG__", &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> PageOptions<'static> {
        PageOptions {
            title: "roads & <rivers>",
            width: "100%",
            height: "400px",
            basemap_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
            basemap_attribution: "OpenStreetMap",
            bounds: (-79.0, 35.6, -78.6, 35.8),
        }
    }

    #[test]
    fn page_contains_layers_in_order() {
        let layers = vec![
            PageLayer::Image {
                name: "elevation@PERMANENT".to_string(),
                data_uri: "data:image/png;base64,AAAA".to_string(),
                bounds: (-79.0, 35.6, -78.6, 35.8),
                opacity: 0.7,
            },
            PageLayer::GeoJson {
                name: "roadsmajor@PERMANENT".to_string(),
                data: json!({"type": "FeatureCollection", "features": []}),
            },
        ];
        let page = render_page(&options(), &layers);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>roads &amp; &lt;rivers&gt;</title>"));
        let raster = page.find("elevation@PERMANENT").unwrap();
        let vector = page.find("roadsmajor@PERMANENT").unwrap();
        assert!(raster < vector);
        assert!(page.contains("[[35.6,-79.0],[35.8,-78.6]]"));
        assert!(!page.contains("__CONFIG__"));
    }

    #[test]
    fn script_end_tag_in_data_is_escaped() {
        let layers = vec![PageLayer::GeoJson {
            name: "</script><script>alert(1)</script>".to_string(),
            data: json!({"type": "FeatureCollection", "features": []}),
        }];
        let page = render_page(&options(), &layers);
        assert_eq!(page.matches("</script>").count(), 2);
        assert!(page.contains("<\\/script><script>alert(1)<\\/script>"));
    }
}
