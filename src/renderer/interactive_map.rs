use std::path::Path;
use std::sync::Arc;

use super::MapView;
use crate::error::{DatasetKind, MapError};
use crate::location_db::Setting;
use crate::session::{QualifiedName, Session};

pub const DEFAULT_BASEMAP_URL: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_BASEMAP_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";
pub const DEFAULT_RASTER_OPACITY: f64 = 0.7;
pub const DEFAULT_MAX_OVERLAY_SIZE: usize = 1024;

/// A dataset registered for display. Layers are drawn in registration
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub kind: DatasetKind,
    pub name: QualifiedName,
    pub opacity: f64,
}

/// Collects raster and vector layers and turns them into an interactive
/// web map, either served locally (`show`) or written to a file (`save`).
///
/// Names are resolved when a layer is added, so a missing dataset is
/// reported by `add_raster`/`add_vector` and never by `show`/`save`. The
/// rendered map covers the session's computational region at the time of
/// rendering.
pub struct InteractiveMap {
    session: Arc<Session>,
    width: String,
    height: String,
    layers: Vec<Layer>,
}

impl InteractiveMap {
    pub fn new(session: Arc<Session>) -> Self {
        InteractiveMap {
            session,
            width: "100%".to_string(),
            height: "400px".to_string(),
            layers: Vec::new(),
        }
    }

    /// CSS width and height of the map element.
    pub fn with_size(mut self, width: &str, height: &str) -> Self {
        self.width = width.to_string();
        self.height = height.to_string();
        self
    }

    pub fn add_raster(&mut self, name: &str) -> Result<&mut Self, MapError> {
        let opacity = self
            .session
            .setting_with_default(Setting::RasterOpacity, DEFAULT_RASTER_OPACITY);
        self.add_raster_with_opacity(name, opacity)
    }

    pub fn add_raster_with_opacity(
        &mut self,
        name: &str,
        opacity: f64,
    ) -> Result<&mut Self, MapError> {
        self.add_layer(DatasetKind::Raster, name, opacity.clamp(0.0, 1.0))
    }

    pub fn add_vector(&mut self, name: &str) -> Result<&mut Self, MapError> {
        self.add_layer(DatasetKind::Vector, name, 1.0)
    }

    fn add_layer(
        &mut self,
        kind: DatasetKind,
        name: &str,
        opacity: f64,
    ) -> Result<&mut Self, MapError> {
        let qualified_name = self
            .session
            .resolve(kind, name)
            .map_err(MapError::from_anyhow)?;
        info!("[interactive_map] adding {} layer {}", kind, qualified_name);
        self.layers.push(Layer {
            kind,
            name: qualified_name,
            opacity,
        });
        Ok(self)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Publishes the map on the local map server. The page is served until
    /// the returned view is dropped.
    pub fn show(&self) -> Result<MapView, MapError> {
        let document = self.render_document()?;
        let view = Self::publish(document)?;
        info!("[interactive_map] map shown at {}", view.url());
        Ok(view)
    }

    /// Writes the map as a self-contained HTML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MapError> {
        let document = self.render_document()?;
        std::fs::write(path.as_ref(), document)?;
        info!(
            "[interactive_map] map saved to {}",
            path.as_ref().display()
        );
        Ok(())
    }

    fn title(&self) -> String {
        if self.layers.is_empty() {
            "Interactive map".to_string()
        } else {
            self.layers
                .iter()
                .map(|layer| layer.name.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

#[cfg(feature = "render")]
impl InteractiveMap {
    fn render_document(&self) -> Result<String, MapError> {
        use super::html::{render_page, PageLayer, PageOptions};
        use super::overlay;

        let session = &self.session;
        let region = session.region().map_err(MapError::from_anyhow)?;
        let bounds = (region.west, region.south, region.east, region.north);
        let max_overlay_size =
            session.setting_with_default(Setting::MaxOverlaySize, DEFAULT_MAX_OVERLAY_SIZE);

        let mut page_layers = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let page_layer = match layer.kind {
                DatasetKind::Raster => {
                    let (header, _) = session
                        .raster_header(&layer.name)
                        .map_err(MapError::from_anyhow)?;
                    if !header.intersects(&region) {
                        warn!(
                            "[interactive_map] raster {} lies outside the computational region",
                            layer.name
                        );
                    }
                    let png =
                        overlay::raster_overlay(session, &layer.name, &region, max_overlay_size)
                            .map_err(MapError::from_anyhow)?;
                    PageLayer::Image {
                        name: layer.name.to_string(),
                        data_uri: overlay::png_data_uri(&png),
                        bounds,
                        opacity: layer.opacity,
                    }
                }
                DatasetKind::Vector => {
                    let vector = session
                        .read_vector(&layer.name)
                        .map_err(MapError::from_anyhow)?;
                    let attributes = session
                        .read_attributes(&layer.name)
                        .map_err(MapError::from_anyhow)?;
                    PageLayer::GeoJson {
                        name: layer.name.to_string(),
                        data: vector.to_geojson(attributes.as_ref()),
                    }
                }
            };
            page_layers.push(page_layer);
        }

        let basemap_url: String =
            session.setting_with_default(Setting::BasemapUrl, DEFAULT_BASEMAP_URL.to_string());
        let basemap_attribution: String = session.setting_with_default(
            Setting::BasemapAttribution,
            DEFAULT_BASEMAP_ATTRIBUTION.to_string(),
        );
        let title = self.title();
        Ok(render_page(
            &PageOptions {
                title: &title,
                width: &self.width,
                height: &self.height,
                basemap_url: &basemap_url,
                basemap_attribution: &basemap_attribution,
                bounds,
            },
            &page_layers,
        ))
    }

    fn publish(document: String) -> Result<MapView, MapError> {
        super::map_server::publish(document).map_err(MapError::from_anyhow)
    }
}

#[cfg(not(feature = "render"))]
impl InteractiveMap {
    fn render_document(&self) -> Result<String, MapError> {
        warn!(
            "[interactive_map] cannot render {}: {} is not enabled",
            self.title(),
            super::BACKEND
        );
        Err(MapError::DependencyUnavailable(super::BACKEND))
    }

    fn publish(_document: String) -> Result<MapView, MapError> {
        Err(MapError::DependencyUnavailable(super::BACKEND))
    }
}
