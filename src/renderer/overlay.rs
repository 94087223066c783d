use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

use crate::cache_db::OverlayCacheKey;
use crate::raster::RasterMap;
use crate::region::Region;
use crate::session::{QualifiedName, Session};

/// `region` with its resolution coarsened until neither side exceeds
/// `max_size` cells.
pub fn overlay_grid(region: &Region, max_size: usize) -> Result<Region> {
    let max_size = max_size.max(1);
    let longest = region.rows().max(region.cols());
    if longest <= max_size {
        return Ok(*region);
    }
    let factor = (longest as f64 / max_size as f64).ceil();
    Region::new(
        region.north,
        region.south,
        region.east,
        region.west,
        region.ns_res * factor,
        region.ew_res * factor,
    )
}

/// Samples `raster` on `grid` and encodes it as PNG, one pixel per cell.
/// Colors are stretched over the value range of the whole raster so the
/// same value gets the same color whatever the region.
pub fn render_png(raster: &RasterMap, grid: &Region) -> Result<Vec<u8>> {
    let (min, max) = raster.range().unwrap_or((0.0, 0.0));
    let values = raster.resample(grid);
    let cols = grid.cols();
    let image = RgbaImage::from_fn(cols as u32, grid.rows() as u32, |x, y| {
        let value = values[y as usize * cols + x as usize];
        Rgba(raster.color_ramp.rgba(value, min, max))
    });
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// The PNG overlay of `raster` for `region`, served from the overlay cache
/// when the raster content and the grid are unchanged.
pub fn raster_overlay(
    session: &Session,
    raster: &QualifiedName,
    region: &Region,
    max_size: usize,
) -> Result<Vec<u8>> {
    let grid = overlay_grid(region, max_size)?;
    let (_, revision) = session.raster_header(raster)?;
    let key = OverlayCacheKey::new(raster, &revision, &grid);
    session.with_cache_db(|cache_db| {
        cache_db.get_overlay_or_compute(&key, || {
            let map = session.read_raster(raster)?;
            debug!(
                "[overlay] rendering {} on {}x{}",
                raster,
                grid.cols(),
                grid.rows()
            );
            render_png(&map, &grid)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_capped() {
        let region = Region::new(10.0, 0.0, 20.0, 0.0, 0.01, 0.01).unwrap();
        let grid = overlay_grid(&region, 500).unwrap();
        assert!(grid.rows() <= 500 && grid.cols() <= 500);
        assert_eq!(grid.north, region.north);
        assert_eq!(grid.west, region.west);

        let small = Region::new(1.0, 0.0, 1.0, 0.0, 0.1, 0.1).unwrap();
        assert_eq!(overlay_grid(&small, 500).unwrap(), small);
    }

    #[test]
    fn png_has_grid_size() {
        let header = Region::new(2.0, 0.0, 3.0, 0.0, 1.0, 1.0).unwrap();
        let raster = RasterMap::from_fn(header, |x, y| (x + y) as f32);
        let png = render_png(&raster, &header).unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert!(png_data_uri(&png).starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn cells_outside_raster_are_transparent() {
        let header = Region::new(1.0, 0.0, 1.0, 0.0, 1.0, 1.0).unwrap();
        let raster = RasterMap::from_fn(header, |_, _| 5.0);
        let grid = Region::new(1.0, 0.0, 2.0, 0.0, 1.0, 1.0).unwrap();
        let png = render_png(&raster, &grid).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0[3], 255);
        assert_eq!(decoded.get_pixel(1, 0).0[3], 0);
    }
}
