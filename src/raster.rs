use anyhow::Result;
use std::io::{Read, Write};

use crate::colors::ColorRamp;
use crate::region::Region;

// 3 is the zstd default
pub const ZSTD_COMPRESS_LEVEL: i32 = 3;

/// A single band grid. Cells are row-major starting at the north-west
/// corner; NaN marks a null cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMap {
    pub header: Region,
    pub data: Vec<f32>,
    pub color_ramp: ColorRamp,
}

impl RasterMap {
    pub fn new(header: Region, data: Vec<f32>) -> Result<Self> {
        if data.len() != header.cells() {
            bail!(
                "raster data has {} cells but the header describes {}x{}",
                data.len(),
                header.rows(),
                header.cols()
            );
        }
        Ok(RasterMap {
            header,
            data,
            color_ramp: ColorRamp::default(),
        })
    }

    pub fn from_fn<F>(header: Region, f: F) -> Self
    where
        F: Fn(f64, f64) -> f32,
    {
        let mut data = Vec::with_capacity(header.cells());
        for row in 0..header.rows() {
            for col in 0..header.cols() {
                let (x, y) = header.cell_center(row, col);
                data.push(f(x, y));
            }
        }
        RasterMap {
            header,
            data,
            color_ramp: ColorRamp::default(),
        }
    }

    pub fn with_color_ramp(mut self, color_ramp: ColorRamp) -> Self {
        self.color_ramp = color_ramp;
        self
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.header.rows() || col >= self.header.cols() {
            return None;
        }
        Some(self.data[row * self.header.cols() + col])
    }

    /// Value of the cell containing (`x`, `y`), NaN outside the raster.
    pub fn value_at(&self, x: f64, y: f64) -> f32 {
        match self.header.cell_at(x, y) {
            Some((row, col)) => self.get(row, col).unwrap_or(f32::NAN),
            None => f32::NAN,
        }
    }

    /// Min and max over non-null cells.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| {
                let v = v as f64;
                match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
                }
            })
    }

    /// Nearest neighbour resampling onto the grid of `region`.
    pub fn resample(&self, region: &Region) -> Vec<f32> {
        let mut out = Vec::with_capacity(region.cells());
        for row in 0..region.rows() {
            for col in 0..region.cols() {
                let (x, y) = region.cell_center(row, col);
                out.push(self.value_at(x, y));
            }
        }
        out
    }

    pub fn serialize<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut encoder = zstd::Encoder::new(&mut writer, ZSTD_COMPRESS_LEVEL)?.auto_finish();
        encoder.write_all(&(self.data.len() as u64).to_le_bytes())?;
        for v in &self.data {
            encoder.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: R, header: Region, color_ramp: ColorRamp) -> Result<Self> {
        let mut decoder = zstd::Decoder::new(reader)?;
        let mut len_bytes = [0u8; 8];
        decoder.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;
        if len != header.cells() {
            bail!(
                "stored raster has {} cells but its header expects {}",
                len,
                header.cells()
            );
        }
        let mut data = Vec::with_capacity(len);
        let mut cell = [0u8; 4];
        for _ in 0..len {
            decoder.read_exact(&mut cell)?;
            data.push(f32::from_le_bytes(cell));
        }
        Ok(RasterMap {
            header,
            data,
            color_ramp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> RasterMap {
        let header = Region::new(2.0, 0.0, 3.0, 0.0, 1.0, 1.0).unwrap();
        RasterMap::new(header, vec![1.0, 2.0, f32::NAN, 4.0, 5.0, 6.0]).unwrap()
    }

    #[test]
    fn size_must_match_header() {
        let header = Region::new(2.0, 0.0, 3.0, 0.0, 1.0, 1.0).unwrap();
        assert!(RasterMap::new(header, vec![0.0; 5]).is_err());
    }

    #[test]
    fn lookup_and_range() {
        let raster = small();
        assert_eq!(raster.get(1, 0), Some(4.0));
        assert_eq!(raster.get(2, 0), None);
        assert_eq!(raster.value_at(2.5, 0.5), 6.0);
        assert!(raster.value_at(5.0, 0.5).is_nan());
        assert_eq!(raster.range(), Some((1.0, 6.0)));
    }

    #[test]
    fn resample_to_finer_grid() {
        let raster = small();
        let finer = Region::new(2.0, 0.0, 3.0, 0.0, 0.5, 0.5).unwrap();
        let data = raster.resample(&finer);
        assert_eq!(data.len(), 24);
        assert_eq!(data[0], 1.0);
        assert_eq!(data[1], 1.0);
        assert_eq!(data[2], 2.0);
        assert!(data[4].is_nan());
    }

    #[test]
    fn stored_bytes_keep_nulls() {
        let raster = small().with_color_ramp(ColorRamp::Grey);
        let mut buf = Vec::new();
        raster.serialize(&mut buf).unwrap();
        let loaded = RasterMap::deserialize(&buf[..], raster.header, ColorRamp::Grey).unwrap();
        assert_eq!(loaded.get(0, 1), Some(2.0));
        assert!(loaded.get(0, 2).unwrap().is_nan());
        assert_eq!(loaded.color_ramp, ColorRamp::Grey);
    }
}
