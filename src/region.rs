use anyhow::Result;
use std::fmt;

use crate::error::MapError;

/// Rows and columns are each capped at what a 32 bit signed grid index holds.
pub const MAX_DIMENSION: usize = i32::MAX as usize;

/* A computational region: the extent and resolution every raster operation
implicitly works in. Rows and columns are derived, never stored, so they
cannot drift from the bounds.

Coordinates are longitude/latitude degrees. */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub ns_res: f64,
    pub ew_res: f64,
}

impl Region {
    pub fn new(north: f64, south: f64, east: f64, west: f64, ns_res: f64, ew_res: f64) -> Result<Self> {
        let region = Region {
            north,
            south,
            east,
            west,
            ns_res,
            ew_res,
        };
        region.validate()?;
        Ok(region)
    }

    /// The region used by a fresh mapset that has never been configured.
    pub fn world() -> Self {
        Region {
            north: 90.0,
            south: -90.0,
            east: 180.0,
            west: -180.0,
            ns_res: 1.0,
            ew_res: 1.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let values = [
            self.north,
            self.south,
            self.east,
            self.west,
            self.ns_res,
            self.ew_res,
        ];
        if values.iter().any(|x| !x.is_finite()) {
            return Err(MapError::InvalidRegion(format!("non finite value in {:?}", self)).into());
        }
        if self.north <= self.south {
            return Err(MapError::InvalidRegion(format!(
                "north ({}) must be larger than south ({})",
                self.north, self.south
            ))
            .into());
        }
        if self.east <= self.west {
            return Err(MapError::InvalidRegion(format!(
                "east ({}) must be larger than west ({})",
                self.east, self.west
            ))
            .into());
        }
        if self.ns_res <= 0.0 || self.ew_res <= 0.0 {
            return Err(MapError::InvalidRegion(format!(
                "resolution must be positive: nsres={}, ewres={}",
                self.ns_res, self.ew_res
            ))
            .into());
        }
        let (rows, cols) = (self.rows(), self.cols());
        if rows > MAX_DIMENSION || cols > MAX_DIMENSION || rows.checked_mul(cols).is_none() {
            return Err(MapError::InvalidRegion(format!(
                "resolution too fine: {} rows x {} cols",
                rows, cols
            ))
            .into());
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        ((self.north - self.south) / self.ns_res).round().max(1.0) as usize
    }

    pub fn cols(&self) -> usize {
        ((self.east - self.west) / self.ew_res).round().max(1.0) as usize
    }

    pub fn cells(&self) -> usize {
        self.rows().saturating_mul(self.cols())
    }

    /// Center of the cell at (`row`, `col`).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.west + (col as f64 + 0.5) * self.ew_res,
            self.north - (row as f64 + 0.5) * self.ns_res,
        )
    }

    /// The (row, col) containing the point, if it lies inside the region.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if x < self.west || x >= self.east || y <= self.south || y > self.north {
            return None;
        }
        let col = ((x - self.west) / self.ew_res).floor() as usize;
        let row = ((self.north - y) / self.ns_res).floor() as usize;
        if row < self.rows() && col < self.cols() {
            Some((row, col))
        } else {
            None
        }
    }

    /// Same resolution, new bounds grown outwards so they land on the
    /// resolution grid anchored at `self`.
    pub fn with_bounds_aligned(&self, north: f64, south: f64, east: f64, west: f64) -> Result<Self> {
        let snap_up = |v: f64, origin: f64, res: f64| origin + ((v - origin) / res).ceil() * res;
        let snap_down = |v: f64, origin: f64, res: f64| origin + ((v - origin) / res).floor() * res;
        let mut north = snap_up(north, self.south, self.ns_res);
        let south = snap_down(south, self.south, self.ns_res);
        let mut east = snap_up(east, self.west, self.ew_res);
        let west = snap_down(west, self.west, self.ew_res);
        // degenerate extents (a single point) still get one cell
        if north <= south {
            north = south + self.ns_res;
        }
        if east <= west {
            east = west + self.ew_res;
        }
        Region::new(north, south, east, west, self.ns_res, self.ew_res)
    }

    pub fn intersects(&self, other: &Region) -> bool {
        self.west < other.east
            && other.west < self.east
            && self.south < other.north
            && other.south < self.north
    }

    /// Shell style `key=value` lines, also the on-disk format.
    pub fn to_shell_string(&self) -> String {
        format!(
            "n={}\ns={}\ne={}\nw={}\nnsres={}\newres={}\nrows={}\ncols={}\ncells={}\n",
            self.north,
            self.south,
            self.east,
            self.west,
            self.ns_res,
            self.ew_res,
            self.rows(),
            self.cols(),
            self.cells()
        )
    }

    pub fn parse_shell_string(text: &str) -> Result<Self> {
        let mut north = None;
        let mut south = None;
        let mut east = None;
        let mut west = None;
        let mut ns_res = None;
        let mut ew_res = None;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed region line: {}", line))?;
            let slot = match key.trim() {
                "n" => &mut north,
                "s" => &mut south,
                "e" => &mut east,
                "w" => &mut west,
                "nsres" => &mut ns_res,
                "ewres" => &mut ew_res,
                // derived values
                "rows" | "cols" | "cells" => continue,
                other => bail!("unknown region key: {}", other),
            };
            *slot = Some(value.trim().parse::<f64>()?);
        }
        let get = |v: Option<f64>, key: &str| v.ok_or_else(|| anyhow!("region is missing `{}`", key));
        Region::new(
            get(north, "n")?,
            get(south, "s")?,
            get(east, "e")?,
            get(west, "w")?,
            get(ns_res, "nsres")?,
            get(ew_res, "ewres")?,
        )
    }

    /// Stable key for caches; two regions with the same key cover the same
    /// grid.
    pub fn cache_key(&self) -> String {
        format!(
            "{:.9}:{:.9}:{:.9}:{:.9}:{:.9}:{:.9}",
            self.north, self.south, self.east, self.west, self.ns_res, self.ew_res
        )
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "north:      {}", self.north)?;
        writeln!(f, "south:      {}", self.south)?;
        writeln!(f, "west:       {}", self.west)?;
        writeln!(f, "east:       {}", self.east)?;
        writeln!(f, "nsres:      {}", self.ns_res)?;
        writeln!(f, "ewres:      {}", self.ew_res)?;
        writeln!(f, "rows:       {}", self.rows())?;
        writeln!(f, "cols:       {}", self.cols())?;
        writeln!(f, "cells:      {}", self.cells())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Region {
        Region::new(35.8, 35.7, -78.6, -78.8, 0.01, 0.01).unwrap()
    }

    #[test]
    fn too_many_cells() {
        let error = Region::new(90.0, -90.0, 180.0, -180.0, 1e-9, 1e-9).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<MapError>(),
            Some(MapError::InvalidRegion(_))
        ));
        // still reportable without validation
        let region = Region {
            ns_res: 1e-300,
            ew_res: 1e-300,
            ..Region::world()
        };
        assert_eq!(region.cells(), usize::MAX);
    }

    #[test]
    fn derived_dimensions() {
        let region = sample();
        assert_eq!(region.rows(), 10);
        assert_eq!(region.cols(), 20);
        assert_eq!(region.cells(), 200);
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(Region::new(1.0, 2.0, 1.0, 0.0, 0.1, 0.1).is_err());
        assert!(Region::new(2.0, 1.0, 0.0, 1.0, 0.1, 0.1).is_err());
        assert!(Region::new(2.0, 1.0, 1.0, 0.0, 0.0, 0.1).is_err());
        assert!(Region::new(f64::NAN, 1.0, 1.0, 0.0, 0.1, 0.1).is_err());
    }

    #[test]
    fn cell_lookup() {
        let region = sample();
        assert_eq!(region.cell_at(-78.8, 35.8), Some((0, 0)));
        assert_eq!(region.cell_at(-78.6001, 35.7001), Some((9, 19)));
        assert_eq!(region.cell_at(-78.6, 35.75), None);
        assert_eq!(region.cell_at(-79.0, 35.75), None);
        let (x, y) = region.cell_center(0, 0);
        assert!((x - -78.795).abs() < 1e-9);
        assert!((y - 35.795).abs() < 1e-9);
    }

    #[test]
    fn shell_string_round_trip() {
        let region = sample();
        let parsed = Region::parse_shell_string(&region.to_shell_string()).unwrap();
        assert_eq!(parsed, region);
        assert!(Region::parse_shell_string("n=1\ns=0").is_err());
        assert!(Region::parse_shell_string("bogus=1").is_err());
    }

    #[test]
    fn aligned_bounds_grow_to_grid() {
        let region = Region::new(10.0, 0.0, 10.0, 0.0, 1.0, 1.0).unwrap();
        let aligned = region.with_bounds_aligned(5.5, 2.2, 7.1, 3.9).unwrap();
        assert_eq!(aligned.north, 6.0);
        assert_eq!(aligned.south, 2.0);
        assert_eq!(aligned.east, 8.0);
        assert_eq!(aligned.west, 3.0);
        let point = region.with_bounds_aligned(3.0, 3.0, 4.0, 4.0).unwrap();
        assert_eq!(point.rows(), 1);
        assert_eq!(point.cols(), 1);
    }
}
