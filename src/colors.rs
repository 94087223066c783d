use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ColorRamp {
    /// green -> yellow -> brown -> white
    #[default]
    Elevation,
    Viridis,
    Grey,
}

type Stop = (f64, [u8; 3]);

const ELEVATION: &[Stop] = &[
    (0.0, [0, 191, 191]),
    (0.1, [0, 255, 0]),
    (0.3, [255, 255, 0]),
    (0.5, [255, 127, 0]),
    (0.75, [191, 127, 63]),
    (1.0, [200, 200, 200]),
];

const VIRIDIS: &[Stop] = &[
    (0.0, [68, 1, 84]),
    (0.25, [59, 82, 139]),
    (0.5, [33, 145, 140]),
    (0.75, [94, 201, 98]),
    (1.0, [253, 231, 37]),
];

const GREY: &[Stop] = &[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])];

impl ColorRamp {
    fn stops(&self) -> &'static [Stop] {
        match self {
            Self::Elevation => ELEVATION,
            Self::Viridis => VIRIDIS,
            Self::Grey => GREY,
        }
    }

    /// RGBA for `value` stretched over `[min, max]`. NaN is fully
    /// transparent.
    pub fn rgba(&self, value: f32, min: f64, max: f64) -> [u8; 4] {
        if value.is_nan() {
            return [0, 0, 0, 0];
        }
        let t = if max > min {
            ((value as f64 - min) / (max - min)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let stops = self.stops();
        let upper = stops
            .iter()
            .position(|(pos, _)| *pos >= t)
            .unwrap_or(stops.len() - 1);
        if upper == 0 {
            let [r, g, b] = stops[0].1;
            return [r, g, b, 255];
        }
        let (p0, c0) = stops[upper - 1];
        let (p1, c1) = stops[upper];
        let f = if p1 > p0 { (t - p0) / (p1 - p0) } else { 0.0 };
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
        [lerp(c0[0], c1[0]), lerp(c0[1], c1[1]), lerp(c0[2], c1[2]), 255]
    }
}
