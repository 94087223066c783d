use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum DatasetKind {
    Raster,
    Vector,
}

/// Errors surfaced to callers of the map façade and the session.
///
/// Internal code works with `anyhow::Result` and wraps these when a typed
/// failure matters to the caller; use `anyhow::Error::downcast_ref` to get
/// them back.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("{kind} map <{name}> not found")]
    NotFound { kind: DatasetKind, name: String },

    #[error("rendering backend unavailable: {0}")]
    DependencyUnavailable(&'static str),

    #[error("<{0}> is not a legal map name")]
    InvalidName(String),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MapError {
    pub fn not_found(kind: DatasetKind, name: &str) -> Self {
        MapError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Recover a typed error that travelled through an `anyhow::Error`.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        match error.downcast::<MapError>() {
            Ok(map_error) => map_error,
            Err(error) => match error.downcast::<std::io::Error>() {
                Ok(io_error) => MapError::Io(io_error),
                Err(error) => MapError::Other(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_error_survives_anyhow() {
        let error: anyhow::Error = MapError::not_found(DatasetKind::Raster, "elevation").into();
        match MapError::from_anyhow(error) {
            MapError::NotFound { kind, name } => {
                assert_eq!(kind, DatasetKind::Raster);
                assert_eq!(name, "elevation");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn kind_round_trips_through_strings() {
        assert_eq!(DatasetKind::Vector.to_string(), "vector");
        assert_eq!("raster".parse::<DatasetKind>().unwrap(), DatasetKind::Raster);
    }
}
