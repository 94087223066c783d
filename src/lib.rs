#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod cache_db;
pub mod colors;
pub mod error;
pub mod import_data;
pub mod location_db;
pub mod logs;
pub mod modules;
pub mod raster;
pub mod region;
pub mod renderer;
pub mod session;
pub mod utils;
pub mod vector;

pub use error::{DatasetKind, MapError};
pub use renderer::{can_render, InteractiveMap, MapView};
pub use session::{QualifiedName, Session, TempRegion};
