pub mod interactive_map;
pub use interactive_map::{InteractiveMap, Layer};

pub mod registry;
pub use registry::MapView;

#[cfg(feature = "render")]
pub mod html;
#[cfg(feature = "render")]
pub mod map_server;
#[cfg(feature = "render")]
pub mod overlay;

/// Name of the optional rendering backend, used in error messages.
pub const BACKEND: &str = "crate feature `render` (leaflet/png backend)";

/// Whether `show` and `save` can produce anything in this build.
pub fn can_render() -> bool {
    cfg!(feature = "render")
}
