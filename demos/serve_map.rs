use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use mapsight_core::import_data;
use mapsight_core::raster::RasterMap;
use mapsight_core::region::Region;
use mapsight_core::{InteractiveMap, Session};
use std::sync::Arc;

// cargo run --example serve_map -- [location dir]
pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_module_path(false)
        .init();

    let location_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./target/demo_location".to_string());
    let session = Arc::new(Session::open(&location_dir, "PERMANENT")?);

    let region = Region::new(35.74, 35.69, -78.74, -78.82, 0.0005, 0.0005)?;
    let (cx, cy) = (-78.78, 35.715);
    let hill = RasterMap::from_fn(region, |x, y| {
        let d2 = (x - cx).powi(2) + (y - cy).powi(2);
        (100.0 + 60.0 * (-d2 / 0.0002).exp()) as f32
    });
    session.write_raster("hill", &hill)?;
    let (walk, attributes) = import_data::load_gpx("./tests/data/durham_walk.gpx")?;
    session.write_vector("walk", &walk, Some(&attributes))?;
    session.set_region(region)?;

    let mut map = InteractiveMap::new(session.clone()).with_size("100%", "100vh");
    map.add_raster("hill")?.add_vector("walk")?;
    let view = map.show()?;
    map.save(format!("{}/demo.html", location_dir))?;

    println!("================================================");
    println!("[Map Server]: {}", view.url());
    println!("[Map File]:   {}/demo.html", location_dir);
    println!("Press Ctrl+C to exit");

    enable_raw_mode()?;
    loop {
        if let Ok(Event::Key(KeyEvent {
            code, modifiers, ..
        })) = event::read()
        {
            if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
                disable_raw_mode()?;
                println!("Ctrl+C pressed. Stopping...");
                drop(view);
                return Ok(());
            }
        }
    }
}
