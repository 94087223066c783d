use anyhow::Result;

use super::Params;
use crate::error::DatasetKind;
use crate::region::Region;
use crate::session::Session;

/// `g.region`: inspect or change the active computational region.
///
/// `raster=` copies a raster's header, `vector=` grows the bounds to the
/// vector's extent on the current resolution grid, `n/s/e/w/res/nsres/ewres`
/// override single values afterwards. `-p` prints human readable, `-g`
/// prints shell style.
pub fn run(session: &Session, params: &[(&str, &str)]) -> Result<String> {
    let params = Params::parse(
        "g.region",
        params,
        &["raster", "vector", "n", "s", "e", "w", "res", "nsres", "ewres"],
        "pg",
    )?;

    let mut region = session.region()?;
    let mut changed = false;

    if let Some(raster) = params.get("raster") {
        let raster = session.resolve(DatasetKind::Raster, raster)?;
        let (header, _) = session.raster_header(&raster)?;
        region = header;
        changed = true;
    }

    if let Some(vector) = params.get("vector") {
        let vector = session.resolve(DatasetKind::Vector, vector)?;
        let (west, south, east, north) = session
            .read_vector(&vector)?
            .bounds()
            .ok_or_else(|| anyhow!("g.region: vector map <{}> is empty", vector))?;
        region = region.with_bounds_aligned(north, south, east, west)?;
        changed = true;
    }

    let mut set = |value: Option<f64>, slot: &mut f64| {
        if let Some(value) = value {
            *slot = value;
            changed = true;
        }
    };
    set(params.get_f64("n")?, &mut region.north);
    set(params.get_f64("s")?, &mut region.south);
    set(params.get_f64("e")?, &mut region.east);
    set(params.get_f64("w")?, &mut region.west);
    if let Some(res) = params.get_f64("res")? {
        set(Some(res), &mut region.ns_res);
        set(Some(res), &mut region.ew_res);
    }
    set(params.get_f64("nsres")?, &mut region.ns_res);
    set(params.get_f64("ewres")?, &mut region.ew_res);

    if changed {
        let region = Region::new(
            region.north,
            region.south,
            region.east,
            region.west,
            region.ns_res,
            region.ew_res,
        )?;
        session.set_region(region)?;
        info!("g.region: region set to {}", region.cache_key());
    }

    let region = session.region()?;
    if params.flag('g') {
        Ok(region.to_shell_string())
    } else if params.flag('p') {
        Ok(region.to_string())
    } else {
        Ok(String::new())
    }
}
