use anyhow::Result;
use itertools::Itertools;
use std::str::FromStr;
use strum::IntoEnumIterator;

use super::Params;
use crate::error::DatasetKind;
use crate::session::{QualifiedName, Session};

fn parse_element(element: &str) -> Result<DatasetKind> {
    match element {
        "cell" => Ok(DatasetKind::Raster),
        _ => DatasetKind::from_str(element)
            .map_err(|_| {
                anyhow!(
                    "g.findfile: unsupported element <{}>, expected one of: cell, {}",
                    element,
                    DatasetKind::iter().join(", ")
                )
            }),
    }
}

/// `g.findfile`: looks a dataset up and prints `name=`, `mapset=` and
/// `fullname=` lines. All three are empty when nothing is found.
///
/// `mapset=` restricts the lookup: empty searches the search path, `.` is
/// the current mapset.
pub fn run(session: &Session, params: &[(&str, &str)]) -> Result<String> {
    let params = Params::parse("g.findfile", params, &["element", "file", "mapset"], "")?;
    let kind = parse_element(params.required("element")?)?;
    let file = params.required("file")?;

    let (name, qualifier) = QualifiedName::split(file);
    let mapset = match params.get("mapset") {
        None | Some("") => qualifier.map(str::to_string),
        Some(".") => Some(session.mapset().to_string()),
        Some(mapset) => Some(mapset.to_string()),
    };
    let found = match (qualifier, &mapset) {
        (Some(qualifier), Some(mapset)) if qualifier != mapset => None,
        (_, Some(mapset)) => session.find(kind, &format!("{}@{}", name, mapset))?,
        (_, None) => session.find(kind, name)?,
    };

    Ok(match found {
        Some(found) => format!(
            "name={}\nmapset={}\nfullname={}\n",
            found.name, found.mapset, found
        ),
        None => {
            debug!("g.findfile: {} <{}> not found", kind, file);
            "name=\nmapset=\nfullname=\n".to_string()
        }
    })
}
