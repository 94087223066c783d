use anyhow::Result;
use std::collections::{HashMap, HashSet};

use crate::session::Session;

pub mod g_findfile;
pub mod g_region;
pub mod v_db_select;

/// Dispatches a module call by name.
pub fn run(session: &Session, module: &str, params: &[(&str, &str)]) -> Result<String> {
    debug!("[modules] running {} {:?}", module, params);
    match module {
        "g.region" => g_region::run(session, params),
        "g.findfile" => g_findfile::run(session, params),
        "v.db.select" => v_db_select::run(session, params),
        _ => bail!("unknown module <{}>", module),
    }
}

/// Named string parameters of a module call. One-letter flags are passed
/// together under the `flags` key, e.g. `("flags", "cv")`.
pub struct Params<'a> {
    module: &'static str,
    values: HashMap<&'a str, &'a str>,
    flags: HashSet<char>,
}

impl<'a> Params<'a> {
    pub fn parse(
        module: &'static str,
        params: &[(&'a str, &'a str)],
        allowed: &[&str],
        allowed_flags: &str,
    ) -> Result<Self> {
        let mut values = HashMap::new();
        let mut flags = HashSet::new();
        for (key, value) in params {
            if *key == "flags" {
                for flag in value.chars() {
                    if !allowed_flags.contains(flag) {
                        bail!("{}: unknown flag -{}", module, flag);
                    }
                    flags.insert(flag);
                }
                continue;
            }
            if !allowed.contains(key) {
                bail!("{}: unknown parameter <{}>", module, key);
            }
            if values.insert(*key, *value).is_some() {
                bail!("{}: parameter <{}> given more than once", module, key);
            }
        }
        Ok(Params {
            module,
            values,
            flags,
        })
    }

    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.values.get(key).copied()
    }

    pub fn required(&self, key: &str) -> Result<&'a str> {
        self.get(key)
            .ok_or_else(|| anyhow!("{}: required parameter <{}> not set", self.module, key))
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => match value.trim().parse::<f64>() {
                Ok(v) => Ok(Some(v)),
                Err(_) => bail!(
                    "{}: <{}> is not a number for parameter <{}>",
                    self.module,
                    value,
                    key
                ),
            },
        }
    }

    pub fn flag(&self, flag: char) -> bool {
        self.flags.contains(&flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_values_and_flags() {
        let params = Params::parse(
            "test",
            &[("map", "roads"), ("flags", "cv"), ("n", "1.5")],
            &["map", "n"],
            "cv",
        )
        .unwrap();
        assert_eq!(params.get("map"), Some("roads"));
        assert_eq!(params.get_f64("n").unwrap(), Some(1.5));
        assert!(params.flag('c'));
        assert!(params.flag('v'));
        assert!(!params.flag('p'));
        assert!(params.required("where").is_err());
    }

    #[test]
    fn reject_unknown_and_duplicate() {
        assert!(Params::parse("test", &[("bogus", "1")], &["map"], "").is_err());
        assert!(Params::parse("test", &[("flags", "x")], &["map"], "c").is_err());
        assert!(Params::parse("test", &[("map", "a"), ("map", "b")], &["map"], "").is_err());
        let params = Params::parse("test", &[("n", "north")], &["n"], "").unwrap();
        assert!(params.get_f64("n").is_err());
    }
}
