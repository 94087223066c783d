use anyhow::Result;
use itertools::Itertools;

use super::Params;
use crate::error::DatasetKind;
use crate::location_db::SelectResult;
use crate::session::Session;
use crate::vector::AttributeValue;

/// Separator keywords, anything else is taken literally.
fn separator(value: &str) -> &str {
    match value {
        "pipe" => "|",
        "comma" => ",",
        "space" => " ",
        "tab" => "\t",
        "newline" => "\n",
        _ => value,
    }
}

pub struct OutputOptions<'a> {
    pub separator: &'a str,
    pub vertical_separator: Option<&'a str>,
    pub null_value: Option<&'a str>,
    pub column_names: bool,
    pub vertical: bool,
}

/// Horizontal output is a header line followed by one line per record.
/// Vertical output prints one `name<sep>value` line per column, records
/// optionally followed by the vertical separator.
pub fn format(result: &SelectResult, options: &OutputOptions) -> String {
    let mut out = String::new();
    if !options.vertical && options.column_names {
        out.push_str(&result.columns.iter().join(options.separator));
        out.push('\n');
    }
    for row in &result.rows {
        for (i, (column, value)) in result.columns.iter().zip(row).enumerate() {
            if options.vertical && options.column_names {
                out.push_str(column);
                out.push_str(options.separator);
            }
            if i > 0 && !options.vertical {
                out.push_str(options.separator);
            }
            match (value, options.null_value) {
                (AttributeValue::Null, Some(null_value)) => {
                    out.push_str(null_value)
                }
                _ => out.push_str(&value.to_string()),
            }
            if options.vertical {
                out.push('\n');
            }
        }
        if !options.vertical {
            out.push('\n');
        } else if let Some(vertical_separator) = options.vertical_separator {
            out.push_str(vertical_separator);
            out.push('\n');
        }
    }
    out
}

/// `v.db.select`: prints the attribute table of a vector map.
pub fn run(session: &Session, params: &[(&str, &str)]) -> Result<String> {
    let params = Params::parse(
        "v.db.select",
        params,
        &[
            "map",
            "layer",
            "columns",
            "where",
            "separator",
            "vertical_separator",
            "null_value",
        ],
        "cv",
    )?;
    let map = session.resolve(DatasetKind::Vector, params.required("map")?)?;
    // attributes are only ever linked to the first layer
    let layer = params.get("layer").unwrap_or("1");
    if layer != "1" {
        bail!(
            "Database connection not defined for layer <{}> of <{}>",
            layer,
            map
        );
    }
    let result = session.select_attributes(&map, params.get("columns"), params.get("where"))?;
    debug!(
        "v.db.select: {} rows from <{}>",
        result.rows.len(),
        map
    );

    let options = OutputOptions {
        separator: separator(params.get("separator").unwrap_or("pipe")),
        vertical_separator: params.get("vertical_separator").map(separator),
        null_value: params.get("null_value"),
        column_names: !params.flag('c'),
        vertical: params.flag('v'),
    };
    Ok(format(&result, &options))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SelectResult {
        SelectResult {
            columns: vec!["cat".to_string(), "name".to_string()],
            rows: vec![
                vec![AttributeValue::Integer(1), AttributeValue::Text("A1".to_string())],
                vec![AttributeValue::Integer(2), AttributeValue::Null],
            ],
        }
    }

    fn options() -> OutputOptions<'static> {
        OutputOptions {
            separator: "|",
            vertical_separator: None,
            null_value: None,
            column_names: true,
            vertical: false,
        }
    }

    #[test]
    fn horizontal() {
        assert_eq!(format(&sample(), &options()), "cat|name\n1|A1\n2|\n");
    }

    #[test]
    fn horizontal_no_header_with_null_value() {
        let options = OutputOptions {
            column_names: false,
            null_value: Some("NULL"),
            ..options()
        };
        assert_eq!(format(&sample(), &options), "1|A1\n2|NULL\n");
    }

    #[test]
    fn vertical() {
        let options = OutputOptions {
            vertical: true,
            vertical_separator: Some("--"),
            ..options()
        };
        assert_eq!(
            format(&sample(), &options),
            "cat|1\nname|A1\n--\ncat|2\nname|\n--\n"
        );

        let options = OutputOptions {
            vertical: true,
            column_names: false,
            ..self::options()
        };
        assert_eq!(format(&sample(), &options), "1\nA1\n2\n\n");
    }

    #[test]
    fn separator_keywords() {
        assert_eq!(separator("comma"), ",");
        assert_eq!(separator("tab"), "\t");
        assert_eq!(separator(";"), ";");
    }
}
