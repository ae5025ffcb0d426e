use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use database::{Record, Value};

/// Renders rows either as pretty JSON or as a table whose columns are the
/// union of every row's columns, in first-seen order.
pub fn records(records: &[Record], json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(records)?);
    }
    if records.is_empty() {
        return Ok("(no rows)".to_string());
    }

    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for column in record.columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(columns.clone());
    for record in records {
        table.add_row(columns.iter().map(|column| cell(&record[*column])));
    }

    Ok(format!("{table}\n({} row{})", records.len(), plural(records.len())))
}

/// Renders a list of names, one per line or as a JSON array.
pub fn names(names: &[String], json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(names)?);
    }
    Ok(names.join("\n"))
}

/// Renders a single count, e.g. rows affected.
pub fn count(label: &str, n: u64, json: bool) -> String {
    if json {
        let mut object = serde_json::Map::new();
        object.insert(label.to_string(), n.into());
        serde_json::Value::Object(object).to_string()
    } else {
        format!("{n} {label}")
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::fields;

    #[test]
    fn test_table_uses_union_of_columns() {
        let rows = vec![
            Record::from(fields! { "_id" => 1i64, "name" => "pinto" }),
            Record::from(fields! { "_id" => 2i64, "colour" => "red" }),
        ];
        let out = records(&rows, false).unwrap();
        let header = out.lines().find(|line| line.contains("_id")).unwrap();
        let name_at = header.find("name").unwrap();
        let colour_at = header.find("colour").unwrap();
        assert!(name_at < colour_at);
        assert!(out.contains("pinto"));
        assert!(out.ends_with("(2 rows)"));
    }

    #[test]
    fn test_json_output() {
        let rows = vec![Record::from(fields! { "_id" => 1i64, "tags" => vec!["dry"] })];
        let out = records(&rows, true).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, serde_json::json!([{ "_id": 1, "tags": ["dry"] }]));
    }

    #[test]
    fn test_empty_and_counts() {
        assert_eq!(records(&[], false).unwrap(), "(no rows)");
        assert_eq!(records(&[], true).unwrap(), "[]");
        assert_eq!(count("deleted", 3, false), "3 deleted");
        assert_eq!(count("deleted", 3, true), r#"{"deleted":3}"#);
    }
}
