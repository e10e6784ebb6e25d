use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;

/// Output format configuration
#[derive(Clone, Debug)]
pub struct OutputFormat {
    pub json: bool,
}

impl OutputFormat {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print tabular data, column-aligned like `column -t`
    pub fn print_table<T>(&self, data: &[Vec<T>])
    where
        T: Display + AsRef<str>,
    {
        for line in format_table(data) {
            println!("{line}");
        }
    }

    /// Print single-column data
    pub fn print_list<T>(&self, items: &[T])
    where
        T: Display,
    {
        for item in items {
            println!("{item}");
        }
    }

    /// Print key-value pairs, as a JSON object in JSON mode
    pub fn print_key_value<K, V>(&self, pairs: &[(K, V)])
    where
        K: Display + AsRef<str>,
        V: Display + AsRef<str>,
    {
        if self.json {
            let object: serde_json::Map<String, Value> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect();
            println!("{}", pretty_json(&Value::Object(object)));
            return;
        }

        let data: Vec<Vec<String>> = pairs
            .iter()
            .map(|(k, v)| vec![format!("{k}:"), v.to_string()])
            .collect();
        self.print_table(&data);
    }

    /// Print any serializable value as indented JSON
    pub fn print_json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => tracing::warn!("Failed to render JSON output: {e}"),
        }
    }
}

/// Indent a JSON value with two spaces.
pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn format_table<T>(data: &[Vec<T>]) -> Vec<String>
where
    T: Display + AsRef<str>,
{
    if data.is_empty() {
        return Vec::new();
    }

    let num_cols = data.iter().map(Vec::len).max().unwrap_or(0);
    let mut col_widths = vec![0; num_cols];

    for row in data {
        for (i, cell) in row.iter().enumerate() {
            col_widths[i] = col_widths[i].max(cell.as_ref().len());
        }
    }

    data.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, cell)| {
                    if i == row.len() - 1 {
                        // Last column - no padding needed
                        cell.to_string()
                    } else {
                        format!("{:<width$}", cell.as_ref(), width = col_widths[i])
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect()
}
