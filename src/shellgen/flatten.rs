//! Config-tree flattening and scalar formatting (C1).

use toml::Value;

/// One flattened `(dotted-key, value)` entry. The original `toml::Value` is
/// preserved (not yet formatted) so callers can apply CLI-specific
/// formatting rules (e.g. Codex wants JSON array syntax, Copilot wants
/// `--flag`/`--no-flag` for booleans).
#[derive(Debug, Clone, PartialEq)]
pub struct FlatEntry {
    pub key: String,
    pub value: Value,
}

/// Walks `config` in ascending key order at every nesting level, emitting
/// `(dotted-key, value)` pairs. Empty mappings and empty/whitespace scalar
/// strings are omitted. When `expand_arrays` is true, each non-empty array
/// element yields its own entry under the same key; otherwise arrays are
/// kept intact as a single entry.
pub fn flatten(config: &Value, expand_arrays: bool) -> Vec<FlatEntry> {
    let mut out = Vec::new();
    walk(config, String::new(), expand_arrays, &mut out);
    out
}

fn walk(value: &Value, prefix: String, expand_arrays: bool, out: &mut Vec<FlatEntry>) {
    match value {
        Value::Table(table) => {
            let mut keys: Vec<&String> = table.keys().collect();
            keys.sort();
            for key in keys {
                let child = table.get(key).expect("key from keys() exists");
                let next_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                walk(child, next_prefix, expand_arrays, out);
            }
        }
        Value::Array(items) if expand_arrays => {
            for item in items {
                if is_empty_scalar(item) {
                    continue;
                }
                out.push(FlatEntry {
                    key: prefix.clone(),
                    value: item.clone(),
                });
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                return;
            }
            out.push(FlatEntry {
                key: prefix,
                value: value.clone(),
            });
        }
        scalar => {
            if is_empty_scalar(scalar) {
                return;
            }
            out.push(FlatEntry {
                key: prefix,
                value: scalar.clone(),
            });
        }
    }
}

fn is_empty_scalar(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

/// Formats a scalar the way §4.1 specifies: strings verbatim, booleans as
/// `true`/`false`, integers canonical, floats via the shortest
/// round-trippable base-10 representation, anything else (tables, arrays)
/// via JSON encoding.
pub fn format_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        other => serde_json::to_string(&toml_to_json(other)).unwrap_or_default(),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn toml_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(toml_to_json).collect()),
        Value::Table(table) => {
            let mut map = serde_json::Map::new();
            for (k, v) in table {
                map.insert(k.clone(), toml_to_json(v));
            }
            serde_json::Value::Object(map)
        }
    }
}

/// Normalizes a dotted key into a CLI flag name: `.` and `_` become `-`.
pub fn normalize_flag_name(key: &str) -> String {
    key.chars()
        .map(|c| if c == '.' || c == '_' { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Value {
        toml::from_str(src).expect("valid toml fixture")
    }

    #[test]
    fn flattens_nested_tables_in_ascending_order() {
        let cfg = parse("b = 1\n[a]\nz = \"1\"\ny = \"2\"\n");
        let entries = flatten(&cfg, true);
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a.y", "a.z", "b"]);
    }

    #[test]
    fn omits_empty_mappings_and_blank_scalars() {
        let cfg = parse("keep = \"value\"\nblank = \"   \"\n[empty_table]\n");
        let entries = flatten(&cfg, true);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "keep");
    }

    #[test]
    fn expand_arrays_splits_elements() {
        let cfg = parse("tag = [\"a\", \"b\", \"\"]\n");
        let entries = flatten(&cfg, true);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "tag");
        assert_eq!(format_scalar(&entries[0].value), "a");
        assert_eq!(format_scalar(&entries[1].value), "b");
    }

    #[test]
    fn preserved_arrays_stay_as_one_entry() {
        let cfg = parse("tag = [\"a\", \"b\"]\n");
        let entries = flatten(&cfg, false);
        assert_eq!(entries.len(), 1);
        assert_eq!(format_scalar(&entries[0].value), "[\"a\",\"b\"]");
    }

    #[test]
    fn normalizes_flag_names() {
        assert_eq!(normalize_flag_name("foo.bar_baz"), "foo-bar-baz");
    }

    #[test]
    fn formats_integers_canonically_across_64_bits() {
        assert_eq!(format_scalar(&Value::Integer(i64::MAX)), i64::MAX.to_string());
        assert_eq!(format_scalar(&Value::Integer(i64::MIN)), i64::MIN.to_string());
    }
}
