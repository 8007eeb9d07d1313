//! Readers for the property file formats understood by the engine.
//!
//! `.properties` files are parsed line by line, `.toml` and `.json` through
//! their serde crates, and `.yaml`/`.yml`/`.ini` through the `config` crate.
//! Structured documents are flattened into dotted keys.

use std::fs;
use std::path::Path;

use config::{Config, File, FileFormat};
use serde_json::Value;

use autoconf_core::{AutoconfError, AutoconfResult};

/// Read and flatten one property file
pub fn parse_file(path: &Path) -> AutoconfResult<Vec<(String, String)>> {
    let location = path.to_string_lossy().to_string();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "toml" => {
            let content = fs::read_to_string(path)?;
            let value: Value = toml::from_str(&content)
                .map_err(|e| AutoconfError::malformed(&location, format!("TOML parse error: {e}")))?;
            Ok(flatten(&value))
        }
        "json" => {
            let content = fs::read_to_string(path)?;
            let value: Value = serde_json::from_str(&content)
                .map_err(|e| AutoconfError::malformed(&location, format!("JSON parse error: {e}")))?;
            Ok(flatten(&value))
        }
        "yaml" | "yml" | "ini" => {
            let format = if extension == "ini" {
                FileFormat::Ini
            } else {
                FileFormat::Yaml
            };
            let value: Value = Config::builder()
                .add_source(File::from(path).format(format))
                .build()
                .and_then(|c| c.try_deserialize())
                .map_err(|e| AutoconfError::malformed(&location, e.to_string()))?;
            Ok(flatten(&value))
        }
        _ => {
            let content = fs::read_to_string(path)?;
            parse_properties(&content, &location)
        }
    }
}

/// Parse `key=value` / `key: value` lines with `#`/`!` comments and `\` continuation
pub fn parse_properties(content: &str, location: &str) -> AutoconfResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut pending = String::new();
    let mut start_line = 0;

    for (idx, raw) in content.lines().enumerate() {
        if pending.is_empty() {
            start_line = idx + 1;
        }
        let line = raw.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        if let Some(stripped) = line.strip_suffix('\\') {
            pending.push_str(stripped);
            continue;
        }
        pending.push_str(line);

        let logical = std::mem::take(&mut pending);
        let sep = logical.find(['=', ':']).ok_or_else(|| {
            AutoconfError::malformed(location, format!("line {start_line}: missing '=' or ':'"))
        })?;
        let key = logical[..sep].trim();
        if key.is_empty() {
            return Err(AutoconfError::malformed(
                location,
                format!("line {start_line}: empty key"),
            ));
        }
        out.push((key.to_string(), logical[sep + 1..].trim().to_string()));
    }

    if !pending.is_empty() {
        return Err(AutoconfError::malformed(
            location,
            format!("line {start_line}: unterminated continuation"),
        ));
    }
    Ok(out)
}

/// Flatten nested tables into dotted keys and arrays into `key[idx]`
pub fn flatten(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into("", value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_into(&key, v, out);
            }
        }
        Value::Array(items) => {
            for (idx, v) in items.iter().enumerate() {
                flatten_into(&format!("{prefix}[{idx}]"), v, out);
            }
        }
        Value::Null => out.push((prefix.to_string(), String::new())),
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}
