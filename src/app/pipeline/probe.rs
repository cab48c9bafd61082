use std::collections::HashMap;
use std::path::Path;
use std::process::Command as ProcessCommand;

use anyhow::{Result, bail};
use serde_json::Value;

use super::process::run_capture;

/// Run ffprobe and return its parsed JSON document.
pub fn probe(path: &Path) -> Result<Value> {
    let mut cmd = ProcessCommand::new("ffprobe");
    cmd.arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg(path);

    let output = run_capture(cmd, "ffprobe")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "ffprobe exited with {} for {}: {}",
            output.status,
            path.display(),
            stderr.trim()
        );
    }
    match serde_json::from_slice(&output.stdout) {
        Ok(value) => Ok(value),
        Err(err) => bail!("ffprobe produced invalid JSON for {}: {err}", path.display()),
    }
}

/// Duration in seconds, or `None` when the probe fails or reports nothing.
pub fn duration_secs(path: &Path) -> Option<f64> {
    let data = probe(path).ok()?;
    duration_from_probe(&data)
}

pub fn duration_from_probe(data: &Value) -> Option<f64> {
    let raw = data.pointer("/format/duration")?;
    match raw {
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Number(num) => num.as_f64(),
        _ => None,
    }
}

/// Embedded format tags with keys normalized to lowercase; ffprobe reports
/// tag case inconsistently across containers.
pub fn format_tags(data: &Value) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    if let Some(raw) = data.pointer("/format/tags").and_then(Value::as_object) {
        for (key, value) in raw {
            if let Some(text) = value.as_str() {
                tags.insert(key.to_lowercase(), text.to_string());
            }
        }
    }
    tags
}
