//! Loads a `priter.*` job config from a flat `key=value` text file, the
//! CLI's answer to spec.md 1's "CLI, configuration loading ... treated
//! as out of scope" — `priter-core::Config::from_map` still needs a
//! `HashMap<String, String>` from *somewhere*, and this is the
//! straightforward file format a host job-submission layer would hand
//! it in practice.

use priter_core::{PriterErrorKind, Result};
use std::collections::HashMap;
use std::path::Path;

/// Parses `path` into a `key=value` map, skipping blank lines and lines
/// starting with `#`. Unrecognized keys are left for `Config::from_map`
/// to silently ignore (spec.md 6: a Hadoop-`Configuration`-style
/// permissive load).
pub fn load(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).map_err(|_| PriterErrorKind::Config)?;
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_and_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.properties");
        std::fs::write(
            &path,
            "# a comment\npriter.job=true\n\npriter.snapshot.topk=50\n",
        )
        .unwrap();

        let map = load(&path).unwrap();
        assert_eq!(map.get("priter.job").map(String::as_str), Some("true"));
        assert_eq!(map.get("priter.snapshot.topk").map(String::as_str), Some("50"));
        assert_eq!(map.len(), 2);
    }
}
