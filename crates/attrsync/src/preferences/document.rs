//! The preference document and its file format.

use std::io::Write;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::PreferenceError;

/// The value of the preference at `path`.
///
/// Falls back to `default_value` when `value` is missing or null.
pub fn preference_value(doc: &Value, path: &str) -> Option<Value> {
    match doc.pointer(&format!("{path}/value")) {
        Some(value) if !value.is_null() => Some(value.clone()),
        _ => doc.pointer(&format!("{path}/default_value")).cloned(),
    }
}

/// A JSON preference document.
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    doc: Value,
}

impl Default for Preferences {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl Preferences {
    pub fn new(doc: Value) -> Self {
        Self { doc }
    }

    pub fn document(&self) -> &Value {
        &self.doc
    }

    pub fn value(&self, path: &str) -> Option<Value> {
        preference_value(&self.doc, path)
    }

    /// Write `value` to `path + "/value"`. Returns whether anything changed.
    ///
    /// Without `create_if_missing` the preference object must already exist.
    pub fn set_value(
        &mut self,
        path: &str,
        value: Value,
        create_if_missing: bool,
    ) -> Result<bool, PreferenceError> {
        if self.doc.pointer(path).is_none() && !create_if_missing {
            return Err(PreferenceError::NotFound(path.to_string()));
        }
        let slot = create_path(&mut self.doc, path)
            .ok_or_else(|| PreferenceError::InvalidPath(path.to_string()))?;
        let Value::Object(pref) = slot else {
            return Err(PreferenceError::InvalidPath(path.to_string()));
        };
        if pref.get("value") == Some(&value) {
            return Ok(false);
        }
        pref.insert("value".to_string(), value);
        Ok(true)
    }
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Walk `pointer`, creating empty objects for missing or null members.
fn create_path<'a>(doc: &'a mut Value, pointer: &str) -> Option<&'a mut Value> {
    if doc.is_null() {
        *doc = Value::Object(Map::new());
    }
    if pointer.is_empty() {
        return Some(doc);
    }
    let rest = pointer.strip_prefix('/')?;
    let mut node = doc;
    for token in rest.split('/') {
        let map = match { node } {
            Value::Object(map) => map,
            _ => return None,
        };
        let child = map
            .entry(unescape(token))
            .or_insert_with(|| Value::Object(Map::new()));
        if child.is_null() {
            *child = Value::Object(Map::new());
        }
        node = child;
    }
    Some(node)
}

/// Read a preference document from a JSON file.
pub fn load_json(path: &Path) -> Result<Value, PreferenceError> {
    let text = std::fs::read_to_string(path).map_err(|source| PreferenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| PreferenceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a preference document atomically (temp file plus rename).
pub fn save_json(path: &Path, doc: &Value) -> Result<(), PreferenceError> {
    let io_err = |source| PreferenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    let text = serde_json::to_string_pretty(doc).map_err(|source| PreferenceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(text.as_bytes()).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;
    file.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preference_value_fallback() {
        let doc = json!({
            "a": {"value": null, "default_value": 3},
            "b": {"value": "x", "default_value": "y"},
            "c": {}
        });
        assert_eq!(preference_value(&doc, "/a"), Some(json!(3)));
        assert_eq!(preference_value(&doc, "/b"), Some(json!("x")));
        assert_eq!(preference_value(&doc, "/c"), None);
        assert_eq!(preference_value(&doc, "/missing"), None);
    }

    #[test]
    fn test_set_value() {
        let mut prefs = Preferences::default();
        assert!(matches!(
            prefs.set_value("/ui/zoom", json!(2), false),
            Err(PreferenceError::NotFound(_))
        ));
        assert!(prefs.set_value("/ui/zoom", json!(2), true).unwrap());
        assert!(!prefs.set_value("/ui/zoom", json!(2), false).unwrap());
        assert_eq!(prefs.value("/ui/zoom"), Some(json!(2)));
        assert_eq!(prefs.document(), &json!({"ui": {"zoom": {"value": 2}}}));

        let mut prefs = Preferences::new(json!({"ui": 5}));
        assert!(matches!(
            prefs.set_value("/ui/zoom", json!(2), true),
            Err(PreferenceError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_escaped_tokens() {
        let mut prefs = Preferences::default();
        prefs.set_value("/a~1b", json!(1), true).unwrap();
        assert_eq!(prefs.document(), &json!({"a/b": {"value": 1}}));
        assert_eq!(prefs.value("/a~1b"), Some(json!(1)));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let doc = json!({"ui": {"zoom": {"value": 2}}});
        save_json(&path, &doc).unwrap();
        assert_eq!(load_json(&path).unwrap(), doc);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_json(&path), Err(PreferenceError::Parse { .. })));
    }
}
