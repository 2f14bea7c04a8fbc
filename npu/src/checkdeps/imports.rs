//! Import specifier extraction.
//!
//! Regex-based extraction of ES6 imports, dynamic imports, and CommonJS
//! requires, plus a heuristic pass over JSON config files whose
//! well-known fields (`extends`, `plugins`, `presets`, ...) reference
//! packages by name.

use regex::Regex;
use serde_json::Value;

/// JSON fields that commonly hold package references.
const JSON_DEPENDENCY_FIELDS: &[&str] = &[
    "extends", "plugins", "presets", "parser", "loader", "use", "plugin", "preset",
];

/// Extracts import specifiers from source text.
pub struct ImportScanner {
    es_import: Regex,
    dynamic_import: Regex,
    require_call: Regex,
}

impl Default for ImportScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportScanner {
    pub fn new() -> Self {
        Self {
            // import defaultExport, { named } from 'pkg'; and bare
            // side-effect imports: import 'pkg';
            es_import: Regex::new(
                r#"import\s+(?:(?:\{[^}]*\}|\*\s+as\s+\w+|[\w$]+)(?:\s*,\s*(?:\{[^}]*\}|\*\s+as\s+\w+|[\w$]+))*\s+from\s+)?['"]([^'"]+)['"]"#,
            )
            .expect("es import pattern"),
            // import('pkg')
            dynamic_import: Regex::new(r#"import\s*\(\s*['"]([^'"]+)['"]\s*\)"#)
                .expect("dynamic import pattern"),
            // require('pkg')
            require_call: Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#)
                .expect("require pattern"),
        }
    }

    /// All import specifiers found in a JS/TS source file.
    pub fn scan_source(&self, content: &str) -> Vec<String> {
        let mut specifiers = Vec::new();
        for regex in [&self.es_import, &self.dynamic_import, &self.require_call] {
            for capture in regex.captures_iter(content) {
                if let Some(m) = capture.get(1) {
                    specifiers.push(m.as_str().to_string());
                }
            }
        }
        specifiers
    }

    /// Package references found in a JSON config file.
    pub fn scan_json(&self, content: &str) -> Vec<String> {
        let Ok(value) = serde_json::from_str::<Value>(content) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        collect_json_references(&value, &mut found);
        found
    }
}

fn collect_json_references(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for field in JSON_DEPENDENCY_FIELDS {
                match map.get(*field) {
                    Some(Value::String(s)) => found.push(s.clone()),
                    Some(Value::Array(items)) => {
                        for item in items {
                            if let Value::String(s) = item {
                                found.push(s.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
            for nested in map.values() {
                collect_json_references(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_json_references(item, found);
            }
        }
        _ => {}
    }
}

/// Reduces an import specifier to its package name.
///
/// Subpaths are stripped; scoped imports keep `@scope/name`; relative,
/// absolute, URL-shaped, and node builtin specifiers yield `None`.
pub fn normalize_specifier(specifier: &str) -> Option<String> {
    if specifier.is_empty()
        || specifier.starts_with('.')
        || specifier.starts_with('/')
        || specifier.starts_with("node:")
        || specifier.contains("://")
    {
        return None;
    }

    let mut parts = specifier.split('/');
    let first = parts.next()?;
    if first.starts_with('@') {
        let second = parts.next()?;
        if second.is_empty() {
            return None;
        }
        Some(format!("{first}/{second}"))
    } else {
        Some(first.to_string())
    }
}
