use crate::utils::error::{BootcampError, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::OnceLock;

pub const KEY_DELIMITER: &str = ":";

/// Flattened, case-insensitive configuration. Keys are colon-delimited paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

fn index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("static regex"))
}

/// `spring.cloud.config.uri`, `SPRING__CLOUD__CONFIG__URI` and `spring:cloud:config:uri`
/// all normalize to the same key. `list[2]` becomes `list:2`.
pub fn normalize_key(raw: &str) -> String {
    let indexed = index_pattern().replace_all(raw.trim(), ":$1");
    indexed
        .replace("__", KEY_DELIMITER)
        .replace('.', KEY_DELIMITER)
        .to_lowercase()
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                BootcampError::InvalidConfigValueError {
                    field: normalize_key(key),
                    value: raw.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(BootcampError::InvalidConfigValueError {
                    field: normalize_key(key),
                    value: raw.to_string(),
                    reason: "Expected true or false".to_string(),
                }),
            },
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(&normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Values from `other` replace values already present.
    pub fn merge(&mut self, other: Settings) {
        self.values.extend(other.values);
    }

    /// The sub-tree under `prefix`, with the prefix removed from every key.
    pub fn section(&self, prefix: &str) -> Settings {
        let prefix = format!("{}{}", normalize_key(prefix), KEY_DELIMITER);
        let values = self
            .values
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|rest| (rest.to_string(), v.clone())))
            .collect();
        Settings { values }
    }

    /// Names of the immediate children under `prefix`.
    pub fn child_keys(&self, prefix: &str) -> BTreeSet<String> {
        self.section(prefix)
            .values
            .keys()
            .filter_map(|k| k.split(KEY_DELIMITER).next())
            .map(str::to_string)
            .collect()
    }

    pub fn from_json(prefix: &str, value: &serde_json::Value) -> Settings {
        let mut settings = Settings::new();
        settings.flatten_json(&normalize_key(prefix), value);
        settings
    }

    fn flatten_json(&mut self, path: &str, value: &serde_json::Value) {
        use serde_json::Value;
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    self.flatten_json(&join(path, key), child);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    self.flatten_json(&join(path, &index.to_string()), child);
                }
            }
            Value::String(s) => self.insert(path, s.clone()),
            Value::Null => self.insert(path, ""),
            other => self.insert(path, other.to_string()),
        }
    }

    pub fn from_toml(prefix: &str, value: &toml::Value) -> Settings {
        let mut settings = Settings::new();
        settings.flatten_toml(&normalize_key(prefix), value);
        settings
    }

    fn flatten_toml(&mut self, path: &str, value: &toml::Value) {
        use toml::Value;
        match value {
            Value::Table(table) => {
                for (key, child) in table {
                    self.flatten_toml(&join(path, key), child);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    self.flatten_toml(&join(path, &index.to_string()), child);
                }
            }
            Value::String(s) => self.insert(path, s.clone()),
            other => self.insert(path, other.to_string()),
        }
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", path, KEY_DELIMITER, key)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut settings = Settings::new();
        for (k, v) in iter {
            settings.insert(k.as_ref(), v);
        }
        settings
    }
}
