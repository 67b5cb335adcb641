//! Read-only nested parameters for simulations.
//!
//! A `Params` tree maps keys to numbers, flags, strings, lists, or nested tables.
//! It is built once (in code with `with`, or from a RON file) and only read
//! afterwards. Lists of tables, such as a list of magnets, are tables all the way
//! down, so every level is read through the same typed accessors.

use std::{collections::BTreeMap, fs, path::Path};

use ron::ser::{PrettyConfig, to_string_pretty};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamErrors {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("parameter '{0}' not found")]
    KeyNotFound(String),
    #[error("{0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("{0}")]
    Serialize(#[from] ron::Error),
    #[error("parameter '{key}' is a {found}, expected a {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// A single parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ParamValue>),
    Table(Params),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Number(_) => "number",
            ParamValue::Text(_) => "string",
            ParamValue::List(_) => "list",
            ParamValue::Table(_) => "table",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Params> {
        match self {
            ParamValue::Table(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Params> for ParamValue {
    fn from(value: Params) -> Self {
        ParamValue::Table(value)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(value: Vec<T>) -> Self {
        ParamValue::List(
            value
                .into_iter()
                .map(Into::into)
                .collect(),
        )
    }
}

/// A table of named parameters, ordered by key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `key`, converting nested vectors and tables recursively.
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.0
            .insert(key.to_string(), value.into());
        self
    }

    pub fn from_ron_str(s: &str) -> Result<Self, ParamErrors> {
        Ok(ron::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ParamErrors> {
        let contents = fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    pub fn to_ron_string(&self) -> Result<String, ParamErrors> {
        Ok(to_string_pretty(self, PrettyConfig::new())?)
    }

    pub fn get(&self, key: &str) -> Result<&ParamValue, ParamErrors> {
        self.0
            .get(key)
            .ok_or_else(|| ParamErrors::KeyNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn number(&self, key: &str) -> Result<f64, ParamErrors> {
        let value = self.get(key)?;
        value
            .as_number()
            .ok_or_else(|| wrong_type(key, "number", value))
    }

    pub fn boolean(&self, key: &str) -> Result<bool, ParamErrors> {
        let value = self.get(key)?;
        value
            .as_bool()
            .ok_or_else(|| wrong_type(key, "bool", value))
    }

    pub fn text(&self, key: &str) -> Result<&str, ParamErrors> {
        let value = self.get(key)?;
        value
            .as_text()
            .ok_or_else(|| wrong_type(key, "string", value))
    }

    pub fn list(&self, key: &str) -> Result<&[ParamValue], ParamErrors> {
        let value = self.get(key)?;
        value
            .as_list()
            .ok_or_else(|| wrong_type(key, "list", value))
    }

    pub fn table(&self, key: &str) -> Result<&Params, ParamErrors> {
        let value = self.get(key)?;
        value
            .as_table()
            .ok_or_else(|| wrong_type(key, "table", value))
    }

    /// Reads a list whose entries are all tables, e.g. a list of magnets.
    pub fn tables(&self, key: &str) -> Result<Vec<&Params>, ParamErrors> {
        self.list(key)?
            .iter()
            .enumerate()
            .map(|(i, value)| {
                value
                    .as_table()
                    .ok_or_else(|| wrong_type(&format!("{key}.{i}"), "table", value))
            })
            .collect()
    }

    /// Looks up a dotted path such as `magnets.0.k`. Numeric segments index into
    /// lists.
    pub fn path(&self, path: &str) -> Result<&ParamValue, ParamErrors> {
        let mut segments = path.split('.');
        let first = segments
            .next()
            .unwrap_or_default();
        let mut value = self.get(first)?;
        let mut seen = first.to_string();

        for segment in segments {
            seen.push('.');
            seen.push_str(segment);
            value = match value {
                ParamValue::Table(table) => table
                    .0
                    .get(segment)
                    .ok_or_else(|| ParamErrors::KeyNotFound(seen.clone()))?,
                ParamValue::List(list) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| list.get(i))
                    .ok_or_else(|| ParamErrors::KeyNotFound(seen.clone()))?,
                other => {
                    return Err(ParamErrors::WrongType {
                        key: seen,
                        expected: "table or list",
                        found: other.type_name(),
                    });
                }
            };
        }
        Ok(value)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn wrong_type(key: &str, expected: &'static str, value: &ParamValue) -> ParamErrors {
    ParamErrors::WrongType {
        key: key.to_string(),
        expected,
        found: value.type_name(),
    }
}
