//! Hierarchical key/value result store.
//!
//! Ensembles and optimization state are persisted as named values under
//! `/`-delimited group paths, one group per repetition. The store is a plain
//! mapping serialized with [`bincode`]; the path layout it is used with is
//! part of the result-file contract, not of this module.

use super::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayD, Ix1, Ix2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A single stored value.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    /// A scalar float.
    Scalar(f64),
    /// An unsigned integer (counters, identifiers, seeds).
    Int(u64),
    /// A string.
    Text(String),
    /// A list of strings (parameter names).
    Strings(Vec<String>),
    /// An n-dimensional float array.
    Array(ArrayD<f64>),
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::Strings(value)
    }
}

impl From<Array1<f64>> for Value {
    fn from(value: Array1<f64>) -> Self {
        Self::Array(value.into_dyn())
    }
}

impl From<Array2<f64>> for Value {
    fn from(value: Array2<f64>) -> Self {
        Self::Array(value.into_dyn())
    }
}

fn full_key(path: &str, name: &str) -> String {
    format!("{}/{name}", path.trim_end_matches('/'))
}

/// In-memory result store with a binary on-disk representation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ResultStore {
    entries: BTreeMap<String, Value>,
}

impl ResultStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `path`/`name`, creating or overwriting the entry.
    pub fn put(&mut self, path: &str, name: &str, value: impl Into<Value>) {
        self.entries.insert(full_key(path, name), value.into());
    }

    /// Looks up the entry stored under `path`/`name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] when no such entry exists.
    pub fn get(&self, path: &str, name: &str) -> Result<&Value> {
        self.entries
            .get(&full_key(path, name))
            .ok_or_else(|| Error::MissingEntry {
                path: path.to_owned(),
                name: name.to_owned(),
            })
    }

    fn wrong_type(path: &str, name: &str) -> Error {
        Error::WrongType {
            path: path.to_owned(),
            name: name.to_owned(),
        }
    }

    /// Reads a scalar float.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] or [`Error::WrongType`].
    pub fn get_f64(&self, path: &str, name: &str) -> Result<f64> {
        match self.get(path, name)? {
            Value::Scalar(value) => Ok(*value),
            _ => Err(Self::wrong_type(path, name)),
        }
    }

    /// Reads an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] or [`Error::WrongType`].
    pub fn get_u64(&self, path: &str, name: &str) -> Result<u64> {
        match self.get(path, name)? {
            Value::Int(value) => Ok(*value),
            _ => Err(Self::wrong_type(path, name)),
        }
    }

    /// Reads a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] or [`Error::WrongType`].
    pub fn get_str(&self, path: &str, name: &str) -> Result<&str> {
        match self.get(path, name)? {
            Value::Text(value) => Ok(value),
            _ => Err(Self::wrong_type(path, name)),
        }
    }

    /// Reads a list of strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] or [`Error::WrongType`].
    pub fn get_strings(&self, path: &str, name: &str) -> Result<&[String]> {
        match self.get(path, name)? {
            Value::Strings(value) => Ok(value),
            _ => Err(Self::wrong_type(path, name)),
        }
    }

    /// Reads a one-dimensional array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] or [`Error::WrongType`].
    pub fn get_array1(&self, path: &str, name: &str) -> Result<Array1<f64>> {
        match self.get(path, name)? {
            Value::Array(value) => value
                .clone()
                .into_dimensionality::<Ix1>()
                .map_err(|_| Self::wrong_type(path, name)),
            _ => Err(Self::wrong_type(path, name)),
        }
    }

    /// Reads a two-dimensional array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEntry`] or [`Error::WrongType`].
    pub fn get_array2(&self, path: &str, name: &str) -> Result<Array2<f64>> {
        match self.get(path, name)? {
            Value::Array(value) => value
                .clone()
                .into_dimensionality::<Ix2>()
                .map_err(|_| Self::wrong_type(path, name)),
            _ => Err(Self::wrong_type(path, name)),
        }
    }

    /// Repetition ids stored under `prefix`, ascending and without
    /// duplicates. Gaps in the numbering are preserved as-is.
    #[must_use]
    pub fn repetition_ids(&self, prefix: &str) -> Vec<usize> {
        let group = format!("{}/repetition", prefix.trim_end_matches('/'));
        let mut ids: Vec<usize> = self
            .entries
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(&group)?;
                let digits = &rest[..rest.find('/')?];
                digits.parse().ok()
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Serializes the store into `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on serialization failure.
    pub fn write(&self, writer: impl Write) -> Result<()> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Deserializes a store from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on deserialization failure.
    pub fn read(reader: impl Read) -> Result<Self> {
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Writes the store to a file, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Codec`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write(BufWriter::new(File::create(path)?))
    }

    /// Reads a store back from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Codec`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::read(BufReader::new(File::open(path)?))
    }
}
