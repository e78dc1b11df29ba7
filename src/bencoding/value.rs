use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Error, Result, anyhow};

/// A decoded bencoded value: byte string, integer, list, or dictionary.
///
/// Dictionary keys are UTF-8 strings; valid torrent files carry them sorted,
/// which is the order `BTreeMap` preserves on re-encoding.
#[derive(Debug, PartialEq)]
pub enum Value {
    String(Vec<u8>),
    Integer(i64),
    List(Vec<Value>),
    Dictionary(BTreeMap<String, Value>),
}

impl Value {
    pub fn string(string: &str) -> Self {
        Self::String(string.as_bytes().to_vec())
    }

    pub fn list() -> Self {
        Self::List(Vec::new())
    }

    pub fn dictionary() -> Self {
        Self::Dictionary(BTreeMap::new())
    }

    pub fn with_value(mut self, value: Value) -> Self {
        if let Self::List(values) = &mut self {
            values.push(value);
        } else {
            panic!("with_value is only supported for lists");
        }
        self
    }

    pub fn with_entry(mut self, key: &str, value: Value) -> Self {
        if let Self::Dictionary(entries) = &mut self {
            entries.insert(key.to_string(), value);
        } else {
            panic!("with_entry is only supported for dictionaries");
        }
        self
    }

    /// Removes a required dictionary entry, failing if it is absent.
    pub fn remove_entry(&mut self, key: &str) -> Result<Value> {
        self.try_remove_entry(key)?
            .ok_or_else(|| anyhow!("missing entry {:?}", key))
    }

    /// Removes an optional dictionary entry.
    pub fn try_remove_entry(&mut self, key: &str) -> Result<Option<Value>> {
        match self {
            Self::Dictionary(entries) => Ok(entries.remove(key)),
            _ => Err(anyhow!("not a dictionary")),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(bytes) => Ok(bytes),
            other => Err(anyhow!("expected string, got {:?}", other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let bytes: Vec<u8> = value.try_into()?;
        String::from_utf8(bytes).map_err(|err| anyhow!("invalid utf8 string: {}", err))
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Integer(integer) => Ok(integer),
            other => Err(anyhow!("expected integer, got {:?}", other)),
        }
    }
}

impl TryFrom<Value> for usize {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let integer: i64 = value.try_into()?;
        integer
            .try_into()
            .map_err(|_| anyhow!("expected non-negative integer, got {}", integer))
    }
}

impl TryFrom<Value> for u16 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let integer: i64 = value.try_into()?;
        integer
            .try_into()
            .map_err(|_| anyhow!("integer {} out of range", integer))
    }
}

impl TryFrom<Value> for Duration {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let seconds: usize = value.try_into()?;
        Ok(Duration::from_secs(seconds as u64))
    }
}

impl TryFrom<Value> for Vec<Value> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::List(values) => Ok(values),
            other => Err(anyhow!("expected list, got {:?}", other)),
        }
    }
}
