use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

pub const STOP_TIME: &str = "stop";
pub const SEED: &str = "seed";

/// 20 virtual minutes.
pub const DEFAULT_STOP_TIME: u64 = 1_200_000;

/// Read-only name/value map handed to every control algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalParameters {
    values: BTreeMap<String, String>,
}

impl GlobalParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(old) = self.values.get(&name) {
            warn!("parameter {} redefined: {} -> {}", name, old, value);
        }
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let value = self.values.get(name).map(String::as_str);
        if value.is_none() {
            warn!("parameter {} is not defined", name);
        }
        value
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Typed lookup; `None` when the name is missing or the value does not parse.
    pub fn get_parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get(name)?.parse().ok()
    }

    pub fn stop_time(&self) -> u64 {
        if self.contains(STOP_TIME) {
            self.get_parsed(STOP_TIME).unwrap_or(DEFAULT_STOP_TIME)
        } else {
            DEFAULT_STOP_TIME
        }
    }

    pub fn seed(&self) -> u64 {
        if self.contains(SEED) {
            self.get_parsed(SEED).unwrap_or_default()
        } else {
            0
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
