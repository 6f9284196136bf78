use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<OptionValue>),
}

impl OptionValue {
    fn scalar(&self) -> Option<String> {
        match self {
            OptionValue::Integer(v) => Some(v.to_string()),
            OptionValue::Float(v) => Some(v.to_string()),
            OptionValue::String(v) if !v.is_empty() => Some(v.clone()),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Integer(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::String(v.to_owned())
    }
}

/// Extra restic command line options, keyed by flag name.
///
/// Keys may be given with or without leading dashes: `keep-daily` and
/// `--keep-daily` render the same, `-v` is kept as a short flag.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(pub BTreeMap<String, OptionValue>);

impl Options {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.0.insert(flag(&key.into()), value.into());
        self
    }

    /// Renders the options as command line arguments, in key order.
    ///
    /// `true` becomes a bare flag, `false` and empty strings are dropped and
    /// lists repeat the flag once per element.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in &self.0 {
            let flag = flag(key);
            match value {
                OptionValue::Bool(true) => args.push(flag),
                OptionValue::Bool(false) => {}
                OptionValue::List(values) => {
                    for v in values.iter().filter_map(OptionValue::scalar) {
                        args.push(flag.clone());
                        args.push(v);
                    }
                }
                scalar => {
                    if let Some(v) = scalar.scalar() {
                        args.push(flag);
                        args.push(v);
                    }
                }
            }
        }
        args
    }

    /// Combines two option sets; entries from `other` win on conflicting flags.
    pub fn merge(&self, other: &Options) -> Options {
        let mut merged = BTreeMap::new();
        for (key, value) in self.0.iter().chain(other.0.iter()) {
            merged.insert(flag(key), value.clone());
        }
        Options(merged)
    }
}

fn flag(key: &str) -> String {
    if key.starts_with('-') {
        key.to_owned()
    } else {
        format!("--{}", key)
    }
}
