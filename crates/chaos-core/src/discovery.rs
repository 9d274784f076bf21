use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::skill::TargetKind;

/// Attribute carrying the owning AWS account id.
pub const ATTR_ACCOUNT: &str = "aws.account";
/// Attribute carrying the AWS region.
pub const ATTR_REGION: &str = "aws.region";

/// A resource discovered on a target, with a flat multi-valued attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub label: String,
    pub kind: TargetKind,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl Target {
    pub fn new(kind: TargetKind, id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            attributes: BTreeMap::new(),
        }
    }

    /// Add a single-valued attribute. Empty values are dropped.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.attributes.entry(key.into()).or_default().push(value);
        }
    }

    /// Add an optional attribute, skipping `None`.
    pub fn set_opt_attr<V: ToString>(&mut self, key: &str, value: Option<V>) {
        if let Some(v) = value {
            self.set_attr(key, v.to_string());
        }
    }

    /// First value of an attribute.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn account(&self) -> Option<&str> {
        self.attr(ATTR_ACCOUNT)
    }

    pub fn region(&self) -> Option<&str> {
        self.attr(ATTR_REGION)
    }

    pub fn metadata(&self) -> serde_yaml::Value {
        serde_yaml::to_value(&self.attributes).unwrap_or(serde_yaml::Value::Null)
    }
}

/// Picks discovered targets for a skill invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSelector {
    pub kind: TargetKind,
    /// Every entry must match one of the target's attribute values.
    /// The key `id` matches the target id itself.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl TargetSelector {
    pub fn matches(&self, target: &Target) -> bool {
        target.kind == self.kind
            && self.attributes.iter().all(|(key, expected)| {
                if key == "id" {
                    return &target.id == expected;
                }
                target
                    .attributes
                    .get(key)
                    .map_or(false, |values| values.iter().any(|v| v == expected))
            })
    }

    pub fn select<'a>(&self, targets: &'a [Target]) -> Vec<&'a Target> {
        targets.iter().filter(|t| self.matches(t)).collect()
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for (k, v) in &self.attributes {
            write!(f, " {k}={v}")?;
        }
        Ok(())
    }
}
