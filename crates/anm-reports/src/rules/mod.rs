//! # Reporting Rules
//!
//! Stateless predicates over the fields of a submission. Indicator
//! definitions name the rules that must hold before the indicator is
//! reported; [`RuleRegistry`] resolves those names.

use std::collections::HashMap;

use serde::Deserialize;

use crate::{Error, Result};

mod field_rules;

pub use field_rules::{
    IsDeathDueToAbortionRule, IsDeathDueToHighFeverRule, IsDeathDueToSepsisRule,
    NewFPMethodIsCentchromanPillsRule, NewFPMethodIsCondomRule, NewFPMethodIsIUDRule,
    NewFPMethodIsOCPRule,
};

/// Field name to value map of a submission. Missing fields read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SafeMap(HashMap<String, String>);

impl SafeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }
}

impl From<HashMap<String, String>> for SafeMap {
    fn from(fields: HashMap<String, String>) -> Self {
        Self(fields)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SafeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A reporting predicate.
pub trait Rule: Send + Sync {
    fn apply(&self, fields: &SafeMap) -> bool;
}

/// Rules keyed by name.
#[derive(Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rule under its type name.
    pub fn with_default_rules() -> Self {
        let mut registry = Self::new();
        registry.register("IsDeathDueToAbortionRule", IsDeathDueToAbortionRule);
        registry.register("IsDeathDueToSepsisRule", IsDeathDueToSepsisRule);
        registry.register("IsDeathDueToHighFeverRule", IsDeathDueToHighFeverRule);
        registry.register(
            "NewFPMethodIsCentchromanPillsRule",
            NewFPMethodIsCentchromanPillsRule,
        );
        registry.register("NewFPMethodIsCondomRule", NewFPMethodIsCondomRule);
        registry.register("NewFPMethodIsOCPRule", NewFPMethodIsOCPRule);
        registry.register("NewFPMethodIsIUDRule", NewFPMethodIsIUDRule);
        registry
    }

    /// Registers a rule, replacing any rule already under `name`.
    pub fn register(&mut self, name: impl Into<String>, rule: impl Rule + 'static) {
        self.rules.insert(name.into(), Box::new(rule));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Rule> {
        self.rules.get(name).map(|rule| rule.as_ref())
    }

    pub fn apply(&self, name: &str, fields: &SafeMap) -> Result<bool> {
        self.get(name)
            .map(|rule| rule.apply(fields))
            .ok_or_else(|| Error::UnknownRule(name.to_string()))
    }

    /// `true` when every named rule applies. All names are resolved before
    /// any rule runs, so an unknown name always fails.
    pub fn apply_all<S: AsRef<str>>(&self, names: &[S], fields: &SafeMap) -> Result<bool> {
        let rules = names
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .ok_or_else(|| Error::UnknownRule(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(rules.iter().all(|rule| rule.apply(fields)))
    }
}
