// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Field selectors in kubectl's `--field-selector` syntax

use crate::error::{DevclusterError, Result};

/// Options accepted by list operations
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub field_selector: Option<String>,
}

impl ListOptions {
    pub fn field_selector(selector: impl Into<String>) -> Self {
        Self {
            field_selector: Some(selector.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
}

/// A parsed selector; an empty selector matches everything
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<Requirement>,
}

impl FieldSelector {
    /// Parse `k=v`, `k==v` and `k!=v` terms joined by commas.
    ///
    /// Only keys in `fields` are accepted.
    pub fn parse(raw: &str, fields: &[&str]) -> Result<Self> {
        let mut requirements = Vec::new();

        for term in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let requirement = if let Some((key, value)) = term.split_once("!=") {
                Requirement::NotEquals(key.trim().to_string(), value.trim().to_string())
            } else if let Some((key, value)) = term.split_once("==") {
                Requirement::Equals(key.trim().to_string(), value.trim().to_string())
            } else if let Some((key, value)) = term.split_once('=') {
                Requirement::Equals(key.trim().to_string(), value.trim().to_string())
            } else {
                return Err(DevclusterError::InvalidSelector(format!(
                    "{:?}: expected key=value, key==value or key!=value",
                    term
                )));
            };

            let key = match &requirement {
                Requirement::Equals(k, _) | Requirement::NotEquals(k, _) => k,
            };
            if key.is_empty() || !fields.contains(&key.as_str()) {
                return Err(DevclusterError::InvalidSelector(format!(
                    "{:?}: field {:?} is not supported (supported: {})",
                    term,
                    key,
                    fields.join(", ")
                )));
            }
            requirements.push(requirement);
        }

        Ok(Self { requirements })
    }

    /// Parse the selector from list options, if any
    pub fn from_options(options: &ListOptions, fields: &[&str]) -> Result<Self> {
        match options.field_selector.as_deref() {
            Some(raw) => Self::parse(raw, fields),
            None => Ok(Self::default()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Check every requirement against the fields `lookup` resolves
    pub fn matches<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> bool {
        self.requirements.iter().all(|r| match r {
            Requirement::Equals(k, v) => lookup(k) == Some(v.as_str()),
            Requirement::NotEquals(k, v) => lookup(k) != Some(v.as_str()),
        })
    }
}
