//! Relabel rules as understood by the scraping agent
//!
//! A scrape job's relabel pipeline is order-significant: the agent applies
//! rules top to bottom, so the position of every rule is part of the contract.

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relabel action
///
/// Actions the agent does not know are carried through verbatim as
/// [`RelabelAction::Other`] so descriptor rules are never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelabelAction {
    #[default]
    Replace,
    Keep,
    Drop,
    KeepEqual,
    DropEqual,
    HashMod,
    LabelMap,
    LabelDrop,
    LabelKeep,
    Lowercase,
    Uppercase,
    Other(String),
}

impl RelabelAction {
    /// Parse an action name case-insensitively; empty means `replace`.
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.to_ascii_lowercase();
        match lowered.as_str() {
            "" | "replace" => RelabelAction::Replace,
            "keep" => RelabelAction::Keep,
            "drop" => RelabelAction::Drop,
            "keepequal" => RelabelAction::KeepEqual,
            "dropequal" => RelabelAction::DropEqual,
            "hashmod" => RelabelAction::HashMod,
            "labelmap" => RelabelAction::LabelMap,
            "labeldrop" => RelabelAction::LabelDrop,
            "labelkeep" => RelabelAction::LabelKeep,
            "lowercase" => RelabelAction::Lowercase,
            "uppercase" => RelabelAction::Uppercase,
            _ => RelabelAction::Other(lowered),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RelabelAction::Replace => "replace",
            RelabelAction::Keep => "keep",
            RelabelAction::Drop => "drop",
            RelabelAction::KeepEqual => "keepequal",
            RelabelAction::DropEqual => "dropequal",
            RelabelAction::HashMod => "hashmod",
            RelabelAction::LabelMap => "labelmap",
            RelabelAction::LabelDrop => "labeldrop",
            RelabelAction::LabelKeep => "labelkeep",
            RelabelAction::Lowercase => "lowercase",
            RelabelAction::Uppercase => "uppercase",
            RelabelAction::Other(raw) => raw,
        }
    }
}

impl From<String> for RelabelAction {
    fn from(raw: String) -> Self {
        RelabelAction::parse(&raw)
    }
}

impl From<RelabelAction> for String {
    fn from(action: RelabelAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for RelabelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regex source text of a relabel rule
///
/// Kept as written; the agent anchors it on both ends when compiling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelabelRegex(String);

impl RelabelRegex {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    /// `.*`
    pub fn match_all() -> Self {
        Self::new(".*")
    }

    /// `(.+)`: matches any non-empty value and captures it
    pub fn non_empty() -> Self {
        Self::new("(.+)")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully anchored form, `^(?:<source>)$`
    pub fn anchored(&self) -> String {
        format!("^(?:{})$", self.0)
    }

    /// Compile the anchored form.
    pub fn compile(&self) -> Result<regex::Regex> {
        regex::Regex::new(&self.anchored()).map_err(|source| TypesError::InvalidRegex {
            regex: self.0.clone(),
            source,
        })
    }
}

impl fmt::Display for RelabelRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One relabel step in a scrape job
///
/// Unset fields are omitted on the wire and take the agent's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelabelRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<RelabelRegex>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulus: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,

    #[serde(default)]
    pub action: RelabelAction,
}

impl RelabelRule {
    /// Start a rule with the given action and nothing else set
    pub fn new(action: RelabelAction) -> Self {
        Self {
            action,
            ..Default::default()
        }
    }

    /// Start a `replace` rule
    pub fn replace() -> Self {
        Self::new(RelabelAction::Replace)
    }

    pub fn with_source_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn with_regex(mut self, regex: RelabelRegex) -> Self {
        self.regex = Some(regex);
        self
    }

    pub fn with_target_label(mut self, label: impl Into<String>) -> Self {
        self.target_label = Some(label.into());
        self
    }

    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }
}
