//! Filter criteria wire format.
//!
//! A criteria document is a recursive boolean expression tree authored by the
//! client and persisted as JSON. Two node shapes exist:
//!
//! - leaf: `{ "field": ..., "operator": ..., "value": ..., "isCustomField": ... }`
//! - composite: `{ "combinator": "AND" | "OR", "rules": [...] }`
//!
//! Deserialization is deliberately forgiving: a document that matches neither
//! shape normalizes to the neutral composite (empty `rules`), which compiles
//! to "entire list". Unknown operator strings survive parsing as
//! [`Operator::Unknown`] so the compiler can fail them closed per leaf instead
//! of widening the whole document to match-all.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Leaf-level comparison operator. Validity against a given field type is a
/// property of the compiler, not of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    IsEmpty,
    IsNotEmpty,
    GreaterThan,
    LessThan,
    Between,
    OneOf,
    IsTrue,
    IsFalse,
    /// Operator string not recognized by this build. Compiles to match-none.
    Unknown,
}

impl Operator {
    /// Parse a wire operator name. Anything unrecognized maps to `Unknown`
    /// rather than failing the document.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "equals" => Self::Equals,
            "notEquals" => Self::NotEquals,
            "contains" => Self::Contains,
            "notContains" => Self::NotContains,
            "isEmpty" => Self::IsEmpty,
            "isNotEmpty" => Self::IsNotEmpty,
            "greaterThan" => Self::GreaterThan,
            "lessThan" => Self::LessThan,
            "between" => Self::Between,
            "oneOf" => Self::OneOf,
            "isTrue" => Self::IsTrue,
            "isFalse" => Self::IsFalse,
            _ => Self::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
            Self::GreaterThan => "greaterThan",
            Self::LessThan => "lessThan",
            Self::Between => "between",
            Self::OneOf => "oneOf",
            Self::IsTrue => "isTrue",
            Self::IsFalse => "isFalse",
            Self::Unknown => "unknown",
        }
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Non-string operators are a shape error; the untagged FilterCriteria
        // deserializer then falls through to the neutral composite.
        let raw = String::deserialize(deserializer).map_err(DeError::custom)?;
        Ok(Self::parse(&raw))
    }
}

/// Boolean connective for composite nodes. Missing combinators default to
/// `AND`, which narrows rather than widens the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// Single comparison over one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: JsonValue,
    #[serde(default)]
    pub is_custom_field: bool,
}

/// Composite node joining child criteria with a combinator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    #[serde(default)]
    pub combinator: Combinator,
    #[serde(default)]
    pub rules: Vec<FilterCriteria>,
}

/// A client-authored filter criteria tree.
///
/// Variant order matters for the untagged deserializer: a map is tried as a
/// leaf first (requires `field` and `operator`); every other map falls back to
/// the composite shape, whose fields all default. A malformed object therefore
/// lands on the neutral composite instead of erroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterCriteria {
    Leaf(FilterRule),
    Group(FilterGroup),
}

impl Default for FilterCriteria {
    /// The neutral criteria: matches the entire list.
    fn default() -> Self {
        Self::Group(FilterGroup::default())
    }
}

impl FilterCriteria {
    /// Leaf over a fixed contact field.
    pub fn rule(field: impl Into<String>, operator: Operator, value: impl Into<JsonValue>) -> Self {
        Self::Leaf(FilterRule {
            field: field.into(),
            operator,
            value: value.into(),
            is_custom_field: false,
        })
    }

    /// Leaf over an organization-defined custom field.
    pub fn custom_rule(field: impl Into<String>, operator: Operator, value: impl Into<JsonValue>) -> Self {
        Self::Leaf(FilterRule {
            field: field.into(),
            operator,
            value: value.into(),
            is_custom_field: true,
        })
    }

    /// Composite requiring every child to match.
    pub fn all(rules: impl IntoIterator<Item = FilterCriteria>) -> Self {
        Self::Group(FilterGroup {
            combinator: Combinator::And,
            rules: rules.into_iter().collect(),
        })
    }

    /// Composite requiring at least one child to match.
    pub fn any(rules: impl IntoIterator<Item = FilterCriteria>) -> Self {
        Self::Group(FilterGroup {
            combinator: Combinator::Or,
            rules: rules.into_iter().collect(),
        })
    }

    /// True for a composite with no rules, i.e. "entire list".
    pub fn is_neutral(&self) -> bool {
        matches!(self, Self::Group(group) if group.rules.is_empty())
    }

    /// Parse a persisted JSON document, normalizing anything malformed (wrong
    /// shape, `rules` not an array, `null`) to the neutral criteria.
    pub fn parse(value: &JsonValue) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}
