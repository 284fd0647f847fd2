//! Store predicate vocabulary.
//!
//! A [`Predicate`] is the opaque boolean condition tree the compiler hands to
//! a contact store. Leaves address a [`FieldTarget`] (fixed column or custom
//! field bag entry); composites are the store's native And/Or/Not. Two
//! consumers exist: [`Predicate::matches`] evaluates directly against a
//! contact (the in-memory store), and the search module renders the same tree
//! into a RediSearch query clause.
//!
//! The constructors simplify around the two constants so that `MatchAll` is
//! the And-identity and `MatchNone` the Or-identity. An unresolvable leaf is
//! `MatchNone`, never an error: segment evaluation stays non-fatal even as
//! custom fields are renamed or deleted.

use chrono::{DateTime, NaiveDate};
use serde_json::Value as JsonValue;

use crate::fields::{ContactField, CustomFieldType};
use crate::types::{Contact, SubscriptionStatus};

/// What a predicate leaf compares against.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTarget {
    /// The implicit audience list scope column.
    ListScope,
    /// A fixed contact column.
    Column(ContactField),
    /// An entry in the per-contact custom field bag, with the declared type
    /// driving evaluation-time coercion of the stored scalar.
    Custom { key: String, ty: CustomFieldType },
}

impl FieldTarget {
    pub fn custom(key: impl Into<String>, ty: CustomFieldType) -> Self {
        Self::Custom { key: key.into(), ty }
    }
}

/// Executable boolean condition over contacts.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every contact. And-identity.
    MatchAll,
    /// Matches no contact. The fail-closed output for unresolvable leaves.
    MatchNone,
    /// Exact string equality; on multi-valued targets (tags), set membership.
    Equals { target: FieldTarget, value: String },
    /// Membership in a value set.
    OneOf { target: FieldTarget, values: Vec<String> },
    /// Case-insensitive substring match.
    Contains { target: FieldTarget, value: String },
    /// Numeric comparison over coerced values; dates compare as epoch seconds.
    Range {
        target: FieldTarget,
        min: Option<f64>,
        max: Option<f64>,
        min_exclusive: bool,
        max_exclusive: bool,
    },
    /// Boolean-like comparison (subscription flag, coerced custom scalars).
    BoolIs { target: FieldTarget, value: bool },
    /// Null, missing, or empty-string check.
    Empty { target: FieldTarget },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    // ========== Leaf Constructors ==========

    #[inline]
    pub fn equals(target: FieldTarget, value: impl Into<String>) -> Self {
        Self::Equals {
            target,
            value: value.into(),
        }
    }

    #[inline]
    pub fn one_of<S: Into<String>>(target: FieldTarget, values: impl IntoIterator<Item = S>) -> Self {
        Self::OneOf {
            target,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn contains(target: FieldTarget, value: impl Into<String>) -> Self {
        Self::Contains {
            target,
            value: value.into(),
        }
    }

    /// Strictly greater than.
    #[inline]
    pub fn greater_than(target: FieldTarget, min: f64) -> Self {
        Self::Range {
            target,
            min: Some(min),
            max: None,
            min_exclusive: true,
            max_exclusive: false,
        }
    }

    /// Strictly less than.
    #[inline]
    pub fn less_than(target: FieldTarget, max: f64) -> Self {
        Self::Range {
            target,
            min: None,
            max: Some(max),
            min_exclusive: false,
            max_exclusive: true,
        }
    }

    /// Inclusive range.
    #[inline]
    pub fn between(target: FieldTarget, min: f64, max: f64) -> Self {
        Self::Range {
            target,
            min: Some(min),
            max: Some(max),
            min_exclusive: false,
            max_exclusive: false,
        }
    }

    /// Numeric equality, expressed as a degenerate inclusive range.
    #[inline]
    pub fn number_equals(target: FieldTarget, value: f64) -> Self {
        Self::between(target, value, value)
    }

    #[inline]
    pub fn bool_is(target: FieldTarget, value: bool) -> Self {
        Self::BoolIs { target, value }
    }

    #[inline]
    pub fn empty(target: FieldTarget) -> Self {
        Self::Empty { target }
    }

    // ========== Composite Constructors ==========

    /// Negation, folding the constants and double negation.
    pub fn not(inner: Predicate) -> Self {
        match inner {
            Self::MatchAll => Self::MatchNone,
            Self::MatchNone => Self::MatchAll,
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Conjunction. `MatchNone` annihilates; `MatchAll` members drop out; an
    /// empty conjunction is `MatchAll`.
    pub fn and(members: impl IntoIterator<Item = Predicate>) -> Self {
        let mut kept = Vec::new();
        for member in members {
            match member {
                Self::MatchAll => {}
                Self::MatchNone => return Self::MatchNone,
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Self::MatchAll,
            1 => kept.into_iter().next().unwrap_or(Self::MatchAll),
            _ => Self::And(kept),
        }
    }

    /// Disjunction. `MatchAll` annihilates; `MatchNone` members drop out; an
    /// empty disjunction is `MatchNone`.
    pub fn or(members: impl IntoIterator<Item = Predicate>) -> Self {
        let mut kept = Vec::new();
        for member in members {
            match member {
                Self::MatchNone => {}
                Self::MatchAll => return Self::MatchAll,
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Self::MatchNone,
            1 => kept.into_iter().next().unwrap_or(Self::MatchNone),
            _ => Self::Or(kept),
        }
    }

    // ========== Evaluation ==========

    /// Evaluate this predicate against a single contact. This is the
    /// semantics the RediSearch rendering must agree with.
    pub fn matches(&self, contact: &Contact) -> bool {
        match self {
            Self::MatchAll => true,
            Self::MatchNone => false,
            Self::Equals { target, value } => target.string_values(contact).iter().any(|v| v == value),
            Self::OneOf { target, values } => {
                target.string_values(contact).iter().any(|v| values.contains(v))
            }
            Self::Contains { target, value } => {
                let needle = value.to_lowercase();
                target
                    .string_values(contact)
                    .iter()
                    .any(|v| v.to_lowercase().contains(&needle))
            }
            Self::Range {
                target,
                min,
                max,
                min_exclusive,
                max_exclusive,
            } => match target.numeric_value(contact) {
                // Coercion failure on the stored value: the contact does not
                // match, consistent with the fail-closed policy.
                None => false,
                Some(n) => {
                    let above = min.is_none_or(|m| if *min_exclusive { n > m } else { n >= m });
                    let below = max.is_none_or(|m| if *max_exclusive { n < m } else { n <= m });
                    above && below
                }
            },
            Self::BoolIs { target, value } => target.boolean_value(contact) == Some(*value),
            Self::Empty { target } => target.is_empty_on(contact),
            Self::Not(inner) => !inner.matches(contact),
            Self::And(members) => members.iter().all(|m| m.matches(contact)),
            Self::Or(members) => members.iter().any(|m| m.matches(contact)),
        }
    }
}

impl FieldTarget {
    /// Stored string values for this target. Multi-valued targets (tags,
    /// array bag entries) yield one entry per value; absent values yield none.
    pub(crate) fn string_values(&self, contact: &Contact) -> Vec<String> {
        match self {
            Self::ListScope => vec![contact.audience_list_id.clone()],
            Self::Column(field) => match field {
                ContactField::Email => vec![contact.email.clone()],
                ContactField::FirstName => option_values(&contact.first_name),
                ContactField::LastName => option_values(&contact.last_name),
                ContactField::Phone => option_values(&contact.phone),
                ContactField::Note => option_values(&contact.note),
                ContactField::Tags => contact.tags.clone(),
                ContactField::Status => vec![contact.status.as_str().to_string()],
                ContactField::DefaultAddressLine1 => option_values(&contact.default_address_line1),
                ContactField::DefaultAddressLine2 => option_values(&contact.default_address_line2),
                ContactField::DefaultAddressCity => option_values(&contact.default_address_city),
                ContactField::DefaultAddressState => option_values(&contact.default_address_state),
                ContactField::DefaultAddressZip => option_values(&contact.default_address_zip),
                ContactField::DefaultAddressCountry => option_values(&contact.default_address_country),
                // Timestamps only participate in numeric comparisons.
                ContactField::CreatedAt | ContactField::UpdatedAt => Vec::new(),
            },
            Self::Custom { key, .. } => match contact.custom_fields.get(key) {
                None => Vec::new(),
                Some(value) => match value {
                    JsonValue::Array(items) => items.iter().filter_map(coerce_string).collect(),
                    scalar => coerce_string(scalar).into_iter().collect(),
                },
            },
        }
    }

    /// Stored value coerced to a number, per the target's declared type.
    pub(crate) fn numeric_value(&self, contact: &Contact) -> Option<f64> {
        match self {
            Self::ListScope => None,
            Self::Column(field) => match field {
                ContactField::CreatedAt => Some(contact.created_at.timestamp() as f64),
                ContactField::UpdatedAt => Some(contact.updated_at.timestamp() as f64),
                _ => None,
            },
            Self::Custom { key, ty } => {
                let stored = contact.custom_fields.get(key)?;
                match ty {
                    CustomFieldType::Number => coerce_number(stored),
                    CustomFieldType::Date => coerce_epoch(stored),
                    _ => None,
                }
            }
        }
    }

    /// Stored value coerced to a boolean.
    pub(crate) fn boolean_value(&self, contact: &Contact) -> Option<bool> {
        match self {
            Self::ListScope => None,
            Self::Column(field) => match field {
                ContactField::Status => Some(contact.status == SubscriptionStatus::Subscribed),
                _ => None,
            },
            Self::Custom { key, .. } => coerce_bool(contact.custom_fields.get(key)?),
        }
    }

    /// Null, missing, or empty-string semantics for the is-empty family.
    pub(crate) fn is_empty_on(&self, contact: &Contact) -> bool {
        match self {
            Self::ListScope => false,
            Self::Column(field) => match field {
                ContactField::Email => contact.email.is_empty(),
                ContactField::FirstName => option_empty(&contact.first_name),
                ContactField::LastName => option_empty(&contact.last_name),
                ContactField::Phone => option_empty(&contact.phone),
                ContactField::Note => option_empty(&contact.note),
                ContactField::Tags => contact.tags.is_empty(),
                // Status and timestamps always carry a value.
                ContactField::Status | ContactField::CreatedAt | ContactField::UpdatedAt => false,
                ContactField::DefaultAddressLine1 => option_empty(&contact.default_address_line1),
                ContactField::DefaultAddressLine2 => option_empty(&contact.default_address_line2),
                ContactField::DefaultAddressCity => option_empty(&contact.default_address_city),
                ContactField::DefaultAddressState => option_empty(&contact.default_address_state),
                ContactField::DefaultAddressZip => option_empty(&contact.default_address_zip),
                ContactField::DefaultAddressCountry => option_empty(&contact.default_address_country),
            },
            Self::Custom { key, .. } => match contact.custom_fields.get(key) {
                None | Some(JsonValue::Null) => true,
                Some(JsonValue::String(s)) => s.is_empty(),
                Some(JsonValue::Array(items)) => items.is_empty(),
                Some(_) => false,
            },
        }
    }
}

fn option_values(value: &Option<String>) -> Vec<String> {
    value.clone().into_iter().collect()
}

fn option_empty(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

// ============================================================================
// Scalar coercion (shared by evaluation and the compiler)
// ============================================================================

/// JSON scalar to display string. Objects and nulls have no string form.
pub(crate) fn coerce_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JSON scalar to number. Numeric strings are parsed; everything else fails.
pub(crate) fn coerce_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// JSON scalar to epoch seconds. Numbers are taken as epoch seconds directly;
/// strings are parsed as RFC 3339 or `YYYY-MM-DD` (midnight UTC).
pub(crate) fn coerce_epoch(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => parse_date_epoch(s).map(|e| e as f64),
        _ => None,
    }
}

/// JSON scalar to boolean. Accepts `true`/`false` and `1`/`0`, as strings or
/// numbers, mirroring what the numeric index slots accept.
pub(crate) fn coerce_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        JsonValue::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a date string to epoch seconds.
pub(crate) fn parse_date_epoch(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.timestamp());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// Seconds in one day, for expanding date-only equality to a day range.
pub(crate) const DAY_SECONDS: i64 = 86_400;
