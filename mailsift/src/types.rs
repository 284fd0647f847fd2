//! Domain entities: organizations, audience lists, contacts, segments.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::criteria::FilterCriteria;
use crate::id;

/// Tenant owning audience lists and custom field definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: id::organization_id(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Named collection of contacts owned by one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceList {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl AudienceList {
    pub fn new(organization_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id::audience_list_id(),
            organization_id: organization_id.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Subscription state of a contact within its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Subscribed,
    Unsubscribed,
    Bounced,
    Complained,
}

impl SubscriptionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribed => "subscribed",
            Self::Unsubscribed => "unsubscribed",
            Self::Bounced => "bounced",
            Self::Complained => "complained",
        }
    }
}

/// A row in an audience list: fixed columns plus the custom field bag.
///
/// `(audience_list_id, email)` is unique within a store. Bag keys correspond
/// to [`crate::fields::CustomFieldDefinition::name`] within the owning
/// organization; orphaned keys from deleted definitions are tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub audience_list_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: SubscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address_line1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address_line2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address_zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_address_country: Option<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(audience_list_id: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id::contact_id(),
            audience_list_id: audience_list_id.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            phone: None,
            note: None,
            tags: Vec::new(),
            status: SubscriptionStatus::Subscribed,
            default_address_line1: None,
            default_address_line2: None,
            default_address_city: None,
            default_address_state: None,
            default_address_zip: None,
            default_address_country: None,
            custom_fields: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    pub fn with_status(mut self, status: SubscriptionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_zip(mut self, zip: impl Into<String>) -> Self {
        self.default_address_zip = Some(zip.into());
        self
    }

    pub fn with_custom_field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.custom_fields.insert(name.into(), value.into());
        self
    }
}

/// A saved, named filter over one audience list.
///
/// Membership is derived by recompiling `criteria` on every read; neither the
/// contact set nor its count is ever stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub audience_list_id: String,
    pub name: String,
    pub criteria: FilterCriteria,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Segment {
    pub fn new(audience_list_id: impl Into<String>, name: impl Into<String>, criteria: FilterCriteria) -> Self {
        let now = Utc::now();
        Self {
            id: id::segment_id(),
            audience_list_id: audience_list_id.into(),
            name: name.into(),
            criteria,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the saved criteria. The next count/list read reflects it.
    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.updated_at = Utc::now();
    }
}
