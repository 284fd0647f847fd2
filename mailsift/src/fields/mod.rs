//! Fixed contact schema and the per-organization custom field registry.
//!
//! Filter criteria reference two kinds of fields: fixed contact columns
//! (resolved through [`ContactField`]) and organization-defined custom fields
//! (resolved through a [`FieldRegistry`] snapshot). The compiler depends only
//! on these resolvers, never on storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::SegmentError;
use crate::id;

/// Fixed, filterable contact attributes. Wire names are camelCase, matching
/// the persisted filter criteria documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Email,
    FirstName,
    LastName,
    Phone,
    Note,
    Tags,
    Status,
    DefaultAddressLine1,
    DefaultAddressLine2,
    DefaultAddressCity,
    DefaultAddressState,
    DefaultAddressZip,
    DefaultAddressCountry,
    CreatedAt,
    UpdatedAt,
}

/// Coarse type of a fixed field, driving operator validity in the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single string value (email, names, phone, note, address parts).
    Text,
    /// Multi-valued string set.
    Tags,
    /// Subscription status enum.
    Status,
    /// Timestamp, compared as epoch seconds.
    Date,
}

impl ContactField {
    /// Resolve a criteria `field` name to a fixed column. `None` means the
    /// reference is unknown and the leaf must compile fail-closed.
    pub fn parse(name: &str) -> Option<Self> {
        let field = match name {
            "email" => Self::Email,
            "firstName" => Self::FirstName,
            "lastName" => Self::LastName,
            "phone" => Self::Phone,
            "note" => Self::Note,
            "tags" => Self::Tags,
            "status" => Self::Status,
            "defaultAddressLine1" => Self::DefaultAddressLine1,
            "defaultAddressLine2" => Self::DefaultAddressLine2,
            "defaultAddressCity" => Self::DefaultAddressCity,
            "defaultAddressState" => Self::DefaultAddressState,
            "defaultAddressZip" => Self::DefaultAddressZip,
            "defaultAddressCountry" => Self::DefaultAddressCountry,
            "createdAt" => Self::CreatedAt,
            "updatedAt" => Self::UpdatedAt,
            _ => return None,
        };
        Some(field)
    }

    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Phone => "phone",
            Self::Note => "note",
            Self::Tags => "tags",
            Self::Status => "status",
            Self::DefaultAddressLine1 => "defaultAddressLine1",
            Self::DefaultAddressLine2 => "defaultAddressLine2",
            Self::DefaultAddressCity => "defaultAddressCity",
            Self::DefaultAddressState => "defaultAddressState",
            Self::DefaultAddressZip => "defaultAddressZip",
            Self::DefaultAddressCountry => "defaultAddressCountry",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Email
            | Self::FirstName
            | Self::LastName
            | Self::Phone
            | Self::Note
            | Self::DefaultAddressLine1
            | Self::DefaultAddressLine2
            | Self::DefaultAddressCity
            | Self::DefaultAddressState
            | Self::DefaultAddressZip
            | Self::DefaultAddressCountry => FieldKind::Text,
            Self::Tags => FieldKind::Tags,
            Self::Status => FieldKind::Status,
            Self::CreatedAt | Self::UpdatedAt => FieldKind::Date,
        }
    }

    /// All fixed fields, in export column order.
    pub const ALL: [Self; 15] = [
        Self::Email,
        Self::FirstName,
        Self::LastName,
        Self::Phone,
        Self::Note,
        Self::Tags,
        Self::Status,
        Self::DefaultAddressLine1,
        Self::DefaultAddressLine2,
        Self::DefaultAddressCity,
        Self::DefaultAddressState,
        Self::DefaultAddressZip,
        Self::DefaultAddressCountry,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];
}

/// Declared type of a custom field. Determines the coercion applied to stored
/// scalars before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldType {
    Text,
    Number,
    Date,
    Select,
    Textarea,
}

/// Organization-defined, typed key-value attribute attached to contacts.
///
/// `name` is unique within an organization and is the key contacts use in
/// their `customFields` bag. Deleting a definition does not purge stored
/// values; stale references simply stop matching (fail-closed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDefinition {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl CustomFieldDefinition {
    pub fn new(
        organization_id: impl Into<String>,
        name: impl Into<String>,
        label: impl Into<String>,
        field_type: CustomFieldType,
    ) -> Self {
        Self {
            id: id::custom_field_id(),
            organization_id: organization_id.into(),
            name: name.into(),
            label: label.into(),
            field_type,
            options: Vec::new(),
            required: false,
            description: None,
        }
    }

    pub fn with_options<S: Into<String>>(mut self, options: impl IntoIterator<Item = S>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// Read-only snapshot of one organization's custom field definitions.
///
/// Built once per compile call and passed in explicitly so the compiler stays
/// pure; it never reaches into global state mid-compilation.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    organization_id: String,
    by_name: BTreeMap<String, CustomFieldDefinition>,
}

impl FieldRegistry {
    /// Empty registry for an organization with no custom fields defined.
    pub fn empty(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            by_name: BTreeMap::new(),
        }
    }

    /// Snapshot a set of definitions. Definitions belonging to a different
    /// organization are skipped; on duplicate names the last one wins.
    pub fn from_definitions(organization_id: impl Into<String>, definitions: &[CustomFieldDefinition]) -> Self {
        let organization_id = organization_id.into();
        let mut by_name = BTreeMap::new();
        for definition in definitions {
            if definition.organization_id == organization_id {
                by_name.insert(definition.name.clone(), definition.clone());
            }
        }
        Self {
            organization_id,
            by_name,
        }
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    /// Resolve a custom field reference by name. `None` means the reference
    /// is stale or unknown and must compile to a match-nothing predicate.
    pub fn lookup(&self, name: &str) -> Option<&CustomFieldDefinition> {
        self.by_name.get(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &CustomFieldDefinition> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// In-process catalog of custom field definitions across organizations.
///
/// This is the external registry lookup the segment consumers perform before
/// compiling: an organization with no catalog entry is a precondition failure
/// ([`SegmentError::RegistryUnavailable`]), never a silent "no custom fields".
#[derive(Debug, Default)]
pub struct CustomFieldCatalog {
    by_org: BTreeMap<String, Vec<CustomFieldDefinition>>,
}

impl CustomFieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an organization, with or without definitions yet.
    pub fn register_organization(&mut self, organization_id: impl Into<String>) {
        self.by_org.entry(organization_id.into()).or_default();
    }

    pub fn upsert(&mut self, definition: CustomFieldDefinition) {
        let entries = self.by_org.entry(definition.organization_id.clone()).or_default();
        if let Some(existing) = entries.iter_mut().find(|d| d.name == definition.name) {
            *existing = definition;
        } else {
            entries.push(definition);
        }
    }

    /// Remove a definition by name. Stored contact values keep the orphaned
    /// key; filters referencing it stop matching from the next snapshot on.
    pub fn remove(&mut self, organization_id: &str, name: &str) -> Option<CustomFieldDefinition> {
        let entries = self.by_org.get_mut(organization_id)?;
        let index = entries.iter().position(|d| d.name == name)?;
        Some(entries.remove(index))
    }

    /// Snapshot the registry for one organization.
    pub fn registry_for(&self, organization_id: &str) -> Result<FieldRegistry, SegmentError> {
        match self.by_org.get(organization_id) {
            Some(entries) => Ok(FieldRegistry::from_definitions(organization_id, entries)),
            None => Err(SegmentError::RegistryUnavailable {
                organization_id: organization_id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resolves_wire_names() {
        assert_eq!(ContactField::parse("email"), Some(ContactField::Email));
        assert_eq!(ContactField::parse("defaultAddressZip"), Some(ContactField::DefaultAddressZip));
        assert_eq!(ContactField::parse("createdAt"), Some(ContactField::CreatedAt));
        assert_eq!(ContactField::parse("zip"), None);
        assert_eq!(ContactField::parse(""), None);
    }

    #[test]
    fn parse_round_trips_every_field() {
        for field in ContactField::ALL {
            assert_eq!(ContactField::parse(field.wire_name()), Some(field));
        }
    }

    #[test]
    fn registry_skips_foreign_org_definitions() {
        let ours = CustomFieldDefinition::new("org_a", "tier", "Tier", CustomFieldType::Select);
        let theirs = CustomFieldDefinition::new("org_b", "tier", "Tier", CustomFieldType::Text);
        let registry = FieldRegistry::from_definitions("org_a", &[theirs, ours.clone()]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("tier"), Some(&ours));
    }

    #[test]
    fn registry_last_definition_wins_on_duplicate_names() {
        let first = CustomFieldDefinition::new("org_a", "tier", "Tier", CustomFieldType::Text);
        let second = CustomFieldDefinition::new("org_a", "tier", "Tier v2", CustomFieldType::Select);
        let registry = FieldRegistry::from_definitions("org_a", &[first, second.clone()]);

        assert_eq!(registry.lookup("tier"), Some(&second));
    }

    #[test]
    fn catalog_distinguishes_missing_org_from_empty_registry() {
        let mut catalog = CustomFieldCatalog::new();
        catalog.register_organization("org_a");

        let registry = catalog.registry_for("org_a").expect("registered org");
        assert!(registry.is_empty());

        let err = catalog.registry_for("org_unknown").expect_err("unregistered org");
        assert!(matches!(err, SegmentError::RegistryUnavailable { organization_id } if organization_id == "org_unknown"));
    }

    #[test]
    fn catalog_remove_leaves_other_definitions() {
        let mut catalog = CustomFieldCatalog::new();
        catalog.upsert(CustomFieldDefinition::new("org_a", "tier", "Tier", CustomFieldType::Select));
        catalog.upsert(CustomFieldDefinition::new("org_a", "score", "Score", CustomFieldType::Number));

        assert!(catalog.remove("org_a", "tier").is_some());
        let registry = catalog.registry_for("org_a").unwrap();
        assert!(registry.lookup("tier").is_none());
        assert!(registry.lookup("score").is_some());
    }
}
