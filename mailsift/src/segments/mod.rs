//! Segment read operations.
//!
//! A segment stores only its criteria; membership, counts, and exports are
//! derived on every call by compiling the criteria against the current
//! registry snapshot and handing the predicate to the store. Nothing here
//! caches.

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::compiler::compile;
use crate::criteria::FilterCriteria;
use crate::errors::SegmentError;
use crate::fields::{ContactField, FieldRegistry};
use crate::store::ContactStore;
use crate::types::{Contact, Segment};

/// Read surface over one organization's contacts.
///
/// Binds a store to the registry snapshot used for compilation, so every call
/// in a request resolves custom fields against the same definitions.
pub struct SegmentQueries<'a, S> {
    store: &'a S,
    registry: &'a FieldRegistry,
}

impl<'a, S: ContactStore> SegmentQueries<'a, S> {
    pub fn new(store: &'a S, registry: &'a FieldRegistry) -> Self {
        Self { store, registry }
    }

    /// Contacts in the list matching the criteria. `None` criteria means the
    /// entire list.
    pub async fn contacts(
        &self,
        audience_list_id: &str,
        criteria: Option<&FilterCriteria>,
    ) -> Result<Vec<Contact>, SegmentError> {
        let predicate = compile(audience_list_id, criteria, self.registry);
        let contacts = self.store.find(&predicate).await?;
        if contacts.is_empty() && criteria.is_some_and(|c| !c.is_neutral()) {
            // Often legitimate, but also the symptom of a stale field
            // reference, so worth a trace.
            debug!("criteria over list {audience_list_id} matched no contacts");
        }
        Ok(contacts)
    }

    pub async fn count(&self, audience_list_id: &str, criteria: Option<&FilterCriteria>) -> Result<u64, SegmentError> {
        let predicate = compile(audience_list_id, criteria, self.registry);
        self.store.count(&predicate).await
    }

    /// Count and contacts from a single store read, so the two always agree
    /// even while the list is being written to.
    pub async fn count_and_contacts(
        &self,
        audience_list_id: &str,
        criteria: Option<&FilterCriteria>,
    ) -> Result<(u64, Vec<Contact>), SegmentError> {
        let contacts = self.contacts(audience_list_id, criteria).await?;
        Ok((contacts.len() as u64, contacts))
    }

    /// Flat export rows for the matching contacts: every fixed column plus one
    /// column per custom field the registry currently defines. Orphaned bag
    /// keys from deleted definitions are not exported.
    pub async fn export(
        &self,
        audience_list_id: &str,
        criteria: Option<&FilterCriteria>,
    ) -> Result<Vec<ExportRecord>, SegmentError> {
        let contacts = self.contacts(audience_list_id, criteria).await?;
        Ok(contacts.iter().map(|contact| export_record(contact, self.registry)).collect())
    }

    pub async fn segment_contacts(&self, segment: &Segment) -> Result<Vec<Contact>, SegmentError> {
        self.contacts(&segment.audience_list_id, Some(&segment.criteria)).await
    }

    pub async fn segment_count(&self, segment: &Segment) -> Result<u64, SegmentError> {
        self.count(&segment.audience_list_id, Some(&segment.criteria)).await
    }

    pub async fn segment_export(&self, segment: &Segment) -> Result<Vec<ExportRecord>, SegmentError> {
        self.export(&segment.audience_list_id, Some(&segment.criteria)).await
    }
}

/// One exported contact row. Column keys are the wire names of the fixed
/// fields plus custom field names; values are display strings, empty when the
/// contact has no value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    pub contact_id: String,
    pub columns: BTreeMap<String, String>,
}

fn export_record(contact: &Contact, registry: &FieldRegistry) -> ExportRecord {
    let mut columns = BTreeMap::new();
    for column in ContactField::ALL {
        columns.insert(column.wire_name().to_string(), column_text(contact, column));
    }
    for definition in registry.definitions() {
        let value = contact
            .custom_fields
            .get(&definition.name)
            .map(custom_text)
            .unwrap_or_default();
        columns.insert(definition.name.clone(), value);
    }
    ExportRecord {
        contact_id: contact.id.clone(),
        columns,
    }
}

fn column_text(contact: &Contact, column: ContactField) -> String {
    match column {
        ContactField::Email => contact.email.clone(),
        ContactField::FirstName => contact.first_name.clone().unwrap_or_default(),
        ContactField::LastName => contact.last_name.clone().unwrap_or_default(),
        ContactField::Phone => contact.phone.clone().unwrap_or_default(),
        ContactField::Note => contact.note.clone().unwrap_or_default(),
        ContactField::Tags => contact.tags.join(", "),
        ContactField::Status => contact.status.as_str().to_string(),
        ContactField::DefaultAddressLine1 => contact.default_address_line1.clone().unwrap_or_default(),
        ContactField::DefaultAddressLine2 => contact.default_address_line2.clone().unwrap_or_default(),
        ContactField::DefaultAddressCity => contact.default_address_city.clone().unwrap_or_default(),
        ContactField::DefaultAddressState => contact.default_address_state.clone().unwrap_or_default(),
        ContactField::DefaultAddressZip => contact.default_address_zip.clone().unwrap_or_default(),
        ContactField::DefaultAddressCountry => contact.default_address_country.clone().unwrap_or_default(),
        ContactField::CreatedAt => contact.created_at.to_rfc3339(),
        ContactField::UpdatedAt => contact.updated_at.to_rfc3339(),
    }
}

fn custom_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
