//! Contact stores.
//!
//! A [`ContactStore`] executes compiled predicates; it is the only thing that
//! ever touches contact rows. [`MemoryContactStore`] evaluates predicates
//! in-process and doubles as the reference semantics the RediSearch rendering
//! must agree with. The Redis-backed implementation lives in the search
//! module.

use std::collections::BTreeMap;

use crate::errors::{SegmentError, ValidationError};
use crate::predicate::Predicate;
use crate::types::Contact;
use crate::validators::is_valid_email;

/// Query surface the segment consumers depend on. Implementations must apply
/// the predicate exactly as [`Predicate::matches`] defines it.
#[allow(async_fn_in_trait)]
pub trait ContactStore {
    /// All contacts matching the predicate.
    async fn find(&self, predicate: &Predicate) -> Result<Vec<Contact>, SegmentError>;

    /// Number of contacts matching the predicate.
    async fn count(&self, predicate: &Predicate) -> Result<u64, SegmentError>;
}

/// In-process contact store backed by a map keyed on contact id.
///
/// Enforces the `(audienceListId, email)` uniqueness invariant (emails
/// compared case-insensitively) and validates email syntax on write. Iteration
/// order is deterministic, so `find` results are stable across calls.
#[derive(Debug, Default)]
pub struct MemoryContactStore {
    contacts: BTreeMap<String, Contact>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, contact: Contact) -> Result<(), SegmentError> {
        self.check_writable(&contact, None)?;
        self.contacts.insert(contact.id.clone(), contact);
        Ok(())
    }

    /// Replace an existing contact wholesale. The contact must already exist;
    /// uniqueness is re-checked against every other contact.
    pub fn update(&mut self, contact: Contact) -> Result<(), SegmentError> {
        if !self.contacts.contains_key(&contact.id) {
            return Err(SegmentError::NotFound {
                contact_id: Some(contact.id.clone()),
            });
        }
        self.check_writable(&contact, Some(&contact.id))?;
        self.contacts.insert(contact.id.clone(), contact);
        Ok(())
    }

    pub fn remove(&mut self, contact_id: &str) -> Option<Contact> {
        self.contacts.remove(contact_id)
    }

    pub fn get(&self, contact_id: &str) -> Option<&Contact> {
        self.contacts.get(contact_id)
    }

    /// Contacts belonging to one list, in id order.
    pub fn contacts_in_list<'a>(&'a self, audience_list_id: &'a str) -> impl Iterator<Item = &'a Contact> {
        self.contacts
            .values()
            .filter(move |contact| contact.audience_list_id == audience_list_id)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    fn check_writable(&self, contact: &Contact, exclude_id: Option<&str>) -> Result<(), SegmentError> {
        if !is_valid_email(&contact.email) {
            return Err(ValidationError::single(
                "email",
                "invalid_email",
                format!("'{}' is not a valid email address", contact.email),
            )
            .into());
        }

        let email = contact.email.to_ascii_lowercase();
        let duplicate = self.contacts.values().find(|existing| {
            exclude_id != Some(existing.id.as_str())
                && existing.audience_list_id == contact.audience_list_id
                && existing.email.to_ascii_lowercase() == email
        });
        if let Some(existing) = duplicate {
            return Err(SegmentError::DuplicateContact {
                audience_list_id: contact.audience_list_id.clone(),
                email: contact.email.clone(),
                existing_contact_id: existing.id.clone(),
            });
        }
        Ok(())
    }
}

impl ContactStore for MemoryContactStore {
    async fn find(&self, predicate: &Predicate) -> Result<Vec<Contact>, SegmentError> {
        Ok(self
            .contacts
            .values()
            .filter(|contact| predicate.matches(contact))
            .cloned()
            .collect())
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, SegmentError> {
        Ok(self.contacts.values().filter(|contact| predicate.matches(contact)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_invalid_email() {
        let mut store = MemoryContactStore::new();
        let err = store.insert(Contact::new("lst_1", "not-an-email")).expect_err("should fail");
        assert!(matches!(err, SegmentError::Validation(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn insert_rejects_duplicate_email_in_same_list() {
        let mut store = MemoryContactStore::new();
        let first = Contact::new("lst_1", "a@example.com");
        let first_id = first.id.clone();
        store.insert(first).unwrap();

        // Case differences still collide.
        let err = store
            .insert(Contact::new("lst_1", "A@Example.com"))
            .expect_err("duplicate should fail");
        assert!(matches!(
            err,
            SegmentError::DuplicateContact { existing_contact_id, .. } if existing_contact_id == first_id
        ));

        // Same email in another list is fine.
        store.insert(Contact::new("lst_2", "a@example.com")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn update_requires_existing_contact_and_recheck_uniqueness() {
        let mut store = MemoryContactStore::new();
        let mut contact = Contact::new("lst_1", "a@example.com");
        store.insert(contact.clone()).unwrap();
        store.insert(Contact::new("lst_1", "b@example.com")).unwrap();

        let missing = Contact::new("lst_1", "c@example.com");
        assert!(matches!(
            store.update(missing),
            Err(SegmentError::NotFound { .. })
        ));

        // Updating onto another contact's email collides.
        contact.email = "b@example.com".to_string();
        assert!(matches!(
            store.update(contact.clone()),
            Err(SegmentError::DuplicateContact { .. })
        ));

        // Keeping your own email is not a collision.
        contact.email = "a@example.com".to_string();
        contact.note = Some("updated".to_string());
        store.update(contact).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn find_and_count_agree_on_the_same_snapshot() {
        let mut store = MemoryContactStore::new();
        store.insert(Contact::new("lst_1", "a@example.com")).unwrap();
        store.insert(Contact::new("lst_1", "b@example.com")).unwrap();
        store.insert(Contact::new("lst_2", "c@example.com")).unwrap();

        let scope = Predicate::equals(crate::predicate::FieldTarget::ListScope, "lst_1");
        let found = store.find(&scope).await.unwrap();
        let counted = store.count(&scope).await.unwrap();
        assert_eq!(found.len() as u64, counted);
        assert!(found.iter().all(|c| c.audience_list_id == "lst_1"));
        assert_eq!(store.contacts_in_list("lst_1").count(), 2);
    }
}
