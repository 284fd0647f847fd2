//! End-to-end segmentation behavior over the in-memory store.
//!
//! These tests exercise the contract the compiler guarantees to callers:
//! list scoping, neutral criteria, monotonicity of AND/OR, fail-closed
//! handling of stale references, and determinism.

use mailsift::{
    compile, Contact, CustomFieldCatalog, CustomFieldDefinition, CustomFieldType, FieldRegistry, FilterCriteria,
    MemoryContactStore, Operator, Segment, SegmentQueries,
};
use serde_json::json;

const ORG: &str = "org_test";
const LIST: &str = "lst_test";

fn store_with(contacts: impl IntoIterator<Item = Contact>) -> MemoryContactStore {
    let mut store = MemoryContactStore::new();
    for contact in contacts {
        store.insert(contact).expect("seed contact");
    }
    store
}

fn emails(contacts: &[Contact]) -> Vec<&str> {
    let mut emails: Vec<&str> = contacts.iter().map(|c| c.email.as_str()).collect();
    emails.sort_unstable();
    emails
}

#[tokio::test]
async fn results_never_leak_across_lists() {
    let store = store_with([
        Contact::new(LIST, "in@example.com").with_tags(["vip"]),
        Contact::new("lst_other", "out@example.com").with_tags(["vip"]),
    ]);
    let registry = FieldRegistry::empty(ORG);
    let queries = SegmentQueries::new(&store, &registry);

    let criteria = FilterCriteria::rule("tags", Operator::Contains, "vip");
    let contacts = queries.contacts(LIST, Some(&criteria)).await.unwrap();
    assert_eq!(emails(&contacts), ["in@example.com"]);

    // Even without criteria the scope holds.
    let all = queries.contacts(LIST, None).await.unwrap();
    assert_eq!(emails(&all), ["in@example.com"]);
}

#[tokio::test]
async fn neutral_criteria_equals_no_criteria() {
    let store = store_with([
        Contact::new(LIST, "a@example.com"),
        Contact::new(LIST, "b@example.com").with_zip("94110"),
    ]);
    let registry = FieldRegistry::empty(ORG);
    let queries = SegmentQueries::new(&store, &registry);

    let without = queries.contacts(LIST, None).await.unwrap();
    let neutral = FilterCriteria::parse(&json!({}));
    let with = queries.contacts(LIST, Some(&neutral)).await.unwrap();
    assert_eq!(emails(&with), emails(&without));

    // Malformed documents normalize to neutral as well.
    let malformed = FilterCriteria::parse(&json!({ "rules": "oops" }));
    let recovered = queries.contacts(LIST, Some(&malformed)).await.unwrap();
    assert_eq!(emails(&recovered), emails(&without));
}

#[tokio::test]
async fn and_narrows_and_or_widens() {
    let store = store_with([
        Contact::new(LIST, "both@example.com").with_zip("94110").with_tags(["vip"]),
        Contact::new(LIST, "zip@example.com").with_zip("94110"),
        Contact::new(LIST, "tag@example.com").with_tags(["vip"]),
        Contact::new(LIST, "neither@example.com"),
    ]);
    let registry = FieldRegistry::empty(ORG);
    let queries = SegmentQueries::new(&store, &registry);

    let zip = FilterCriteria::rule("defaultAddressZip", Operator::Equals, "94110");
    let vip = FilterCriteria::rule("tags", Operator::Contains, "vip");

    let zip_count = queries.count(LIST, Some(&zip)).await.unwrap();
    let both = FilterCriteria::all([zip.clone(), vip.clone()]);
    let either = FilterCriteria::any([zip, vip]);

    let and_count = queries.count(LIST, Some(&both)).await.unwrap();
    let or_count = queries.count(LIST, Some(&either)).await.unwrap();

    assert!(and_count <= zip_count);
    assert!(or_count >= zip_count);
    assert_eq!(and_count, 1);
    assert_eq!(or_count, 3);
}

#[tokio::test]
async fn unknown_references_fail_closed() {
    let store = store_with([
        Contact::new(LIST, "a@example.com").with_zip("94110"),
        Contact::new(LIST, "b@example.com"),
    ]);
    let registry = FieldRegistry::empty(ORG);
    let queries = SegmentQueries::new(&store, &registry);

    let stale = FilterCriteria::custom_rule("deletedField", Operator::Equals, "x");
    let zip = FilterCriteria::rule("defaultAddressZip", Operator::Equals, "94110");

    // Under AND the stale branch empties the result.
    let conjunction = FilterCriteria::all([zip.clone(), stale.clone()]);
    assert_eq!(queries.count(LIST, Some(&conjunction)).await.unwrap(), 0);

    // Under OR only the stale branch disappears.
    let disjunction = FilterCriteria::any([zip, stale]);
    let contacts = queries.contacts(LIST, Some(&disjunction)).await.unwrap();
    assert_eq!(emails(&contacts), ["a@example.com"]);

    // Unknown operators behave the same way.
    let bad_operator = FilterCriteria::parse(&json!({
        "field": "email",
        "operator": "regexMatch",
        "value": ".*"
    }));
    assert_eq!(queries.count(LIST, Some(&bad_operator)).await.unwrap(), 0);
}

#[tokio::test]
async fn count_agrees_with_contact_listing() {
    let store = store_with([
        Contact::new(LIST, "a@example.com").with_tags(["vip"]),
        Contact::new(LIST, "b@example.com").with_tags(["vip", "donor"]),
        Contact::new(LIST, "c@example.com"),
    ]);
    let registry = FieldRegistry::empty(ORG);
    let queries = SegmentQueries::new(&store, &registry);

    let criteria = FilterCriteria::rule("tags", Operator::Contains, "vip");
    let (count, contacts) = queries.count_and_contacts(LIST, Some(&criteria)).await.unwrap();
    assert_eq!(count, contacts.len() as u64);
    assert_eq!(count, queries.count(LIST, Some(&criteria)).await.unwrap());
}

#[tokio::test]
async fn compilation_is_deterministic() {
    let registry = FieldRegistry::from_definitions(
        ORG,
        &[CustomFieldDefinition::new(ORG, "tier", "Tier", CustomFieldType::Select)],
    );
    let criteria = FilterCriteria::any([
        FilterCriteria::rule("status", Operator::Equals, "subscribed"),
        FilterCriteria::custom_rule("tier", Operator::OneOf, json!(["gold", "silver"])),
    ]);

    let first = compile(LIST, Some(&criteria), &registry);
    let second = compile(LIST, Some(&criteria), &registry);
    assert_eq!(first, second);
    assert_eq!(first.to_query_clause(), second.to_query_clause());

    // Saved criteria recompile identically on every read.
    let segment = Segment::new(LIST, "Gold or subscribed", criteria);
    let recompiled = compile(&segment.audience_list_id, Some(&segment.criteria), &registry);
    assert_eq!(recompiled, first);
}

#[tokio::test]
async fn zip_equals_or_empty_scenario() {
    let store = store_with([
        Contact::new(LIST, "a@example.com").with_zip("94110"),
        Contact::new(LIST, "b@example.com").with_zip("10001"),
        Contact::new(LIST, "c@example.com"),
    ]);
    let registry = FieldRegistry::empty(ORG);
    let queries = SegmentQueries::new(&store, &registry);

    let criteria = FilterCriteria::any([
        FilterCriteria::rule("defaultAddressZip", Operator::Equals, "94110"),
        FilterCriteria::rule("defaultAddressZip", Operator::IsEmpty, json!(null)),
    ]);

    let contacts = queries.contacts(LIST, Some(&criteria)).await.unwrap();
    assert_eq!(emails(&contacts), ["a@example.com", "c@example.com"]);
}

#[tokio::test]
async fn deleting_a_definition_empties_dependent_segments() {
    let store = store_with([
        Contact::new(LIST, "gold@example.com").with_custom_field("tier", "gold"),
        Contact::new(LIST, "silver@example.com").with_custom_field("tier", "silver"),
    ]);

    let mut catalog = CustomFieldCatalog::new();
    catalog.register_organization(ORG);
    let tier = CustomFieldDefinition::new(ORG, "tier", "Tier", CustomFieldType::Select)
        .with_options(["gold", "silver", "bronze"]);
    catalog.upsert(tier);

    let criteria = FilterCriteria::custom_rule("tier", Operator::Equals, "gold");
    let segment = Segment::new(LIST, "Gold tier", criteria);

    let registry = catalog.registry_for(ORG).unwrap();
    let queries = SegmentQueries::new(&store, &registry);
    let contacts = queries.segment_contacts(&segment).await.unwrap();
    assert_eq!(emails(&contacts), ["gold@example.com"]);

    // Delete the definition; the same saved segment now matches nothing.
    catalog.remove(ORG, "tier");
    let registry = catalog.registry_for(ORG).unwrap();
    let queries = SegmentQueries::new(&store, &registry);
    assert_eq!(queries.segment_count(&segment).await.unwrap(), 0);
}

#[tokio::test]
async fn numeric_strings_compare_as_numbers() {
    let store = store_with([
        Contact::new(LIST, "big@example.com").with_custom_field("donationTotal", "150"),
        Contact::new(LIST, "small@example.com").with_custom_field("donationTotal", 25),
        Contact::new(LIST, "junk@example.com").with_custom_field("donationTotal", "n/a"),
    ]);
    let registry = FieldRegistry::from_definitions(
        ORG,
        &[CustomFieldDefinition::new(ORG, "donationTotal", "Donation Total", CustomFieldType::Number)],
    );
    let queries = SegmentQueries::new(&store, &registry);

    let criteria = FilterCriteria::custom_rule("donationTotal", Operator::GreaterThan, 100);
    let contacts = queries.contacts(LIST, Some(&criteria)).await.unwrap();
    assert_eq!(emails(&contacts), ["big@example.com"]);

    let between = FilterCriteria::custom_rule("donationTotal", Operator::Between, json!([20, 30]));
    let contacts = queries.contacts(LIST, Some(&between)).await.unwrap();
    assert_eq!(emails(&contacts), ["small@example.com"]);
}
