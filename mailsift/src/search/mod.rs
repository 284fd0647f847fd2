//! RediSearch execution backend.
//!
//! Renders compiled predicates into RediSearch query clauses and runs them
//! against an FT index over JSON contact documents. Rendering must agree with
//! [`Predicate::matches`]: a clause may only match contacts the in-process
//! evaluation would also match. One known exception: equality on TEXT-indexed
//! columns renders as an exact phrase, which RediSearch folds case and stems,
//! so `first_name = "ada"` can match `"Ada"` here while the in-process
//! comparison stays byte-exact.
//!
//! Because RediSearch compares what is indexed, not what is stored, documents
//! are written with normalized mirrors: `createdAtTs`/`updatedAtTs` carry the
//! timestamps as epoch seconds, and `customFieldsIndex` carries custom values
//! coerced per their definition (so a number field stored as `"150"` still
//! lands in a NUMERIC index slot).

use std::borrow::Cow;

use redis::aio::ConnectionManager;
use redis::{Value, cmd, from_redis_value};
use serde_json::Value as JsonValue;

use crate::errors::SegmentError;
use crate::fields::{ContactField, CustomFieldType, FieldRegistry};
use crate::predicate::{self, FieldTarget, Predicate};
use crate::store::ContactStore;
use crate::types::Contact;

/// Separator for multi-value TAG fields.
pub const TAG_SEPARATOR: &str = "|";

/// List-scope value no contact can carry; the rendering of match-none.
const NONE_SENTINEL: &str = "__none__";

/// Page size used when draining a full result set.
const FETCH_PAGE_SIZE: u64 = 500;

/// How a target is indexed, which decides the clause syntax for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStyle {
    Tag,
    Text,
    Numeric,
}

/// Index alias for a target. Fixed columns use snake_case aliases; custom
/// fields get a sanitized `cf_` alias so arbitrary display names stay out of
/// query syntax.
pub(crate) fn target_alias(target: &FieldTarget) -> Cow<'static, str> {
    match target {
        FieldTarget::ListScope => Cow::Borrowed("audience_list_id"),
        FieldTarget::Column(field) => Cow::Borrowed(column_alias(*field)),
        FieldTarget::Custom { key, .. } => Cow::Owned(custom_alias(key)),
    }
}

pub(crate) fn target_style(target: &FieldTarget) -> IndexStyle {
    match target {
        FieldTarget::ListScope => IndexStyle::Tag,
        FieldTarget::Column(field) => match field {
            // Names and notes want substring search; identifiers want exact
            // matching, so they index as TAG.
            ContactField::FirstName | ContactField::LastName | ContactField::Note => IndexStyle::Text,
            ContactField::CreatedAt | ContactField::UpdatedAt => IndexStyle::Numeric,
            _ => IndexStyle::Tag,
        },
        FieldTarget::Custom { ty, .. } => match ty {
            CustomFieldType::Number | CustomFieldType::Date => IndexStyle::Numeric,
            CustomFieldType::Select => IndexStyle::Tag,
            CustomFieldType::Text | CustomFieldType::Textarea => IndexStyle::Text,
        },
    }
}

const fn column_alias(field: ContactField) -> &'static str {
    match field {
        ContactField::Email => "email",
        ContactField::FirstName => "first_name",
        ContactField::LastName => "last_name",
        ContactField::Phone => "phone",
        ContactField::Note => "note",
        ContactField::Tags => "tags",
        ContactField::Status => "status",
        ContactField::DefaultAddressLine1 => "address_line1",
        ContactField::DefaultAddressLine2 => "address_line2",
        ContactField::DefaultAddressCity => "address_city",
        ContactField::DefaultAddressState => "address_state",
        ContactField::DefaultAddressZip => "address_zip",
        ContactField::DefaultAddressCountry => "address_country",
        ContactField::CreatedAt => "created_at_ts",
        ContactField::UpdatedAt => "updated_at_ts",
    }
}

fn custom_alias(name: &str) -> String {
    let mut alias = String::with_capacity(name.len() + 3);
    alias.push_str("cf_");
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            alias.push(ch.to_ascii_lowercase());
        } else {
            alias.push('_');
        }
    }
    alias
}

impl Predicate {
    /// Render this predicate as a RediSearch query clause.
    ///
    /// Total: every predicate renders to a non-empty clause. Match-none
    /// renders as a scope equality no contact can satisfy, so unresolvable
    /// branches stay unsatisfiable after composition instead of disappearing
    /// from the query string.
    pub fn to_query_clause(&self) -> String {
        match self {
            Self::MatchAll => "*".to_string(),
            Self::MatchNone => none_clause(),
            Self::Equals { target, value } => equality_clause(target, value),
            Self::OneOf { target, values } => {
                if values.is_empty() {
                    return none_clause();
                }
                match target_style(target) {
                    IndexStyle::Tag => {
                        let escaped: Vec<String> = values.iter().map(|v| escape_for_tag_query(v)).collect();
                        format!("(@{}:{{{}}})", target_alias(target), escaped.join(TAG_SEPARATOR))
                    }
                    _ => join_or(values.iter().map(|v| equality_clause(target, v)).collect()),
                }
            }
            Self::Contains { target, value } => {
                let alias = target_alias(target);
                match target_style(target) {
                    IndexStyle::Text => format!("(@{}:{})", alias, escape_for_text_contains(value)),
                    IndexStyle::Tag => format!("(@{}:{{*{}*}})", alias, escape_for_tag_query(value)),
                    IndexStyle::Numeric => none_clause(),
                }
            }
            Self::Range {
                target,
                min,
                max,
                min_exclusive,
                max_exclusive,
            } => {
                if target_style(target) != IndexStyle::Numeric {
                    return none_clause();
                }
                let min_s = match min {
                    Some(v) => exclusive_bound(format_numeric(*v), *min_exclusive),
                    None => "-inf".to_string(),
                };
                let max_s = match max {
                    Some(v) => exclusive_bound(format_numeric(*v), *max_exclusive),
                    None => "+inf".to_string(),
                };
                format!("(@{}:[{} {}])", target_alias(target), min_s, max_s)
            }
            Self::BoolIs { target, value } => bool_clause(target, *value),
            Self::Empty { target } => {
                let alias = target_alias(target);
                match target_style(target) {
                    // A field can be absent from the document or present but
                    // blank; both count as empty.
                    IndexStyle::Tag => format!("((ismissing(@{alias}))|(@{alias}:{{\"\"}}))"),
                    IndexStyle::Text => format!("((ismissing(@{alias}))|(@{alias}:\"\"))"),
                    IndexStyle::Numeric => format!("(ismissing(@{alias}))"),
                }
            }
            Self::Not(inner) => format!("(-{})", inner.to_query_clause()),
            Self::And(members) => {
                let clauses: Vec<String> = members.iter().map(Self::to_query_clause).collect();
                join_and(clauses)
            }
            Self::Or(members) => {
                let clauses: Vec<String> = members.iter().map(Self::to_query_clause).collect();
                join_or(clauses)
            }
        }
    }
}

fn none_clause() -> String {
    format!("(@audience_list_id:{{{NONE_SENTINEL}}})")
}

fn equality_clause(target: &FieldTarget, value: &str) -> String {
    let alias = target_alias(target);
    match target_style(target) {
        IndexStyle::Tag => format!("(@{}:{{{}}})", alias, escape_for_tag_query(value)),
        IndexStyle::Text => format!("(@{}:{})", alias, escape_for_text_exact(value)),
        IndexStyle::Numeric => match value.parse::<f64>() {
            Ok(parsed) => {
                let n = format_numeric(parsed);
                format!("(@{alias}:[{n} {n}])")
            }
            Err(_) => none_clause(),
        },
    }
}

fn bool_clause(target: &FieldTarget, value: bool) -> String {
    match target {
        // Truthy on a contact means currently subscribed.
        FieldTarget::Column(ContactField::Status) => {
            let subscribed = "(@status:{subscribed})".to_string();
            if value { subscribed } else { format!("(-{subscribed})") }
        }
        FieldTarget::Custom { .. } => {
            let alias = target_alias(target);
            match target_style(target) {
                IndexStyle::Tag => {
                    let literals = if value { "true|1" } else { "false|0" };
                    format!("(@{alias}:{{{literals}}})")
                }
                IndexStyle::Text => {
                    let literals: [&str; 2] = if value { ["true", "1"] } else { ["false", "0"] };
                    join_or(
                        literals
                            .iter()
                            .map(|lit| format!("(@{}:{})", alias, escape_for_text_exact(lit)))
                            .collect(),
                    )
                }
                IndexStyle::Numeric => {
                    let n = if value { "1" } else { "0" };
                    format!("(@{alias}:[{n} {n}])")
                }
            }
        }
        _ => none_clause(),
    }
}

fn exclusive_bound(formatted: String, exclusive: bool) -> String {
    if exclusive { format!("({formatted}") } else { formatted }
}

fn join_and(clauses: Vec<String>) -> String {
    match clauses.len() {
        0 => "*".to_string(),
        1 => clauses.into_iter().next().unwrap_or_default(),
        _ => format!("({})", clauses.join(" ")),
    }
}

fn join_or(clauses: Vec<String>) -> String {
    match clauses.len() {
        0 => none_clause(),
        1 => clauses.into_iter().next().unwrap_or_default(),
        _ => format!("({})", clauses.join("|")),
    }
}

/// Escape a value for RediSearch TAG field queries.
///
/// TAG fields use exact matching; this escapes the characters that carry
/// query syntax meaning (`$`, braces, backslash, `|` as OR, `-` as NOT, and
/// `.` as the JSON path separator). Spaces, colons, and quotes are legal in
/// TAG values without escaping.
///
/// ```
/// use mailsift::search::escape_for_tag_query;
///
/// assert_eq!(escape_for_tag_query("94110"), "94110");
/// assert_eq!(escape_for_tag_query("New York"), "New York");
/// assert_eq!(escape_for_tag_query("a@example.com"), "a@example\\.com");
/// assert_eq!(escape_for_tag_query("opt-in|vip"), "opt\\-in\\|vip");
/// ```
pub fn escape_for_tag_query(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '$' | '{' | '}' | '\\' | '|' | '.' | '-' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escape and wrap a value in `*...*` for TEXT substring matching.
pub fn escape_for_text_contains(value: &str) -> String {
    format!("*{}*", escape_text_value(value))
}

/// Escape quotes and backslashes, then wrap in double quotes for TEXT exact
/// phrase matching.
///
/// ```
/// use mailsift::search::escape_for_text_exact;
///
/// assert_eq!(escape_for_text_exact("John Doe"), "\"John Doe\"");
/// assert_eq!(escape_for_text_exact("say \"hi\""), "\"say \\\"hi\\\"\"");
/// ```
pub fn escape_for_text_exact(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for ch in value.chars() {
        match ch {
            '\\' | '"' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}

// '-' and '/' stay unescaped: they are tokenizers in TEXT fields.
fn escape_text_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' | '(' | ')' | '|' | '\'' | '"' | '[' | ']' | '{' | '}' | ':' | '@' | '?' | '~' | '&' | '!' | '.'
            | '*' | '%' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct IndexField {
    pub path: String,
    pub alias: String,
    pub style: IndexStyle,
    pub sortable: bool,
}

#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub name: String,
    pub prefixes: Vec<String>,
    pub fields: Vec<IndexField>,
}

/// Build the FT index schema for contact documents under `key_prefix`,
/// including one slot per custom field the registry currently knows. Adding a
/// definition later means rebuilding the index; dropping one just leaves an
/// unused slot behind.
pub fn contact_index_definition(name: &str, key_prefix: &str, registry: &FieldRegistry) -> IndexDefinition {
    let mut fields = vec![IndexField {
        path: "$.audienceListId".to_string(),
        alias: "audience_list_id".to_string(),
        style: IndexStyle::Tag,
        sortable: false,
    }];

    for column in ContactField::ALL {
        let target = FieldTarget::Column(column);
        let path = match column {
            ContactField::Tags => "$.tags[*]".to_string(),
            // Timestamps index from their epoch-second mirrors.
            ContactField::CreatedAt => "$.createdAtTs".to_string(),
            ContactField::UpdatedAt => "$.updatedAtTs".to_string(),
            other => format!("$.{}", other.wire_name()),
        };
        fields.push(IndexField {
            path,
            alias: column_alias(column).to_string(),
            style: target_style(&target),
            sortable: matches!(column, ContactField::Email | ContactField::CreatedAt),
        });
    }

    for definition in registry.definitions() {
        let target = FieldTarget::custom(&definition.name, definition.field_type);
        fields.push(IndexField {
            path: format!("$.customFieldsIndex[\"{}\"]", definition.name),
            alias: custom_alias(&definition.name),
            style: target_style(&target),
            sortable: false,
        });
    }

    IndexDefinition {
        name: name.to_string(),
        prefixes: vec![key_prefix.to_string()],
        fields,
    }
}

/// Create the index if it does not exist yet. Every field indexes missing
/// values, and TAG/TEXT fields index empty ones, so is-empty clauses can use
/// `ismissing()`.
pub async fn ensure_index(conn: &mut ConnectionManager, definition: &IndexDefinition) -> Result<(), SegmentError> {
    let indexes: Vec<String> = cmd("FT._LIST").query_async(conn).await?;
    if indexes.iter().any(|name| name == &definition.name) {
        return Ok(());
    }

    let mut command = cmd("FT.CREATE");
    command.arg(definition.name.as_str());
    command.arg("ON").arg("JSON");
    command.arg("PREFIX").arg(definition.prefixes.len());
    for prefix in &definition.prefixes {
        command.arg(prefix.as_str());
    }

    command.arg("SCHEMA");
    for field in &definition.fields {
        command.arg(field.path.as_str());
        command.arg("AS").arg(field.alias.as_str());
        match field.style {
            IndexStyle::Tag => {
                command.arg("TAG");
                command.arg("SEPARATOR").arg(TAG_SEPARATOR);
                command.arg("INDEXMISSING").arg("INDEXEMPTY");
            }
            IndexStyle::Text => {
                command.arg("TEXT");
                command.arg("INDEXMISSING").arg("INDEXEMPTY");
            }
            IndexStyle::Numeric => {
                command.arg("NUMERIC");
                command.arg("INDEXMISSING");
            }
        }
        if field.sortable {
            command.arg("SORTABLE");
        }
    }

    if let Err(err) = command.query_async::<()>(conn).await {
        if index_exists_error(&err) {
            return Ok(());
        }
        return Err(err.into());
    }

    Ok(())
}

fn index_exists_error(err: &redis::RedisError) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("already exists") && msg.contains("index")
}

/// Contact store backed by Redis Stack (JSON documents + an FT index).
///
/// `ConnectionManager` is cheap to clone and reconnects on failure; each call
/// works on its own clone.
#[derive(Clone)]
pub struct RedisContactStore {
    conn: ConnectionManager,
    index: String,
    key_prefix: String,
}

impl RedisContactStore {
    pub async fn connect(url: &str, namespace: &str) -> Result<Self, SegmentError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, namespace))
    }

    pub fn new(conn: ConnectionManager, namespace: &str) -> Self {
        Self {
            conn,
            index: format!("{namespace}-contacts-idx"),
            key_prefix: format!("{namespace}:contact:"),
        }
    }

    pub async fn ensure_index(&self, registry: &FieldRegistry) -> Result<(), SegmentError> {
        let definition = contact_index_definition(&self.index, &self.key_prefix, registry);
        ensure_index(&mut self.conn.clone(), &definition).await
    }

    /// Write or replace a contact document, attaching the normalized index
    /// mirrors for the registry's current definitions.
    pub async fn put_contact(&self, contact: &Contact, registry: &FieldRegistry) -> Result<(), SegmentError> {
        let document = index_document(contact, registry)?;
        let payload = serde_json::to_string(&document)
            .map_err(|err| SegmentError::other(format!("failed to serialize contact document: {err}")))?;

        let mut conn = self.conn.clone();
        cmd("JSON.SET")
            .arg(self.contact_key(&contact.id))
            .arg("$")
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn remove_contact(&self, contact_id: &str) -> Result<bool, SegmentError> {
        let mut conn = self.conn.clone();
        let removed: u64 = cmd("DEL").arg(self.contact_key(contact_id)).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    fn contact_key(&self, contact_id: &str) -> String {
        format!("{}{}", self.key_prefix, contact_id)
    }
}

impl ContactStore for RedisContactStore {
    async fn find(&self, predicate: &Predicate) -> Result<Vec<Contact>, SegmentError> {
        let query = predicate.to_query_clause();
        let mut conn = self.conn.clone();

        let mut contacts: Vec<Contact> = Vec::new();
        let mut offset = 0u64;
        loop {
            let page = search_page(&mut conn, &self.index, &query, offset, FETCH_PAGE_SIZE).await?;
            let fetched = page.items.len();
            contacts.extend(page.items);
            offset += FETCH_PAGE_SIZE;
            if fetched == 0 || contacts.len() as u64 >= page.total {
                break;
            }
        }
        Ok(contacts)
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, SegmentError> {
        let query = predicate.to_query_clause();
        let mut conn = self.conn.clone();
        // LIMIT 0 0 returns only the total.
        let page = search_page(&mut conn, &self.index, &query, 0, 0).await?;
        Ok(page.total)
    }
}

fn index_document(contact: &Contact, registry: &FieldRegistry) -> Result<JsonValue, SegmentError> {
    let mut document = serde_json::to_value(contact)
        .map_err(|err| SegmentError::other(format!("failed to serialize contact: {err}")))?;
    let map = document
        .as_object_mut()
        .ok_or_else(|| SegmentError::other("contact did not serialize to a JSON object"))?;

    map.insert("createdAtTs".to_string(), JsonValue::from(contact.created_at.timestamp()));
    map.insert("updatedAtTs".to_string(), JsonValue::from(contact.updated_at.timestamp()));

    let mut mirror = serde_json::Map::new();
    for definition in registry.definitions() {
        let Some(raw) = contact.custom_fields.get(&definition.name) else {
            continue;
        };
        // Values that do not coerce to the declared type stay out of the
        // mirror, so the query side never sees them.
        let normalized = match definition.field_type {
            CustomFieldType::Number => predicate::coerce_number(raw).map(JsonValue::from),
            CustomFieldType::Date => predicate::coerce_epoch(raw).map(JsonValue::from),
            _ => predicate::coerce_string(raw).map(JsonValue::from),
        };
        if let Some(value) = normalized {
            mirror.insert(definition.name.clone(), value);
        }
    }
    map.insert("customFieldsIndex".to_string(), JsonValue::Object(mirror));

    Ok(document)
}

struct SearchPage {
    total: u64,
    items: Vec<Contact>,
}

async fn search_page(
    conn: &mut ConnectionManager,
    index: &str,
    query: &str,
    offset: u64,
    count: u64,
) -> Result<SearchPage, SegmentError> {
    let mut command = cmd("FT.SEARCH");
    command.arg(index);
    command.arg(query);
    command.arg("LIMIT").arg(offset).arg(count);
    command.arg("RETURN").arg(1).arg("$");
    command.arg("DIALECT").arg(3);

    let raw: Value = command.query_async(conn).await?;
    parse_search_reply(&raw)
}

fn parse_search_reply(raw: &Value) -> Result<SearchPage, SegmentError> {
    let values: Vec<Value> = from_redis_value(raw)
        .map_err(|err| SegmentError::other(format!("failed to parse search response: {err}")))?;

    if values.is_empty() {
        return Ok(SearchPage { total: 0, items: Vec::new() });
    }

    let total = reply_total(&values[0])?;

    let mut items = Vec::new();
    let mut idx = 1;
    // Reply alternates document key and document value.
    while idx + 1 < values.len() {
        let payload = extract_json_payload(&values[idx + 1])?;
        let contact: Contact = serde_json::from_str(&payload)
            .map_err(|err| SegmentError::other(format!("failed to deserialize contact document: {err}")))?;
        items.push(contact);
        idx += 2;
    }

    Ok(SearchPage { total, items })
}

fn reply_total(value: &Value) -> Result<u64, SegmentError> {
    match value {
        Value::Int(v) => Ok(*v as u64),
        Value::BulkString(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| SegmentError::other("invalid total count in search response")),
        other => Err(SegmentError::other(format!("unexpected total count type: {other:?}"))),
    }
}

fn extract_json_payload(value: &Value) -> Result<String, SegmentError> {
    match value {
        Value::Array(parts) => {
            for chunk in parts.chunks(2) {
                if chunk.len() != 2 {
                    continue;
                }
                let alias: String = from_redis_value(&chunk[0])
                    .map_err(|err| SegmentError::other(format!("invalid field alias in search document: {err}")))?;
                if alias == "$" {
                    return normalize_json_payload(value_to_string(&chunk[1])?);
                }
            }
            Err(SegmentError::other("search response missing JSON payload"))
        }
        other => normalize_json_payload(value_to_string(other)?),
    }
}

// DIALECT 3 wraps the document in a one-element JSON array.
fn normalize_json_payload(payload: String) -> Result<String, SegmentError> {
    let trimmed = payload.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let value: JsonValue = serde_json::from_str(trimmed)
            .map_err(|err| SegmentError::other(format!("failed to parse JSON payload array: {err}")))?;
        if let Some(first) = value.as_array().and_then(|arr| arr.first()) {
            return serde_json::to_string(first)
                .map_err(|err| SegmentError::other(format!("failed to serialize JSON payload element: {err}")));
        }
    }
    Ok(payload)
}

fn value_to_string(value: &Value) -> Result<String, SegmentError> {
    match value {
        Value::BulkString(bytes) => String::from_utf8(bytes.clone())
            .map_err(|err| SegmentError::other(format!("invalid UTF-8 in search response: {err}"))),
        Value::SimpleString(status) => Ok(status.clone()),
        Value::VerbatimString { text, .. } => Ok(text.clone()),
        other => from_redis_value::<String>(other)
            .map_err(|err| SegmentError::other(format!("unexpected search value type: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::CustomFieldDefinition;

    fn zip() -> FieldTarget {
        FieldTarget::Column(ContactField::DefaultAddressZip)
    }

    #[test]
    fn match_all_renders_wildcard() {
        assert_eq!(Predicate::MatchAll.to_query_clause(), "*");
    }

    #[test]
    fn match_none_renders_unsatisfiable_scope() {
        assert_eq!(Predicate::MatchNone.to_query_clause(), "(@audience_list_id:{__none__})");
    }

    #[test]
    fn tag_equality_escapes_value() {
        let clause = Predicate::equals(FieldTarget::Column(ContactField::Email), "a@example.com").to_query_clause();
        assert_eq!(clause, "(@email:{a@example\\.com})");
    }

    #[test]
    fn text_equality_uses_exact_phrase() {
        let clause = Predicate::equals(FieldTarget::Column(ContactField::FirstName), "Ada").to_query_clause();
        assert_eq!(clause, "(@first_name:\"Ada\")");
    }

    #[test]
    fn one_of_joins_tags_with_separator() {
        let clause = Predicate::one_of(zip(), ["94110", "94117"]).to_query_clause();
        assert_eq!(clause, "(@address_zip:{94110|94117})");
    }

    #[test]
    fn contains_on_text_wraps_with_wildcards() {
        let clause = Predicate::contains(FieldTarget::Column(ContactField::Note), "donor").to_query_clause();
        assert_eq!(clause, "(@note:*donor*)");
    }

    #[test]
    fn contains_on_tags_uses_wildcard_tag_match() {
        let clause = Predicate::contains(FieldTarget::Column(ContactField::Tags), "vip").to_query_clause();
        assert_eq!(clause, "(@tags:{*vip*})");
    }

    #[test]
    fn strict_bounds_render_exclusive_syntax() {
        let target = FieldTarget::custom("donationTotal", CustomFieldType::Number);
        assert_eq!(
            Predicate::greater_than(target.clone(), 100.0).to_query_clause(),
            "(@cf_donationtotal:[(100 +inf])"
        );
        assert_eq!(
            Predicate::less_than(target.clone(), 50.5).to_query_clause(),
            "(@cf_donationtotal:[-inf (50.5])"
        );
        assert_eq!(
            Predicate::between(target, 10.0, 20.0).to_query_clause(),
            "(@cf_donationtotal:[10 20])"
        );
    }

    #[test]
    fn status_truthiness_reads_subscribed_tag() {
        let target = FieldTarget::Column(ContactField::Status);
        assert_eq!(Predicate::bool_is(target.clone(), true).to_query_clause(), "(@status:{subscribed})");
        assert_eq!(Predicate::bool_is(target, false).to_query_clause(), "(-(@status:{subscribed}))");
    }

    #[test]
    fn empty_on_tag_field_covers_missing_and_blank() {
        let clause = Predicate::empty(zip()).to_query_clause();
        assert_eq!(clause, "((ismissing(@address_zip))|(@address_zip:{\"\"}))");
    }

    #[test]
    fn empty_on_text_field_covers_missing_and_blank() {
        let clause = Predicate::empty(FieldTarget::Column(ContactField::Note)).to_query_clause();
        assert_eq!(clause, "((ismissing(@note))|(@note:\"\"))");

        // Numbers are either present or missing; there is no blank form.
        let target = FieldTarget::custom("donationTotal", CustomFieldType::Number);
        assert_eq!(Predicate::empty(target).to_query_clause(), "(ismissing(@cf_donationtotal))");
    }

    #[test]
    fn composites_join_with_space_and_pipe() {
        let scope = Predicate::equals(FieldTarget::ListScope, "lst_1");
        let vip = Predicate::equals(FieldTarget::Column(ContactField::Tags), "vip");
        let bounced = Predicate::equals(FieldTarget::Column(ContactField::Status), "bounced");

        let conjunction = Predicate::and([scope.clone(), vip.clone()]).to_query_clause();
        assert_eq!(conjunction, "((@audience_list_id:{lst_1}) (@tags:{vip}))");

        let disjunction = Predicate::or([vip, bounced]).to_query_clause();
        assert_eq!(disjunction, "((@tags:{vip})|(@status:{bounced}))");
    }

    #[test]
    fn negation_wraps_with_minus() {
        let clause = Predicate::not(Predicate::equals(zip(), "94110")).to_query_clause();
        assert_eq!(clause, "(-(@address_zip:{94110}))");
    }

    #[test]
    fn match_none_stays_unsatisfiable_inside_or() {
        let clause = Predicate::Or(vec![
            Predicate::MatchNone,
            Predicate::equals(zip(), "94110"),
        ])
        .to_query_clause();
        assert_eq!(clause, "((@audience_list_id:{__none__})|(@address_zip:{94110}))");
    }

    #[test]
    fn custom_aliases_are_sanitized() {
        let target = FieldTarget::custom("Donation Total!", CustomFieldType::Number);
        assert_eq!(target_alias(&target), "cf_donation_total_");
    }

    #[test]
    fn index_definition_includes_registry_fields() {
        let org = "org_a";
        let definitions = [
            CustomFieldDefinition::new(org, "tier", "Tier", CustomFieldType::Select),
            CustomFieldDefinition::new(org, "donationTotal", "Donation Total", CustomFieldType::Number),
        ];
        let registry = FieldRegistry::from_definitions(org, &definitions);

        let definition = contact_index_definition("contacts-idx", "app:contact:", &registry);
        assert_eq!(definition.prefixes, vec!["app:contact:".to_string()]);

        let tier = definition
            .fields
            .iter()
            .find(|f| f.alias == "cf_tier")
            .expect("tier slot");
        assert_eq!(tier.style, IndexStyle::Tag);
        assert_eq!(tier.path, "$.customFieldsIndex[\"tier\"]");

        let donation = definition
            .fields
            .iter()
            .find(|f| f.alias == "cf_donationtotal")
            .expect("donation slot");
        assert_eq!(donation.style, IndexStyle::Numeric);

        // Timestamps index from their numeric mirrors.
        let created = definition
            .fields
            .iter()
            .find(|f| f.alias == "created_at_ts")
            .expect("created_at slot");
        assert_eq!(created.path, "$.createdAtTs");
        assert_eq!(created.style, IndexStyle::Numeric);
    }

    #[test]
    fn index_document_normalizes_custom_values() {
        let org = "org_a";
        let definitions = [CustomFieldDefinition::new(org, "donationTotal", "Donation Total", CustomFieldType::Number)];
        let registry = FieldRegistry::from_definitions(org, &definitions);

        let contact = Contact::new("lst_1", "a@example.com").with_custom_field("donationTotal", "150");
        let document = index_document(&contact, &registry).unwrap();

        // Raw value is preserved; the mirror carries the coerced number.
        assert_eq!(document["customFields"]["donationTotal"], "150");
        assert_eq!(document["customFieldsIndex"]["donationTotal"], 150.0);
        assert_eq!(document["createdAtTs"], contact.created_at.timestamp());
    }
}
