//! Contact segmentation for audience lists.
//!
//! Segments are saved filter criteria, not saved memberships: a criteria tree
//! authored as JSON is compiled into a [`Predicate`] and evaluated against a
//! contact store on every read. The compiler is pure and fails closed, so a
//! stale field reference or unknown operator can narrow a result but never
//! widen it.
//!
//! Two stores ship with the crate: [`MemoryContactStore`] evaluates predicates
//! in-process, and [`RedisContactStore`] renders them as RediSearch queries
//! over JSON documents in Redis Stack.

pub mod compiler;
pub mod criteria;
pub mod errors;
pub mod fields;
pub mod id;
pub mod predicate;
pub mod search;
pub mod segments;
pub mod store;
pub mod types;
pub mod validators;

pub use compiler::compile;
pub use criteria::{Combinator, FilterCriteria, FilterGroup, FilterRule, Operator};
pub use errors::{SegmentError, ValidationError, ValidationIssue};
pub use fields::{
    ContactField, CustomFieldCatalog, CustomFieldDefinition, CustomFieldType, FieldKind, FieldRegistry,
};
pub use predicate::{FieldTarget, Predicate};
pub use search::RedisContactStore;
pub use segments::{ExportRecord, SegmentQueries};
pub use store::{ContactStore, MemoryContactStore};
pub use types::{AudienceList, Contact, Organization, Segment, SubscriptionStatus};

// Re-export redis types so users don't need to depend on a specific redis version
pub use redis;
pub use redis::aio::ConnectionManager;

/// Delete all keys matching a pattern (for test cleanup).
///
/// This performs a SCAN + DEL operation to safely delete keys without blocking Redis.
pub async fn cleanup_pattern(conn: &mut ConnectionManager, pattern: &str) -> Result<u64, SegmentError> {
    const SCAN_COUNT: usize = 1000;
    let mut cursor: u64 = 0;
    let mut total_deleted: u64 = 0;

    loop {
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(conn)
            .await?;

        if !keys.is_empty() {
            let deleted: u64 = redis::cmd("DEL").arg(&keys).query_async(conn).await?;
            total_deleted += deleted;
        }

        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }

    Ok(total_deleted)
}
