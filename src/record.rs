use serde_json::Value;
use time::format_description::well_known::Iso8601;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Marker value that flags a record as the explicit origin of its lineage.
pub const PRIME_ROOT: &str = "root";

/// Resolve the canonical identifier of a version record.
///
/// Candidates are consulted in a fixed order: the top-level `@id`, `id`,
/// and `_id` fields (string values only, non-strings fall through), then
/// the first present of the nested `__rerum.history.id` / `__rerum.id`
/// pair. A present non-string nested value ends the chain rather than
/// falling through to the alternate location, and an identifier that
/// resolves to the empty string counts as no identity at all.
///
/// This is the same accessor the builder keys its node table with, so
/// caller-side lookups are guaranteed to agree with the graph.
pub fn resolve_id(record: &Value) -> Option<&str> {
    let direct = record
        .get("@id")
        .and_then(Value::as_str)
        .or_else(|| record.get("id").and_then(Value::as_str))
        .or_else(|| record.get("_id").and_then(Value::as_str));
    direct
        .or_else(|| nested_id(record))
        .filter(|id| !id.is_empty())
}

fn nested_id(record: &Value) -> Option<&str> {
    present(record, &["__rerum", "history", "id"])
        .or_else(|| present(record, &["__rerum", "id"]))
        .and_then(Value::as_str)
}

/// Walk `path` into the record, treating JSON `null` at the leaf as absent.
fn present<'a>(record: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cursor = record;
    for key in path {
        cursor = cursor.get(key)?;
    }
    if cursor.is_null() {
        None
    } else {
        Some(cursor)
    }
}

/// A lineage link as it appears inside a record.
///
/// Stores emit links either as bare identifier strings or as embedded
/// record objects; both forms resolve to an identifier (or to nothing, for
/// an embedded object with no usable identity).
#[derive(Debug, Clone, Copy)]
pub enum LinkTarget<'a> {
    /// The link is the identifier itself.
    Id(&'a str),
    /// The link is an embedded record whose identifier is the target.
    Embedded(&'a Value),
}

impl<'a> LinkTarget<'a> {
    /// The identifier this link points at, if one can be resolved.
    pub fn resolve(self) -> Option<&'a str> {
        match self {
            LinkTarget::Id(id) => (!id.is_empty()).then_some(id),
            LinkTarget::Embedded(record) => resolve_id(record),
        }
    }
}

fn link_from(value: &Value) -> Option<LinkTarget<'_>> {
    match value {
        Value::String(id) => Some(LinkTarget::Id(id)),
        Value::Object(_) => Some(LinkTarget::Embedded(value)),
        _ => None,
    }
}

/// The record's predecessor link, when one is present.
///
/// Consulted locations, first present wins: `__rerum.history.previous`,
/// `history.previous`, `__rerum.previous`.
pub fn previous_link(record: &Value) -> Option<LinkTarget<'_>> {
    present(record, &["__rerum", "history", "previous"])
        .or_else(|| present(record, &["history", "previous"]))
        .or_else(|| present(record, &["__rerum", "previous"]))
        .and_then(link_from)
}

/// The record's successor links, normalized to zero or more targets.
///
/// Consulted locations, first present wins: `__rerum.history.next`,
/// `history.next`, `__rerum.next`. An array contributes one target per
/// string or object element; a bare string contributes one target; any
/// other shape contributes none.
pub fn next_links(record: &Value) -> Vec<LinkTarget<'_>> {
    let raw = present(record, &["__rerum", "history", "next"])
        .or_else(|| present(record, &["history", "next"]))
        .or_else(|| present(record, &["__rerum", "next"]));
    match raw {
        Some(Value::Array(entries)) => entries.iter().filter_map(link_from).collect(),
        Some(Value::String(id)) => vec![LinkTarget::Id(id)],
        _ => Vec::new(),
    }
}

fn prime_marker(record: &Value) -> Option<&Value> {
    present(record, &["__rerum", "history", "prime"])
        .or_else(|| present(record, &["history", "prime"]))
        .or_else(|| present(record, &["__rerum", "prime"]))
}

/// Whether the record carries the explicit [`PRIME_ROOT`] marker.
pub fn is_prime_root(record: &Value) -> bool {
    matches!(prime_marker(record), Some(Value::String(marker)) if marker == PRIME_ROOT)
}

/// A prime marker that names a *different* record as the true root.
///
/// Returns the named identifier when the marker is a non-empty string
/// other than the [`PRIME_ROOT`] sentinel. Used as a root-selection
/// fallback when no record in the dataset is explicitly marked.
pub fn prime_reference(record: &Value) -> Option<&str> {
    match prime_marker(record)? {
        Value::String(id) if !id.is_empty() && id != PRIME_ROOT => Some(id),
        _ => None,
    }
}

/// The record's effective timestamp in Unix milliseconds.
///
/// Takes the later of the creation timestamp (`__rerum.createdAt`, then
/// `createdAt`) and the overwrite timestamp (`__rerum.isOverwritten`, then
/// `isOverwritten`). Each candidate may be an ISO-8601 string or a numeric
/// epoch-milliseconds value; candidates that fail to parse are ignored.
/// Returns 0 when no candidate parses, which sorts such records behind any
/// sibling with a real timestamp.
pub fn effective_timestamp(record: &Value) -> i64 {
    let created = present(record, &["__rerum", "createdAt"]).or_else(|| present(record, &["createdAt"]));
    let overwritten =
        present(record, &["__rerum", "isOverwritten"]).or_else(|| present(record, &["isOverwritten"]));
    [created, overwritten]
        .into_iter()
        .flatten()
        .filter_map(timestamp_millis)
        .max()
        .unwrap_or(0)
}

fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::String(text) => parse_iso_millis(text),
        // A numeric zero means "no timestamp" in store payloads; skipping it
        // keeps it from shadowing a genuine pre-epoch candidate.
        Value::Number(number) => {
            let millis = number
                .as_i64()
                .or_else(|| number.as_f64().map(|float| float as i64))?;
            (millis != 0).then_some(millis)
        }
        _ => None,
    }
}

/// Parse an ISO-8601 timestamp into Unix milliseconds.
///
/// Accepts a full offset datetime, a naive datetime (assumed UTC), or a
/// bare date (UTC midnight).
pub(crate) fn parse_iso_millis(text: &str) -> Option<i64> {
    if let Ok(stamp) = OffsetDateTime::parse(text, &Iso8601::DEFAULT) {
        return Some(unix_millis(stamp));
    }
    if let Ok(stamp) = PrimitiveDateTime::parse(text, &Iso8601::DEFAULT) {
        return Some(unix_millis(stamp.assume_utc()));
    }
    if let Ok(date) = Date::parse(text, &Iso8601::DEFAULT) {
        return Some(unix_millis(date.midnight().assume_utc()));
    }
    None
}

fn unix_millis(stamp: OffsetDateTime) -> i64 {
    (stamp.unix_timestamp_nanos() / 1_000_000) as i64
}
