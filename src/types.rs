//! Wire types for the Orchestrate API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::url_builder::UrlBuilder;

/// Type alias for arbitrary JSON data
pub type AnyValue = serde_json::Value;

/// Ordered string-keyed JSON object, used for merge-patch payloads and
/// other untyped partial-update bodies.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Path metadata attached to every KV-shaped result item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvPath {
    pub collection: String,
    pub key: String,
    #[serde(rename = "ref")]
    pub reference: String,
    /// When this version was written, as epoch milliseconds on the wire
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub reftime: Option<DateTime<Utc>>,
    /// Deletion marker; a tombstoned history entry carries no value
    #[serde(default)]
    pub tombstone: bool,
}

/// One item of a List, History or Search page.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct KvItem<T = AnyValue> {
    pub path: KvPath,
    /// Absent for tombstones and for history listings without `values=true`
    #[serde(default)]
    pub value: Option<T>,
    /// Relevance score (search only)
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub reftime: Option<DateTime<Utc>>,
}

/// Path metadata attached to every event result item.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPath {
    pub collection: String,
    pub key: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub ordinal: u64,
    #[serde(rename = "ref", default)]
    pub reference: String,
}

/// One item of an event listing, or a single fetched event.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct EventItem<T = AnyValue> {
    pub path: EventPath,
    #[serde(default)]
    pub value: Option<T>,
}

/// Metadata describing a successfully written event.
///
/// Timestamp and ordinal are recovered from the `Location` header; they
/// are `None` when the server response did not carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    pub collection: String,
    pub key: String,
    pub event_type: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub ordinal: Option<u64>,
    /// Version reference of the event, empty when the server sent no ETag
    pub reference: String,
    pub location: String,
}

/// One RFC 6902 patch operation (plus the service's `inc` extension).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<AnyValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl PatchOp {
    fn new(op: &str, path: &str) -> Self {
        Self {
            op: op.to_string(),
            path: path.to_string(),
            value: None,
            from: None,
        }
    }

    /// `add` a value at a path
    pub fn add<V: Into<AnyValue>>(path: &str, value: V) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new("add", path)
        }
    }

    /// `remove` the value at a path
    pub fn remove(path: &str) -> Self {
        Self::new("remove", path)
    }

    /// `replace` the value at a path
    pub fn replace<V: Into<AnyValue>>(path: &str, value: V) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new("replace", path)
        }
    }

    /// `test` that a path holds the given value; the patch aborts otherwise
    pub fn test<V: Into<AnyValue>>(path: &str, value: V) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new("test", path)
        }
    }

    /// `move` the value at `from` to `path`
    pub fn move_to(from: &str, path: &str) -> Self {
        Self {
            from: Some(from.to_string()),
            ..Self::new("move", path)
        }
    }

    /// `copy` the value at `from` to `path`
    pub fn copy_to(from: &str, path: &str) -> Self {
        Self {
            from: Some(from.to_string()),
            ..Self::new("copy", path)
        }
    }

    /// `inc`rement the number at a path by `amount`
    pub fn inc(path: &str, amount: f64) -> Self {
        Self {
            value: Some(AnyValue::from(amount)),
            ..Self::new("inc", path)
        }
    }
}

/// Key-range parameters for collection listing
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub start_key: Option<String>,
    pub after_key: Option<String>,
    pub before_key: Option<String>,
    pub end_key: Option<String>,
}

impl ListParams {
    /// Create empty listing parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Start listing at this key (inclusive)
    pub fn starting_at<S: Into<String>>(mut self, key: S) -> Self {
        self.start_key = Some(key.into());
        self
    }

    /// Start listing after this key (exclusive)
    pub fn after<S: Into<String>>(mut self, key: S) -> Self {
        self.after_key = Some(key.into());
        self
    }

    /// Stop listing before this key (exclusive)
    pub fn before<S: Into<String>>(mut self, key: S) -> Self {
        self.before_key = Some(key.into());
        self
    }

    /// Stop listing at this key (inclusive)
    pub fn ending_at<S: Into<String>>(mut self, key: S) -> Self {
        self.end_key = Some(key.into());
        self
    }

    pub(crate) fn apply(&self, mut builder: UrlBuilder) -> UrlBuilder {
        if let Some(limit) = self.limit {
            builder = builder.add_query("limit", &limit.to_string());
        }
        if let Some(key) = &self.start_key {
            builder = builder.add_query("startKey", key);
        }
        if let Some(key) = &self.after_key {
            builder = builder.add_query("afterKey", key);
        }
        if let Some(key) = &self.before_key {
            builder = builder.add_query("beforeKey", key);
        }
        if let Some(key) = &self.end_key {
            builder = builder.add_query("endKey", key);
        }
        builder
    }
}

/// Lucene-query search parameters. The query text is opaque pass-through;
/// the client performs no query-language handling.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<String>,
}

impl SearchParams {
    /// Create search parameters from a Lucene query string
    pub fn new<S: Into<String>>(query: S) -> Self {
        Self {
            query: query.into(),
            limit: None,
            offset: None,
            sort: None,
        }
    }

    /// Set the page size
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the starting offset
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sort by a field expression, e.g. `value.name:asc`
    pub fn with_sort<S: Into<String>>(mut self, sort: S) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub(crate) fn apply(&self, mut builder: UrlBuilder) -> UrlBuilder {
        builder = builder.add_query("query", &self.query);
        if let Some(limit) = self.limit {
            builder = builder.add_query("limit", &limit.to_string());
        }
        if let Some(offset) = self.offset {
            builder = builder.add_query("offset", &offset.to_string());
        }
        if let Some(sort) = &self.sort {
            builder = builder.add_query("sort", sort);
        }
        builder
    }
}

/// Version-history parameters
#[derive(Debug, Clone, Default)]
pub struct HistoryParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub values: bool,
}

impl HistoryParams {
    /// Create empty history parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the starting offset
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Include the stored value of each version, not just path metadata
    pub fn with_values(mut self) -> Self {
        self.values = true;
        self
    }

    pub(crate) fn apply(&self, mut builder: UrlBuilder) -> UrlBuilder {
        if let Some(limit) = self.limit {
            builder = builder.add_query("limit", &limit.to_string());
        }
        if let Some(offset) = self.offset {
            builder = builder.add_query("offset", &offset.to_string());
        }
        if self.values {
            builder = builder.add_query("values", "true");
        }
        builder
    }
}

/// A boundary in an event timeline: a timestamp plus an optional ordinal
/// to disambiguate events sharing one millisecond.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBound {
    pub timestamp: DateTime<Utc>,
    pub ordinal: Option<u64>,
}

impl EventBound {
    /// Bound at a timestamp
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            ordinal: None,
        }
    }

    /// Narrow the bound to a specific ordinal
    pub fn with_ordinal(mut self, ordinal: u64) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub(crate) fn render(&self) -> String {
        match self.ordinal {
            Some(ordinal) => format!("{}/{}", self.timestamp.timestamp_millis(), ordinal),
            None => self.timestamp.timestamp_millis().to_string(),
        }
    }
}

/// Time-range parameters for event listings
#[derive(Debug, Clone, Default)]
pub struct EventRange {
    pub limit: Option<u32>,
    pub start: Option<EventBound>,
    pub end: Option<EventBound>,
    pub before: Option<EventBound>,
    pub after: Option<EventBound>,
}

impl EventRange {
    /// Create an unbounded range
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Events at or after this bound (inclusive)
    pub fn starting_at(mut self, bound: EventBound) -> Self {
        self.start = Some(bound);
        self
    }

    /// Events at or before this bound (inclusive)
    pub fn ending_at(mut self, bound: EventBound) -> Self {
        self.end = Some(bound);
        self
    }

    /// Events strictly before this bound
    pub fn before(mut self, bound: EventBound) -> Self {
        self.before = Some(bound);
        self
    }

    /// Events strictly after this bound
    pub fn after(mut self, bound: EventBound) -> Self {
        self.after = Some(bound);
        self
    }

    pub(crate) fn apply(&self, mut builder: UrlBuilder) -> UrlBuilder {
        if let Some(limit) = self.limit {
            builder = builder.add_query("limit", &limit.to_string());
        }
        if let Some(bound) = &self.start {
            builder = builder.add_query("startEvent", &bound.render());
        }
        if let Some(bound) = &self.end {
            builder = builder.add_query("endEvent", &bound.render());
        }
        if let Some(bound) = &self.before {
            builder = builder.add_query("beforeEvent", &bound.render());
        }
        if let Some(bound) = &self.after {
            builder = builder.add_query("afterEvent", &bound.render());
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_patch_op_serialization() {
        let ops = vec![
            PatchOp::add("/tags", serde_json::json!(["new"])),
            PatchOp::replace("/name", "Widget"),
            PatchOp::remove("/obsolete"),
            PatchOp::test("/version", 3),
            PatchOp::move_to("/old", "/new"),
            PatchOp::inc("/count", 1.0),
        ];

        let json = serde_json::to_string(&ops).unwrap();

        assert!(json.contains(r#""op":"add""#));
        assert!(json.contains(r#""op":"replace""#));
        assert!(json.contains(r#""from":"/old""#));
        assert!(json.contains(r#""op":"inc""#));
        // Absent optional fields stay off the wire
        assert!(!json.contains(r#""value":null"#));
        assert!(!json.contains(r#""from":null"#));
    }

    #[test]
    fn test_kv_path_reftime_from_epoch_millis() {
        let path: KvPath = serde_json::from_str(
            r#"{
                "collection": "items",
                "key": "k",
                "ref": "abc",
                "reftime": 1395441087000
            }"#,
        )
        .unwrap();

        assert_eq!(
            path.reftime,
            Some(Utc.timestamp_millis_opt(1395441087000).unwrap())
        );
        assert!(!path.tombstone);
    }

    #[test]
    fn test_kv_item_tombstone_has_no_value() {
        let item: KvItem = serde_json::from_str(
            r#"{
                "path": {
                    "collection": "items",
                    "key": "k",
                    "ref": "abc",
                    "tombstone": true
                }
            }"#,
        )
        .unwrap();

        assert!(item.path.tombstone);
        assert!(item.value.is_none());
        assert!(item.score.is_none());
    }

    #[test]
    fn test_event_path_timestamp_from_epoch_millis() {
        let path: EventPath = serde_json::from_str(
            r#"{
                "collection": "items",
                "key": "k",
                "type": "activity",
                "timestamp": 1369832019085,
                "ordinal": 9,
                "ref": "deadbeef"
            }"#,
        )
        .unwrap();

        assert_eq!(path.timestamp.timestamp_millis(), 1369832019085);
        assert_eq!(path.ordinal, 9);
    }

    #[test]
    fn test_list_params_builder_and_query() {
        let params = ListParams::new().with_limit(10).after("key-a");
        let rendered = params
            .apply(crate::url_builder::UrlBuilder::parse_relative("/v0/items").unwrap())
            .render();

        assert_eq!(rendered, "/v0/items?limit=10&afterKey=key-a");
    }

    #[test]
    fn test_search_params_builder_and_query() {
        let params = SearchParams::new("value.kind:widget")
            .with_limit(5)
            .with_offset(10)
            .with_sort("value.name:asc");
        let rendered = params
            .apply(crate::url_builder::UrlBuilder::parse_relative("/v0/items").unwrap())
            .render();

        assert_eq!(
            rendered,
            "/v0/items?query=value.kind:widget&limit=5&offset=10&sort=value.name:asc"
        );
    }

    #[test]
    fn test_event_bound_render() {
        let timestamp = Utc.timestamp_millis_opt(1369832019085).unwrap();

        assert_eq!(EventBound::at(timestamp).render(), "1369832019085");
        assert_eq!(
            EventBound::at(timestamp).with_ordinal(7).render(),
            "1369832019085/7"
        );
    }

    #[test]
    fn test_event_range_query() {
        let timestamp = Utc.timestamp_millis_opt(1369832019085).unwrap();
        let range = EventRange::new()
            .with_limit(20)
            .starting_at(EventBound::at(timestamp))
            .before(EventBound::at(timestamp).with_ordinal(3));
        let rendered = range
            .apply(crate::url_builder::UrlBuilder::parse_relative("/v0/items").unwrap())
            .render();

        assert_eq!(
            rendered,
            "/v0/items?limit=20&startEvent=1369832019085&beforeEvent=1369832019085%2F3"
        );
    }
}
