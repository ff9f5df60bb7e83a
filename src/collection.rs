//! Typed operations over one collection: key/value, search, history,
//! events and graph relations.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use crate::client::OrchestrateClient;
use crate::conditional::{ConditionalIntent, RecordMetadata};
use crate::error::{OrchestrateError, Result};
use crate::pagination::ResultPage;
use crate::types::{
    EventItem, EventMetadata, EventRange, HistoryParams, JsonObject, KvItem, ListParams, PatchOp,
    SearchParams,
};
use crate::url_builder::UrlBuilder;

const JSON_PATCH: &str = "application/json-patch+json";
const MERGE_PATCH: &str = "application/merge-patch+json";

/// A single fetched record with its version metadata.
#[derive(Debug, Clone)]
pub struct Record<T> {
    pub metadata: RecordMetadata,
    pub value: T,
}

/// Handle on one named collection.
#[derive(Debug, Clone)]
pub struct Collection {
    client: OrchestrateClient,
    name: String,
}

impl Collection {
    pub(crate) fn new(client: OrchestrateClient, name: String) -> Self {
        Self { client, name }
    }

    /// The collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch the current version of a record
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Record<T>> {
        self.require_key(key)?;
        let url = self.kv_url(key)?.to_url()?;
        let response = self
            .client
            .request(Method::GET, url, &ConditionalIntent::Unconditional, None, None)
            .await?;

        Ok(Record {
            metadata: RecordMetadata::from_response(&self.name, key, &response),
            value: serde_json::from_str(&response.body)?,
        })
    }

    /// Fetch a specific immutable version of a record
    pub async fn get_ref<T: DeserializeOwned>(&self, key: &str, reference: &str) -> Result<Record<T>> {
        self.require_key(key)?;
        require(reference, "reference")?;
        let url = self
            .kv_url(key)?
            .append_path("refs")
            .append_component(reference)
            .to_url()?;
        let response = self
            .client
            .request(Method::GET, url, &ConditionalIntent::Unconditional, None, None)
            .await?;

        Ok(Record {
            metadata: RecordMetadata::from_response(&self.name, key, &response),
            value: serde_json::from_str(&response.body)?,
        })
    }

    /// Store a value under a server-generated key. The key is recovered
    /// from the `Location` header of the response.
    pub async fn add<T: Serialize>(&self, value: &T) -> Result<RecordMetadata> {
        require(&self.name, "collection")?;
        let url = self
            .client
            .url()
            .append_component(&self.name)
            .to_url()?;
        let body = serde_json::to_string(value)?;
        let response = self
            .client
            .request(
                Method::POST,
                url,
                &ConditionalIntent::Unconditional,
                None,
                Some(body),
            )
            .await?;

        Ok(RecordMetadata::from_response(&self.name, "", &response))
    }

    /// Store a value under a caller-chosen key, subject to `intent`.
    ///
    /// The write itself reports the outcome; no existence pre-check is
    /// issued, so there is no read-then-write race window.
    pub async fn put<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        intent: &ConditionalIntent,
    ) -> Result<RecordMetadata> {
        self.require_key(key)?;
        let url = self.kv_url(key)?.to_url()?;
        let body = serde_json::to_string(value)?;
        let response = self
            .client
            .request(Method::PUT, url, intent, None, Some(body))
            .await?;

        Ok(RecordMetadata::from_response(&self.name, key, &response))
    }

    /// Apply an RFC 7386 merge-patch to a record
    pub async fn merge(
        &self,
        key: &str,
        partial: &JsonObject,
        intent: &ConditionalIntent,
    ) -> Result<RecordMetadata> {
        self.require_key(key)?;
        let url = self.kv_url(key)?.to_url()?;
        let body = serde_json::to_string(partial)?;
        let response = self
            .client
            .request(Method::PATCH, url, intent, Some(MERGE_PATCH), Some(body))
            .await?;

        Ok(RecordMetadata::from_response(&self.name, key, &response))
    }

    /// Apply an RFC 6902 operation list to a record
    pub async fn patch(
        &self,
        key: &str,
        ops: &[PatchOp],
        intent: &ConditionalIntent,
    ) -> Result<RecordMetadata> {
        self.require_key(key)?;
        if ops.is_empty() {
            return Err(OrchestrateError::validation(
                "patch requires at least one operation",
            ));
        }
        let url = self.kv_url(key)?.to_url()?;
        let body = serde_json::to_string(ops)?;
        let response = self
            .client
            .request(Method::PATCH, url, intent, Some(JSON_PATCH), Some(body))
            .await?;

        Ok(RecordMetadata::from_response(&self.name, key, &response))
    }

    /// Delete the current version of a record, subject to `intent`.
    /// History is retained; use [`purge`](Self::purge) to erase it.
    pub async fn delete(&self, key: &str, intent: &ConditionalIntent) -> Result<()> {
        self.require_key(key)?;
        let url = self.kv_url(key)?.to_url()?;
        self.client
            .request(Method::DELETE, url, intent, None, None)
            .await?;
        Ok(())
    }

    /// Delete a record and its entire version history
    pub async fn purge(&self, key: &str) -> Result<()> {
        self.require_key(key)?;
        let url = self.kv_url(key)?.add_query("purge", "true").to_url()?;
        self.client
            .request(Method::DELETE, url, &ConditionalIntent::Unconditional, None, None)
            .await?;
        Ok(())
    }

    /// List records in key order
    pub async fn list<T: DeserializeOwned>(
        &self,
        params: &ListParams,
    ) -> Result<ResultPage<KvItem<T>>> {
        require(&self.name, "collection")?;
        let builder = params.apply(self.client.url().append_component(&self.name));
        ResultPage::fetch(&self.client, builder.to_url()?).await
    }

    /// Search the collection with an opaque Lucene query
    pub async fn search<T: DeserializeOwned>(
        &self,
        params: &SearchParams,
    ) -> Result<ResultPage<KvItem<T>>> {
        require(&self.name, "collection")?;
        require(&params.query, "query")?;
        let builder = params.apply(self.client.url().append_component(&self.name));
        ResultPage::fetch(&self.client, builder.to_url()?).await
    }

    /// List the version history of a record, newest first. Deleted
    /// versions appear as tombstones without values.
    pub async fn history<T: DeserializeOwned>(
        &self,
        key: &str,
        params: &HistoryParams,
    ) -> Result<ResultPage<KvItem<T>>> {
        self.require_key(key)?;
        let builder = params.apply(self.kv_url(key)?.append_path("refs"));
        ResultPage::fetch(&self.client, builder.to_url()?).await
    }

    /// Event operations for one record
    pub fn events(&self, key: &str) -> Events {
        Events {
            client: self.client.clone(),
            collection: self.name.clone(),
            key: key.to_string(),
        }
    }

    /// Graph-relation operations for one record
    pub fn graph(&self, key: &str) -> Graph {
        Graph {
            client: self.client.clone(),
            collection: self.name.clone(),
            key: key.to_string(),
        }
    }

    fn kv_url(&self, key: &str) -> Result<UrlBuilder> {
        require(&self.name, "collection")?;
        Ok(self
            .client
            .url()
            .append_component(&self.name)
            .append_component(key))
    }

    fn require_key(&self, key: &str) -> Result<()> {
        require(key, "key")
    }
}

/// Time-ordered event operations for one record.
#[derive(Debug, Clone)]
pub struct Events {
    client: OrchestrateClient,
    collection: String,
    key: String,
}

impl Events {
    /// Append an event of the given type. When `timestamp` is `None` the
    /// server assigns the current time; the assigned timestamp and ordinal
    /// are recovered from the `Location` header.
    pub async fn append<T: Serialize>(
        &self,
        event_type: &str,
        value: &T,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<EventMetadata> {
        let mut builder = self.url(event_type)?;
        if let Some(timestamp) = timestamp {
            builder = builder.append_path(&timestamp.timestamp_millis().to_string());
        }
        let body = serde_json::to_string(value)?;
        let response = self
            .client
            .request(
                Method::POST,
                builder.to_url()?,
                &ConditionalIntent::Unconditional,
                None,
                Some(body),
            )
            .await?;

        Ok(self.metadata(event_type, &response))
    }

    /// Fetch a single event
    pub async fn get<T: DeserializeOwned>(
        &self,
        event_type: &str,
        timestamp: DateTime<Utc>,
        ordinal: u64,
    ) -> Result<EventItem<T>> {
        let url = self
            .instance_url(event_type, timestamp, ordinal)?
            .to_url()?;
        let response = self
            .client
            .request(Method::GET, url, &ConditionalIntent::Unconditional, None, None)
            .await?;

        Ok(serde_json::from_str(&response.body)?)
    }

    /// Replace the value of an existing event, subject to `intent`
    pub async fn update<T: Serialize>(
        &self,
        event_type: &str,
        timestamp: DateTime<Utc>,
        ordinal: u64,
        value: &T,
        intent: &ConditionalIntent,
    ) -> Result<EventMetadata> {
        let url = self
            .instance_url(event_type, timestamp, ordinal)?
            .to_url()?;
        let body = serde_json::to_string(value)?;
        let response = self
            .client
            .request(Method::PUT, url, intent, None, Some(body))
            .await?;

        Ok(self.metadata(event_type, &response))
    }

    /// Delete an event, subject to `intent`
    pub async fn delete(
        &self,
        event_type: &str,
        timestamp: DateTime<Utc>,
        ordinal: u64,
        intent: &ConditionalIntent,
    ) -> Result<()> {
        let url = self
            .instance_url(event_type, timestamp, ordinal)?
            .add_query("purge", "true")
            .to_url()?;
        self.client
            .request(Method::DELETE, url, intent, None, None)
            .await?;
        Ok(())
    }

    /// List events of one type, newest first, within an optional range
    pub async fn list<T: DeserializeOwned>(
        &self,
        event_type: &str,
        range: &EventRange,
    ) -> Result<ResultPage<EventItem<T>>> {
        let builder = range.apply(self.url(event_type)?);
        ResultPage::fetch(&self.client, builder.to_url()?).await
    }

    fn url(&self, event_type: &str) -> Result<UrlBuilder> {
        require(&self.collection, "collection")?;
        require(&self.key, "key")?;
        require(event_type, "event type")?;
        Ok(self
            .client
            .url()
            .append_component(&self.collection)
            .append_component(&self.key)
            .append_path("events")
            .append_component(event_type))
    }

    fn instance_url(
        &self,
        event_type: &str,
        timestamp: DateTime<Utc>,
        ordinal: u64,
    ) -> Result<UrlBuilder> {
        Ok(self
            .url(event_type)?
            .append_path(&timestamp.timestamp_millis().to_string())
            .append_path(&ordinal.to_string()))
    }

    fn metadata(&self, event_type: &str, response: &crate::client::ApiResponse) -> EventMetadata {
        let record = RecordMetadata::from_response(&self.collection, &self.key, response);
        let (timestamp, ordinal) = match event_coords(&record.location) {
            Some((timestamp, ordinal)) => (Some(timestamp), Some(ordinal)),
            None => (None, None),
        };

        EventMetadata {
            collection: record.collection,
            key: record.key,
            event_type: event_type.to_string(),
            timestamp,
            ordinal,
            reference: record.reference,
            location: record.location,
        }
    }
}

/// Graph-relation operations for one record.
#[derive(Debug, Clone)]
pub struct Graph {
    client: OrchestrateClient,
    collection: String,
    key: String,
}

impl Graph {
    /// Create a named relation from this record to another
    pub async fn link(
        &self,
        kind: &str,
        to_collection: &str,
        to_key: &str,
    ) -> Result<RecordMetadata> {
        let url = self
            .relation_url(kind, to_collection, to_key)?
            .to_url()?;
        let response = self
            .client
            .request(Method::PUT, url, &ConditionalIntent::Unconditional, None, None)
            .await?;

        Ok(RecordMetadata::from_response(
            &self.collection,
            &self.key,
            &response,
        ))
    }

    /// Remove a relation
    pub async fn unlink(&self, kind: &str, to_collection: &str, to_key: &str) -> Result<()> {
        let url = self
            .relation_url(kind, to_collection, to_key)?
            .add_query("purge", "true")
            .to_url()?;
        self.client
            .request(Method::DELETE, url, &ConditionalIntent::Unconditional, None, None)
            .await?;
        Ok(())
    }

    /// Traverse one or more relation kinds and return the reachable records
    pub async fn neighbors<T: DeserializeOwned>(
        &self,
        kinds: &[&str],
    ) -> Result<ResultPage<KvItem<T>>> {
        require(&self.collection, "collection")?;
        require(&self.key, "key")?;
        if kinds.is_empty() {
            return Err(OrchestrateError::validation(
                "traversal requires at least one relation kind",
            ));
        }

        let mut builder = self
            .client
            .url()
            .append_component(&self.collection)
            .append_component(&self.key)
            .append_path("relations");
        for kind in kinds {
            require(kind, "relation kind")?;
            builder = builder.append_component(kind);
        }

        ResultPage::fetch(&self.client, builder.to_url()?).await
    }

    fn relation_url(&self, kind: &str, to_collection: &str, to_key: &str) -> Result<UrlBuilder> {
        require(&self.collection, "collection")?;
        require(&self.key, "key")?;
        require(kind, "relation kind")?;
        require(to_collection, "target collection")?;
        require(to_key, "target key")?;

        Ok(self
            .client
            .url()
            .append_component(&self.collection)
            .append_component(&self.key)
            .append_path("relation")
            .append_component(kind)
            .append_component(to_collection)
            .append_component(to_key))
    }
}

fn require(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        Err(OrchestrateError::validation(format!(
            "{name} must not be empty"
        )))
    } else {
        Ok(())
    }
}

/// Pull the timestamp and ordinal out of an event `Location` path:
/// `/v0/<collection>/<key>/events/<type>/<timestamp>/<ordinal>`.
fn event_coords(location: &str) -> Option<(DateTime<Utc>, u64)> {
    let mut segments = location.trim_matches('/').rsplit('/');
    let ordinal = segments.next()?.parse::<u64>().ok()?;
    let millis = segments.next()?.parse::<i64>().ok()?;
    let timestamp = Utc.timestamp_millis_opt(millis).single()?;
    Some((timestamp, ordinal))
}
