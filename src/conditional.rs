//! Conditional request headers and write metadata.
//!
//! Writes against the service carry one of three intents, mapped onto the
//! `If-Match` / `If-None-Match` conditional headers. Successful writes come
//! back with an `ETag` and a `Location` header that are folded into a
//! [`RecordMetadata`].

use percent_encoding::percent_decode_str;

use crate::client::ApiResponse;

/// Precondition a write places on the current version of a record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConditionalIntent {
    /// No precondition; the write always applies.
    #[default]
    Unconditional,
    /// The record must exist at exactly this version reference
    /// (`If-Match: "<ref>"`).
    MustExist(String),
    /// The record must not exist (`If-None-Match: *`).
    MustNotExist,
}

impl ConditionalIntent {
    /// Build an intent from an optional version reference. An absent or
    /// empty reference degrades to [`Unconditional`](Self::Unconditional)
    /// so call sites can take optional references.
    pub fn from_ref(reference: Option<&str>) -> Self {
        match reference {
            Some(reference) if !reference.is_empty() => Self::MustExist(reference.to_string()),
            _ => Self::Unconditional,
        }
    }

    /// The conditional header to emit, if any. At most one of `If-Match`
    /// and `If-None-Match` is ever produced.
    pub(crate) fn header(&self) -> Option<(&'static str, String)> {
        match self {
            Self::Unconditional => None,
            Self::MustExist(reference) if reference.is_empty() => None,
            Self::MustExist(reference) => Some(("If-Match", format!("\"{reference}\""))),
            Self::MustNotExist => Some(("If-None-Match", "*".to_string())),
        }
    }
}

/// Metadata describing the outcome of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Collection the record lives in
    pub collection: String,
    /// Key of the record (recovered from `Location` for server-generated keys)
    pub key: String,
    /// Version reference from the `ETag` header, stripped of quoting.
    /// Empty when the server sent no ETag; an empty reference means
    /// "unknown" and is never forged.
    pub reference: String,
    /// Server-provided canonical path to the written version
    pub location: String,
}

impl RecordMetadata {
    /// Map the `ETag`/`Location` headers of a successful write. An empty
    /// `key` is recovered from the location path (POST with a
    /// server-generated key).
    pub(crate) fn from_response(collection: &str, key: &str, response: &ApiResponse) -> Self {
        let location = response.location.clone();
        let key = if key.is_empty() {
            key_from_location(&location).unwrap_or_default()
        } else {
            key.to_string()
        };

        Self {
            collection: collection.to_string(),
            key,
            reference: unquote_etag(&response.etag),
            location,
        }
    }

    /// Whether the server reported a version reference for this write.
    pub fn has_reference(&self) -> bool {
        !self.reference.is_empty()
    }

    /// Intent asserting that a later write only applies while this version
    /// is still current. Without a reference this is unconditional.
    pub fn intent(&self) -> ConditionalIntent {
        ConditionalIntent::from_ref(Some(&self.reference))
    }
}

/// Strip the quoting (and a weak-validator prefix) off an `ETag` value.
pub(crate) fn unquote_etag(etag: &str) -> String {
    let etag = etag.trim();
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    etag.trim_matches('"').to_string()
}

/// Extract the key from a `Location` path of the form
/// `/v0/<collection>/<key>/refs/<ref>`.
pub(crate) fn key_from_location(location: &str) -> Option<String> {
    let mut segments = location.trim_start_matches('/').split('/');
    let _version = segments.next()?;
    let _collection = segments.next()?;
    let key = segments.next()?;
    if key.is_empty() {
        return None;
    }
    Some(
        percent_decode_str(key)
            .decode_utf8()
            .ok()?
            .into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(etag: &str, location: &str) -> ApiResponse {
        ApiResponse {
            status: 201,
            etag: etag.to_string(),
            location: location.to_string(),
            request_id: String::new(),
            body: String::new(),
        }
    }

    #[test]
    fn test_unconditional_emits_no_header() {
        assert_eq!(ConditionalIntent::Unconditional.header(), None);
    }

    #[test]
    fn test_must_exist_emits_quoted_if_match() {
        let intent = ConditionalIntent::MustExist("cbb48f9464612f20".to_string());

        assert_eq!(
            intent.header(),
            Some(("If-Match", "\"cbb48f9464612f20\"".to_string()))
        );
    }

    #[test]
    fn test_must_not_exist_emits_if_none_match_star() {
        assert_eq!(
            ConditionalIntent::MustNotExist.header(),
            Some(("If-None-Match", "*".to_string()))
        );
    }

    #[test]
    fn test_empty_reference_degrades_to_unconditional() {
        assert_eq!(
            ConditionalIntent::from_ref(None),
            ConditionalIntent::Unconditional
        );
        assert_eq!(
            ConditionalIntent::from_ref(Some("")),
            ConditionalIntent::Unconditional
        );
        assert_eq!(ConditionalIntent::MustExist(String::new()).header(), None);
    }

    #[test]
    fn test_metadata_unquotes_etag() {
        let metadata = RecordMetadata::from_response(
            "items",
            "key-1",
            &response("\"cbb48f9464612f20\"", "/v0/items/key-1/refs/cbb48f9464612f20"),
        );

        assert_eq!(metadata.reference, "cbb48f9464612f20");
        assert!(metadata.has_reference());
        assert_eq!(
            metadata.intent(),
            ConditionalIntent::MustExist("cbb48f9464612f20".to_string())
        );
    }

    #[test]
    fn test_metadata_without_etag_is_unknown_not_forged() {
        let metadata = RecordMetadata::from_response("items", "key-1", &response("", ""));

        assert_eq!(metadata.reference, "");
        assert!(!metadata.has_reference());
        assert_eq!(metadata.intent(), ConditionalIntent::Unconditional);
    }

    #[test]
    fn test_key_recovered_from_location() {
        let metadata = RecordMetadata::from_response(
            "items",
            "",
            &response("\"abc\"", "/v0/items/generated-key/refs/abc"),
        );

        assert_eq!(metadata.key, "generated-key");
    }

    #[test]
    fn test_key_from_location_decodes_components() {
        assert_eq!(
            key_from_location("/v0/items/a%2Fb/refs/abc"),
            Some("a/b".to_string())
        );
        assert_eq!(key_from_location("/v0/items"), None);
        assert_eq!(key_from_location(""), None);
    }

    #[test]
    fn test_unquote_etag_handles_weak_validators() {
        assert_eq!(unquote_etag("W/\"abc\""), "abc");
        assert_eq!(unquote_etag(" \"abc\" "), "abc");
        assert_eq!(unquote_etag("abc"), "abc");
    }
}
