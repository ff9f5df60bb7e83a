//! URL construction with component-level percent-encoding.
//!
//! Every request path in the client is composed through [`UrlBuilder`].
//! Encoding happens per component: path segments keep literal `/` as a
//! separator, opaque components (keys) encode it as data, and query names
//! and values are always fully encoded.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::{OrchestrateError, Result};

/// Characters escaped inside a path segment. `/` is deliberately absent:
/// `append_path` treats it as a separator between logical sub-segments.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Escapes for a single opaque path component, where `/` is user data.
const PATH_COMPONENT: &AsciiSet = &PATH_SEGMENT.add(b'/');

/// Escapes for query names and values. `/`, `&`, `=` and `+` are data here.
const QUERY_COMPONENT: &AsciiSet = &PATH_COMPONENT.add(b'&').add(b'=').add(b'+');

/// Escapes for fragment segments. `#` must never survive unencoded.
const FRAGMENT_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`');

/// A rendered URL that preserves the absolute/relative fidelity of its
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    Absolute(Url),
    Relative(String),
}

/// Mutable URL under construction.
///
/// A builder is either absolute (scheme, host, optional port) or relative
/// (path, query and fragment only). Relative construction never silently
/// coerces to absolute; setting a host promotes the builder explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlBuilder {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    // Stored already encoded; path keeps a leading '/' when non-empty.
    path: String,
    query: String,
    fragment: String,
}

impl UrlBuilder {
    /// Create an absolute builder from discrete scheme/host/port parts.
    pub fn from_parts(scheme: &str, host: &str, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.to_string(),
            host: Some(host.to_string()),
            port,
            path: String::new(),
            query: String::new(),
            fragment: String::new(),
        }
    }

    /// Parse an absolute URL into a builder.
    pub fn parse_absolute(input: &str) -> Result<Self> {
        let url = Url::parse(input)?;
        let host = url
            .host_str()
            .ok_or_else(|| {
                OrchestrateError::validation(format!("absolute URL has no host: {input}"))
            })?
            .to_string();

        let path = if url.path() == "/" {
            String::new()
        } else {
            url.path().to_string()
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            host: Some(host),
            port: url.port(),
            path,
            query: url.query().unwrap_or_default().to_string(),
            fragment: url.fragment().unwrap_or_default().to_string(),
        })
    }

    /// Parse a relative URL (a server-supplied cursor, for example) into a
    /// builder, keeping its existing encoding verbatim.
    ///
    /// Input that cannot be split into path/query/fragment is a fatal
    /// construction error.
    pub fn parse_relative(input: &str) -> Result<Self> {
        if input.is_empty()
            || input
                .chars()
                .any(|c| c.is_ascii_control() || c == ' ')
        {
            return Err(OrchestrateError::validation(format!(
                "malformed relative URL: {input:?}"
            )));
        }
        if input.contains("://") {
            return Err(OrchestrateError::validation(format!(
                "expected a relative URL, got an absolute one: {input}"
            )));
        }

        let (rest, fragment) = match input.split_once('#') {
            Some((rest, fragment)) => (rest, fragment),
            None => (input, ""),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };

        let mut normalized = String::new();
        if !path.starts_with('/') {
            normalized.push('/');
        }
        normalized.push_str(path);

        Ok(Self {
            scheme: "https".to_string(),
            host: None,
            port: None,
            path: normalized,
            query: query.to_string(),
            fragment: fragment.to_string(),
        })
    }

    /// Whether this builder renders a relative URL.
    pub fn is_relative(&self) -> bool {
        self.host.is_none()
    }

    /// Append one or more path segments, separated from the existing path
    /// by exactly one `/`. Literal `/` in `segment` delimits sub-segments;
    /// everything else (including `#` and `?`) is percent-encoded.
    pub fn append_path(mut self, segment: &str) -> Self {
        let encoded = encode_segments(segment);
        if encoded.is_empty() {
            return self;
        }
        while self.path.ends_with('/') {
            self.path.pop();
        }
        self.path.push('/');
        self.path.push_str(&encoded);
        self
    }

    /// Substitute `args` for the `{}` placeholders in `template`, then
    /// append the result as with [`append_path`](Self::append_path).
    pub fn append_path_args(self, template: &str, args: &[&str]) -> Self {
        let mut filled = String::with_capacity(template.len());
        let mut rest = template;
        let mut args = args.iter();
        while let Some(pos) = rest.find("{}") {
            filled.push_str(&rest[..pos]);
            filled.push_str(args.next().copied().unwrap_or(""));
            rest = &rest[pos + 2..];
        }
        filled.push_str(rest);
        self.append_path(&filled)
    }

    /// Append a single opaque path component (a key, for example), where a
    /// literal `/` is user data and encodes to `%2F`.
    pub fn append_component(mut self, component: &str) -> Self {
        let encoded = utf8_percent_encode(component, PATH_COMPONENT).to_string();
        while self.path.ends_with('/') {
            self.path.pop();
        }
        self.path.push('/');
        self.path.push_str(&encoded);
        self
    }

    /// Append a fragment segment. A leading `#` is stripped; any literal
    /// `#` remaining in the segment text is encoded.
    pub fn append_fragment(mut self, segment: &str) -> Self {
        let trimmed = segment.strip_prefix('#').unwrap_or(segment);
        let encoded = trimmed
            .split('/')
            .filter(|part| !part.is_empty())
            .map(|part| utf8_percent_encode(part, FRAGMENT_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        if encoded.is_empty() {
            return self;
        }
        if !self.fragment.is_empty() {
            self.fragment.push('/');
        }
        self.fragment.push_str(&encoded);
        self
    }

    /// Replace the path wholesale, with the same encoding rules as
    /// [`append_path`](Self::append_path).
    pub fn with_path(mut self, path: &str) -> Self {
        self.path.clear();
        self.append_path(path)
    }

    /// Append a query parameter. Name and value are encoded independently;
    /// a `/` in either becomes `%2F`.
    pub fn add_query(mut self, name: &str, value: &str) -> Self {
        if !self.query.is_empty() {
            self.query.push('&');
        }
        self.query
            .push_str(&utf8_percent_encode(name, QUERY_COMPONENT).to_string());
        self.query.push('=');
        self.query
            .push_str(&utf8_percent_encode(value, QUERY_COMPONENT).to_string());
        self
    }

    /// Append pre-encoded query text verbatim, joined with `&` when a query
    /// already exists.
    pub fn add_raw_query(mut self, raw: &str) -> Self {
        if raw.is_empty() {
            return self;
        }
        if !self.query.is_empty() {
            self.query.push('&');
        }
        self.query.push_str(raw);
        self
    }

    /// Set the host. A relative builder becomes absolute.
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the scheme.
    pub fn with_scheme<S: Into<String>>(mut self, scheme: S) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Render the URL in string form, absolute or relative depending on
    /// how the builder was constructed.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(host) = &self.host {
            out.push_str(&self.scheme);
            out.push_str("://");
            out.push_str(host);
            if let Some(port) = self.port {
                out.push(':');
                out.push_str(&port.to_string());
            }
        }
        if self.path.is_empty() {
            out.push('/');
        } else {
            out.push_str(&self.path);
        }
        if !self.query.is_empty() {
            out.push('?');
            out.push_str(&self.query);
        }
        if !self.fragment.is_empty() {
            out.push('#');
            out.push_str(&self.fragment);
        }
        out
    }

    /// Render into a structured locator with the same absolute/relative
    /// fidelity as [`render`](Self::render).
    pub fn to_locator(&self) -> Result<Locator> {
        if self.host.is_some() {
            Ok(Locator::Absolute(Url::parse(&self.render())?))
        } else {
            Ok(Locator::Relative(self.render()))
        }
    }

    /// Render into a request target. Relative builders are rejected.
    pub fn to_url(&self) -> Result<Url> {
        match self.to_locator()? {
            Locator::Absolute(url) => Ok(url),
            Locator::Relative(text) => Err(OrchestrateError::validation(format!(
                "relative URL cannot be used as a request target: {text}"
            ))),
        }
    }
}

fn encode_segments(text: &str) -> String {
    text.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| utf8_percent_encode(part, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relative() -> UrlBuilder {
        UrlBuilder::parse_relative("/").unwrap()
    }

    #[test]
    fn test_append_path_collapses_separators() {
        let rendered = relative().append_path("foo/bar").render();
        assert_eq!(rendered, "/foo/bar");

        let rendered = relative()
            .append_path("foo/")
            .append_path("/bar")
            .render();
        assert_eq!(rendered, "/foo/bar");
    }

    #[test]
    fn test_append_path_encodes_hash_and_question_mark() {
        let rendered = relative().append_path("a#b").append_path("c?d").render();

        assert!(rendered.contains("%23"));
        assert!(rendered.contains("%3F"));
        assert!(!rendered.contains('#'));
        assert!(!rendered.contains('?'));
    }

    #[test]
    fn test_append_path_keeps_literal_slash_as_separator() {
        let rendered = relative().append_path("v0/items").render();
        assert_eq!(rendered, "/v0/items");
        assert!(!rendered.to_lowercase().contains("%2f"));
    }

    #[test]
    fn test_append_component_encodes_slash_as_data() {
        let rendered = relative()
            .append_path("v0/items")
            .append_component("a/b")
            .render();

        assert_eq!(rendered, "/v0/items/a%2Fb");
    }

    #[test]
    fn test_append_path_args_substitutes_positionally() {
        let rendered = relative()
            .append_path_args("{}/items/{}", &["v0", "widget 1"])
            .render();

        assert_eq!(rendered, "/v0/items/widget%201");
    }

    #[test]
    fn test_add_query_encodes_slash_in_name_and_value() {
        let rendered = relative().add_query("a/b", "c/d").render();

        let query = rendered.split('?').nth(1).unwrap();
        assert!(query.to_lowercase().contains("%2f"));
        assert!(!query.contains('/'));
        assert_eq!(query, "a%2Fb=c%2Fd");
    }

    #[test]
    fn test_add_query_preserves_order_and_separators() {
        let rendered = relative()
            .add_query("limit", "10")
            .add_query("afterKey", "k")
            .render();

        assert_eq!(rendered, "/?limit=10&afterKey=k");
    }

    #[test]
    fn test_add_raw_query_appends_verbatim() {
        let rendered = relative()
            .add_query("limit", "10")
            .add_raw_query("afterKey=a%2Fb")
            .render();

        assert_eq!(rendered, "/?limit=10&afterKey=a%2Fb");
    }

    #[test]
    fn test_append_fragment_strips_and_encodes_hash() {
        let rendered = relative().append_fragment("#sec").append_fragment("a#b").render();

        assert_eq!(rendered, "/#sec/a%23b");
    }

    #[test]
    fn test_with_path_replaces_wholesale() {
        let rendered = relative()
            .append_path("old/path")
            .with_path("new")
            .render();

        assert_eq!(rendered, "/new");
    }

    #[test]
    fn test_from_parts_renders_absolute() {
        let rendered = UrlBuilder::from_parts("https", "api.orchestrate.io", None)
            .append_path("v0")
            .render();

        assert_eq!(rendered, "https://api.orchestrate.io/v0");

        let rendered = UrlBuilder::from_parts("http", "127.0.0.1", Some(8080))
            .append_path("v0")
            .render();

        assert_eq!(rendered, "http://127.0.0.1:8080/v0");
    }

    #[test]
    fn test_parse_relative_splits_path_query_fragment() {
        let builder = UrlBuilder::parse_relative("/v0/items?limit=2&afterKey=b#frag").unwrap();

        assert!(builder.is_relative());
        assert_eq!(builder.render(), "/v0/items?limit=2&afterKey=b#frag");
    }

    #[test]
    fn test_parse_relative_rejects_malformed_input() {
        assert!(UrlBuilder::parse_relative("").is_err());
        assert!(UrlBuilder::parse_relative("/a b").is_err());
        assert!(UrlBuilder::parse_relative("https://host/path").is_err());
    }

    #[test]
    fn test_relative_promoted_to_absolute_by_host() {
        let rendered = UrlBuilder::parse_relative("/v0/items?limit=2")
            .unwrap()
            .with_scheme("http")
            .with_host("127.0.0.1")
            .with_port(3000)
            .render();

        assert_eq!(rendered, "http://127.0.0.1:3000/v0/items?limit=2");
    }

    #[test]
    fn test_to_locator_preserves_fidelity() {
        let absolute = UrlBuilder::from_parts("https", "api.orchestrate.io", None)
            .append_path("v0")
            .to_locator()
            .unwrap();
        assert!(matches!(absolute, Locator::Absolute(_)));

        let cursor = UrlBuilder::parse_relative("/v0/items?limit=2")
            .unwrap()
            .to_locator()
            .unwrap();
        assert_eq!(
            cursor,
            Locator::Relative("/v0/items?limit=2".to_string())
        );
    }

    #[test]
    fn test_to_url_rejects_relative() {
        let result = UrlBuilder::parse_relative("/v0/items").unwrap().to_url();
        assert!(matches!(result, Err(OrchestrateError::Validation { .. })));
    }

    #[test]
    fn test_parse_absolute_round_trips() {
        let builder = UrlBuilder::parse_absolute("http://127.0.0.1:3000/v0/items?limit=2").unwrap();

        assert!(!builder.is_relative());
        assert_eq!(builder.render(), "http://127.0.0.1:3000/v0/items?limit=2");
    }
}
