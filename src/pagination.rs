//! Cursor-following result pages for list-shaped responses.
//!
//! List, History, Search and Events all answer with the same page shape:
//! a `count`, the ordered `results`, and server-opaque relative cursors to
//! the neighboring pages. Cursors are followed verbatim against the host
//! of the original request; the client never re-derives them.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::client::OrchestrateClient;
use crate::conditional::ConditionalIntent;
use crate::error::{OrchestrateError, Result};
use crate::url_builder::UrlBuilder;

/// Wire shape shared by every list-shaped response.
#[derive(Debug, Deserialize)]
struct PageBody<T> {
    count: u32,
    results: Vec<T>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    prev: Option<String>,
    #[serde(default)]
    total_count: Option<u64>,
}

/// One page of results plus the cursors to its neighbors.
///
/// Pages are immutable value objects: fetching a neighboring page produces
/// a new, independent page and leaves this one untouched. Item order is the
/// order the server returned; no client-side re-sorting occurs.
#[derive(Debug)]
pub struct ResultPage<T> {
    client: OrchestrateClient,
    // Origin of the original request; cursors resolve against this host,
    // never against whatever host a later page came from.
    base: Url,
    /// Number of items present in this page
    pub count: u32,
    /// The items, in server order
    pub items: Vec<T>,
    /// Total matching items across all pages (search only)
    pub total_count: Option<u64>,
    next: Option<String>,
    prev: Option<String>,
}

impl<T: DeserializeOwned> ResultPage<T> {
    /// Issue a GET against `url` and decode the response into a page.
    pub(crate) async fn fetch(client: &OrchestrateClient, url: Url) -> Result<Self> {
        let base = origin_of(&url);
        let response = client
            .request(Method::GET, url, &ConditionalIntent::Unconditional, None, None)
            .await?;
        let body: PageBody<T> = serde_json::from_str(&response.body)?;

        Ok(Self {
            client: client.clone(),
            base,
            count: body.count,
            items: body.results,
            total_count: body.total_count,
            next: normalize(body.next),
            prev: normalize(body.prev),
        })
    }

    /// Whether the server supplied a cursor to a following page
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Whether the server supplied a cursor to a preceding page (search only)
    pub fn has_prev(&self) -> bool {
        self.prev.is_some()
    }

    /// The raw relative cursor to the next page, if any
    pub fn next_cursor(&self) -> Option<&str> {
        self.next.as_deref()
    }

    /// The raw relative cursor to the previous page, if any
    pub fn prev_cursor(&self) -> Option<&str> {
        self.prev.as_deref()
    }

    /// Fetch the next page. Calling this without a next cursor is a usage
    /// error; check [`has_next`](Self::has_next) first.
    pub async fn fetch_next(&self) -> Result<Self> {
        let cursor = self.next.as_deref().ok_or_else(|| {
            OrchestrateError::usage("no next page: check has_next() before calling fetch_next()")
        })?;
        self.follow(cursor).await
    }

    /// Fetch the previous page. Calling this without a prev cursor is a
    /// usage error; check [`has_prev`](Self::has_prev) first.
    pub async fn fetch_prev(&self) -> Result<Self> {
        let cursor = self.prev.as_deref().ok_or_else(|| {
            OrchestrateError::usage("no previous page: check has_prev() before calling fetch_prev()")
        })?;
        self.follow(cursor).await
    }

    async fn follow(&self, cursor: &str) -> Result<Self> {
        let mut builder = UrlBuilder::parse_relative(cursor)?
            .with_scheme(self.base.scheme())
            .with_host(self.base.host_str().unwrap_or_default());
        if let Some(port) = self.base.port() {
            builder = builder.with_port(port);
        }
        Self::fetch(&self.client, builder.to_url()?).await
    }
}

/// Scheme/host/port of the request, with path, query and fragment dropped.
fn origin_of(url: &Url) -> Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

/// An absent or empty cursor both mean "no neighboring page".
fn normalize(cursor: Option<String>) -> Option<String> {
    cursor.filter(|cursor| !cursor.is_empty())
}
