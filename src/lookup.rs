use serde_json::Value;

use crate::error::ReconcileError;
use crate::transport::RestClient;

const PAGE_SIZE: usize = 100;
/// Upper bound on pages read per lookup.
const MAX_PAGES: u32 = 1000;

/// Harbor collections that can only be searched by listing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Registries,
    ReplicationPolicies,
}

impl Listing {
    pub fn path(self) -> &'static str {
        match self {
            Self::Registries => crate::harbor::REGISTRY_API,
            Self::ReplicationPolicies => crate::harbor::REPLICATION_POLICY_API,
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            Self::Registries => "registry",
            Self::ReplicationPolicies => "replication policy",
        }
    }
}

/// Resolves a resource name to its backend-assigned id.
///
/// `Ok(None)` means the listing was read and holds no such name.
#[allow(async_fn_in_trait)]
pub trait IdLookup {
    async fn resolve_id(&self, listing: Listing, name: &str) -> Result<Option<i64>, ReconcileError>;
}

/// [`IdLookup`] that pages through the whole collection and scans for the name.
#[derive(Debug, Clone, Copy)]
pub struct ListingScan<'a> {
    client: &'a RestClient,
}

impl<'a> ListingScan<'a> {
    pub fn new(client: &'a RestClient) -> Self {
        Self { client }
    }
}

impl IdLookup for ListingScan<'_> {
    #[tracing::instrument(skip(self), err)]
    async fn resolve_id(&self, listing: Listing, name: &str) -> Result<Option<i64>, ReconcileError> {
        let mut previous: Option<Vec<Value>> = None;
        for page in 1..=MAX_PAGES {
            let path = format!("{}?page={page}&page_size={PAGE_SIZE}", listing.path());
            let outcome = self.client.get(&path).await;
            let Some(body) = outcome.body() else {
                return Err(outcome.into_error(listing.kind(), name));
            };

            let entries = parse_page(body).ok_or_else(|| ReconcileError::Decode {
                kind: listing.kind(),
                name: name.to_owned(),
                detail: format!("listing page {page} is not a JSON array"),
            })?;
            if let Some(id) = find_id(&entries, name) {
                return Ok(Some(id));
            }
            if entries.len() < PAGE_SIZE {
                return Ok(None);
            }
            // A backend that ignores `page` keeps answering with the same entries.
            if previous.as_ref() == Some(&entries) {
                tracing::warn!(page, "listing does not advance, stopping scan");
                return Ok(None);
            }
            previous = Some(entries);
        }

        tracing::warn!(pages = MAX_PAGES, "listing page limit reached, stopping scan");
        Ok(None)
    }
}

/// An empty body is an empty page; anything else must be a JSON array.
fn parse_page(body: &str) -> Option<Vec<Value>> {
    if body.trim().is_empty() {
        return Some(Vec::new());
    }
    serde_json::from_str(body).ok()
}

/// Linear scan of a listing for an exact name match.
pub fn find_id(entries: &[Value], name: &str) -> Option<i64> {
    entries
        .iter()
        .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|entry| entry.get("id"))
        .and_then(Value::as_i64)
}
