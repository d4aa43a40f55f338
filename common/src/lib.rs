#![warn(clippy::nursery, clippy::pedantic)]

//! Contains common functions and structures used by multiple projects

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
pub use url::Url;

use crate::error::BaseUrlError;
use crate::estimate::RemainingViews;

#[cfg(feature = "client")]
pub mod client;
pub mod confirm;
pub mod draft;
pub mod error;
pub mod estimate;

pub const API_ENDPOINT: &str = "/paste/api";
pub const PASTES_PATH: &str = "pastes";
pub const DEFAULT_API_URL: &str = "http://localhost:8081/paste/api";
pub const DEFAULT_VIEWER_PREFIX: &str = "p";

/// Body of a paste creation request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreatePaste {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_views: Option<i64>,
}

/// Body of a successful creation response. Services may answer with an
/// identifier, an absolute URL, or both.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CreatedPaste {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CreatedPaste {
    /// The paste identifier, preferring `id` and falling back to the last
    /// path segment of `url`.
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned)
            .or_else(|| self.url.as_deref().and_then(id_from_url))
    }
}

/// A point-in-time snapshot of a paste, as returned by a consuming fetch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PasteView {
    pub content: String,
    /// `None` means the paste has no view limit.
    pub remaining_views: Option<u64>,
    /// Display only. Unreadable timestamps become `None` rather than failing
    /// the decode, since the view has already been spent by then.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(parse_timestamp))
}

/// RFC 3339, or an ISO-8601 date-time without an offset read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            raw.parse::<NaiveDateTime>()
                .ok()
                .map(|time| Utc.from_utc_datetime(&time))
        })
}

impl PasteView {
    #[must_use]
    pub fn remaining(&self) -> RemainingViews {
        self.remaining_views.into()
    }
}

/// Error payload of a non-2xx response.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Client-side reference to a created paste.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasteHandle {
    pub id: String,
    pub url: Url,
}

/// Extracts the trailing non-empty path segment of a URL. Strings that do not
/// parse as a URL are split on `/` directly.
#[must_use]
pub fn id_from_url(raw: &str) -> Option<String> {
    let path = Url::parse(raw).map(|url| url.path().to_owned());
    let path = path.as_deref().unwrap_or(raw);
    last_segment(path)
}

/// Accepts either a bare identifier or a link containing one.
#[must_use]
pub fn id_from_input(input: &str) -> Option<String> {
    let input = input.trim();
    if input.contains('/') {
        id_from_url(input)
    } else if input.is_empty() {
        None
    } else {
        Some(input.to_owned())
    }
}

fn last_segment(path: &str) -> Option<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .map(ToOwned::to_owned)
}

/// Builds local viewer links of the form `{origin}/{prefix}/{id}`.
#[derive(Clone, Debug)]
pub struct ViewerRoute {
    origin: Url,
    prefix: Vec<String>,
}

impl ViewerRoute {
    /// # Errors
    ///
    /// Fails if the origin cannot carry a path, such as a `data:` URL.
    pub fn new(mut origin: Url, prefix: &str) -> Result<Self, BaseUrlError> {
        if origin.cannot_be_a_base() {
            return Err(BaseUrlError(origin));
        }
        origin.set_path("");
        origin.set_query(None);
        origin.set_fragment(None);

        Ok(Self {
            origin,
            prefix: prefix
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
        })
    }

    /// Links served next to the API itself. The prefix replaces the API's
    /// last path segment, so `{host}/paste/api` links to
    /// `{host}/paste/{prefix}/{id}`.
    ///
    /// # Errors
    ///
    /// Fails if the API URL cannot carry a path.
    pub fn beside_api(api: &Url, prefix: &str) -> Result<Self, BaseUrlError> {
        let mut route = Self::new(api.clone(), prefix)?;
        let mut mount: Vec<String> = api
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|segment| !segment.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        mount.pop();
        mount.append(&mut route.prefix);
        route.prefix = mount;
        Ok(route)
    }

    #[must_use]
    pub fn link(&self, id: &str) -> Url {
        let mut url = self.origin.clone();
        // Checked for in the constructor
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.clear().extend(&self.prefix).push(id);
        }
        url
    }
}
