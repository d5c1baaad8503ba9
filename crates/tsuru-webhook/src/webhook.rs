//! Webhook registration types.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// HTTP headers keyed by canonical name, each with its ordered values.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Criteria narrowing which events trigger a webhook.
///
/// Each set is a wildcard when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct EventFilter {
    /// Accepted target types, matched against the primary and extra targets.
    #[serde(default)]
    pub target_types: BTreeSet<String>,
    /// Accepted target values, matched against the primary and extra targets.
    #[serde(default)]
    pub target_values: BTreeSet<String>,
    /// Accepted kind types (leading component of the kind name).
    #[serde(default)]
    pub kind_types: BTreeSet<String>,
    /// Accepted fully qualified kind names.
    #[serde(default)]
    pub kind_names: BTreeSet<String>,
    /// Only fire for events that completed with an error.
    #[serde(default)]
    pub error_only: bool,
    /// Only fire for events that completed successfully.
    #[serde(default)]
    pub success_only: bool,
}

impl EventFilter {
    /// Adds an accepted target type.
    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_types.insert(target_type.into());
        self
    }

    /// Adds an accepted target value.
    pub fn with_target_value(mut self, value: impl Into<String>) -> Self {
        self.target_values.insert(value.into());
        self
    }

    /// Adds an accepted kind type.
    pub fn with_kind_type(mut self, kind_type: impl Into<String>) -> Self {
        self.kind_types.insert(kind_type.into());
        self
    }

    /// Adds an accepted kind name.
    pub fn with_kind_name(mut self, name: impl Into<String>) -> Self {
        self.kind_names.insert(name.into());
        self
    }

    /// Restricts the filter to failed events.
    pub fn error_only(mut self) -> Self {
        self.error_only = true;
        self
    }

    /// Restricts the filter to successful events.
    pub fn success_only(mut self) -> Self {
        self.success_only = true;
        self
    }
}

/// A registered external endpoint and its delivery configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Webhook {
    /// Unique webhook name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Team that owns the webhook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_owner: Option<String>,
    #[serde(default)]
    pub event_filter: EventFilter,
    /// Destination URL, used verbatim.
    pub url: String,
    /// Forward proxy the request is routed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    /// HTTP method; `POST` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Body template; the serialized event is sent when empty.
    #[serde(default)]
    pub body: String,
}

impl Webhook {
    /// Creates a webhook with the given name and destination URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the body template.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends a value to a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Sets the forward proxy URL.
    pub fn with_proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    /// Sets the event filter.
    pub fn with_event_filter(mut self, event_filter: EventFilter) -> Self {
        self.event_filter = event_filter;
        self
    }

    /// Sets the owning team.
    pub fn with_team_owner(mut self, team: impl Into<String>) -> Self {
        self.team_owner = Some(team.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Brings the webhook into its stored form.
    ///
    /// Header names are canonicalized (values of colliding names are merged in
    /// order), and blank optional strings become `None`.
    pub(crate) fn normalize(&mut self) {
        let headers = std::mem::take(&mut self.headers);
        for (name, values) in headers {
            self.headers
                .entry(canonical_header_name(&name))
                .or_default()
                .extend(values);
        }

        for field in [
            &mut self.proxy_url,
            &mut self.method,
            &mut self.description,
            &mut self.team_owner,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
    }
}

/// Returns the canonical form of an HTTP header name.
///
/// The first letter and any letter following a hyphen are upper-cased, the
/// rest lower-cased (`x-ahoy` becomes `X-Ahoy`). Names containing characters
/// that are not valid in a header token are returned unchanged.
pub fn canonical_header_name(name: &str) -> String {
    const TOKEN_SYMBOLS: &[u8] = b"!#$%&'*+-.^_`|~";

    let is_token = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || TOKEN_SYMBOLS.contains(&b));
    if !is_token {
        return name.to_owned();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let mapped = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            mapped
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("x-ahoy"), "X-Ahoy");
        assert_eq!(canonical_header_name("CONTENT-TYPE"), "Content-Type");
        assert_eq!(canonical_header_name("User-Agent"), "User-Agent");
        assert_eq!(canonical_header_name("bad header"), "bad header");
    }

    #[test]
    fn test_normalize_merges_headers() {
        let mut webhook = Webhook::new("xyz", "http://a")
            .with_header("x-ahoy", "a")
            .with_header("X-Ahoy", "b")
            .with_proxy_url("")
            .with_method(" ");
        webhook.normalize();

        // "X-Ahoy" sorts before "x-ahoy", so its values come first.
        assert_eq!(webhook.headers["X-Ahoy"], ["b", "a"]);
        assert_eq!(webhook.headers.len(), 1);
        assert!(webhook.proxy_url.is_none());
        assert!(webhook.method.is_none());
    }

    #[test]
    fn test_deserialize_fills_missing_containers() {
        let webhook: Webhook =
            serde_json::from_str(r#"{"name": "xyz", "url": "http://a"}"#).unwrap();
        assert!(webhook.headers.is_empty());
        assert_eq!(webhook.event_filter, EventFilter::default());
        assert!(webhook.body.is_empty());
    }
}
