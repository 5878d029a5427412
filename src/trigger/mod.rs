//! Request parsing for the external trigger surfaces.
//!
//! The HTTP server, the messaging client and the button driver live
//! outside this crate. They turn their inputs into a [`Request`] with the
//! helpers below and hand it to [`Controller::handle`](crate::Controller::handle).
//!
//! HTTP paths:
//!
//! | Path | Request |
//! |------|---------|
//! | `/on`, `/on?id=N` | wake all, or identity `N` |
//! | `/off`, `/off?id=N` | sleep all, or identity `N` |
//! | `/rename?id=N&name=S` | rename identity `N` |
//!
//! Messaging topics, relative to a base topic:
//!
//! | Topic | Direction | Payload |
//! |-------|-----------|---------|
//! | `base/command` | in | `on` / `off` for all |
//! | `base/lighthouseN/command` | in | `on` / `off` for identity `N` |
//! | `base/lighthouseN/status` | out | last-known status |
//! | `base/lighthouseN/name` | out | display name |
//! | `base/availability` | out | `online` (retained) |

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::protocol::Intent;
use crate::state::IdentityStatus;
use crate::types::Target;

/// Default base topic.
pub const DEFAULT_BASE_TOPIC: &str = "lighthouse";

/// Payload published on the availability topic after connecting.
pub const AVAILABILITY_ONLINE: &str = "online";

const IDENTITY_PREFIX: &str = "lighthouse";

/// An operator request, independent of where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Wake or sleep base stations.
    Command { intent: Intent, target: Target },
    /// Rename an identity.
    Rename { index: usize, name: String },
}

impl Request {
    /// Wake or sleep every base station.
    #[must_use]
    pub const fn all(intent: Intent) -> Self {
        Self::Command {
            intent,
            target: Target::All,
        }
    }
}

/// Physical momentary inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    On,
    Off,
}

impl Button {
    /// Returns the request bound to this button.
    #[must_use]
    pub const fn request(self) -> Request {
        match self {
            Self::On => Request::all(Intent::Wake),
            Self::Off => Request::all(Intent::Sleep),
        }
    }
}

/// Parses a command payload (`on` / `off`).
#[must_use]
pub fn parse_intent(payload: &str) -> Option<Intent> {
    match payload.trim() {
        "on" => Some(Intent::Wake),
        "off" => Some(Intent::Sleep),
        _ => None,
    }
}

fn parse_index(value: &str, identity_count: usize) -> Result<usize> {
    let index = value
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::InvalidParameter {
            name: "id",
            value: value.to_string(),
        })?;
    if index >= identity_count {
        return Err(Error::InvalidTarget {
            index,
            count: identity_count,
        });
    }
    Ok(index)
}

/// Parses an HTTP path with its query string.
///
/// Returns `Ok(None)` for paths that are not control paths. An empty `id`
/// on `/on` or `/off` means all base stations.
pub fn parse_http(path_and_query: &str, identity_count: usize) -> Result<Option<Request>> {
    let (path, query) = path_and_query
        .split_once('?')
        .unwrap_or((path_and_query, ""));

    let mut id: Option<Cow<'_, str>> = None;
    let mut name: Option<Cow<'_, str>> = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "id" => id = Some(value),
            "name" => name = Some(value),
            _ => {}
        }
    }
    let id = id.filter(|v| !v.trim().is_empty());

    let intent = match path {
        "/on" => Intent::Wake,
        "/off" => Intent::Sleep,
        "/rename" => {
            let id = id.ok_or(Error::MissingParameter { name: "id" })?;
            let name = name
                .filter(|v| !v.is_empty())
                .ok_or(Error::MissingParameter { name: "name" })?;
            return Ok(Some(Request::Rename {
                index: parse_index(&id, identity_count)?,
                name: name.into_owned(),
            }));
        }
        _ => return Ok(None),
    };

    let target = match id {
        Some(id) => Target::Specific(parse_index(&id, identity_count)?),
        None => Target::All,
    };
    Ok(Some(Request::Command { intent, target }))
}

/// Topic naming under one base topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_TOPIC)
    }
}

impl Topics {
    /// Creates topic names under `base`. An empty base falls back to the default.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let base = base.trim_end_matches('/');
        Self {
            base: if base.is_empty() {
                DEFAULT_BASE_TOPIC.to_string()
            } else {
                base.to_string()
            },
        }
    }

    /// Returns the base topic.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Command topic for all base stations.
    #[must_use]
    pub fn command(&self) -> String {
        format!("{}/command", self.base)
    }

    /// Command topic for one identity.
    #[must_use]
    pub fn identity_command(&self, index: usize) -> String {
        format!("{}/{IDENTITY_PREFIX}{index}/command", self.base)
    }

    /// Status topic for one identity.
    #[must_use]
    pub fn status(&self, index: usize) -> String {
        format!("{}/{IDENTITY_PREFIX}{index}/status", self.base)
    }

    /// Name topic for one identity.
    #[must_use]
    pub fn name(&self, index: usize) -> String {
        format!("{}/{IDENTITY_PREFIX}{index}/name", self.base)
    }

    /// Availability topic.
    #[must_use]
    pub fn availability(&self) -> String {
        format!("{}/availability", self.base)
    }

    /// Topics to subscribe to.
    #[must_use]
    pub fn subscriptions(&self, identity_count: usize) -> Vec<String> {
        std::iter::once(self.command())
            .chain((0..identity_count).map(|index| self.identity_command(index)))
            .collect()
    }

    /// Status and name messages to publish after a cycle or a rename.
    #[must_use]
    pub fn publications(&self, statuses: &[IdentityStatus]) -> Vec<(String, String)> {
        statuses
            .iter()
            .flat_map(|s| {
                [
                    (self.status(s.index), s.status.as_str().to_string()),
                    (self.name(s.index), s.name.clone()),
                ]
            })
            .collect()
    }

    /// Parses an inbound message.
    ///
    /// Returns `Ok(None)` for topics outside the command namespace.
    pub fn parse(
        &self,
        topic: &str,
        payload: &str,
        identity_count: usize,
    ) -> Result<Option<Request>> {
        let Some(rest) = topic
            .strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return Ok(None);
        };

        let target = if rest == "command" {
            Target::All
        } else {
            let Some(index) = rest
                .strip_suffix("/command")
                .and_then(|rest| rest.strip_prefix(IDENTITY_PREFIX))
            else {
                return Ok(None);
            };
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(None);
            }
            Target::Specific(parse_index(index, identity_count)?)
        };

        let intent = parse_intent(payload).ok_or_else(|| Error::InvalidParameter {
            name: "payload",
            value: payload.to_string(),
        })?;
        Ok(Some(Request::Command { intent, target }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PowerStatus;

    #[test]
    fn test_http_commands() {
        assert_eq!(
            parse_http("/on", 2).unwrap(),
            Some(Request::all(Intent::Wake))
        );
        assert_eq!(
            parse_http("/off?id=1", 2).unwrap(),
            Some(Request::Command {
                intent: Intent::Sleep,
                target: Target::Specific(1)
            })
        );
        assert_eq!(
            parse_http("/on?id=", 2).unwrap(),
            Some(Request::all(Intent::Wake))
        );
        assert_eq!(parse_http("/status", 2).unwrap(), None);
    }

    #[test]
    fn test_http_invalid_id() {
        assert!(matches!(
            parse_http("/on?id=2", 2),
            Err(Error::InvalidTarget { index: 2, count: 2 })
        ));
        assert!(matches!(
            parse_http("/off?id=x", 2),
            Err(Error::InvalidParameter { name: "id", .. })
        ));
    }

    #[test]
    fn test_http_rename() {
        assert_eq!(
            parse_http("/rename?id=0&name=Desk%20Left", 2).unwrap(),
            Some(Request::Rename {
                index: 0,
                name: "Desk Left".into()
            })
        );
        assert!(matches!(
            parse_http("/rename?name=Desk", 2),
            Err(Error::MissingParameter { name: "id" })
        ));
        assert!(matches!(
            parse_http("/rename?id=1&name=", 2),
            Err(Error::MissingParameter { name: "name" })
        ));
        assert!(matches!(
            parse_http("/rename?id=5&name=Desk", 2),
            Err(Error::InvalidTarget { index: 5, .. })
        ));
    }

    #[test]
    fn test_topic_names() {
        let topics = Topics::new("home/vr/");
        assert_eq!(topics.command(), "home/vr/command");
        assert_eq!(topics.identity_command(1), "home/vr/lighthouse1/command");
        assert_eq!(topics.status(0), "home/vr/lighthouse0/status");
        assert_eq!(topics.name(0), "home/vr/lighthouse0/name");
        assert_eq!(topics.availability(), "home/vr/availability");
        assert_eq!(
            topics.subscriptions(2),
            [
                "home/vr/command",
                "home/vr/lighthouse0/command",
                "home/vr/lighthouse1/command"
            ]
        );
        assert_eq!(Topics::new("").base(), DEFAULT_BASE_TOPIC);
    }

    #[test]
    fn test_topic_parse_routes_identity_commands() {
        let topics = Topics::default();

        assert_eq!(
            topics.parse("lighthouse/command", "on", 2).unwrap(),
            Some(Request::all(Intent::Wake))
        );
        assert_eq!(
            topics.parse("lighthouse/lighthouse1/command", "off", 2).unwrap(),
            Some(Request::Command {
                intent: Intent::Sleep,
                target: Target::Specific(1)
            })
        );
        assert!(matches!(
            topics.parse("lighthouse/lighthouse7/command", "on", 2),
            Err(Error::InvalidTarget { index: 7, .. })
        ));
        assert!(matches!(
            topics.parse("lighthouse/command", "toggle", 2),
            Err(Error::InvalidParameter { name: "payload", .. })
        ));
        assert_eq!(
            topics.parse("lighthouse/lighthouse0/status", "on", 2).unwrap(),
            None
        );
        assert_eq!(topics.parse("other/command", "on", 2).unwrap(), None);
    }

    #[test]
    fn test_publications() {
        let topics = Topics::default();
        let statuses = [IdentityStatus {
            index: 0,
            label: "C21347".into(),
            name: "Room 1".into(),
            status: PowerStatus::Awake,
        }];

        assert_eq!(
            topics.publications(&statuses),
            [
                ("lighthouse/lighthouse0/status".to_string(), "on".to_string()),
                ("lighthouse/lighthouse0/name".to_string(), "Room 1".to_string()),
            ]
        );
    }

    #[test]
    fn test_buttons() {
        assert_eq!(Button::On.request(), Request::all(Intent::Wake));
        assert_eq!(Button::Off.request(), Request::all(Intent::Sleep));
    }
}
