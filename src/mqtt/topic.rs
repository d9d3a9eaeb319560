//! Topic and client identifier naming.
//!
//! Position reports go to
//! `radiocaching/ff/search_teams/<team>/coordinates`; the command-post
//! dashboards subscribe to `radiocaching/ff/search_teams/+/coordinates`,
//! so the layout is fixed.
//!
//! Client identifiers are `<prefix>-t<team>-<epoch ms>`, unique per process
//! start so two trackers of the same team never kick each other off the
//! broker.

use core::fmt::Write;

use crate::error::PublishError;

/// Fixed-size topic string.
pub type TopicString = heapless::String<96>;

/// Fixed-size client identifier.
pub type ClientIdString = heapless::String<64>;

/// Topic prefix shared by all search teams.
pub const TEAMS_ROOT: &str = "radiocaching/ff/search_teams";

/// Longest client-id prefix that still fits [`ClientIdString`].
pub const MAX_CLIENT_PREFIX_LEN: usize = 32;

/// Coordinates topic for `team`.
pub fn coordinates_topic(team: u16) -> TopicString {
    let mut topic = TopicString::new();
    let _ = write!(topic, "{TEAMS_ROOT}/{team}/coordinates");
    topic
}

/// Per-process client identifier.
pub fn client_id(prefix: &str, team: u16, now_ms: i64) -> ClientIdString {
    let mut id = ClientIdString::new();
    let _ = write!(id, "{prefix}-t{team}-{now_ms}");
    id
}

/// Reject topics a broker would refuse for PUBLISH.
pub fn validate_publish_topic(topic: &str) -> Result<(), PublishError> {
    if topic.is_empty() || topic.len() > usize::from(u16::MAX) {
        return Err(PublishError::InvalidTopic);
    }
    if topic.contains(['+', '#', '\0']) {
        return Err(PublishError::InvalidTopic);
    }
    Ok(())
}
