//! Realtime channel topics and in-process subscription fan-out.
//!
//! Document-change notifications are named by hierarchical dot-separated
//! topics, e.g. `databases.<db>.collections.<coll>.documents.<doc>.update`.
//! Consumers subscribe by exact topic or by prefix/suffix pattern on dot
//! boundaries.

use futures::Stream;
use serde_json::Value;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Builders for the hierarchical topic strings.
pub struct Channel;

impl Channel {
    pub fn database(database_id: &str) -> String {
        format!("databases.{database_id}")
    }

    pub fn collection(database_id: &str, collection_id: &str) -> String {
        format!("databases.{database_id}.collections.{collection_id}")
    }

    pub fn documents(database_id: &str, collection_id: &str) -> String {
        format!("databases.{database_id}.collections.{collection_id}.documents")
    }

    pub fn document(database_id: &str, collection_id: &str, document_id: &str) -> String {
        format!("databases.{database_id}.collections.{collection_id}.documents.{document_id}")
    }

    pub fn document_event(
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        event: &str,
    ) -> String {
        format!(
            "databases.{database_id}.collections.{collection_id}.documents.{document_id}.{event}"
        )
    }
}

/// Returns true when `topic` falls under `pattern`: an exact match, or a
/// prefix/suffix match on a dot boundary.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic {
        return true;
    }
    if topic.len() > pattern.len() {
        if topic.as_bytes()[pattern.len()] == b'.' && topic.starts_with(pattern) {
            return true;
        }
        let suffix_at = topic.len() - pattern.len();
        if topic.as_bytes()[suffix_at - 1] == b'.' && topic.ends_with(pattern) {
            return true;
        }
    }
    false
}

/// A change notification published for one or more channels.
#[derive(Debug, Clone)]
pub struct RealtimeEvent {
    pub channels: Vec<String>,
    pub payload: Value,
}

/// Fan-out hub: publishers broadcast events, subscribers receive those whose
/// channels match any of their patterns.
#[derive(Debug)]
pub struct RealtimeHub {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publishes an event to all matching subscribers. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: RealtimeEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribes to all events whose channel list matches any of `patterns`.
    /// A lagged subscriber skips the events it missed.
    pub fn subscribe(&self, patterns: Vec<String>) -> impl Stream<Item = RealtimeEvent> {
        let rx = self.tx.subscribe();
        futures::stream::unfold((rx, patterns), |(mut rx, patterns)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let matched = event.channels.iter().any(|channel| {
                            patterns.iter().any(|pattern| topic_matches(pattern, channel))
                        });
                        if matched {
                            return Some((event, (rx, patterns)));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_document_event_topic() {
        assert_eq!(
            Channel::document_event("main", "schedules", "abc", "update"),
            "databases.main.collections.schedules.documents.abc.update"
        );
    }

    #[test]
    fn test_topic_matches_exact_and_prefix() {
        let topic = "databases.main.collections.schedules.documents.abc.update";
        assert!(topic_matches(topic, topic));
        assert!(topic_matches("databases.main", topic));
        assert!(topic_matches(
            "databases.main.collections.schedules.documents",
            topic
        ));
        // Prefix must end on a dot boundary.
        assert!(!topic_matches("databases.ma", topic));
    }

    #[test]
    fn test_topic_matches_suffix() {
        let topic = "databases.main.collections.schedules.documents.abc.update";
        assert!(topic_matches("update", topic));
        assert!(topic_matches("abc.update", topic));
        assert!(!topic_matches("pdate", topic));
        assert!(!topic_matches("delete", topic));
    }

    #[tokio::test]
    async fn test_subscribe_filters_by_pattern() {
        let hub = RealtimeHub::new();
        let mut updates = Box::pin(hub.subscribe(vec![Channel::documents("main", "schedules")]));

        hub.publish(RealtimeEvent {
            channels: vec![Channel::document("main", "organizations", "o1")],
            payload: json!({"uid": "o1"}),
        });
        hub.publish(RealtimeEvent {
            channels: vec![Channel::document("main", "schedules", "s1")],
            payload: json!({"uid": "s1"}),
        });

        let event = updates.next().await.unwrap();
        assert_eq!(event.payload, json!({"uid": "s1"}));
    }
}
