//! Event normalizer
//!
//! Turns raw node notifications into typed `Event`s. Decoding is a pure
//! function of the payload; the `Normalizer` only adds the per-topic sequence
//! counter, which advances on successful decodes and health signals alone.

pub mod decoders;

pub use decoders::{decode, decode_channel, decode_channel_balance};

use crate::events::{Event, EventKind, Topic};
use crate::logger::{LogTag, Logger};
use crate::node::RawNotification;

pub struct Normalizer {
    topic: Topic,
    last_sequence: u64,
    discarded: u64,
    logger: Logger,
}

impl Normalizer {
    pub fn for_topic(topic: Topic, logger: Logger) -> Self {
        Self {
            topic,
            last_sequence: 0,
            discarded: 0,
            logger,
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Notifications discarded so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// `None` means the notification was discarded.
    pub fn normalize(&mut self, raw: RawNotification) -> Option<Event> {
        if raw.topic != self.topic {
            self.discarded += 1;
            self.logger.debug(
                LogTag::Normalizer,
                &format!(
                    "Discarded {} notification on the {} stream",
                    raw.topic, self.topic
                ),
            );
            return None;
        }

        match decode(self.topic, &raw.payload) {
            Ok(kind) => Some(self.stamp(kind)),
            Err(err) => {
                self.discarded += 1;
                self.logger.debug(LogTag::Normalizer, &err.to_string());
                None
            }
        }
    }

    /// Stamp a health event so it shares the topic's ordering with data.
    pub fn signal(&mut self, kind: EventKind) -> Event {
        self.stamp(kind)
    }

    fn stamp(&mut self, kind: EventKind) -> Event {
        self.last_sequence += 1;
        Event {
            topic: self.topic,
            sequence: self.last_sequence,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(hash: &str) -> RawNotification {
        RawNotification::new(
            Topic::Transactions,
            json!({"tx_hash": hash, "amount": "1000", "num_confirmations": 0}),
        )
    }

    #[test]
    fn test_sequences_start_at_one() {
        let mut normalizer = Normalizer::for_topic(Topic::Transactions, Logger::silent());
        let first = normalizer.normalize(tx("aa")).unwrap();
        let second = normalizer.normalize(tx("bb")).unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.topic, Topic::Transactions);
    }

    #[test]
    fn test_discard_does_not_consume_sequence() {
        let mut normalizer = Normalizer::for_topic(Topic::Transactions, Logger::silent());
        assert!(normalizer
            .normalize(RawNotification::new(Topic::Transactions, json!("garbage")))
            .is_none());
        assert!(normalizer.normalize(tx("")).is_none());
        assert_eq!(normalizer.last_sequence(), 0);
        assert_eq!(normalizer.discarded(), 2);

        assert_eq!(normalizer.normalize(tx("aa")).unwrap().sequence, 1);
    }

    #[test]
    fn test_foreign_topic_is_discarded() {
        let mut normalizer = Normalizer::for_topic(Topic::Invoices, Logger::silent());
        assert!(normalizer.normalize(tx("aa")).is_none());
        assert_eq!(normalizer.last_sequence(), 0);
    }

    #[test]
    fn test_signals_share_the_counter() {
        let mut normalizer = Normalizer::for_topic(Topic::Transactions, Logger::silent());
        normalizer.normalize(tx("aa")).unwrap();
        let degraded = normalizer.signal(EventKind::StreamDegraded {
            retries: 6,
            reason: "connection refused".to_string(),
        });
        let recovered = normalizer.signal(EventKind::StreamRecovered);
        assert_eq!(degraded.sequence, 2);
        assert_eq!(recovered.sequence, 3);
        assert_eq!(normalizer.normalize(tx("bb")).unwrap().sequence, 4);
    }
}
