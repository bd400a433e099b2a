//! Per-session pending-command correlation map.
//!
//! A command sent to a device is recorded under its sequence number with a
//! 60-second lifetime (§4.4, §5, testable property 7). A later 0x21/0x15
//! response bearing the same sequence is matched against this map; an
//! unanswered entry is swept out by [`PendingCommands::sweep_expired`] and
//! reported as a timeout.

use std::{collections::HashMap, ops::Sub, time::Duration};

/// How long a sent command waits for a correlated response before timing
/// out.
pub const COMMAND_TTL: Duration = Duration::from_secs(60);

/// A command awaiting a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand<I> {
    /// Device identifier the command was sent to.
    pub identifier: String,
    /// The literal command text that was sent.
    pub command: String,
    /// When the command was sent.
    pub sent_at: I,
}

/// Outcome of correlating an inbound command response against the pending
/// map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A pending command with this sequence was found within its TTL.
    Matched {
        /// Time elapsed between sending the command and this response.
        latency: Duration,
        /// The command that was matched.
        command: String,
    },
    /// No pending command with this sequence exists (either none was sent,
    /// or it already timed out and was swept).
    Unmatched,
}

/// The pending-command map for a single session.
#[derive(Debug, Clone, Default)]
pub struct PendingCommands<I> {
    entries: HashMap<u16, PendingCommand<I>>,
}

impl<I> PendingCommands<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Creates an empty pending-command map.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Records a command as sent under `sequence`.
    pub fn insert(&mut self, sequence: u16, identifier: String, command: String, sent_at: I) {
        self.entries.insert(sequence, PendingCommand { identifier, command, sent_at });
    }

    /// Attempts to correlate an inbound response's `sequence` against this
    /// map, removing the entry either way.
    pub fn match_response(&mut self, sequence: u16, now: I) -> MatchOutcome {
        match self.entries.remove(&sequence) {
            Some(pending) => {
                let latency = now - pending.sent_at;
                if latency <= COMMAND_TTL {
                    MatchOutcome::Matched { latency, command: pending.command }
                } else {
                    MatchOutcome::Unmatched
                }
            },
            None => MatchOutcome::Unmatched,
        }
    }

    /// Removes and returns every entry older than [`COMMAND_TTL`].
    pub fn sweep_expired(&mut self, now: I) -> Vec<(u16, PendingCommand<I>)> {
        let expired: Vec<u16> = self
            .entries
            .iter()
            .filter(|(_, pending)| now - pending.sent_at > COMMAND_TTL)
            .map(|(sequence, _)| *sequence)
            .collect();

        expired
            .into_iter()
            .filter_map(|sequence| self.entries.remove(&sequence).map(|p| (sequence, p)))
            .collect()
    }

    /// Whether the map currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn matches_within_ttl() {
        let t0 = Instant::now();
        let mut pending = PendingCommands::new();
        pending.insert(0x0099, "355172107461053".to_string(), "STATUS#".to_string(), t0);

        let t1 = t0 + Duration::from_secs(5);
        match pending.match_response(0x0099, t1) {
            MatchOutcome::Matched { latency, command } => {
                assert_eq!(latency, Duration::from_secs(5));
                assert_eq!(command, "STATUS#");
            },
            MatchOutcome::Unmatched => panic!("expected a match"),
        }
        assert!(pending.is_empty());
    }

    #[test]
    fn unmatched_sequence_reports_unmatched() {
        let t0 = Instant::now();
        let mut pending: PendingCommands<Instant> = PendingCommands::new();
        assert_eq!(pending.match_response(0x1234, t0), MatchOutcome::Unmatched);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let t0 = Instant::now();
        let mut pending = PendingCommands::new();
        pending.insert(1, "a".to_string(), "STATUS#".to_string(), t0);
        pending.insert(2, "b".to_string(), "WHERE#".to_string(), t0 + Duration::from_secs(50));

        let t1 = t0 + Duration::from_secs(61);
        let expired = pending.sweep_expired(t1);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, 1);
        assert!(!pending.is_empty());
    }

    #[test]
    fn response_after_ttl_is_unmatched_even_if_not_yet_swept() {
        let t0 = Instant::now();
        let mut pending = PendingCommands::new();
        pending.insert(7, "a".to_string(), "STATUS#".to_string(), t0);

        let late = t0 + Duration::from_secs(61);
        assert_eq!(pending.match_response(7, late), MatchOutcome::Unmatched);
    }
}
