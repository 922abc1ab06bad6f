use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::shared::constants::DEFAULT_CHANNEL_CAPACITY;
use crate::shared::face::ResultEnvelope;

/// What a bounded channel does when the consumer falls behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum OverflowPolicy {
    /// Never drop; memory grows while the consumer is stalled.
    Unbounded,
    /// Evict the oldest buffered envelope to make room (keeps the latest state).
    DropOldest { capacity: usize },
    /// Reject the incoming envelope.
    DropNewest { capacity: usize },
}

impl OverflowPolicy {
    pub fn capacity(&self) -> Option<usize> {
        match self {
            OverflowPolicy::Unbounded => None,
            OverflowPolicy::DropOldest { capacity } | OverflowPolicy::DropNewest { capacity } => {
                Some(*capacity)
            }
        }
    }

    /// Same policy kind with a different capacity. No-op for `Unbounded`.
    pub fn with_capacity(self, capacity: usize) -> Self {
        match self {
            OverflowPolicy::Unbounded => OverflowPolicy::Unbounded,
            OverflowPolicy::DropOldest { .. } => OverflowPolicy::DropOldest { capacity },
            OverflowPolicy::DropNewest { .. } => OverflowPolicy::DropNewest { capacity },
        }
    }
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::DropOldest {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Unbounded => write!(f, "unbounded"),
            OverflowPolicy::DropOldest { capacity } => write!(f, "drop-oldest({capacity})"),
            OverflowPolicy::DropNewest { capacity } => write!(f, "drop-newest({capacity})"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    /// Parses the policy kind; capacity starts at the default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let capacity = DEFAULT_CHANNEL_CAPACITY;
        match s.to_lowercase().replace('_', "-").as_str() {
            "unbounded" => Ok(OverflowPolicy::Unbounded),
            "drop-oldest" => Ok(OverflowPolicy::DropOldest { capacity }),
            "drop-newest" => Ok(OverflowPolicy::DropNewest { capacity }),
            other => Err(format!(
                "Overflow policy must be one of: drop-oldest, drop-newest, unbounded, got '{other}'"
            )),
        }
    }
}

/// Result of a push. Drops are reported here, never as errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest buffered envelope.
    EvictedOldest,
    /// The pushed envelope itself was discarded.
    Rejected,
}

/// Counters since the channel was created.
///
/// `enqueued == drained + dropped + buffered` once both sides are quiet;
/// `dropped` counts evictions and rejections, and rejected envelopes are not
/// counted as enqueued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub enqueued: u64,
    pub drained: u64,
    pub evicted: u64,
    pub rejected: u64,
}

impl ChannelStats {
    pub fn dropped(&self) -> u64 {
        self.evicted + self.rejected
    }
}

/// Hand-off of result envelopes from the detection thread to the consumer.
///
/// Single producer, single consumer, FIFO. `push` never waits on the
/// consumer: a bounded channel applies its overflow policy instead. Both
/// ends live in one value shared behind an `Arc`.
pub struct ResultChannel {
    tx: Sender<ResultEnvelope>,
    rx: Receiver<ResultEnvelope>,
    policy: OverflowPolicy,
    enqueued: AtomicU64,
    drained: AtomicU64,
    evicted: AtomicU64,
    rejected: AtomicU64,
}

impl ResultChannel {
    pub fn new(policy: OverflowPolicy) -> Self {
        let policy = policy.with_capacity(policy.capacity().unwrap_or(0).max(1));
        let (tx, rx) = match policy.capacity() {
            None => crossbeam_channel::unbounded(),
            Some(capacity) => crossbeam_channel::bounded(capacity),
        };
        Self {
            tx,
            rx,
            policy,
            enqueued: AtomicU64::new(0),
            drained: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Producer side. Returns immediately.
    pub fn push(&self, envelope: ResultEnvelope) -> PushOutcome {
        let mut pending = envelope;
        let mut outcome = PushOutcome::Queued;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => {
                    self.enqueued.fetch_add(1, Ordering::Relaxed);
                    return outcome;
                }
                // Both ends are owned by `self`; disconnection cannot happen
                // while the channel is alive.
                Err(TrySendError::Disconnected(_)) => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    return PushOutcome::Rejected;
                }
                Err(TrySendError::Full(returned)) => match self.policy {
                    OverflowPolicy::DropNewest { .. } | OverflowPolicy::Unbounded => {
                        self.rejected.fetch_add(1, Ordering::Relaxed);
                        log::debug!("Result channel full, dropped frame {}", returned.frame().index());
                        return PushOutcome::Rejected;
                    }
                    OverflowPolicy::DropOldest { .. } => {
                        // The consumer may drain concurrently, in which case
                        // there is nothing to evict and the retry succeeds.
                        if let Ok(old) = self.rx.try_recv() {
                            self.evicted.fetch_add(1, Ordering::Relaxed);
                            log::debug!("Result channel full, evicted frame {}", old.frame().index());
                            outcome = PushOutcome::EvictedOldest;
                        }
                        pending = returned;
                    }
                },
            }
        }
    }

    /// Advisory count of buffered envelopes; may be stale by the time it is
    /// read.
    pub fn size(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Consumer side: takes the oldest envelope, if any, without waiting.
    pub fn try_drain(&self) -> Option<ResultEnvelope> {
        let envelope = self.rx.try_recv().ok()?;
        self.drained.fetch_add(1, Ordering::Relaxed);
        Some(envelope)
    }

    /// Consumer side: waits up to `timeout` for the next envelope.
    pub fn drain_timeout(&self, timeout: Duration) -> Option<ResultEnvelope> {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => {
                self.drained.fetch_add(1, Ordering::Relaxed);
                Some(envelope)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResultChannel {
    fn default() -> Self {
        Self::new(OverflowPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::face::DetectionResult;
    use crate::shared::frame::Frame;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn envelope(index: usize) -> ResultEnvelope {
        let frame = Frame::new(
            vec![0u8; 2 * 2 * 3],
            2,
            2,
            3,
            index,
            Duration::from_millis(index as u64 * 33),
        );
        ResultEnvelope::new(frame, DetectionResult::new())
    }

    fn drain_indices(channel: &ResultChannel) -> Vec<usize> {
        std::iter::from_fn(|| channel.try_drain())
            .map(|e| e.frame().index())
            .collect()
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(100)]
    #[case(1_000)]
    fn test_unbounded_drains_all_in_push_order(#[case] n: usize) {
        let channel = ResultChannel::new(OverflowPolicy::Unbounded);
        for i in 0..n {
            assert_eq!(channel.push(envelope(i)), PushOutcome::Queued);
        }
        assert_eq!(channel.size(), n);

        let drained = drain_indices(&channel);

        assert_eq!(drained, (0..n).collect::<Vec<_>>());
        assert!(channel.try_drain().is_none());
        assert_eq!(channel.stats().enqueued, n as u64);
        assert_eq!(channel.stats().drained, n as u64);
    }

    #[test]
    fn test_drained_envelopes_keep_timestamp_order() {
        let channel = ResultChannel::new(OverflowPolicy::Unbounded);
        for i in 0..10 {
            channel.push(envelope(i));
        }
        let stamps: Vec<_> = std::iter::from_fn(|| channel.try_drain())
            .map(|e| e.timestamp())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_drop_oldest_keeps_latest() {
        let channel = ResultChannel::new(OverflowPolicy::DropOldest { capacity: 3 });
        for i in 0..3 {
            assert_eq!(channel.push(envelope(i)), PushOutcome::Queued);
        }
        assert_eq!(channel.push(envelope(3)), PushOutcome::EvictedOldest);
        assert_eq!(channel.push(envelope(4)), PushOutcome::EvictedOldest);

        assert_eq!(drain_indices(&channel), vec![2, 3, 4]);
        let stats = channel.stats();
        assert_eq!(stats.evicted, 2);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.enqueued, stats.drained + stats.evicted);
    }

    #[test]
    fn test_drop_newest_keeps_earliest() {
        let channel = ResultChannel::new(OverflowPolicy::DropNewest { capacity: 2 });
        assert_eq!(channel.push(envelope(0)), PushOutcome::Queued);
        assert_eq!(channel.push(envelope(1)), PushOutcome::Queued);
        assert_eq!(channel.push(envelope(2)), PushOutcome::Rejected);

        assert_eq!(drain_indices(&channel), vec![0, 1]);
        let stats = channel.stats();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.dropped(), 1);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let channel = ResultChannel::new(OverflowPolicy::DropOldest { capacity: 0 });
        assert_eq!(channel.policy(), OverflowPolicy::DropOldest { capacity: 1 });
        channel.push(envelope(0));
        channel.push(envelope(1));
        assert_eq!(drain_indices(&channel), vec![1]);
    }

    #[test]
    fn test_drain_timeout_returns_none_when_empty() {
        let channel = ResultChannel::default();
        assert!(channel
            .drain_timeout(Duration::from_millis(1))
            .is_none());
    }

    #[test]
    fn test_drain_timeout_wakes_on_push() {
        let channel = Arc::new(ResultChannel::default());
        let producer = {
            let channel = channel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                channel.push(envelope(7));
            })
        };
        let got = channel.drain_timeout(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(got.map(|e| e.frame().index()), Some(7));
    }

    #[rstest]
    #[case::unbounded(OverflowPolicy::Unbounded)]
    #[case::drop_oldest(OverflowPolicy::DropOldest { capacity: 16 })]
    #[case::drop_newest(OverflowPolicy::DropNewest { capacity: 16 })]
    fn test_concurrent_push_and_drain_stress(#[case] policy: OverflowPolicy) {
        const N: usize = 10_000;
        let channel = Arc::new(ResultChannel::new(policy));

        let producer = {
            let channel = channel.clone();
            thread::spawn(move || {
                for i in 0..N {
                    channel.push(envelope(i));
                }
            })
        };

        let mut seen = Vec::new();
        loop {
            // size() is only a hint: a zero may be followed by a successful
            // drain, and a positive value by an empty one.
            let _hint = channel.size();
            match channel.try_drain() {
                Some(e) => seen.push(e.frame().index()),
                None if producer.is_finished() && channel.is_empty() => break,
                None => thread::yield_now(),
            }
        }
        producer.join().unwrap();
        seen.extend(drain_indices(&channel));

        assert!(seen.windows(2).all(|w| w[0] < w[1]), "out of order delivery");
        let unique: HashSet<_> = seen.iter().collect();
        assert_eq!(unique.len(), seen.len(), "duplicate delivery");

        let stats = channel.stats();
        assert_eq!(stats.drained, seen.len() as u64);
        assert_eq!(stats.enqueued, stats.drained + stats.evicted);
        assert_eq!(stats.enqueued + stats.rejected, N as u64);
        if policy == OverflowPolicy::Unbounded {
            assert_eq!(seen.len(), N);
        }
    }

    #[rstest]
    #[case("drop-oldest", OverflowPolicy::DropOldest { capacity: DEFAULT_CHANNEL_CAPACITY })]
    #[case("DROP_NEWEST", OverflowPolicy::DropNewest { capacity: DEFAULT_CHANNEL_CAPACITY })]
    #[case("unbounded", OverflowPolicy::Unbounded)]
    fn test_parse_policy(#[case] input: &str, #[case] expected: OverflowPolicy) {
        assert_eq!(input.parse::<OverflowPolicy>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_policy_errors() {
        assert!("block".parse::<OverflowPolicy>().is_err());
    }

    #[test]
    fn test_default_policy_is_drop_oldest() {
        assert_eq!(
            ResultChannel::default().policy(),
            OverflowPolicy::DropOldest {
                capacity: DEFAULT_CHANNEL_CAPACITY
            }
        );
    }
}
