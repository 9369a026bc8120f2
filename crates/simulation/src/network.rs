//! Simulated network with deterministic delay, loss, duplication, rate
//! limiting and header-before-body ordering.

use crate::config::NetworkConfig;
use crate::event_queue::EventKey;
use crate::log::{DropReason, EventLog, LogEvent, LogRecord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tendersim_messages::NetworkMessage;
use tendersim_node::NodeIndex;
use tendersim_types::Hash;
use tracing::{debug, trace};

/// Counters collected by the network.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    /// Messages scheduled for delivery (duplicates excluded).
    pub messages_sent: u64,
    /// Extra copies scheduled by duplication.
    pub messages_duplicated: u64,
    /// Messages handed to a replica.
    pub messages_delivered: u64,
    /// Messages dropped by simulated loss.
    pub messages_dropped_loss: u64,
    /// Messages dropped because the link was blocked.
    pub messages_dropped_blocked: u64,
    /// Messages dropped because the link ran out of tokens.
    pub messages_dropped_rate_limited: u64,
    /// Bodies dropped after waiting too long for their header.
    pub messages_dropped_causal: u64,
    /// Body deferrals.
    pub deferrals: u64,
    /// Times a link was blocked.
    pub links_blocked: u64,
    /// Times a link was unblocked.
    pub links_unblocked: u64,
}

impl NetworkStats {
    /// Total messages dropped for any reason.
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped_loss
            + self.messages_dropped_blocked
            + self.messages_dropped_rate_limited
            + self.messages_dropped_causal
    }
}

/// A message handed to a replica.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub time: u64,
    pub from: NodeIndex,
    pub to: NodeIndex,
    pub message: NetworkMessage,
}

/// What a call to [`SimulatedNetwork::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Queue was empty; time advanced by one tick.
    Idle,
    /// A message was delivered to the handler.
    Delivered,
    /// A body was pushed back to wait for its header.
    Deferred,
    /// A body missed its deadline and was dropped.
    Dropped,
}

type Link = (NodeIndex, NodeIndex);

#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    last_refill: u64,
}

impl TokenBucket {
    fn full(capacity: f64, now: u64) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Refill for the elapsed time, then take one token if available.
    fn try_take(&mut self, now: u64, rate: f64, capacity: f64) -> bool {
        let elapsed = now.saturating_sub(self.last_refill);
        self.tokens = (self.tokens + rate * elapsed as f64).min(capacity);
        self.last_refill = now;
        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

#[derive(Debug, Clone)]
struct Scheduled {
    from: NodeIndex,
    to: NodeIndex,
    message: NetworkMessage,
    /// Time of the first deferral, for bodies waiting on a header.
    deferred_since: Option<u64>,
}

/// Deterministic discrete-event message bus.
///
/// All randomness comes from one `ChaCha8Rng` seeded at construction and
/// consumed in a fixed order per send: loss roll, delay, duplicate roll.
/// The event queue, token buckets and blocked-link table are owned here and
/// only change inside [`send`](Self::send) and [`step`](Self::step).
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    rng: ChaCha8Rng,
    now: u64,
    sequence: u64,
    queue: BTreeMap<EventKey, Scheduled>,
    buckets: BTreeMap<Link, TokenBucket>,
    /// Blocked links and the tick their cooldown ends.
    blocked: BTreeMap<Link, u64>,
    /// (destination, block hash) pairs whose header has been delivered.
    headers_seen: BTreeSet<(NodeIndex, Hash)>,
    log: EventLog,
    stats: NetworkStats,
}

impl SimulatedNetwork {
    /// Create a network with an in-memory log.
    pub fn new(config: NetworkConfig, seed: u64) -> Self {
        Self::with_log(config, seed, EventLog::in_memory())
    }

    /// Create a network that records into `log`.
    pub fn with_log(config: NetworkConfig, seed: u64, log: EventLog) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            now: 0,
            sequence: 0,
            queue: BTreeMap::new(),
            buckets: BTreeMap::new(),
            blocked: BTreeMap::new(),
            headers_seen: BTreeSet::new(),
            log,
            stats: NetworkStats::default(),
        }
    }

    // ─── Accessors ───

    pub fn now(&self) -> u64 {
        self.now
    }

    /// True iff no events are queued.
    pub fn idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_link_blocked(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.blocked
            .get(&(from, to))
            .is_some_and(|&until| self.now < until)
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Append a record from outside the network (e.g. the round driver).
    pub fn record(&mut self, record: LogRecord) {
        self.log.record(record);
    }

    /// Consume the network, returning its log.
    pub fn into_log(self) -> EventLog {
        self.log
    }

    // ─── Sending ───

    /// Send `message` from `from` to `to`, subject to the fault model.
    pub fn send(&mut self, from: NodeIndex, to: NodeIndex, message: NetworkMessage) {
        let link = (from, to);

        if let Some(&until) = self.blocked.get(&link) {
            if self.now < until {
                trace!(from, to, until, "Message dropped on blocked link");
                self.stats.messages_dropped_blocked += 1;
                self.log.record(
                    LogRecord::network(LogEvent::Drop, self.now)
                        .link(from, to)
                        .message(&message)
                        .reason(DropReason::LinkBlocked),
                );
                return;
            }
            self.unblock(link);
        }

        let (rate, capacity) = (self.config.bucket_rate, self.config.bucket_capacity);
        let now = self.now;
        let has_token = self
            .buckets
            .entry(link)
            .or_insert_with(|| TokenBucket::full(capacity, now))
            .try_take(now, rate, capacity);

        if !has_token {
            let until = now + self.config.block_cooldown;
            debug!(from, to, until, "Link out of tokens, blocking");
            self.blocked.insert(link, until);
            self.stats.links_blocked += 1;
            self.stats.messages_dropped_rate_limited += 1;
            self.log.record(
                LogRecord::network(LogEvent::Block, now)
                    .link(from, to)
                    .message(&message)
                    .until(until),
            );
            return;
        }

        if self.config.drop_probability > 0.0 && self.rng.gen::<f64>() < self.config.drop_probability
        {
            trace!(from, to, "Message dropped due to packet loss");
            self.stats.messages_dropped_loss += 1;
            self.log.record(
                LogRecord::network(LogEvent::Drop, now)
                    .link(from, to)
                    .message(&message)
                    .reason(DropReason::Loss),
            );
            return;
        }

        let delay = self
            .rng
            .gen_range(self.config.delay_min..=self.config.delay_max);
        let duplicate = self.config.duplicate_probability > 0.0
            && self.rng.gen::<f64>() < self.config.duplicate_probability;

        let at = now + delay;
        self.log.record(
            LogRecord::network(LogEvent::Send, now)
                .link(from, to)
                .message(&message)
                .delay(delay),
        );
        self.stats.messages_sent += 1;

        if duplicate {
            self.log.record(
                LogRecord::network(LogEvent::Dup, now)
                    .link(from, to)
                    .message(&message)
                    .delay(delay + 1),
            );
            self.stats.messages_duplicated += 1;
            self.schedule(at, from, to, message.clone(), None);
            self.schedule(at + 1, from, to, message, None);
        } else {
            self.schedule(at, from, to, message, None);
        }
    }

    fn schedule(
        &mut self,
        time: u64,
        from: NodeIndex,
        to: NodeIndex,
        message: NetworkMessage,
        deferred_since: Option<u64>,
    ) {
        self.sequence += 1;
        let key = EventKey::new(time, self.sequence, from, to);
        self.queue.insert(
            key,
            Scheduled {
                from,
                to,
                message,
                deferred_since,
            },
        );
    }

    fn unblock(&mut self, link: Link) {
        self.blocked.remove(&link);
        self.stats.links_unblocked += 1;
        self.log
            .record(LogRecord::network(LogEvent::Unblock, self.now).link(link.0, link.1));
    }

    // ─── Stepping ───

    /// Process the earliest event.
    ///
    /// The handler receives the network so it can send replies.
    pub fn step<F>(&mut self, mut handler: F) -> StepOutcome
    where
        F: FnMut(&mut SimulatedNetwork, Delivery),
    {
        let Some((key, scheduled)) = self.queue.pop_first() else {
            self.now += 1;
            return StepOutcome::Idle;
        };
        self.now = key.time;

        let Scheduled {
            from,
            to,
            message,
            deferred_since,
        } = scheduled;

        let waiting_for_header = match &message {
            NetworkMessage::Body(body) => !self.headers_seen.contains(&(to, body.block_hash)),
            NetworkMessage::Header(header) => {
                self.headers_seen.insert((to, header.block_hash));
                false
            }
            NetworkMessage::Vote(_) => false,
        };

        if waiting_for_header {
            let since = deferred_since.unwrap_or(self.now);
            if self.now - since >= self.config.body_defer_deadline {
                debug!(from, to, height = message.height(), "Body missed its header deadline");
                self.stats.messages_dropped_causal += 1;
                self.log.record(
                    LogRecord::network(LogEvent::Drop, self.now)
                        .link(from, to)
                        .message(&message)
                        .reason(DropReason::CausalDeadline),
                );
                return StepOutcome::Dropped;
            }
            let retry_at = self.now + self.config.body_defer_ticks;
            self.stats.deferrals += 1;
            self.log.record(
                LogRecord::network(LogEvent::Defer, self.now)
                    .link(from, to)
                    .message(&message)
                    .until(retry_at),
            );
            self.schedule(retry_at, from, to, message, Some(since));
            return StepOutcome::Deferred;
        }

        self.stats.messages_delivered += 1;
        self.log.record(
            LogRecord::network(LogEvent::Deliver, self.now)
                .link(from, to)
                .message(&message),
        );
        let delivery = Delivery {
            time: self.now,
            from,
            to,
            message,
        };
        handler(self, delivery);

        self.unblock_expired();
        StepOutcome::Delivered
    }

    fn unblock_expired(&mut self) {
        let expired: Vec<Link> = self
            .blocked
            .iter()
            .filter(|(_, &until)| until <= self.now)
            .map(|(&link, _)| link)
            .collect();
        for link in expired {
            self.unblock(link);
        }
    }
}
