//! Structured, deterministic audit log.
//!
//! One JSON object per line. Field order is the declaration order of
//! [`LogRecord`] and absent fields are omitted, so two runs with the same
//! seed and parameters produce byte-identical logs.

use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tendersim_messages::{MessageKind, NetworkMessage};
use tendersim_node::NodeIndex;
use tendersim_types::{Hash, ValidatorId, VotePhase};
use thiserror::Error;

/// Failure writing the audit log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to write event log: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Which part of the simulation emitted a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Network,
    Simulator,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogEvent {
    Send,
    Dup,
    Drop,
    Deliver,
    Defer,
    Block,
    Unblock,
    ProposeBlock,
    HeightFinalized,
    HeightStalled,
}

/// Why a message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The link was blocked by the rate limiter.
    LinkBlocked,
    /// Simulated packet loss.
    Loss,
    /// A body's header did not arrive before the deferral deadline.
    CausalDeadline,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub component: Component,
    pub event: LogEvent,
    pub time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NodeIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NodeIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<Hash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<VotePhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voter: Option<ValidatorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposer: Option<ValidatorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<Hash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DropReason>,
}

impl LogRecord {
    fn new(component: Component, event: LogEvent, time: u64) -> Self {
        Self {
            component,
            event,
            time,
            from: None,
            to: None,
            kind: None,
            height: None,
            block_hash: None,
            phase: None,
            voter: None,
            proposer: None,
            parent_hash: None,
            delay: None,
            until: None,
            reason: None,
        }
    }

    pub fn network(event: LogEvent, time: u64) -> Self {
        Self::new(Component::Network, event, time)
    }

    pub fn simulator(event: LogEvent, time: u64) -> Self {
        Self::new(Component::Simulator, event, time)
    }

    pub fn link(mut self, from: NodeIndex, to: NodeIndex) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Fill in the message identifiers.
    pub fn message(mut self, message: &NetworkMessage) -> Self {
        self.kind = Some(message.kind());
        self.height = Some(message.height());
        self.block_hash = Some(message.block_hash());
        if let NetworkMessage::Vote(gossip) = message {
            self.phase = Some(gossip.vote.phase);
            self.voter = Some(gossip.vote.validator);
        }
        self
    }

    pub fn height(mut self, height: u64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn block_hash(mut self, hash: Hash) -> Self {
        self.block_hash = Some(hash);
        self
    }

    pub fn proposer(mut self, proposer: ValidatorId) -> Self {
        self.proposer = Some(proposer);
        self
    }

    pub fn parent_hash(mut self, hash: Hash) -> Self {
        self.parent_hash = Some(hash);
        self
    }

    pub fn delay(mut self, delay: u64) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn until(mut self, until: u64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn reason(mut self, reason: DropReason) -> Self {
        self.reason = Some(reason);
        self
    }
}

/// Append-only audit log scoped to one simulation run.
///
/// Lines are always kept in memory. An optional sink receives each line as
/// it is recorded. Recording never fails; the first sink error is kept and
/// returned by [`flush`](Self::flush) or [`finish`](Self::finish).
pub struct EventLog {
    lines: Vec<String>,
    sink: Option<Box<dyn Write + Send>>,
    error: Option<LogError>,
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("lines", &self.lines.len())
            .field("has_sink", &self.sink.is_some())
            .field("error", &self.error)
            .finish()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl EventLog {
    pub fn in_memory() -> Self {
        Self {
            lines: Vec::new(),
            sink: None,
            error: None,
        }
    }

    /// Also stream every line to `sink`.
    pub fn with_sink(sink: impl Write + Send + 'static) -> Self {
        Self {
            lines: Vec::new(),
            sink: Some(Box::new(sink)),
            error: None,
        }
    }

    /// Stream to a newly created (or truncated) file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let file = File::create(path)?;
        Ok(Self::with_sink(BufWriter::new(file)))
    }

    pub fn record(&mut self, record: LogRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                self.error.get_or_insert(LogError::Serialize(e));
                return;
            }
        };
        if self.error.is_none() {
            if let Some(sink) = self.sink.as_mut() {
                if let Err(e) = writeln!(sink, "{line}") {
                    self.error = Some(LogError::Io(e));
                }
            }
        }
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All lines joined with `\n`.
    pub fn contents(&self) -> String {
        self.lines.join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Flush the sink, reporting any error latched since the last flush.
    pub fn flush(&mut self) -> Result<(), LogError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Flush and close the sink, returning the recorded lines.
    pub fn finish(mut self) -> Result<Vec<String>, LogError> {
        self.flush()?;
        self.sink = None;
        Ok(self.lines)
    }
}
