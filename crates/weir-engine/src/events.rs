//! Case events and notifiers.
//!
//! Events are emitted as a case moves through its lifecycle so consumers
//! can persist them, stream them to a UI, or ignore them entirely.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted while a case executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaseEvent {
  /// The case has started running.
  CaseStarted { case_id: String, net_id: String },

  /// A task's join condition became satisfied.
  TaskEnabled { case_id: String, task_id: String },

  /// A task consumed its input tokens and fired.
  TaskFired { case_id: String, task_id: String },

  /// A multi-instance task reached its completion condition.
  InstancesCompleted { case_id: String, task_id: String },

  /// The output condition is marked and nothing remains enabled.
  CaseCompleted { case_id: String },

  /// The case was cancelled from outside.
  CaseCancelled { case_id: String },
}

/// Trait for receiving case events.
///
/// The runner calls `notify` for each event - implementations decide what
/// to do with them (persist, broadcast, log, ignore, etc.).
pub trait EventNotifier: Send + Sync {
  /// Called when a case event occurs.
  fn notify(&self, event: CaseEvent);
}

/// A no-op notifier that discards all events.
///
/// Useful for tests or when event observation is not needed.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
  fn notify(&self, _event: CaseEvent) {
    // Intentionally empty
  }
}

/// A notifier that sends events to an unbounded channel.
///
/// Use this when a persistence or audit collaborator consumes events
/// asynchronously.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // NOTE: Unbounded so `fire` stays non-blocking even when the consumer is
  // slow. The volume is one event per state transition, so memory growth is
  // unlikely in practice; switch to try_send on a bounded channel if a
  // deployment proves otherwise.
  sender: mpsc::UnboundedSender<CaseEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<CaseEvent>) -> Self {
    Self { sender }
  }
}

impl EventNotifier for ChannelNotifier {
  fn notify(&self, event: CaseEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
