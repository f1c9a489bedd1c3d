//! Engine errors.

use weir_net::NetError;

use crate::runner::CaseState;

/// Errors that can occur while executing a case.
///
/// Enablement errors (`TaskNotEnabled`, `NoSplitBranch`) leave the case's
/// marking unchanged; callers re-check `enabled_tasks()` and retry with
/// corrected input. Structural errors are fatal to the operation that
/// raised them and are never silently corrected.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// Task not found in the net.
  #[error("task '{task_id}' not found in net")]
  UnknownTask { task_id: String },

  /// The task's join condition is not satisfied under the current marking.
  #[error("task '{task_id}' is not enabled under the current marking")]
  TaskNotEnabled { task_id: String },

  /// No outgoing flow of an XOR/OR split matched its predicate.
  #[error("no outgoing flow of task '{task_id}' matched its predicate")]
  NoSplitBranch { task_id: String },

  /// The case is not in the state the operation requires.
  #[error("case '{case_id}' is not running (state: {state})")]
  CaseNotRunning { case_id: String, state: CaseState },

  /// `start` was called on a case that already left `Created`.
  #[error("case '{case_id}' already started (state: {state})")]
  AlreadyStarted { case_id: String, state: CaseState },

  /// Internal invariant breach: a consume hit an unmarked condition.
  #[error("condition '{condition_id}' has no token to consume")]
  NoTokenToConsume { condition_id: String },

  /// The task carries no multi-instance attributes.
  #[error("task '{task_id}' is not a multi-instance task")]
  NotMultiInstance { task_id: String },

  /// No instances have been spawned for the task in this case.
  #[error("task '{task_id}' has no spawned instances")]
  InstancesNotSpawned { task_id: String },

  /// A completion was reported with no instance left running.
  #[error("task '{task_id}' has no running instance to complete")]
  NoRunningInstance { task_id: String },

  /// Resolved instance bounds are inverted.
  #[error("invalid instance bounds for task '{task_id}': minimum {minimum} > maximum {maximum}")]
  InvalidMiBounds {
    task_id: String,
    minimum: u32,
    maximum: u32,
  },

  /// Resolved threshold falls outside the instance bounds.
  #[error("threshold {threshold} for task '{task_id}' outside [{minimum}, {maximum}]")]
  InvalidThreshold {
    task_id: String,
    threshold: u32,
    minimum: u32,
    maximum: u32,
  },

  /// Instances of a STATIC task are fixed at spawn time.
  #[error("task '{task_id}' uses static creation; instances are fixed at spawn")]
  StaticCreation { task_id: String },

  /// A DYNAMIC task is already at its instance maximum.
  #[error("task '{task_id}' already has its maximum of {maximum} instances")]
  MaxInstancesReached { task_id: String, maximum: u32 },

  /// A predicate or count query failed to compile or evaluate.
  #[error("failed to evaluate expression '{expression}'")]
  Expression {
    expression: String,
    #[source]
    source: minijinja::Error,
  },

  /// An expression evaluated to a value of the wrong type.
  #[error("expression '{expression}' did not produce {expected}")]
  ExpressionType {
    expression: String,
    expected: &'static str,
  },

  #[error(transparent)]
  Net(#[from] NetError),
}
