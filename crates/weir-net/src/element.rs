//! Net elements: conditions, tasks, and the flows connecting them.

use serde::{Deserialize, Serialize};

/// Role of a condition within its net.
///
/// Every valid net has exactly one `Input` and exactly one `Output`
/// condition; everything else is `Ordinary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
  Input,
  Output,
  Ordinary,
}

/// A place holding zero or more tokens at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
  pub id: String,
  pub name: Option<String>,
  pub kind: ConditionKind,
  /// Incoming flow ids, in declaration order.
  pub preset: Vec<String>,
  /// Outgoing flow ids, in declaration order.
  pub postset: Vec<String>,
}

impl Condition {
  pub fn new(id: impl Into<String>, kind: ConditionKind) -> Self {
    Self {
      id: id.into(),
      name: None,
      kind,
      preset: Vec::new(),
      postset: Vec::new(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }
}

/// Join behaviour of a task: how its incoming flows synchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
  /// Wait for a token on every preset condition.
  And,
  /// Fire on a token in any single preset condition.
  Xor,
  /// Fire once every preset token that can still arrive has arrived
  /// (reachability-checked by the engine).
  Or,
}

/// Split behaviour of a task: which outgoing flows fire on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitType {
  /// Activate every outgoing flow.
  And,
  /// Activate exactly one outgoing flow, chosen by predicate in
  /// declaration order.
  Xor,
  /// Activate every outgoing flow whose predicate matches (at least one).
  Or,
}

/// How instances of a multi-instance task are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreationMode {
  /// The instance count is fixed when the task fires.
  Static,
  /// Further instances may be added while the task runs, up to the maximum.
  Dynamic,
}

/// When a multi-instance task counts as complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionMode {
  /// Every spawned instance must complete.
  All,
  /// A configured number of completions suffices.
  Threshold,
}

/// An instance-count bound: a literal, or a query evaluated against case
/// data when instances are spawned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CountSpec {
  Literal(u32),
  Query(String),
}

/// Instance bounds and modes for a multi-instance task.
///
/// These are static configuration; the live per-case counters are tracked
/// by the engine's instance manager, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiInstanceAttributes {
  pub minimum: CountSpec,
  pub maximum: CountSpec,
  pub threshold: CountSpec,
  pub creation: CreationMode,
  pub completion: CompletionMode,
}

/// A transition of the net.
///
/// Split and join types are immutable once the net is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub id: String,
  pub name: String,
  pub join: JoinType,
  pub split: SplitType,
  /// Incoming flow ids, in declaration order.
  pub preset: Vec<String>,
  /// Outgoing flow ids, in declaration order.
  pub postset: Vec<String>,
  /// Sub-net this task invokes, if it decomposes.
  pub decomposition: Option<String>,
  pub multi_instance: Option<MultiInstanceAttributes>,
  /// Element ids whose tokens are removed whenever this task fires.
  pub cancellation_set: Vec<String>,
}

impl Task {
  pub fn new(id: impl Into<String>, join: JoinType, split: SplitType) -> Self {
    let id = id.into();
    Self {
      name: id.clone(),
      id,
      join,
      split,
      preset: Vec::new(),
      postset: Vec::new(),
      decomposition: None,
      multi_instance: None,
      cancellation_set: Vec::new(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_decomposition(mut self, net_id: impl Into<String>) -> Self {
    self.decomposition = Some(net_id.into());
    self
  }

  pub fn with_multi_instance(mut self, attributes: MultiInstanceAttributes) -> Self {
    self.multi_instance = Some(attributes);
    self
  }

  pub fn with_cancellation_set(mut self, element_ids: Vec<String>) -> Self {
    self.cancellation_set = element_ids;
    self
  }

  pub fn is_multi_instance(&self) -> bool {
    self.multi_instance.is_some()
  }
}

/// A directed arc between a condition and a task (or vice versa).
///
/// The net is bipartite; a flow never connects two conditions or two tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
  pub id: String,
  pub source: String,
  pub target: String,
  /// Guard for XOR/OR splits, evaluated against case data.
  /// A flow without a predicate always matches.
  pub predicate: Option<String>,
}

impl Flow {
  pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      source: source.into(),
      target: target.into(),
      predicate: None,
    }
  }

  pub fn with_predicate(mut self, expression: impl Into<String>) -> Self {
    self.predicate = Some(expression.into());
    self
  }
}

/// A lookup result resolving an element id to its concrete kind.
#[derive(Debug, Clone, Copy)]
pub enum Element<'a> {
  Condition(&'a Condition),
  Task(&'a Task),
}

impl<'a> Element<'a> {
  pub fn id(&self) -> &'a str {
    match self {
      Element::Condition(condition) => &condition.id,
      Element::Task(task) => &task.id,
    }
  }

  pub fn is_condition(&self) -> bool {
    matches!(self, Element::Condition(_))
  }

  pub fn is_task(&self) -> bool {
    matches!(self, Element::Task(_))
  }
}
