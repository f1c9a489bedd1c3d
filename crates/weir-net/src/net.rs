//! The workflow net: a bipartite graph of conditions and tasks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::element::{Condition, ConditionKind, Element, Flow, Task};
use crate::error::NetError;

/// The static graph for one workflow specification.
///
/// Immutable once built; share it as `Arc<Net>` across concurrently
/// executing cases. All runtime state lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
  pub id: String,
  pub name: String,
  conditions: HashMap<String, Condition>,
  tasks: HashMap<String, Task>,
  flows: HashMap<String, Flow>,
  /// Local variable declarations with their initial values.
  variables: HashMap<String, serde_json::Value>,
}

impl Net {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      conditions: HashMap::new(),
      tasks: HashMap::new(),
      flows: HashMap::new(),
      variables: HashMap::new(),
    }
  }

  pub fn add_condition(&mut self, condition: Condition) -> Result<(), NetError> {
    if self.conditions.contains_key(&condition.id) || self.tasks.contains_key(&condition.id) {
      return Err(NetError::DuplicateElement { id: condition.id });
    }
    self.conditions.insert(condition.id.clone(), condition);
    Ok(())
  }

  pub fn add_task(&mut self, task: Task) -> Result<(), NetError> {
    if self.conditions.contains_key(&task.id) || self.tasks.contains_key(&task.id) {
      return Err(NetError::DuplicateElement { id: task.id });
    }
    self.tasks.insert(task.id.clone(), task);
    Ok(())
  }

  /// Add a flow, appending it to both endpoints' pre/postset lists.
  ///
  /// Fails when either endpoint is absent from the net, or when the flow
  /// would connect two conditions or two tasks.
  pub fn add_flow(&mut self, flow: Flow) -> Result<(), NetError> {
    if self.flows.contains_key(&flow.id) {
      return Err(NetError::DuplicateFlow { id: flow.id });
    }

    let source_is_condition = self.conditions.contains_key(&flow.source);
    let source_is_task = self.tasks.contains_key(&flow.source);
    if !source_is_condition && !source_is_task {
      return Err(NetError::UnknownElement { id: flow.source });
    }

    let target_is_condition = self.conditions.contains_key(&flow.target);
    let target_is_task = self.tasks.contains_key(&flow.target);
    if !target_is_condition && !target_is_task {
      return Err(NetError::UnknownElement { id: flow.target });
    }

    if source_is_condition == target_is_condition {
      return Err(NetError::InvalidFlow {
        source_id: flow.source,
        target: flow.target,
      });
    }

    if source_is_condition {
      self
        .conditions
        .get_mut(&flow.source)
        .expect("source checked above")
        .postset
        .push(flow.id.clone());
      self
        .tasks
        .get_mut(&flow.target)
        .expect("target checked above")
        .preset
        .push(flow.id.clone());
    } else {
      self
        .tasks
        .get_mut(&flow.source)
        .expect("source checked above")
        .postset
        .push(flow.id.clone());
      self
        .conditions
        .get_mut(&flow.target)
        .expect("target checked above")
        .preset
        .push(flow.id.clone());
    }

    self.flows.insert(flow.id.clone(), flow);
    Ok(())
  }

  /// Declare a local variable with its initial value.
  pub fn declare_variable(&mut self, name: impl Into<String>, initial: serde_json::Value) {
    self.variables.insert(name.into(), initial);
  }

  pub fn condition(&self, id: &str) -> Option<&Condition> {
    self.conditions.get(id)
  }

  pub fn task(&self, id: &str) -> Option<&Task> {
    self.tasks.get(id)
  }

  pub fn flow(&self, id: &str) -> Option<&Flow> {
    self.flows.get(id)
  }

  /// Resolve an id to its element; `None` when the id is unknown.
  pub fn element(&self, id: &str) -> Option<Element<'_>> {
    if let Some(condition) = self.conditions.get(id) {
      return Some(Element::Condition(condition));
    }
    self.tasks.get(id).map(Element::Task)
  }

  pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
    self.conditions.values()
  }

  pub fn tasks(&self) -> impl Iterator<Item = &Task> {
    self.tasks.values()
  }

  pub fn flows(&self) -> impl Iterator<Item = &Flow> {
    self.flows.values()
  }

  pub fn variables(&self) -> &HashMap<String, serde_json::Value> {
    &self.variables
  }

  /// Elements feeding into `id`, in flow declaration order.
  pub fn preset_elements(&self, id: &str) -> Vec<Element<'_>> {
    let flow_ids = match self.element(id) {
      Some(Element::Condition(condition)) => &condition.preset,
      Some(Element::Task(task)) => &task.preset,
      None => return Vec::new(),
    };
    flow_ids
      .iter()
      .filter_map(|flow_id| self.flows.get(flow_id))
      .filter_map(|flow| self.element(&flow.source))
      .collect()
  }

  /// Elements fed by `id`, in flow declaration order.
  pub fn postset_elements(&self, id: &str) -> Vec<Element<'_>> {
    let flow_ids = match self.element(id) {
      Some(Element::Condition(condition)) => &condition.postset,
      Some(Element::Task(task)) => &task.postset,
      None => return Vec::new(),
    };
    flow_ids
      .iter()
      .filter_map(|flow_id| self.flows.get(flow_id))
      .filter_map(|flow| self.element(&flow.target))
      .collect()
  }

  /// The conditions in a task's preset, in flow declaration order.
  pub fn task_preset_conditions(&self, task: &Task) -> Vec<&Condition> {
    task
      .preset
      .iter()
      .filter_map(|flow_id| self.flows.get(flow_id))
      .filter_map(|flow| self.conditions.get(&flow.source))
      .collect()
  }

  /// The conditions in a task's postset, in flow declaration order.
  pub fn task_postset_conditions(&self, task: &Task) -> Vec<&Condition> {
    task
      .postset
      .iter()
      .filter_map(|flow_id| self.flows.get(flow_id))
      .filter_map(|flow| self.conditions.get(&flow.target))
      .collect()
  }

  /// The designated input condition.
  pub fn input_condition(&self) -> Result<&Condition, NetError> {
    self
      .conditions
      .values()
      .find(|condition| condition.kind == ConditionKind::Input)
      .ok_or(NetError::MissingInputCondition)
  }

  /// The designated output condition.
  pub fn output_condition(&self) -> Result<&Condition, NetError> {
    self
      .conditions
      .values()
      .find(|condition| condition.kind == ConditionKind::Output)
      .ok_or(NetError::MissingOutputCondition)
  }

  /// A net is executable iff it has exactly one input condition, exactly
  /// one output condition, and at least one task.
  pub fn is_valid(&self) -> bool {
    let inputs = self
      .conditions
      .values()
      .filter(|condition| condition.kind == ConditionKind::Input)
      .count();
    let outputs = self
      .conditions
      .values()
      .filter(|condition| condition.kind == ConditionKind::Output)
      .count();
    inputs == 1 && outputs == 1 && !self.tasks.is_empty()
  }
}
