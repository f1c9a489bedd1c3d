//! Multi-instance task state for one running case.
//!
//! The static bounds live on the task; everything here is per-case and
//! created the moment the task fires. Bounds and threshold are validated at
//! spawn time so misconfiguration is caught before any instance runs.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use weir_net::{CompletionMode, CreationMode, Task};

use crate::error::EngineError;
use crate::predicate::PredicateEvaluator;

/// Live instance counters for one multi-instance task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceCounters {
  pub spawned: u32,
  pub completed: u32,
  pub minimum: u32,
  pub maximum: u32,
  pub threshold: u32,
  pub creation: CreationMode,
  pub completion: CompletionMode,
}

impl InstanceCounters {
  /// Whether the task's completion mode is satisfied.
  pub fn satisfied(&self) -> bool {
    match self.completion {
      CompletionMode::All => self.completed == self.spawned,
      CompletionMode::Threshold => self.completed >= self.threshold,
    }
  }

  pub fn running(&self) -> u32 {
    self.spawned - self.completed
  }
}

/// Tracks instance counts per multi-instance task for a single case.
///
/// Satisfaction is reported, never enforced: remaining instances keep
/// running until the runner decides otherwise.
#[derive(Debug, Default)]
pub struct MultiInstanceManager {
  tasks: HashMap<String, InstanceCounters>,
}

impl MultiInstanceManager {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn counters(&self, task_id: &str) -> Option<&InstanceCounters> {
    self.tasks.get(task_id)
  }

  /// Resolve the task's instance bounds against the case data and create
  /// the initial instances. Returns how many were spawned.
  pub fn spawn(
    &mut self,
    task: &Task,
    case_data: &Value,
    evaluator: &PredicateEvaluator,
  ) -> Result<u32, EngineError> {
    let attributes = task
      .multi_instance
      .as_ref()
      .ok_or_else(|| EngineError::NotMultiInstance {
        task_id: task.id.clone(),
      })?;

    let minimum = evaluator.resolve_count(&attributes.minimum, case_data)?;
    let maximum = evaluator.resolve_count(&attributes.maximum, case_data)?;
    if minimum > maximum {
      return Err(EngineError::InvalidMiBounds {
        task_id: task.id.clone(),
        minimum,
        maximum,
      });
    }

    let threshold = evaluator.resolve_count(&attributes.threshold, case_data)?;
    if threshold < minimum || threshold > maximum {
      return Err(EngineError::InvalidThreshold {
        task_id: task.id.clone(),
        threshold,
        minimum,
        maximum,
      });
    }

    let counters = InstanceCounters {
      spawned: minimum,
      completed: 0,
      minimum,
      maximum,
      threshold,
      creation: attributes.creation,
      completion: attributes.completion,
    };
    debug!(
      task_id = %task.id,
      spawned = minimum,
      maximum,
      threshold,
      "instances_spawned"
    );
    self.tasks.insert(task.id.clone(), counters);
    Ok(minimum)
  }

  /// Add one instance to a DYNAMIC task that has already spawned. Returns
  /// the new spawned count.
  pub fn add_instance(&mut self, task_id: &str) -> Result<u32, EngineError> {
    let counters =
      self
        .tasks
        .get_mut(task_id)
        .ok_or_else(|| EngineError::InstancesNotSpawned {
          task_id: task_id.to_string(),
        })?;
    if counters.creation == CreationMode::Static {
      return Err(EngineError::StaticCreation {
        task_id: task_id.to_string(),
      });
    }
    if counters.spawned >= counters.maximum {
      return Err(EngineError::MaxInstancesReached {
        task_id: task_id.to_string(),
        maximum: counters.maximum,
      });
    }
    counters.spawned += 1;
    Ok(counters.spawned)
  }

  /// Record one instance completion. Returns whether the task's completion
  /// mode is now satisfied.
  pub fn record_completion(&mut self, task_id: &str) -> Result<bool, EngineError> {
    let counters =
      self
        .tasks
        .get_mut(task_id)
        .ok_or_else(|| EngineError::InstancesNotSpawned {
          task_id: task_id.to_string(),
        })?;
    if counters.completed >= counters.spawned {
      return Err(EngineError::NoRunningInstance {
        task_id: task_id.to_string(),
      });
    }
    counters.completed += 1;
    Ok(counters.satisfied())
  }

  /// Drop the remaining running instances of a task, fixing its spawned
  /// count at what has completed. Returns how many were cancelled.
  pub fn cancel_remaining(&mut self, task_id: &str) -> u32 {
    match self.tasks.get_mut(task_id) {
      Some(counters) => {
        let cancelled = counters.running();
        counters.spawned = counters.completed;
        cancelled
      }
      None => 0,
    }
  }

  /// Forget a task's instance state entirely (cancellation regions).
  pub fn remove(&mut self, task_id: &str) -> Option<InstanceCounters> {
    self.tasks.remove(task_id)
  }

  pub fn is_spawned(&self, task_id: &str) -> bool {
    self.tasks.contains_key(task_id)
  }

  /// Snapshot for external checkpointing. Deterministic ordering.
  pub fn export(&self) -> BTreeMap<String, InstanceCounters> {
    self
      .tasks
      .iter()
      .map(|(id, counters)| (id.clone(), *counters))
      .collect()
  }

  /// Rebuild instance state from a snapshot.
  pub fn import(snapshot: BTreeMap<String, InstanceCounters>) -> Self {
    Self {
      tasks: snapshot.into_iter().collect(),
    }
  }
}
