//! OR-join enablement analysis.
//!
//! An OR-join task may fire once at least one of its preset conditions is
//! marked and no unmarked preset can still receive a token along an active
//! path that does not run through the join itself. Deciding that exactly is
//! undecidable for unbounded cyclic nets, so the analysis is relative to the
//! current marking: forward reachability from every marked condition, with
//! the candidate join excluded from traversal. The approximation errs
//! towards blocking - a join held back too long is recoverable, a join fired
//! before synchronization is complete is not.

use std::collections::{BTreeSet, HashMap, HashSet};

use weir_net::{Element, Net, Task};

use crate::marking::Marking;

/// Outcome of analysing one OR-join task under one marking.
#[derive(Debug, Clone, PartialEq)]
pub struct OrJoinAnalysis {
  pub enabled: bool,
  /// Preset conditions holding at least one token.
  pub marked_presets: Vec<String>,
  /// Preset conditions currently empty.
  pub unmarked_presets: Vec<String>,
  /// Unmarked presets still reachable from the current marking.
  pub blocked_by: BTreeSet<String>,
}

/// Case-scoped reachability analyzer with a marking-lifetime memo.
///
/// Owned by the runner of a single case, never shared. The memo is only
/// valid for the marking it was computed under; the runner clears it after
/// every fire.
#[derive(Debug, Default)]
pub struct OrJoinAnalyzer {
  /// (or-join task id, source condition id) -> conditions reachable from
  /// the source without traversing the or-join task.
  reachable: HashMap<(String, String), HashSet<String>>,
}

impl OrJoinAnalyzer {
  pub fn new() -> Self {
    Self::default()
  }

  /// Drop every memoised reachability result. Must be called whenever the
  /// marking changes.
  pub fn clear_cache(&mut self) {
    self.reachable.clear();
  }

  /// Decide enablement of `task` (an OR-join) under `marking`.
  pub fn analyze(&mut self, net: &Net, task: &Task, marking: &Marking) -> OrJoinAnalysis {
    let mut marked_presets = Vec::new();
    let mut unmarked_presets = Vec::new();
    for condition in net.task_preset_conditions(task) {
      if marking.is_marked(&condition.id) {
        marked_presets.push(condition.id.clone());
      } else {
        unmarked_presets.push(condition.id.clone());
      }
    }

    // Nothing to synchronize yet; a join with no presets is never enabled.
    if marked_presets.is_empty() {
      return OrJoinAnalysis {
        enabled: false,
        marked_presets,
        unmarked_presets,
        blocked_by: BTreeSet::new(),
      };
    }

    // Full synchronization already present.
    if unmarked_presets.is_empty() {
      return OrJoinAnalysis {
        enabled: true,
        marked_presets,
        unmarked_presets,
        blocked_by: BTreeSet::new(),
      };
    }

    // An unmarked preset blocks the join if any currently marked condition
    // anywhere in the net can still feed it. Searching from the full
    // marking rather than the join's own presets over-approximates on
    // purpose.
    let sources: Vec<String> = marking
      .marked_conditions()
      .into_iter()
      .map(str::to_string)
      .collect();
    let mut blocked_by = BTreeSet::new();
    for target in &unmarked_presets {
      for source in &sources {
        if self.reachable_from(net, task, source).contains(target) {
          blocked_by.insert(target.clone());
          break;
        }
      }
    }

    OrJoinAnalysis {
      enabled: blocked_by.is_empty(),
      marked_presets,
      unmarked_presets,
      blocked_by,
    }
  }

  fn reachable_from(&mut self, net: &Net, or_join: &Task, source: &str) -> &HashSet<String> {
    self
      .reachable
      .entry((or_join.id.clone(), source.to_string()))
      .or_insert_with(|| compute_reachable(net, or_join, source))
  }
}

/// Forward reachability from `source`, skipping `or_join`.
///
/// Iterative worklist with an explicit visited set; cycles and maliciously
/// deep nets cannot overflow the stack.
fn compute_reachable(net: &Net, or_join: &Task, source: &str) -> HashSet<String> {
  let mut reachable = HashSet::new();
  let mut visited = HashSet::new();
  let mut stack = vec![source.to_string()];
  visited.insert(source.to_string());

  while let Some(element_id) = stack.pop() {
    for element in net.postset_elements(&element_id) {
      match element {
        Element::Task(task) => {
          // The join's own firing does not count as a path to itself.
          if task.id == or_join.id {
            continue;
          }
          if visited.insert(task.id.clone()) {
            stack.push(task.id.clone());
          }
        }
        Element::Condition(condition) => {
          reachable.insert(condition.id.clone());
          if visited.insert(condition.id.clone()) {
            stack.push(condition.id.clone());
          }
        }
      }
    }
  }

  reachable
}
