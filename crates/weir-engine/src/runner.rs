//! Case execution.
//!
//! One `NetRunner` owns the marking and instance state for a single case.
//! Every mutation goes through `&mut self`, so a case is single-writer by
//! construction; callers serialize access per case and run as many cases in
//! parallel as they like against the shared `Arc<Net>`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use weir_net::{JoinType, Net, NetError, Task};

use crate::error::EngineError;
use crate::events::{CaseEvent, EventNotifier, NoopNotifier};
use crate::marking::Marking;
use crate::multi_instance::{InstanceCounters, MultiInstanceManager};
use crate::orjoin::OrJoinAnalyzer;
use crate::predicate::PredicateEvaluator;
use crate::split::{evaluate_join, evaluate_split};

/// Lifecycle of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseState {
  Created,
  Running,
  Completed,
  Cancelled,
}

impl fmt::Display for CaseState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match self {
      CaseState::Created => "created",
      CaseState::Running => "running",
      CaseState::Completed => "completed",
      CaseState::Cancelled => "cancelled",
    };
    write!(f, "{}", state)
  }
}

/// Per-case execution policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
  /// Cancel the remaining running instances of a multi-instance task once
  /// its threshold is reached.
  pub cancel_remaining_on_threshold: bool,
}

/// Serializable snapshot of one case for external checkpointing.
///
/// The on-disk format belongs to the persistence collaborator; this is just
/// the state it needs to capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSnapshot {
  pub case_id: String,
  pub state: CaseState,
  pub marking: BTreeMap<String, u32>,
  pub instances: BTreeMap<String, InstanceCounters>,
}

/// Executes one case of a net.
///
/// Generic over `N: EventNotifier` to allow different notification
/// strategies. Use `NetRunner::new()` for a runner that discards events, or
/// `NetRunner::with_notifier()` to observe them.
pub struct NetRunner<N: EventNotifier = NoopNotifier> {
  case_id: String,
  net: Arc<Net>,
  config: RunnerConfig,
  state: CaseState,
  marking: Marking,
  analyzer: OrJoinAnalyzer,
  instances: MultiInstanceManager,
  evaluator: PredicateEvaluator,
  notifier: N,
  /// Tasks already reported enabled, so `TaskEnabled` fires once per
  /// enablement.
  reported_enabled: HashSet<String>,
}

impl NetRunner<NoopNotifier> {
  /// Create a runner for a new case with no-op notifications.
  pub fn new(net: Arc<Net>) -> Result<Self, EngineError> {
    Self::with_notifier(net, RunnerConfig::default(), NoopNotifier)
  }
}

impl<N: EventNotifier> NetRunner<N> {
  /// Create a runner for a new case with a custom notifier.
  ///
  /// The initial marking is a single token on the net's input condition.
  /// The net is assumed to have passed `is_valid()` at load time; enablement
  /// results against an invalid net are undefined.
  pub fn with_notifier(net: Arc<Net>, config: RunnerConfig, notifier: N) -> Result<Self, EngineError> {
    let input_id = net.input_condition()?.id.clone();
    Ok(Self {
      case_id: uuid::Uuid::new_v4().to_string(),
      net,
      config,
      state: CaseState::Created,
      marking: Marking::with_token(input_id),
      analyzer: OrJoinAnalyzer::new(),
      instances: MultiInstanceManager::new(),
      evaluator: PredicateEvaluator::new(),
      notifier,
      reported_enabled: HashSet::new(),
    })
  }

  pub fn case_id(&self) -> &str {
    &self.case_id
  }

  pub fn state(&self) -> CaseState {
    self.state
  }

  pub fn marking(&self) -> &Marking {
    &self.marking
  }

  pub fn net(&self) -> &Net {
    &self.net
  }

  /// Live instance counters for a multi-instance task, if it has spawned.
  pub fn instance_counters(&self, task_id: &str) -> Option<&InstanceCounters> {
    self.instances.counters(task_id)
  }

  /// Start the case: `Created` -> `Running`.
  pub fn start(&mut self) -> Result<(), EngineError> {
    if self.state != CaseState::Created {
      return Err(EngineError::AlreadyStarted {
        case_id: self.case_id.clone(),
        state: self.state,
      });
    }
    self.state = CaseState::Running;
    info!(case_id = %self.case_id, net_id = %self.net.id, "case_started");
    self.notifier.notify(CaseEvent::CaseStarted {
      case_id: self.case_id.clone(),
      net_id: self.net.id.clone(),
    });
    self.report_enabled();
    Ok(())
  }

  /// Every task whose join condition is satisfied under the current
  /// marking, sorted by id. Idempotent between fires.
  pub fn enabled_tasks(&mut self) -> Vec<String> {
    if self.state != CaseState::Running {
      return Vec::new();
    }
    self.compute_enabled()
  }

  /// Fire a completed task: consume its preset tokens and apply its split.
  ///
  /// Multi-instance tasks spawn their instances here instead of producing
  /// postset tokens; production happens in `complete_instance` once the
  /// completion mode is satisfied. All fallible evaluation runs before any
  /// token moves, so an error leaves the marking untouched.
  pub fn fire(&mut self, task_id: &str, case_data: &Value) -> Result<(), EngineError> {
    self.ensure_running()?;
    let net = Arc::clone(&self.net);
    let task = net.task(task_id).ok_or_else(|| EngineError::UnknownTask {
      task_id: task_id.to_string(),
    })?;

    if !evaluate_join(&net, task, &self.marking, &mut self.analyzer) {
      return Err(EngineError::TaskNotEnabled {
        task_id: task_id.to_string(),
      });
    }

    let to_consume = self.consumption_plan(&net, task);
    let produced_flows = if task.is_multi_instance() {
      self.instances.spawn(task, case_data, &self.evaluator)?;
      None
    } else {
      Some(evaluate_split(&net, task, case_data, &self.evaluator)?)
    };

    for condition_id in &to_consume {
      self.marking.consume(condition_id)?;
    }

    if let Some(flow_ids) = produced_flows {
      for flow_id in &flow_ids {
        let flow = net.flow(flow_id).ok_or_else(|| {
          EngineError::Net(NetError::UnknownElement {
            id: flow_id.clone(),
          })
        })?;
        self.marking.produce(&flow.target);
      }
    }

    self.apply_cancellation_set(task);
    self.analyzer.clear_cache();

    info!(case_id = %self.case_id, task_id = %task_id, "task_fired");
    self.notifier.notify(CaseEvent::TaskFired {
      case_id: self.case_id.clone(),
      task_id: task_id.to_string(),
    });

    self.report_enabled();
    self.check_completion();
    Ok(())
  }

  /// Add one instance to a running DYNAMIC multi-instance task.
  pub fn add_instance(&mut self, task_id: &str) -> Result<u32, EngineError> {
    self.ensure_running()?;
    if self.net.task(task_id).is_none() {
      return Err(EngineError::UnknownTask {
        task_id: task_id.to_string(),
      });
    }
    self.instances.add_instance(task_id)
  }

  /// Record the completion of one instance of a multi-instance task.
  ///
  /// Returns whether the task's completion mode is satisfied. On the
  /// satisfying completion the task's split runs and its postset tokens are
  /// produced; later completions of still-running instances are counted but
  /// produce nothing further.
  pub fn complete_instance(&mut self, task_id: &str, case_data: &Value) -> Result<bool, EngineError> {
    self.ensure_running()?;
    let net = Arc::clone(&self.net);
    let task = net.task(task_id).ok_or_else(|| EngineError::UnknownTask {
      task_id: task_id.to_string(),
    })?;
    if !task.is_multi_instance() {
      return Err(EngineError::NotMultiInstance {
        task_id: task_id.to_string(),
      });
    }

    let already_satisfied = self
      .instances
      .counters(task_id)
      .map(InstanceCounters::satisfied)
      .unwrap_or(false);

    // Evaluate the split before recording anything so a failed predicate
    // leaves both the counters and the marking untouched.
    let flow_ids = if already_satisfied {
      Vec::new()
    } else {
      evaluate_split(&net, task, case_data, &self.evaluator)?
    };
    let satisfied = self.instances.record_completion(task_id)?;

    if satisfied && !already_satisfied {
      for flow_id in &flow_ids {
        let flow = net.flow(flow_id).ok_or_else(|| {
          EngineError::Net(NetError::UnknownElement {
            id: flow_id.clone(),
          })
        })?;
        self.marking.produce(&flow.target);
      }

      if self.config.cancel_remaining_on_threshold {
        let cancelled = self.instances.cancel_remaining(task_id);
        if cancelled > 0 {
          debug!(
            case_id = %self.case_id,
            task_id = %task_id,
            cancelled,
            "remaining_instances_cancelled"
          );
        }
      }

      self.apply_cancellation_set(task);
      self.analyzer.clear_cache();

      info!(case_id = %self.case_id, task_id = %task_id, "instances_completed");
      self.notifier.notify(CaseEvent::InstancesCompleted {
        case_id: self.case_id.clone(),
        task_id: task_id.to_string(),
      });

      self.report_enabled();
      self.check_completion();
    }

    Ok(satisfied)
  }

  /// Cancel the case: remove all tokens from the region's conditions and
  /// drop instance state for the region's tasks.
  ///
  /// Immediate and unconditional; the case ends in `Cancelled` regardless
  /// of what the region contains.
  pub fn cancel(&mut self, region: &[String]) -> Result<(), EngineError> {
    self.ensure_running()?;

    let removed = self
      .marking
      .clear_region(region.iter().map(String::as_str));
    for element_id in region {
      self.instances.remove(element_id);
    }
    self.analyzer.clear_cache();
    self.state = CaseState::Cancelled;

    warn!(
      case_id = %self.case_id,
      removed_tokens = removed,
      "case_cancelled"
    );
    self.notifier.notify(CaseEvent::CaseCancelled {
      case_id: self.case_id.clone(),
    });
    Ok(())
  }

  /// Capture the case for external checkpointing.
  pub fn snapshot(&self) -> CaseSnapshot {
    CaseSnapshot {
      case_id: self.case_id.clone(),
      state: self.state,
      marking: self.marking.export(),
      instances: self.instances.export(),
    }
  }

  /// Replace the case's state with a snapshot taken earlier.
  pub fn restore(&mut self, snapshot: CaseSnapshot) {
    self.case_id = snapshot.case_id;
    self.state = snapshot.state;
    self.marking = Marking::import(snapshot.marking);
    self.instances = MultiInstanceManager::import(snapshot.instances);
    self.analyzer.clear_cache();
    self.reported_enabled.clear();
    info!(case_id = %self.case_id, state = %self.state, "case_restored");
  }

  /// One token from each preset that contributed to enablement.
  fn consumption_plan(&self, net: &Net, task: &Task) -> Vec<String> {
    let presets = net.task_preset_conditions(task);
    match task.join {
      JoinType::And => presets.iter().map(|condition| condition.id.clone()).collect(),
      JoinType::Xor => presets
        .iter()
        .find(|condition| self.marking.is_marked(&condition.id))
        .map(|condition| vec![condition.id.clone()])
        .unwrap_or_default(),
      JoinType::Or => presets
        .iter()
        .filter(|condition| self.marking.is_marked(&condition.id))
        .map(|condition| condition.id.clone())
        .collect(),
    }
  }

  /// Remove tokens and instance state for the task's cancellation set.
  fn apply_cancellation_set(&mut self, task: &Task) {
    if task.cancellation_set.is_empty() {
      return;
    }
    let removed = self
      .marking
      .clear_region(task.cancellation_set.iter().map(String::as_str));
    for element_id in &task.cancellation_set {
      self.instances.remove(element_id);
    }
    if removed > 0 {
      debug!(
        case_id = %self.case_id,
        task_id = %task.id,
        removed_tokens = removed,
        "cancellation_set_applied"
      );
    }
  }

  fn compute_enabled(&mut self) -> Vec<String> {
    let net = Arc::clone(&self.net);
    let mut enabled: Vec<String> = net
      .tasks()
      .filter(|task| evaluate_join(&net, task, &self.marking, &mut self.analyzer))
      .map(|task| task.id.clone())
      .collect();
    enabled.sort_unstable();
    enabled
  }

  /// Emit `TaskEnabled` for tasks that newly became enabled.
  fn report_enabled(&mut self) {
    let enabled = self.compute_enabled();
    self.reported_enabled.retain(|id| enabled.contains(id));
    for task_id in enabled {
      if self.reported_enabled.insert(task_id.clone()) {
        debug!(case_id = %self.case_id, task_id = %task_id, "task_enabled");
        self.notifier.notify(CaseEvent::TaskEnabled {
          case_id: self.case_id.clone(),
          task_id,
        });
      }
    }
  }

  /// `Running` -> `Completed` once the output condition is marked and no
  /// task remains enabled.
  fn check_completion(&mut self) {
    let output_id = match self.net.output_condition() {
      Ok(condition) => condition.id.clone(),
      Err(_) => return,
    };
    if self.marking.is_marked(&output_id) && self.compute_enabled().is_empty() {
      self.state = CaseState::Completed;
      info!(case_id = %self.case_id, "case_completed");
      self.notifier.notify(CaseEvent::CaseCompleted {
        case_id: self.case_id.clone(),
      });
    }
  }

  fn ensure_running(&self) -> Result<(), EngineError> {
    if self.state == CaseState::Running {
      Ok(())
    } else {
      Err(EngineError::CaseNotRunning {
        case_id: self.case_id.clone(),
        state: self.state,
      })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::Mutex;
  use weir_net::{
    CompletionMode, Condition, ConditionKind, CountSpec, CreationMode, Flow,
    MultiInstanceAttributes, SplitType,
  };

  /// Notifier that records every event for assertions.
  #[derive(Default)]
  struct RecordingNotifier {
    events: Mutex<Vec<CaseEvent>>,
  }

  impl EventNotifier for Arc<RecordingNotifier> {
    fn notify(&self, event: CaseEvent) {
      self.events.lock().unwrap().push(event);
    }
  }

  /// WCP-1: i -> a -> c1 -> b -> o, all AND/AND.
  fn sequence_net() -> Arc<Net> {
    let mut net = Net::new("wcp1", "sequence");
    for (id, kind) in [
      ("i", ConditionKind::Input),
      ("c1", ConditionKind::Ordinary),
      ("o", ConditionKind::Output),
    ] {
      net.add_condition(Condition::new(id, kind)).unwrap();
    }
    net
      .add_task(Task::new("a", JoinType::And, SplitType::And))
      .unwrap();
    net
      .add_task(Task::new("b", JoinType::And, SplitType::And))
      .unwrap();
    for (id, source, target) in [
      ("f1", "i", "a"),
      ("f2", "a", "c1"),
      ("f3", "c1", "b"),
      ("f4", "b", "o"),
    ] {
      net.add_flow(Flow::new(id, source, target)).unwrap();
    }
    assert!(net.is_valid());
    Arc::new(net)
  }

  /// i -> s (and-split) -> {c1, c2}; c1 -> b1 -> p1; c2 -> b2 -> p2;
  /// {p1, p2} -> j (or-join) -> o.
  fn or_join_net() -> Arc<Net> {
    let mut net = Net::new("orj", "or-join");
    for (id, kind) in [
      ("i", ConditionKind::Input),
      ("c1", ConditionKind::Ordinary),
      ("c2", ConditionKind::Ordinary),
      ("p1", ConditionKind::Ordinary),
      ("p2", ConditionKind::Ordinary),
      ("o", ConditionKind::Output),
    ] {
      net.add_condition(Condition::new(id, kind)).unwrap();
    }
    net
      .add_task(Task::new("s", JoinType::And, SplitType::And))
      .unwrap();
    net
      .add_task(Task::new("b1", JoinType::And, SplitType::And))
      .unwrap();
    net
      .add_task(Task::new("b2", JoinType::And, SplitType::And))
      .unwrap();
    net
      .add_task(Task::new("j", JoinType::Or, SplitType::And))
      .unwrap();
    for (id, source, target) in [
      ("f1", "i", "s"),
      ("f2", "s", "c1"),
      ("f3", "s", "c2"),
      ("f4", "c1", "b1"),
      ("f5", "b1", "p1"),
      ("f6", "c2", "b2"),
      ("f7", "b2", "p2"),
      ("f8", "p1", "j"),
      ("f9", "p2", "j"),
      ("f10", "j", "o"),
    ] {
      net.add_flow(Flow::new(id, source, target)).unwrap();
    }
    Arc::new(net)
  }

  fn mi_net(creation: CreationMode, completion: CompletionMode, counts: (u32, u32, u32)) -> Arc<Net> {
    let (minimum, maximum, threshold) = counts;
    let mut net = Net::new("mi", "multi-instance");
    net
      .add_condition(Condition::new("i", ConditionKind::Input))
      .unwrap();
    net
      .add_condition(Condition::new("o", ConditionKind::Output))
      .unwrap();
    net
      .add_task(
        Task::new("m", JoinType::And, SplitType::And).with_multi_instance(
          MultiInstanceAttributes {
            minimum: CountSpec::Literal(minimum),
            maximum: CountSpec::Literal(maximum),
            threshold: CountSpec::Literal(threshold),
            creation,
            completion,
          },
        ),
      )
      .unwrap();
    net.add_flow(Flow::new("f1", "i", "m")).unwrap();
    net.add_flow(Flow::new("f2", "m", "o")).unwrap();
    Arc::new(net)
  }

  #[test]
  fn wcp1_sequence_runs_to_completion() {
    let mut runner = NetRunner::new(sequence_net()).unwrap();
    assert_eq!(runner.state(), CaseState::Created);

    runner.start().unwrap();
    assert_eq!(runner.state(), CaseState::Running);
    assert_eq!(runner.enabled_tasks(), vec!["a"]);

    runner.fire("a", &json!({})).unwrap();
    assert_eq!(runner.enabled_tasks(), vec!["b"]);

    runner.fire("b", &json!({})).unwrap();
    assert_eq!(runner.state(), CaseState::Completed);
    assert_eq!(runner.marking().tokens("o"), 1);
    assert_eq!(runner.marking().total_tokens(), 1);
  }

  #[test]
  fn start_twice_is_rejected() {
    let mut runner = NetRunner::new(sequence_net()).unwrap();
    runner.start().unwrap();
    let err = runner.start().unwrap_err();
    assert!(matches!(err, EngineError::AlreadyStarted { .. }));
  }

  #[test]
  fn enabled_tasks_is_idempotent() {
    let mut runner = NetRunner::new(or_join_net()).unwrap();
    runner.start().unwrap();
    runner.fire("s", &json!({})).unwrap();

    let first = runner.enabled_tasks();
    let second = runner.enabled_tasks();
    assert_eq!(first, second);
    assert_eq!(first, vec!["b1", "b2"]);
  }

  #[test]
  fn firing_a_disabled_task_leaves_the_marking_unchanged() {
    let mut runner = NetRunner::new(sequence_net()).unwrap();
    runner.start().unwrap();

    let before = runner.marking().export();
    let err = runner.fire("b", &json!({})).unwrap_err();
    assert!(matches!(err, EngineError::TaskNotEnabled { task_id } if task_id == "b"));
    assert_eq!(runner.marking().export(), before);
  }

  #[test]
  fn failed_split_leaves_the_marking_unchanged() {
    let mut net = Net::new("n", "xor");
    net
      .add_condition(Condition::new("i", ConditionKind::Input))
      .unwrap();
    net
      .add_condition(Condition::new("o", ConditionKind::Output))
      .unwrap();
    net
      .add_task(Task::new("t", JoinType::And, SplitType::Xor))
      .unwrap();
    net.add_flow(Flow::new("f1", "i", "t")).unwrap();
    net
      .add_flow(Flow::new("f2", "t", "o").with_predicate("approved"))
      .unwrap();
    let mut runner = NetRunner::new(Arc::new(net)).unwrap();
    runner.start().unwrap();

    let before = runner.marking().export();
    let err = runner.fire("t", &json!({ "approved": false })).unwrap_err();
    assert!(matches!(err, EngineError::NoSplitBranch { .. }));
    assert_eq!(runner.marking().export(), before);
    assert_eq!(runner.state(), CaseState::Running);

    runner.fire("t", &json!({ "approved": true })).unwrap();
    assert_eq!(runner.state(), CaseState::Completed);
  }

  #[test]
  fn and_join_and_split_conserves_tokens() {
    let mut runner = NetRunner::new(or_join_net()).unwrap();
    runner.start().unwrap();
    assert_eq!(runner.marking().total_tokens(), 1);

    // and-split: one token in, one per outgoing flow.
    runner.fire("s", &json!({})).unwrap();
    assert_eq!(runner.marking().total_tokens(), 2);
    assert_eq!(runner.marking().tokens("c1"), 1);
    assert_eq!(runner.marking().tokens("c2"), 1);
  }

  #[test]
  fn or_join_stays_blocked_while_a_branch_is_pending() {
    let mut runner = NetRunner::new(or_join_net()).unwrap();
    runner.start().unwrap();
    runner.fire("s", &json!({})).unwrap();
    runner.fire("b1", &json!({})).unwrap();

    // b2 can still deliver a token to p2, so j must wait.
    let enabled = runner.enabled_tasks();
    assert!(enabled.contains(&"b2".to_string()));
    assert!(!enabled.contains(&"j".to_string()));

    let err = runner.fire("j", &json!({})).unwrap_err();
    assert!(matches!(err, EngineError::TaskNotEnabled { .. }));
  }

  #[test]
  fn or_join_enables_after_the_pending_branch_fires() {
    let mut runner = NetRunner::new(or_join_net()).unwrap();
    runner.start().unwrap();
    runner.fire("s", &json!({})).unwrap();
    runner.fire("b1", &json!({})).unwrap();
    assert!(!runner.enabled_tasks().contains(&"j".to_string()));

    // The fire below must invalidate the analyzer's reachability memo;
    // a stale result would keep j blocked forever.
    runner.fire("b2", &json!({})).unwrap();
    assert_eq!(runner.enabled_tasks(), vec!["j"]);

    runner.fire("j", &json!({})).unwrap();
    assert_eq!(runner.state(), CaseState::Completed);
    assert_eq!(runner.marking().tokens("o"), 1);
    assert_eq!(runner.marking().total_tokens(), 1);
  }

  #[test]
  fn multi_instance_produces_output_once_satisfied() {
    let net = mi_net(CreationMode::Static, CompletionMode::All, (3, 3, 3));
    let mut runner = NetRunner::new(net).unwrap();
    runner.start().unwrap();

    runner.fire("m", &json!({})).unwrap();
    assert_eq!(runner.state(), CaseState::Running);
    assert_eq!(runner.marking().total_tokens(), 0);
    assert_eq!(runner.instance_counters("m").unwrap().spawned, 3);

    assert!(!runner.complete_instance("m", &json!({})).unwrap());
    assert!(!runner.complete_instance("m", &json!({})).unwrap());
    assert!(runner.complete_instance("m", &json!({})).unwrap());

    assert_eq!(runner.state(), CaseState::Completed);
    assert_eq!(runner.marking().tokens("o"), 1);
  }

  #[test]
  fn threshold_policy_cancels_remaining_instances() {
    let net = mi_net(CreationMode::Dynamic, CompletionMode::Threshold, (2, 5, 3));
    let config = RunnerConfig {
      cancel_remaining_on_threshold: true,
    };
    let mut runner = NetRunner::with_notifier(net, config, NoopNotifier).unwrap();
    runner.start().unwrap();

    runner.fire("m", &json!({})).unwrap();
    runner.add_instance("m").unwrap();
    runner.add_instance("m").unwrap();
    assert_eq!(runner.instance_counters("m").unwrap().spawned, 4);

    assert!(!runner.complete_instance("m", &json!({})).unwrap());
    assert!(!runner.complete_instance("m", &json!({})).unwrap());
    assert!(runner.complete_instance("m", &json!({})).unwrap());

    // The fourth instance was cancelled by policy.
    assert_eq!(runner.instance_counters("m").unwrap().running(), 0);
    assert_eq!(runner.marking().tokens("o"), 1);
    assert_eq!(runner.state(), CaseState::Completed);
  }

  #[test]
  fn cancel_empties_the_region_and_ends_the_case() {
    let mut runner = NetRunner::new(or_join_net()).unwrap();
    runner.start().unwrap();
    runner.fire("s", &json!({})).unwrap();

    runner
      .cancel(&["c1".to_string(), "c2".to_string()])
      .unwrap();
    assert_eq!(runner.state(), CaseState::Cancelled);
    assert!(runner.marking().is_empty());

    let err = runner.fire("b1", &json!({})).unwrap_err();
    assert!(matches!(err, EngineError::CaseNotRunning { .. }));
    assert!(runner.enabled_tasks().is_empty());
  }

  #[test]
  fn task_cancellation_set_removes_competing_tokens() {
    // i -> s (and-split) -> {c1, c2}; c1 -> t1 -> o; c2 -> t2 -> o.
    // t1 cancels c2 when it fires, so t2 never runs.
    let mut net = Net::new("n", "cancellation set");
    for (id, kind) in [
      ("i", ConditionKind::Input),
      ("c1", ConditionKind::Ordinary),
      ("c2", ConditionKind::Ordinary),
      ("o", ConditionKind::Output),
    ] {
      net.add_condition(Condition::new(id, kind)).unwrap();
    }
    net
      .add_task(Task::new("s", JoinType::And, SplitType::And))
      .unwrap();
    net
      .add_task(
        Task::new("t1", JoinType::And, SplitType::And)
          .with_cancellation_set(vec!["c2".to_string()]),
      )
      .unwrap();
    net
      .add_task(Task::new("t2", JoinType::And, SplitType::And))
      .unwrap();
    for (id, source, target) in [
      ("f1", "i", "s"),
      ("f2", "s", "c1"),
      ("f3", "s", "c2"),
      ("f4", "c1", "t1"),
      ("f5", "t1", "o"),
      ("f6", "c2", "t2"),
      ("f7", "t2", "o"),
    ] {
      net.add_flow(Flow::new(id, source, target)).unwrap();
    }

    let mut runner = NetRunner::new(Arc::new(net)).unwrap();
    runner.start().unwrap();
    runner.fire("s", &json!({})).unwrap();
    runner.fire("t1", &json!({})).unwrap();

    assert!(!runner.marking().is_marked("c2"));
    assert_eq!(runner.state(), CaseState::Completed);
    assert_eq!(runner.marking().tokens("o"), 1);
  }

  #[test]
  fn snapshot_restore_resumes_mid_case() {
    let mut runner = NetRunner::new(or_join_net()).unwrap();
    runner.start().unwrap();
    runner.fire("s", &json!({})).unwrap();
    runner.fire("b1", &json!({})).unwrap();
    let snapshot = runner.snapshot();

    let mut resumed = NetRunner::new(or_join_net()).unwrap();
    resumed.restore(snapshot.clone());
    assert_eq!(resumed.case_id(), runner.case_id());
    assert_eq!(resumed.marking(), runner.marking());
    assert_eq!(resumed.enabled_tasks(), vec!["b2"]);

    resumed.fire("b2", &json!({})).unwrap();
    resumed.fire("j", &json!({})).unwrap();
    assert_eq!(resumed.state(), CaseState::Completed);

    // Snapshots survive a serde round trip for the persistence boundary.
    let encoded = serde_json::to_string(&snapshot).unwrap();
    let decoded: CaseSnapshot = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, snapshot);
  }

  #[test]
  fn events_are_emitted_in_transition_order() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut runner = NetRunner::with_notifier(
      sequence_net(),
      RunnerConfig::default(),
      Arc::clone(&notifier),
    )
    .unwrap();
    let case_id = runner.case_id().to_string();

    runner.start().unwrap();
    runner.fire("a", &json!({})).unwrap();
    runner.fire("b", &json!({})).unwrap();

    let events = notifier.events.lock().unwrap();
    let expected = vec![
      CaseEvent::CaseStarted {
        case_id: case_id.clone(),
        net_id: "wcp1".to_string(),
      },
      CaseEvent::TaskEnabled {
        case_id: case_id.clone(),
        task_id: "a".to_string(),
      },
      CaseEvent::TaskFired {
        case_id: case_id.clone(),
        task_id: "a".to_string(),
      },
      CaseEvent::TaskEnabled {
        case_id: case_id.clone(),
        task_id: "b".to_string(),
      },
      CaseEvent::TaskFired {
        case_id: case_id.clone(),
        task_id: "b".to_string(),
      },
      CaseEvent::CaseCompleted { case_id },
    ];
    assert_eq!(*events, expected);
  }

  #[test]
  fn xor_join_consumes_only_the_first_marked_preset() {
    // i -> s (and-split) -> {c1, c2}; {c1, c2} -> x (xor-join) -> o.
    let mut net = Net::new("n", "xor-join");
    for (id, kind) in [
      ("i", ConditionKind::Input),
      ("c1", ConditionKind::Ordinary),
      ("c2", ConditionKind::Ordinary),
      ("o", ConditionKind::Output),
    ] {
      net.add_condition(Condition::new(id, kind)).unwrap();
    }
    net
      .add_task(Task::new("s", JoinType::And, SplitType::And))
      .unwrap();
    net
      .add_task(Task::new("x", JoinType::Xor, SplitType::And))
      .unwrap();
    for (id, source, target) in [
      ("f1", "i", "s"),
      ("f2", "s", "c1"),
      ("f3", "s", "c2"),
      ("f4", "c1", "x"),
      ("f5", "c2", "x"),
      ("f6", "x", "o"),
    ] {
      net.add_flow(Flow::new(id, source, target)).unwrap();
    }

    let mut runner = NetRunner::new(Arc::new(net)).unwrap();
    runner.start().unwrap();
    runner.fire("s", &json!({})).unwrap();

    runner.fire("x", &json!({})).unwrap();
    assert!(!runner.marking().is_marked("c1"));
    assert_eq!(runner.marking().tokens("c2"), 1);
    assert_eq!(runner.marking().tokens("o"), 1);

    // The second branch's token still enables the join again.
    assert_eq!(runner.enabled_tasks(), vec!["x"]);
  }

  #[test]
  fn unknown_task_is_rejected() {
    let mut runner = NetRunner::new(sequence_net()).unwrap();
    runner.start().unwrap();
    let err = runner.fire("nope", &json!({})).unwrap_err();
    assert!(matches!(err, EngineError::UnknownTask { .. }));
  }

  #[test]
  fn runner_requires_an_input_condition() {
    let mut net = Net::new("n", "no input");
    net
      .add_condition(Condition::new("o", ConditionKind::Output))
      .unwrap();
    net
      .add_task(Task::new("t", JoinType::And, SplitType::And))
      .unwrap();

    assert!(matches!(
      NetRunner::new(Arc::new(net)),
      Err(EngineError::Net(NetError::MissingInputCondition))
    ));
  }
}
