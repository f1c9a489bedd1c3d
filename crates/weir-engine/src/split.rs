//! Split and join evaluation.
//!
//! Pure functions over the static net, the case data, and the current
//! marking. OR-joins delegate to the reachability analyzer; everything else
//! is a local token check.

use serde_json::Value;
use weir_net::{JoinType, Net, NetError, SplitType, Task};

use crate::error::EngineError;
use crate::marking::Marking;
use crate::orjoin::OrJoinAnalyzer;
use crate::predicate::PredicateEvaluator;

/// Decide which outgoing flows of `task` fire, given the case data.
///
/// AND activates every flow. XOR activates the first flow in declaration
/// order whose predicate matches. OR activates every matching flow. XOR and
/// OR fail with `NoSplitBranch` when nothing matches.
pub fn evaluate_split(
  net: &Net,
  task: &Task,
  case_data: &Value,
  evaluator: &PredicateEvaluator,
) -> Result<Vec<String>, EngineError> {
  match task.split {
    SplitType::And => Ok(task.postset.clone()),
    SplitType::Xor => {
      for flow_id in &task.postset {
        if flow_matches(net, flow_id, case_data, evaluator)? {
          return Ok(vec![flow_id.clone()]);
        }
      }
      Err(EngineError::NoSplitBranch {
        task_id: task.id.clone(),
      })
    }
    SplitType::Or => {
      let mut selected = Vec::new();
      for flow_id in &task.postset {
        if flow_matches(net, flow_id, case_data, evaluator)? {
          selected.push(flow_id.clone());
        }
      }
      if selected.is_empty() {
        return Err(EngineError::NoSplitBranch {
          task_id: task.id.clone(),
        });
      }
      Ok(selected)
    }
  }
}

fn flow_matches(
  net: &Net,
  flow_id: &str,
  case_data: &Value,
  evaluator: &PredicateEvaluator,
) -> Result<bool, EngineError> {
  let flow = net.flow(flow_id).ok_or_else(|| {
    EngineError::Net(NetError::UnknownElement {
      id: flow_id.to_string(),
    })
  })?;
  match &flow.predicate {
    Some(expression) => evaluator.eval_bool(expression, case_data),
    None => Ok(true),
  }
}

/// Decide whether `task`'s join is satisfied under `marking`.
///
/// A task with an empty preset is never enabled.
pub fn evaluate_join(
  net: &Net,
  task: &Task,
  marking: &Marking,
  analyzer: &mut OrJoinAnalyzer,
) -> bool {
  let presets = net.task_preset_conditions(task);
  match task.join {
    JoinType::And => {
      !presets.is_empty()
        && presets
          .iter()
          .all(|condition| marking.is_marked(&condition.id))
    }
    JoinType::Xor => presets
      .iter()
      .any(|condition| marking.is_marked(&condition.id)),
    JoinType::Or => analyzer.analyze(net, task, marking).enabled,
  }
}
