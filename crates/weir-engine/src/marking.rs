//! Token distribution over a net's conditions for one running case.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The current token distribution for one case.
///
/// Sparse: conditions with zero tokens are not stored. Owned exclusively by
/// a single `NetRunner`; never shared across cases. Conditions are not
/// assumed safe, so counts above one are legal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Marking {
  tokens: HashMap<String, u32>,
}

impl Marking {
  pub fn new() -> Self {
    Self::default()
  }

  /// The single-token initial marking on the given condition.
  pub fn with_token(condition_id: impl Into<String>) -> Self {
    let mut marking = Self::new();
    marking.tokens.insert(condition_id.into(), 1);
    marking
  }

  pub fn tokens(&self, condition_id: &str) -> u32 {
    self.tokens.get(condition_id).copied().unwrap_or(0)
  }

  pub fn is_marked(&self, condition_id: &str) -> bool {
    self.tokens(condition_id) > 0
  }

  /// Set the token count of a condition outright.
  pub fn mark(&mut self, condition_id: impl Into<String>, count: u32) {
    let condition_id = condition_id.into();
    if count == 0 {
      self.tokens.remove(&condition_id);
    } else {
      self.tokens.insert(condition_id, count);
    }
  }

  /// Add one token to a condition.
  pub fn produce(&mut self, condition_id: &str) {
    *self.tokens.entry(condition_id.to_string()).or_insert(0) += 1;
  }

  /// Remove one token from a condition.
  pub fn consume(&mut self, condition_id: &str) -> Result<(), EngineError> {
    match self.tokens.get_mut(condition_id) {
      Some(count) if *count > 1 => {
        *count -= 1;
        Ok(())
      }
      Some(_) => {
        self.tokens.remove(condition_id);
        Ok(())
      }
      None => Err(EngineError::NoTokenToConsume {
        condition_id: condition_id.to_string(),
      }),
    }
  }

  /// Ids of every condition holding at least one token, sorted.
  pub fn marked_conditions(&self) -> Vec<&str> {
    let mut ids: Vec<&str> = self.tokens.keys().map(String::as_str).collect();
    ids.sort_unstable();
    ids
  }

  pub fn total_tokens(&self) -> u32 {
    self.tokens.values().sum()
  }

  pub fn is_empty(&self) -> bool {
    self.tokens.is_empty()
  }

  /// Remove every token from the given conditions; returns how many tokens
  /// were dropped.
  pub fn clear_region<'a>(&mut self, condition_ids: impl IntoIterator<Item = &'a str>) -> u32 {
    let mut removed = 0;
    for condition_id in condition_ids {
      if let Some(count) = self.tokens.remove(condition_id) {
        removed += count;
      }
    }
    removed
  }

  /// Snapshot for external checkpointing. Deterministic ordering.
  pub fn export(&self) -> BTreeMap<String, u32> {
    self
      .tokens
      .iter()
      .map(|(id, count)| (id.clone(), *count))
      .collect()
  }

  /// Rebuild a marking from a snapshot; zero entries are dropped.
  pub fn import(snapshot: BTreeMap<String, u32>) -> Self {
    Self {
      tokens: snapshot
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn produce_and_consume_round_trip() {
    let mut marking = Marking::with_token("i");
    assert_eq!(marking.tokens("i"), 1);

    marking.produce("i");
    assert_eq!(marking.tokens("i"), 2);

    marking.consume("i").unwrap();
    marking.consume("i").unwrap();
    assert!(!marking.is_marked("i"));
    assert!(marking.is_empty());
  }

  #[test]
  fn consume_without_token_is_an_error() {
    let mut marking = Marking::new();
    let err = marking.consume("c").unwrap_err();
    assert!(matches!(err, EngineError::NoTokenToConsume { condition_id } if condition_id == "c"));
  }

  #[test]
  fn marked_conditions_are_sorted() {
    let mut marking = Marking::new();
    marking.produce("c2");
    marking.produce("c1");
    marking.produce("c3");
    assert_eq!(marking.marked_conditions(), vec!["c1", "c2", "c3"]);
  }

  #[test]
  fn clear_region_drops_all_tokens() {
    let mut marking = Marking::new();
    marking.mark("c1", 3);
    marking.produce("c2");
    marking.produce("keep");

    let removed = marking.clear_region(["c1", "c2", "absent"]);
    assert_eq!(removed, 4);
    assert!(!marking.is_marked("c1"));
    assert!(marking.is_marked("keep"));
  }

  #[test]
  fn export_import_round_trip() {
    let mut marking = Marking::new();
    marking.mark("c1", 2);
    marking.produce("c2");

    let snapshot = marking.export();
    let restored = Marking::import(snapshot);
    assert_eq!(restored, marking);
    assert_eq!(restored.total_tokens(), 3);
  }
}
