//! Predicate and count-query evaluation against case data.
//!
//! Flow guards on XOR/OR splits and multi-instance count queries are
//! minijinja expressions evaluated at read time against the case's data.
//! Evaluation is an explicit strategy object so the engine never probes
//! attributes reflectively.

use minijinja::Environment;
use serde_json::Value;
use weir_net::CountSpec;

use crate::error::EngineError;

/// Compiles and evaluates guard expressions for one case.
pub struct PredicateEvaluator {
  env: Environment<'static>,
}

impl PredicateEvaluator {
  pub fn new() -> Self {
    Self {
      env: Environment::new(),
    }
  }

  /// Evaluate a guard expression to a truth value.
  ///
  /// Missing variables evaluate to undefined, which is falsy; a guard over
  /// absent data therefore never matches.
  pub fn eval_bool(&self, expression: &str, case_data: &Value) -> Result<bool, EngineError> {
    let compiled =
      self
        .env
        .compile_expression(expression)
        .map_err(|source| EngineError::Expression {
          expression: expression.to_string(),
          source,
        })?;
    let value = compiled
      .eval(case_data)
      .map_err(|source| EngineError::Expression {
        expression: expression.to_string(),
        source,
      })?;
    Ok(value.is_true())
  }

  /// Evaluate a count query to a non-negative integer.
  pub fn eval_count(&self, expression: &str, case_data: &Value) -> Result<u32, EngineError> {
    let compiled =
      self
        .env
        .compile_expression(expression)
        .map_err(|source| EngineError::Expression {
          expression: expression.to_string(),
          source,
        })?;
    let value = compiled
      .eval(case_data)
      .map_err(|source| EngineError::Expression {
        expression: expression.to_string(),
        source,
      })?;
    u32::try_from(value).map_err(|_| EngineError::ExpressionType {
      expression: expression.to_string(),
      expected: "a non-negative integer",
    })
  }

  /// Resolve an instance-count bound: literal, or query against case data.
  pub fn resolve_count(&self, bound: &CountSpec, case_data: &Value) -> Result<u32, EngineError> {
    match bound {
      CountSpec::Literal(count) => Ok(*count),
      CountSpec::Query(expression) => self.eval_count(expression, case_data),
    }
  }
}

impl Default for PredicateEvaluator {
  fn default() -> Self {
    Self::new()
  }
}
