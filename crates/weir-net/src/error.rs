use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
  #[error("flow references unknown element: {id}")]
  UnknownElement { id: String },

  #[error("duplicate element id: {id}")]
  DuplicateElement { id: String },

  #[error("duplicate flow id: {id}")]
  DuplicateFlow { id: String },

  #[error("flow must connect a condition and a task: source={source_id}, target={target}")]
  InvalidFlow { source_id: String, target: String },

  #[error("net has no input condition")]
  MissingInputCondition,

  #[error("net has no output condition")]
  MissingOutputCondition,
}
