//! Weir Net
//!
//! This crate provides the static topology of a weir workflow net: a
//! bipartite graph of conditions (places) and tasks (transitions) connected
//! by flows. A net is built once when a specification is loaded, validated,
//! and then shared read-only across every case that executes it.
//!
//! Runtime state (markings, instance counters) lives in `weir-engine`;
//! nothing in this crate changes after construction.

mod element;
mod error;
mod net;

pub use element::{
  CompletionMode, Condition, ConditionKind, CountSpec, CreationMode, Element, Flow, JoinType,
  MultiInstanceAttributes, SplitType, Task,
};
pub use error::NetError;
pub use net::Net;
