//! Weir Engine
//!
//! Runtime semantics for weir workflow nets: the per-case marking, AND/XOR/OR
//! split and join firing, OR-join reachability analysis, multi-instance task
//! state, and the case runner that ties them together.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        NetRunner                            │
//! │  - owns the Marking and instance state for one case         │
//! │  - enabled_tasks() / fire() / complete_instance() / cancel()│
//! │  - emits CaseEvents through an EventNotifier                │
//! └─────────────────────────────────────────────────────────────┘
//!               │                        │
//!               ▼                        ▼
//! ┌───────────────────────┐  ┌──────────────────────────────────┐
//! │  split / join eval    │  │        OrJoinAnalyzer            │
//! │  - pure functions     │  │  - marking-relative reachability │
//! │  - predicate guards   │  │  - memo cleared on every fire    │
//! └───────────────────────┘  └──────────────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  MultiInstanceManager                       │
//! │  - per-case spawned/completed counters and bounds           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! One runner per case; callers serialize access per case. The static
//! `weir_net::Net` is shared read-only across cases.

mod error;
mod events;
mod marking;
mod multi_instance;
mod orjoin;
mod predicate;
mod runner;
mod split;

pub use error::EngineError;
pub use events::{CaseEvent, ChannelNotifier, EventNotifier, NoopNotifier};
pub use marking::Marking;
pub use multi_instance::{InstanceCounters, MultiInstanceManager};
pub use orjoin::{OrJoinAnalysis, OrJoinAnalyzer};
pub use predicate::PredicateEvaluator;
pub use runner::{CaseSnapshot, CaseState, NetRunner, RunnerConfig};
pub use split::{evaluate_join, evaluate_split};
