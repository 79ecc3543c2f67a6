//! Single-owner Core: Plan/Decision-Pack construction, Apply gating and
//! execution, the Job Queue, and active Run lifecycle, all wired behind
//! one command loop (§4.5-§4.6).

pub mod apply;
pub mod command;
pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod evidence;
pub mod idempotency;
pub mod jobs;
pub mod metrics;
pub mod plan;
pub mod policy;
pub mod runs;

pub use command::{Command, ConnectorFactory, Responder};
pub use config::{ConfigBundle, CoreOptions, SecretRecord};
pub use core::{Core, CoreContext, CoreHandle};
pub use error::CoreError;
pub use event::Event;
pub use jobs::JobQueue;
pub use plan::{MatchingContext, PlanBuildRequest, PlanStore, PresetMapping, PresetStore};
pub use runs::{ActiveRun, RunAction, RunActionResult, RunRegistry};
