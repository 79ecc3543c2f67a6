//! The Matching Engine (§4.2) and its supporting Learning Hint Store
//! (§4.2.2). `evaluate` is a pure function of its inputs — no I/O, no
//! wall-clock beyond the injected `today` — so it is trivially testable
//! and safe to call from any thread. The Learning Hint Store is the one
//! piece of this crate that touches disk; it is kept separate so
//! `evaluate` itself stays pure.

pub mod candidates;
pub mod detect;
pub mod documents;
pub mod engine;
pub mod error;
pub mod hint_store;
pub mod scope;

pub use engine::{evaluate, MatchingInputs};
pub use error::MatchingError;
pub use hint_store::{derive_hint_id, HintStore};
pub use scope::{resolve_scope, ResolvedScope};
