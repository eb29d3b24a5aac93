//! State-graph navigation engine.
//!
//! Observations of an external target are reduced to stable states
//! (`state`), collected into a graph of action-triggered transitions
//! (`graph`), projected onto a token grid for path search (`encoder`,
//! `planner`) and turned back into an executable action plan
//! (`sequencer`). `session` ties the stages together for one target.

pub mod cli;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod graph;
pub mod perception;
pub mod planner;
pub mod sequencer;
pub mod session;
pub mod state;
pub mod trace;

pub use error::{NavError, NavResult};
