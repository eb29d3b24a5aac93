pub mod action;
pub mod persist;
pub mod state_graph;
