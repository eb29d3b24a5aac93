pub mod path_planner;
pub mod solver;
