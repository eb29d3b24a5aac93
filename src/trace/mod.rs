pub mod event;
pub mod writer;
