pub mod access;
pub mod hierarchy;
pub mod models;
pub mod state_machine;
pub mod visibility;
pub mod workflow;
