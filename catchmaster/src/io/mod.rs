//! Side-effecting collaborators: filesystem, child processes, HTTP.

pub mod atomic;
pub mod config;
pub mod conversation;
pub mod generator;
pub mod history_store;
pub mod http_generator;
pub mod paths;
pub mod process;
