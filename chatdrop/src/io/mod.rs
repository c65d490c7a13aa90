//! Side-effecting adapters: filesystem, child processes, git, clipboard.

pub mod backup;
pub mod config;
pub mod git;
pub mod process;
pub mod scaffold;
pub mod source;
pub mod validator;
pub mod writer;
