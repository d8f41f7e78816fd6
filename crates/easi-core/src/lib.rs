pub mod action;
pub mod config;
pub mod error;
pub mod feedback;
pub mod intake;
pub mod io;
pub mod lcid;
pub mod paths;
pub mod store;
pub mod task_list;
pub mod types;

pub use error::{EasiError, Result};
