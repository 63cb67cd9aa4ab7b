pub mod api;
pub mod application;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod io;
pub mod logging;
pub mod storage;

pub use application::{AppError, BankService};
pub use domain::*;
pub use storage::{LedgerStore, MemoryStore, Repository};
