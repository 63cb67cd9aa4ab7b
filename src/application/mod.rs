// Application layer: use cases on top of the ledger store.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
