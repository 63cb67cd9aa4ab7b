mod account;
mod ledger;
mod money;
mod period;
mod series;
mod transaction;

pub use account::*;
pub use ledger::*;
pub use money::*;
pub use period::*;
pub use series::*;
pub use transaction::*;
