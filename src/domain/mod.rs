mod ledger;
mod money;
mod policy;
mod summary;
mod transaction;

pub use ledger::*;
pub use money::*;
pub use policy::*;
pub use summary::*;
pub use transaction::*;
