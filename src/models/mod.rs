pub mod budget;
pub mod goal;
pub mod record;
pub mod transaction;

pub use budget::Budget;
pub use goal::Goal;
pub use record::{Collection, SyncRecord};
pub use transaction::Transaction;
