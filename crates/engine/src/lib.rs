pub mod directory;
pub mod ledger;
pub mod processor;

pub use directory::{PgDirectory, RecipientDirectory, StaticDirectory};
pub use ledger::DeliveryLedger;
pub use processor::{EventOutcome, EventProcessor};
