pub mod scheduler;
pub mod signal;
pub mod source;

pub use scheduler::ReminderScheduler;
pub use signal::ShutdownSignal;
pub use source::{EventSource, HttpEventSource};
