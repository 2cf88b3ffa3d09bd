pub mod dispatcher;
pub mod ingest;
pub mod transport;

pub use dispatcher::{BatchSummary, Dispatcher};
pub use ingest::{SkipReason, interpret};
pub use transport::{PushTransport, SendOutcome};
