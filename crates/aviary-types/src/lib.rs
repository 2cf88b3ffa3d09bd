pub mod events;
pub mod models;

pub use events::{EventKind, FanoutPayload, MutationEvent};
pub use models::{MediaRecord, TagValue};
