pub mod connection;
pub mod sessions;

pub use sessions::{SessionTransport, Sessions};
