//! Work dispatch: queue backends and the outbox relay.

mod http;
mod outbox;
mod sqlite;
mod traits;
mod types;

pub use http::HttpWorkQueue;
pub use outbox::OutboxRelay;
pub use sqlite::SqliteWorkQueue;
pub use traits::WorkQueue;
pub use types::{DispatchAck, DispatchError, PendingDispatch, WorkItem};
