//! Test doubles shared by unit and integration tests.

mod mock_queue;

pub use mock_queue::MockWorkQueue;
