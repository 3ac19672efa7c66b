//! Background refresh of data that changes while the user is signed in.

pub mod poller;

pub use poller::{NotificationPoller, DEFAULT_POLL_INTERVAL};
