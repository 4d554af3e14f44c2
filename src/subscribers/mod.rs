//! Subscriber API: observe the allocator's event flow.
//!
//! ## Contents
//! - [`Subscribe`] - trait for custom observers (logging, metrics, audit)
//! - [`SubscriberSet`] - per-subscriber queues and workers, panic isolation
//! - `LogWriter` - built-in stdout subscriber (feature `logging`)

mod subscriber;
mod subscriber_set;

pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;

#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogWriter;
