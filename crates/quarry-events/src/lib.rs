//! Quarry Events - change notifications for the Quarry virtual file system.
//!
//! This crate provides:
//! - [`VfsEvent`], one variant per kind of tree mutation
//! - A broadcast-based [`EventBus`] for async receivers
//! - A [`SubscriberRegistry`] for synchronous handlers
//!
//! Events are published only after the corresponding disk mutation
//! succeeded.
//!
//! # Example
//!
//! ```rust
//! use quarry_events::{EventBus, EventMetadata, VfsEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(VfsEvent::Created {
//!     metadata: EventMetadata::new("ws-1"),
//!     path: "/proj".to_string(),
//!     is_folder: true,
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "created");
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;
mod subscriber;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, VfsEvent};
pub use subscriber::{
    EventFilter, EventSubscriber, FilterSubscriber, SubscriberId, SubscriberRegistry,
};
