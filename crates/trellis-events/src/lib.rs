//! Trellis Events - lifecycle notifications for the Trellis module runtime.
//!
//! The framework queues a [`FrameworkEvent`] for every lifecycle transition
//! while it holds its graph lock and publishes the queue on an [`EventBus`]
//! once the lock is released, so subscribers never observe a half-committed
//! graph.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::UnitId;
//! use trellis_events::{EventBus, FrameworkEvent, UnitEventKind};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(FrameworkEvent::unit(UnitEventKind::Installed, UnitId(1)));
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "installed");
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

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{FrameworkEvent, UnitEventKind};
