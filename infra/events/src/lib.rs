//! # Event Bus
//!
//! Fan-out delivery of container lifecycle events (service transitions, model commits,
//! rollbacks) to any number of observers.
//!
//! Events are identified by their Rust type; each type gets its own `tokio` broadcast
//! channel, created lazily on first publish or subscribe. Publishing never blocks and never
//! fails because nobody is listening.
//!
//! ```rust
//! use capstan_event_bus::{EventBus, EventStream};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Booted { services: usize }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe::<Booted>();
//! bus.publish(Booted { services: 3 });
//! assert_eq!(rx.next_event().await.map(|e| e.services), Some(3));
//! # }
//! ```

mod bus;
mod error;
mod stream;

pub use bus::{Event, EventBus};
pub use error::EventBusError;
pub use stream::EventStream;
