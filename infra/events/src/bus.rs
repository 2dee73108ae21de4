use crate::error::EventBusError;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

/// Anything that can travel over the bus.
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

type Channels = FxHashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Cheap-to-clone handle to a shared set of typed broadcast channels.
#[derive(Debug, Clone)]
pub struct EventBus {
    channels: Arc<RwLock<Channels>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self { channels: Arc::default(), capacity: DEFAULT_CAPACITY }
    }

    /// Bus whose channels buffer `capacity` events per slow subscriber.
    pub fn with_capacity(capacity: usize) -> Result<Self, EventBusError> {
        if capacity == 0 {
            return Err(EventBusError::InvalidCapacity {
                message: "capacity must be greater than zero".into(),
                context: None,
            });
        }
        Ok(Self { channels: Arc::default(), capacity })
    }

    /// Opens a new receiver for events of type `T`.
    #[must_use]
    pub fn subscribe<T: Event>(&self) -> broadcast::Receiver<Arc<T>> {
        self.sender::<T>().subscribe()
    }

    /// Delivers `event` to current subscribers; returns how many received it.
    pub fn publish<T: Event>(&self, event: T) -> usize {
        self.publish_arc(Arc::new(event))
    }

    pub fn publish_arc<T: Event>(&self, event: Arc<T>) -> usize {
        self.sender::<T>().send(event).map_or_else(
            |_| {
                trace!(event = type_name::<T>(), "Event dropped: no active subscribers");
                0
            },
            |count| {
                trace!(event = type_name::<T>(), count, "Event dispatched");
                count
            },
        )
    }

    #[must_use]
    pub fn subscriber_count<T: Event>(&self) -> usize {
        self.channels
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|sender| sender.downcast_ref::<broadcast::Sender<Arc<T>>>())
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn sender<T: Event>(&self) -> broadcast::Sender<Arc<T>> {
        let id = TypeId::of::<T>();
        if let Some(sender) = self
            .channels
            .read()
            .get(&id)
            .and_then(|s| s.downcast_ref::<broadcast::Sender<Arc<T>>>())
        {
            return sender.clone();
        }

        let mut channels = self.channels.write();
        let entry = channels
            .entry(id)
            .or_insert_with(|| Box::new(broadcast::channel::<Arc<T>>(self.capacity).0));
        // Keyed by TypeId, so the stored sender always has this exact type.
        entry
            .downcast_ref::<broadcast::Sender<Arc<T>>>()
            .cloned()
            .unwrap_or_else(|| broadcast::channel(self.capacity).0)
    }
}
