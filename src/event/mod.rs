mod bus;
mod events;

pub use bus::{EventBus, SubscriptionId};
pub use events::{DocumentEvent, LayerEvent, ModelEvent};

/// Observer registered on an [`EventBus`].
pub trait EventHandler {
    fn handle_event(&mut self, event: &ModelEvent);
}

impl<F: FnMut(&ModelEvent)> EventHandler for F {
    fn handle_event(&mut self, event: &ModelEvent) {
        self(event)
    }
}
