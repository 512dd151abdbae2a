use std::cell::{Cell, RefCell};

use crate::event::{EventHandler, ModelEvent};

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A simple event bus for broadcasting model events to registered handlers.
///
/// Handlers may subscribe or unsubscribe (themselves included) while an
/// event is being dispatched. Such changes apply from the next emit.
pub struct EventBus {
    handlers: RefCell<Vec<(SubscriptionId, Box<dyn EventHandler>)>>,
    // Ids taken out of `handlers` by emits still in progress
    in_flight: RefCell<Vec<SubscriptionId>>,
    // In-flight ids unsubscribed before their emit finished
    removed: RefCell<Vec<SubscriptionId>>,
    next_id: Cell<u64>,
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        // Observers belong to the original model; a copy starts with none
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &format!("<{} handlers>", self.handler_count()))
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a new event bus
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            in_flight: RefCell::new(Vec::new()),
            removed: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Subscribe a handler to receive events
    pub fn subscribe(&self, handler: Box<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, handler));
        id
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        {
            let mut handlers = self.handlers.borrow_mut();
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.len() != before {
                return true;
            }
        }
        let mut removed = self.removed.borrow_mut();
        if self.in_flight.borrow().contains(&id) && !removed.contains(&id) {
            removed.push(id);
            return true;
        }
        false
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len() + self.in_flight.borrow().len() - self.removed.borrow().len()
    }

    /// Emit an event to all registered handlers.
    ///
    /// The handler list is not borrowed while handlers run, so a handler
    /// can call back into the bus.
    pub fn emit(&self, event: ModelEvent) {
        let mut taken = std::mem::take(&mut *self.handlers.borrow_mut());
        self.in_flight
            .borrow_mut()
            .extend(taken.iter().map(|(id, _)| *id));

        for (id, handler) in &mut taken {
            if self.removed.borrow().contains(id) {
                continue;
            }
            handler.handle_event(&event);
        }

        let mut in_flight = self.in_flight.borrow_mut();
        in_flight.retain(|id| !taken.iter().any(|(taken_id, _)| taken_id == id));
        let mut removed = self.removed.borrow_mut();
        taken.retain(|(id, _)| !removed.contains(id));
        removed.retain(|id| in_flight.contains(id));
        drop((in_flight, removed));

        let mut handlers = self.handlers.borrow_mut();
        let added = std::mem::replace(&mut *handlers, taken);
        handlers.extend(added);
    }
}
