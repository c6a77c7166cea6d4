//! Prioritized signals
//!
//! The observer primitive behind every structural and property notification
//! in the engine. Subscribers run in descending priority order, equal
//! priorities in registration order. Dispatch iterates a snapshot of the
//! subscriber list, and a subscriber disconnected while a dispatch is in
//! flight is skipped, so handlers may connect or disconnect freely.
//!
//! Handlers return [`SceneResult`]; the first error stops the dispatch and is
//! returned to whoever fired the signal.

use crate::error::SceneResult;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<A> = Rc<dyn Fn(&A) -> SceneResult<()>>;

struct Subscriber<A> {
    id: u64,
    priority: f32,
    callback: Callback<A>,
}

struct SignalInner<A> {
    subscribers: Vec<Subscriber<A>>,
    next_id: u64,
}

/// Ordered list of subscribers notified with `&A`
pub struct Signal<A: 'static> {
    inner: Rc<RefCell<SignalInner<A>>>,
}

impl<A: 'static> Signal<A> {
    /// Create a signal with no subscribers
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Connect a handler at the default priority (0.0)
    pub fn connect<F>(&self, callback: F) -> Slot
    where
        F: Fn(&A) -> SceneResult<()> + 'static,
    {
        self.connect_with_priority(callback, 0.0)
    }

    /// Connect a handler; higher priorities run first
    ///
    /// The returned [`Slot`] keeps the connection alive. Dropping it
    /// disconnects the handler.
    pub fn connect_with_priority<F>(&self, callback: F, priority: f32) -> Slot
    where
        F: Fn(&A) -> SceneResult<()> + 'static,
    {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;

            let position = inner
                .subscribers
                .iter()
                .position(|s| s.priority < priority)
                .unwrap_or(inner.subscribers.len());
            inner.subscribers.insert(
                position,
                Subscriber {
                    id,
                    priority,
                    callback: Rc::new(callback),
                },
            );
            id
        };

        let weak: Weak<RefCell<SignalInner<A>>> = Rc::downgrade(&self.inner);
        Slot {
            disconnect: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    // Take the subscriber out first: dropping its closure may
                    // drop other slots, which must not find this list borrowed.
                    let removed = {
                        let mut inner = inner.borrow_mut();
                        inner
                            .subscribers
                            .iter()
                            .position(|s| s.id == id)
                            .map(|index| inner.subscribers.remove(index))
                    };
                    drop(removed);
                }
            })),
        }
    }

    /// Notify every connected subscriber
    pub fn execute(&self, args: &A) -> SceneResult<()> {
        let snapshot: Vec<(u64, Callback<A>)> = self
            .inner
            .borrow()
            .subscribers
            .iter()
            .map(|s| (s.id, Rc::clone(&s.callback)))
            .collect();

        for (id, callback) in snapshot {
            let connected = self.inner.borrow().subscribers.iter().any(|s| s.id == id);
            if connected {
                callback(args)?;
            }
        }
        Ok(())
    }

    /// Number of connected subscribers
    pub fn len(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// True when nobody is listening
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: 'static> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Connection handle returned by [`Signal::connect`]
///
/// Disconnects on drop.
#[must_use = "dropping a Slot disconnects its handler immediately"]
pub struct Slot {
    disconnect: Option<Box<dyn FnOnce()>>,
}

impl Slot {
    /// Disconnect now (same as dropping)
    pub fn disconnect(mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("connected", &self.disconnect.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_priority_order() {
        let signal: Signal<u32> = Signal::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = Rc::clone(&order);
        let _low = signal.connect_with_priority(move |_| { o.borrow_mut().push("low"); Ok(()) }, -1.0);
        let o = Rc::clone(&order);
        let _first = signal.connect(move |_| { o.borrow_mut().push("first"); Ok(()) });
        let o = Rc::clone(&order);
        let _high = signal.connect_with_priority(move |_| { o.borrow_mut().push("high"); Ok(()) }, 10.0);
        let o = Rc::clone(&order);
        let _second = signal.connect(move |_| { o.borrow_mut().push("second"); Ok(()) });

        signal.execute(&0).unwrap();
        assert_eq!(*order.borrow(), vec!["high", "first", "second", "low"]);
    }

    #[test]
    fn test_drop_disconnects() {
        let signal: Signal<()> = Signal::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let slot = signal.connect(move |()| { c.set(c.get() + 1); Ok(()) });

        signal.execute(&()).unwrap();
        drop(slot);
        signal.execute(&()).unwrap();

        assert_eq!(count.get(), 1);
        assert!(signal.is_empty());
    }

    #[test]
    fn test_disconnect_during_dispatch() {
        let signal: Signal<()> = Signal::new();
        let victim: Rc<RefCell<Option<Slot>>> = Rc::new(RefCell::new(None));
        let victim_calls = Rc::new(Cell::new(0));

        let v = Rc::clone(&victim);
        let _killer = signal.connect_with_priority(move |()| { v.borrow_mut().take(); Ok(()) }, 1.0);

        let c = Rc::clone(&victim_calls);
        *victim.borrow_mut() = Some(signal.connect(move |()| { c.set(c.get() + 1); Ok(()) }));

        signal.execute(&()).unwrap();
        assert_eq!(victim_calls.get(), 0);
        assert_eq!(signal.len(), 1);
    }

    #[test]
    fn test_error_stops_dispatch() {
        use crate::error::SceneError;

        let signal: Signal<()> = Signal::new();
        let reached = Rc::new(Cell::new(false));
        let _failing = signal.connect_with_priority(|()| Err(SceneError::ContextBusy), 1.0);
        let r = Rc::clone(&reached);
        let _after = signal.connect(move |()| { r.set(true); Ok(()) });

        assert!(signal.execute(&()).is_err());
        assert!(!reached.get());
    }
}
