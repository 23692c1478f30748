//! Minimal single-threaded notification stream.
//!
//! Listeners are addressed by the id handed out at registration. Callbacks
//! are invoked with no internal borrow held, so a listener may freely read
//! from, subscribe to, or unsubscribe from the object that emitted the
//! event. A listener that re-enters *itself* (emits back into a stream it is
//! currently handling) panics by design; that indicates a cycle in the
//! subscriber graph.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

type Listener<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct SubjectState<E> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<E>>,
    closed: bool,
}

/// An event stream with id-addressed listeners.
///
/// Cloning a `Subject` produces another handle to the same stream.
pub struct Subject<E> {
    state: Rc<RefCell<SubjectState<E>>>,
}

impl<E> Clone for Subject<E> {
    fn clone(&self) -> Self {
        Self { state: Rc::clone(&self.state) }
    }
}

impl<E> Default for Subject<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Subject<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Subject")
                .field("listeners", &state.listeners.len())
                .field("closed", &state.closed)
                .finish(),
            Err(_) => f.debug_struct("Subject").finish_non_exhaustive(),
        }
    }
}

impl<E> Subject<E> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SubjectState {
                next_id: 1,
                listeners: BTreeMap::new(),
                closed: false,
            })),
        }
    }

    /// Registers a listener and returns its id.
    pub fn subscribe<F>(&self, listener: F) -> u64
    where
        F: FnMut(&E) + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id = state.next_id.saturating_add(1);
        state.listeners.insert(id, Rc::new(RefCell::new(listener)));
        id
    }

    /// Removes a listener; returns whether it was registered.
    pub fn unsubscribe(&self, id: u64) -> bool {
        self.state.borrow_mut().listeners.remove(&id).is_some()
    }

    /// Delivers `event` to every listener in registration order. A no-op
    /// after [`close`](Self::close).
    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = {
            let state = self.state.borrow();
            if state.closed {
                return;
            }
            state.listeners.values().cloned().collect()
        };
        for listener in listeners {
            (&mut *listener.borrow_mut())(event);
        }
    }

    /// Closes the stream: drops every listener and ignores further emits.
    pub fn close(&self) {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        state.listeners.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }
}
