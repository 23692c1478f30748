//! The hierarchically-nested observable sequence.
//!
//! An [`ObservableSeq`] owns an ordered sequence of [`Element`]s, any of
//! which may itself be a collection. Mutations run inside an implicit
//! transaction: change events accumulate in a per-node pending queue, and a
//! depth-shifted copy of each event is propagated to every registered parent
//! at record time. When a node's outermost transaction ends, the queue is
//! flushed as a single event (a composite when more than one entry), the
//! flat projection is emitted when representable, and the plain value is
//! re-published. Idle ancestors are flushed afterwards, child first.
//!
//! One logical owner thread is assumed; handles are `Rc`-based and not
//! `Send`. The `RefCell` borrow discipline plays the role of the mutation
//! guard, and an integer transaction depth, alone, gates flushing.

use std::cell::RefCell;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use tracing::trace;

use obseq_diff::{diff, Edit};

use crate::change::{DeepChange, FlatChange};
use crate::element::Element;
use crate::error::SeqError;
use crate::generate_identity;
use crate::registry::IdentityRegistry;
use crate::subject::Subject;

type Inner<T> = RefCell<SeqInner<T>>;

pub(crate) struct SeqInner<T> {
    identity: u64,
    items: Vec<Element<T>>,
    /// Non-owning backreferences to every collection currently holding this
    /// node as a direct element.
    parents: IdentityRegistry<Inner<T>>,
    /// Edits accumulated since the last flush.
    pending: Vec<DeepChange<Element<T>>>,
    /// Re-entrant transaction depth; flushing happens only at the 1 -> 0
    /// transition.
    txn_depth: usize,
    closed: bool,
    value_stream: Subject<Vec<Element<T>>>,
    deep_stream: Subject<DeepChange<Element<T>>>,
    flat_stream: Subject<FlatChange<Element<T>>>,
}

/// Handle to a hierarchically-nested observable sequence.
///
/// Cloning the handle shares the same underlying collection; ownership of
/// nested collections runs strictly downward (a parent owns its `Node`
/// elements), while the upward links are weak and never extend a parent's
/// lifetime.
pub struct ObservableSeq<T> {
    pub(crate) inner: Rc<Inner<T>>,
}

impl<T> Clone for ObservableSeq<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T> Default for ObservableSeq<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableSeq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("ObservableSeq")
                .field("identity", &inner.identity)
                .field("items", &inner.items)
                .finish(),
            Err(_) => f.debug_struct("ObservableSeq").finish_non_exhaustive(),
        }
    }
}

impl<T> ObservableSeq<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SeqInner {
                identity: generate_identity(),
                items: Vec::new(),
                parents: IdentityRegistry::new(),
                pending: Vec::new(),
                txn_depth: 0,
                closed: false,
                value_stream: Subject::new(),
                deep_stream: Subject::new(),
                flat_stream: Subject::new(),
            })),
        }
    }

    /// Builds a collection from initial contents. Every `Node` element is
    /// registered as a child of the new collection.
    pub fn from_items(items: Vec<Element<T>>) -> Self {
        let seq = Self::new();
        for element in &items {
            seq.adopt(element);
        }
        seq.inner.borrow_mut().items = items;
        seq
    }

    /// Identity token of this node, used for parent-registry bucketing.
    pub fn identity(&self) -> u64 {
        self.inner.borrow().identity
    }

    /// Whether `other` is a handle to this very collection.
    pub fn same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().items.is_empty()
    }

    /// Whether `parent` currently holds a registered backreference to this
    /// node.
    pub fn has_parent(&self, parent: &Self) -> bool {
        let key = parent.identity();
        self.inner.borrow_mut().parents.contains(key, &parent.inner)
    }

    /// Closes the three notification streams. Calling it twice is an error.
    pub fn close(&self) -> Result<(), SeqError> {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            return Err(SeqError::AlreadyClosed);
        }
        inner.closed = true;
        inner.value_stream.close();
        inner.deep_stream.close();
        inner.flat_stream.close();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Registers `self` as a parent of a `Node` element.
    fn adopt(&self, element: &Element<T>) {
        if let Element::Node(child) = element {
            let key = self.inner.borrow().identity;
            child.inner.borrow_mut().parents.insert(key, &self.inner);
        }
    }

    /// Drops the parent registration for an evicted `Node` element, unless
    /// the node still occurs elsewhere in this collection.
    fn orphan(&self, element: &Element<T>) {
        if let Element::Node(child) = element {
            let still_present = self
                .inner
                .borrow()
                .items
                .iter()
                .any(|el| matches!(el, Element::Node(other) if other.same_node(child)));
            if !still_present {
                let key = self.inner.borrow().identity;
                child.inner.borrow_mut().parents.remove(key, &self.inner);
            }
        }
    }

    fn check_not_self(&self, element: &Element<T>) -> Result<(), SeqError> {
        match element {
            Element::Node(node) if node.same_node(self) => Err(SeqError::SelfInsertion),
            _ => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<(), SeqError> {
        if self.inner.borrow().closed {
            Err(SeqError::AlreadyClosed)
        } else {
            Ok(())
        }
    }
}

impl<T: Clone> ObservableSeq<T> {
    pub fn get(&self, index: usize) -> Option<Element<T>> {
        self.inner.borrow().items.get(index).cloned()
    }

    /// Snapshot of the current contents.
    pub fn value(&self) -> Vec<Element<T>> {
        self.inner.borrow().items.clone()
    }

    /// Pure read by recursive descent. Fails on an out-of-bounds index or on
    /// descent through a `Leaf`.
    pub fn element_at_path(&self, path: &[usize]) -> Result<Element<T>, SeqError> {
        if path.is_empty() {
            return Err(SeqError::EmptyPath);
        }
        let parent = self.resolve_parent(path)?;
        let index = path[path.len() - 1];
        parent.get(index).ok_or(SeqError::IndexOutOfBounds { index, len: parent.len() })
    }

    /// Resolves the collection owning the final index of `path`.
    fn resolve_parent(&self, path: &[usize]) -> Result<ObservableSeq<T>, SeqError> {
        let mut node = self.clone();
        for &index in &path[..path.len() - 1] {
            node = node.node_at(index)?;
        }
        Ok(node)
    }

    /// The `Node` child at `index`, or the appropriate usage error.
    fn node_at(&self, index: usize) -> Result<ObservableSeq<T>, SeqError> {
        let inner = self.inner.borrow();
        match inner.items.get(index) {
            Some(Element::Node(child)) => Ok(child.clone()),
            Some(Element::Leaf(_)) => Err(SeqError::NotANode { index }),
            None => Err(SeqError::IndexOutOfBounds { index, len: inner.items.len() }),
        }
    }

    /// Subscribes to the plain-value stream. The current contents are
    /// replayed to the listener immediately, then every completed
    /// transaction re-publishes.
    pub fn observe_value<F>(&self, mut listener: F) -> u64
    where
        F: FnMut(&Vec<Element<T>>) + 'static,
    {
        let (stream, current) = {
            let inner = self.inner.borrow();
            (inner.value_stream.clone(), inner.items.clone())
        };
        listener(&current);
        stream.subscribe(listener)
    }

    pub fn unobserve_value(&self, id: u64) -> bool {
        let stream = self.inner.borrow().value_stream.clone();
        stream.unsubscribe(id)
    }

    /// Subscribes to path-addressed change events.
    pub fn observe_changes<F>(&self, listener: F) -> u64
    where
        F: FnMut(&DeepChange<Element<T>>) + 'static,
    {
        self.inner.borrow().deep_stream.clone().subscribe(listener)
    }

    pub fn unobserve_changes(&self, id: u64) -> bool {
        let stream = self.inner.borrow().deep_stream.clone();
        stream.unsubscribe(id)
    }

    /// Subscribes to single-level change events. A transaction whose changes
    /// address deeper levels emits nothing here.
    pub fn observe_flat_changes<F>(&self, listener: F) -> u64
    where
        F: FnMut(&FlatChange<Element<T>>) + 'static,
    {
        self.inner.borrow().flat_stream.clone().subscribe(listener)
    }

    pub fn unobserve_flat_changes(&self, id: u64) -> bool {
        let stream = self.inner.borrow().flat_stream.clone();
        stream.unsubscribe(id)
    }
}

impl<T: Clone + PartialEq> ObservableSeq<T> {
    /// Opens an explicit transaction. Nested calls share the outer
    /// transaction; only the matching outermost [`end_transaction`] flushes.
    ///
    /// [`end_transaction`]: Self::end_transaction
    pub fn begin_transaction(&self) {
        self.inner.borrow_mut().txn_depth += 1;
    }

    /// Closes one level of transaction; the outermost close flushes the
    /// pending queue.
    pub fn end_transaction(&self) -> Result<(), SeqError> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.txn_depth == 0 {
                return Err(SeqError::UnbalancedTransaction);
            }
            inner.txn_depth -= 1;
            if inner.txn_depth > 0 {
                return Ok(());
            }
        }
        flush(&self.inner);
        Ok(())
    }

    /// Runs `f` inside one transaction: every mutation performed within
    /// coalesces into a single notification.
    pub fn transact<R>(&self, f: impl FnOnce(&Self) -> Result<R, SeqError>) -> Result<R, SeqError> {
        self.begin_transaction();
        let out = f(self);
        self.end_transaction().and(out)
    }

    /// Whole-sequence replace. The minimal edit script between the old and
    /// new contents is recorded as one composite change; equal contents
    /// record (and publish) nothing.
    pub fn set_value(&self, new_items: Vec<Element<T>>) -> Result<(), SeqError> {
        for element in &new_items {
            self.check_not_self(element)?;
        }
        self.with_txn(|seq| {
            let old = seq.inner.borrow().items.clone();
            let script = diff(&old, &new_items);
            let key = seq.identity();
            for element in &old {
                if let Element::Node(child) = element {
                    child.inner.borrow_mut().parents.remove(key, &seq.inner);
                }
            }
            for element in &new_items {
                seq.adopt(element);
            }
            seq.inner.borrow_mut().items = new_items;
            if script.is_empty() {
                return Ok(());
            }
            let changes = script
                .into_iter()
                .map(|edit| match edit {
                    Edit::Insert { index, element } => {
                        DeepChange::Insert { path: vec![index], element }
                    }
                    Edit::Remove { index, element } => {
                        DeepChange::Remove { path: vec![index], element }
                    }
                })
                .collect();
            seq.record(DeepChange::Composite(changes));
            Ok(())
        })
    }

    /// Splices `element` in at `index` (`index == len` appends).
    pub fn insert(&self, index: usize, element: Element<T>) -> Result<(), SeqError> {
        self.with_txn(|seq| seq.splice_insert(index, element))
    }

    /// Path form of [`insert`](Self::insert): a path longer than one
    /// delegates to the `Node` child at the head index, so the event is
    /// recorded by the node where the splice physically happens and reaches
    /// this node depth-shifted through the parent registry.
    pub fn insert_at_path(&self, path: &[usize], element: Element<T>) -> Result<(), SeqError> {
        self.with_txn(|seq| match path {
            [] => Err(SeqError::EmptyPath),
            [index] => seq.splice_insert(*index, element),
            [head, rest @ ..] => seq.node_at(*head)?.insert_at_path(rest, element),
        })
    }

    /// Removes and returns the element at `index`.
    pub fn remove_at(&self, index: usize) -> Result<Element<T>, SeqError> {
        self.with_txn(|seq| seq.splice_remove(index))
    }

    pub fn remove_at_path(&self, path: &[usize]) -> Result<Element<T>, SeqError> {
        self.with_txn(|seq| match path {
            [] => Err(SeqError::EmptyPath),
            [index] => seq.splice_remove(*index),
            [head, rest @ ..] => seq.node_at(*head)?.remove_at_path(rest),
        })
    }

    pub fn remove_first(&self) -> Result<Element<T>, SeqError> {
        self.with_txn(|seq| seq.splice_remove(0))
    }

    pub fn remove_last(&self) -> Result<Element<T>, SeqError> {
        self.with_txn(|seq| {
            let len = seq.len();
            if len == 0 {
                return Err(SeqError::IndexOutOfBounds { index: 0, len: 0 });
            }
            seq.splice_remove(len - 1)
        })
    }

    /// Empties the collection, recording one composite of per-slot removals
    /// at their original (non-renumbered) indices. A no-op when already
    /// empty.
    pub fn remove_all(&self) -> Result<(), SeqError> {
        self.with_txn(|seq| {
            let old = std::mem::take(&mut seq.inner.borrow_mut().items);
            if old.is_empty() {
                return Ok(());
            }
            for element in &old {
                seq.orphan(element);
            }
            let removes = old
                .into_iter()
                .enumerate()
                .map(|(index, element)| DeepChange::Remove { path: vec![index], element })
                .collect();
            seq.record(DeepChange::Composite(removes));
            Ok(())
        })
    }

    /// Replaces `range` with `replacement`. Overlapping slots record an
    /// `Update`; surplus old slots record `Remove`s at their original
    /// indices; surplus new elements record `Insert`s at their destination
    /// indices.
    pub fn replace_range(
        &self,
        range: Range<usize>,
        replacement: Vec<Element<T>>,
    ) -> Result<(), SeqError> {
        for element in &replacement {
            self.check_not_self(element)?;
        }
        self.with_txn(|seq| {
            let len = seq.len();
            if range.start > range.end || range.end > len {
                return Err(SeqError::RangeOutOfBounds {
                    start: range.start,
                    end: range.end,
                    len,
                });
            }
            let old_slice: Vec<Element<T>> = {
                let mut inner = seq.inner.borrow_mut();
                inner.items.splice(range.clone(), replacement.iter().cloned()).collect()
            };
            for element in &old_slice {
                seq.orphan(element);
            }
            for element in &replacement {
                seq.adopt(element);
            }

            let overlap = old_slice.len().min(replacement.len());
            let mut changes = Vec::new();
            for offset in 0..overlap {
                changes.push(DeepChange::Update {
                    path: vec![range.start + offset],
                    old: old_slice[offset].clone(),
                    new: replacement[offset].clone(),
                });
            }
            for offset in overlap..old_slice.len() {
                changes.push(DeepChange::Remove {
                    path: vec![range.start + offset],
                    element: old_slice[offset].clone(),
                });
            }
            for offset in overlap..replacement.len() {
                changes.push(DeepChange::Insert {
                    path: vec![range.start + offset],
                    element: replacement[offset].clone(),
                });
            }
            match changes.len() {
                0 => {}
                1 => seq.record(changes.remove(0)),
                _ => seq.record(DeepChange::Composite(changes)),
            }
            Ok(())
        })
    }

    /// Deep replace: resolves the parent collection by path-minus-last and
    /// replaces at the final index, recording an `Update` there.
    pub fn replace_at_path(&self, path: &[usize], element: Element<T>) -> Result<(), SeqError> {
        self.with_txn(|seq| match path {
            [] => Err(SeqError::EmptyPath),
            [index] => {
                seq.check_not_self(&element)?;
                seq.replace_existing(*index, element)
            }
            [head, rest @ ..] => seq.node_at(*head)?.replace_at_path(rest, element),
        })
    }

    /// Subscript write: an existing index replaces (recorded as `Update`),
    /// `index == len` appends, anything larger fails.
    pub fn set_at(&self, index: usize, element: Element<T>) -> Result<(), SeqError> {
        self.check_not_self(&element)?;
        let len = self.len();
        if index < len {
            self.with_txn(|seq| seq.replace_existing(index, element))
        } else if index == len {
            self.with_txn(|seq| seq.splice_insert(index, element))
        } else {
            Err(SeqError::IndexOutOfBounds { index, len })
        }
    }

    /// Moves the element at `from` so it ends up at `to`, recorded as a
    /// removal followed by an insertion (there is no dedicated move event).
    /// `to` addresses the post-removal sequence.
    pub fn move_item(&self, from: usize, to: usize) -> Result<(), SeqError> {
        self.with_txn(|seq| {
            let len = seq.len();
            if from >= len {
                return Err(SeqError::IndexOutOfBounds { index: from, len });
            }
            if to >= len {
                return Err(SeqError::IndexOutOfBounds { index: to, len });
            }
            let element = seq.splice_remove(from)?;
            seq.splice_insert(to, element)
        })
    }

    /// Deep move. Source and destination may live under different parents;
    /// a moved `Node`'s parent registration follows it.
    pub fn move_between_paths(&self, from: &[usize], to: &[usize]) -> Result<(), SeqError> {
        if from.is_empty() || to.is_empty() {
            return Err(SeqError::EmptyPath);
        }
        self.with_txn(|seq| {
            let source = seq.resolve_parent(from)?;
            let dest = seq.resolve_parent(to)?;
            let from_index = from[from.len() - 1];
            let to_index = to[to.len() - 1];
            if source.same_node(&dest) {
                return source.move_item(from_index, to_index);
            }

            // Validate both ends before touching either, so a failure never
            // leaves the element half-moved.
            let moved = source.get(from_index).ok_or(SeqError::IndexOutOfBounds {
                index: from_index,
                len: source.len(),
            })?;
            if let Element::Node(node) = &moved {
                if node.same_node(&dest) {
                    return Err(SeqError::SelfInsertion);
                }
            }
            let dest_len = dest.len();
            if to_index > dest_len {
                return Err(SeqError::IndexOutOfBounds { index: to_index, len: dest_len });
            }

            let element = source.with_txn(|s| s.splice_remove(from_index))?;
            dest.with_txn(|d| d.splice_insert(to_index, element))
        })
    }

    /// Wraps a mutation in the implicit transaction every public operation
    /// runs under.
    fn with_txn<R>(&self, f: impl FnOnce(&Self) -> Result<R, SeqError>) -> Result<R, SeqError> {
        self.ensure_open()?;
        self.begin_transaction();
        let out = f(self);
        self.end_transaction().and(out)
    }

    fn splice_insert(&self, index: usize, element: Element<T>) -> Result<(), SeqError> {
        self.check_not_self(&element)?;
        let len = self.len();
        if index > len {
            return Err(SeqError::IndexOutOfBounds { index, len });
        }
        self.adopt(&element);
        self.inner.borrow_mut().items.insert(index, element.clone());
        self.record(DeepChange::Insert { path: vec![index], element });
        Ok(())
    }

    fn splice_remove(&self, index: usize) -> Result<Element<T>, SeqError> {
        let len = self.len();
        if index >= len {
            return Err(SeqError::IndexOutOfBounds { index, len });
        }
        let removed = self.inner.borrow_mut().items.remove(index);
        self.orphan(&removed);
        self.record(DeepChange::Remove { path: vec![index], element: removed.clone() });
        Ok(removed)
    }

    fn replace_existing(&self, index: usize, element: Element<T>) -> Result<(), SeqError> {
        let len = self.len();
        if index >= len {
            return Err(SeqError::IndexOutOfBounds { index, len });
        }
        let old = {
            let mut inner = self.inner.borrow_mut();
            std::mem::replace(&mut inner.items[index], element.clone())
        };
        self.orphan(&old);
        self.adopt(&element);
        self.record(DeepChange::Update { path: vec![index], old, new: element });
        Ok(())
    }

    /// Appends an event to the pending queue and pushes depth-shifted
    /// copies into every ancestor's queue.
    fn record(&self, event: DeepChange<Element<T>>) {
        self.inner.borrow_mut().pending.push(event.clone());
        let mut visited = vec![self.identity()];
        propagate(&self.inner, &event, &mut visited);
    }
}

/// Pushes a depth-shifted copy of `event` into every live parent of `node`,
/// recursively. The visited list is scoped to the current descent path, so a
/// node reachable through two distinct parents receives one copy per path
/// while true cycles terminate.
fn propagate<T: Clone>(node: &Rc<Inner<T>>, event: &DeepChange<Element<T>>, visited: &mut Vec<u64>) {
    let parents = node.borrow_mut().parents.live();
    for parent in parents {
        let (parent_identity, index) = {
            let p = parent.borrow();
            let index = p
                .items
                .iter()
                .position(|el| matches!(el, Element::Node(other) if Rc::ptr_eq(&other.inner, node)));
            (p.identity, index)
        };
        // A registered parent that no longer holds the node is stale; skip it.
        let Some(index) = index else { continue };
        if visited.contains(&parent_identity) {
            continue;
        }
        trace!(parent = parent_identity, index, "propagating change upward");
        let shifted = event.increased_depth(index);
        parent.borrow_mut().pending.push(shifted.clone());
        visited.push(parent_identity);
        propagate(&parent, &shifted, visited);
        visited.pop();
    }
}

/// Publishes the pending queue of `node` as one event, then flushes every
/// idle ancestor, child first. A node with an empty queue publishes nothing.
fn flush<T: Clone>(node: &Rc<Inner<T>>) {
    let flushed = {
        let mut inner = node.borrow_mut();
        if inner.pending.is_empty() {
            None
        } else {
            let mut drained = std::mem::take(&mut inner.pending);
            let event = if drained.len() == 1 {
                drained.remove(0)
            } else {
                DeepChange::Composite(drained)
            };
            Some((
                event,
                inner.deep_stream.clone(),
                inner.flat_stream.clone(),
                inner.value_stream.clone(),
                inner.items.clone(),
                inner.identity,
            ))
        }
    };
    let Some((event, deep_stream, flat_stream, value_stream, items, identity)) = flushed else {
        return;
    };
    trace!(identity, "flushing pending changes");
    deep_stream.emit(&event);
    if let Some(flat) = event.flatten() {
        flat_stream.emit(&flat);
    }
    value_stream.emit(&items);
    flush_parents(node, &mut vec![identity]);
}

/// Flushes every ancestor of `node` whose own transaction depth is zero and
/// whose queue is non-empty. Ancestors mid-transaction keep accumulating
/// until their own outermost end.
fn flush_parents<T: Clone>(node: &Rc<Inner<T>>, visited: &mut Vec<u64>) {
    let parents = node.borrow_mut().parents.live();
    for parent in parents {
        let (parent_identity, ready) = {
            let p = parent.borrow();
            (p.identity, p.txn_depth == 0 && !p.pending.is_empty())
        };
        if visited.contains(&parent_identity) {
            continue;
        }
        if ready {
            visited.push(parent_identity);
            flush(&parent);
            visited.pop();
        }
    }
}
