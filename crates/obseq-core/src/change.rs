//! Change event model: the deep (path-addressed) form and its flat
//! (single-level) projection.
//!
//! All operations here are pure: depth-shifting and flattening return new
//! events, nothing is mutated in place.

use crate::error::SeqError;

/// Root-relative position of an element in the collection tree, read
/// root-to-leaf. Non-empty for every leaf event.
pub type Path = Vec<usize>;

/// The kind of an atomic change. `Composite` events have no kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insertion,
    Removal,
    Update,
}

/// A change event addressed by a full path, able to describe an edit at any
/// depth of the collection tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DeepChange<E> {
    Insert { path: Path, element: E },
    Remove { path: Path, element: E },
    Update { path: Path, old: E, new: E },
    Composite(Vec<DeepChange<E>>),
}

/// A change event restricted to a single level: a bare index instead of a
/// path. Only constructible from deep events whose every path has length 1.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatChange<E> {
    Insert { index: usize, element: E },
    Remove { index: usize, element: E },
    Update { index: usize, old: E, new: E },
    Composite(Vec<FlatChange<E>>),
}

impl<E> DeepChange<E> {
    /// Builds an insertion event, rejecting the empty path.
    pub fn insert(path: Path, element: E) -> Result<Self, SeqError> {
        if path.is_empty() {
            return Err(SeqError::EmptyPath);
        }
        Ok(DeepChange::Insert { path, element })
    }

    /// Builds a removal event, rejecting the empty path.
    pub fn remove(path: Path, element: E) -> Result<Self, SeqError> {
        if path.is_empty() {
            return Err(SeqError::EmptyPath);
        }
        Ok(DeepChange::Remove { path, element })
    }

    /// Builds an update event, rejecting the empty path.
    pub fn update(path: Path, old: E, new: E) -> Result<Self, SeqError> {
        if path.is_empty() {
            return Err(SeqError::EmptyPath);
        }
        Ok(DeepChange::Update { path, old, new })
    }

    pub fn kind(&self) -> Option<ChangeKind> {
        match self {
            DeepChange::Insert { .. } => Some(ChangeKind::Insertion),
            DeepChange::Remove { .. } => Some(ChangeKind::Removal),
            DeepChange::Update { .. } => Some(ChangeKind::Update),
            DeepChange::Composite(_) => None,
        }
    }

    pub fn path(&self) -> Option<&[usize]> {
        match self {
            DeepChange::Insert { path, .. }
            | DeepChange::Remove { path, .. }
            | DeepChange::Update { path, .. } => Some(path),
            DeepChange::Composite(_) => None,
        }
    }

    /// The element removed or overwritten by this change.
    pub fn old_element(&self) -> Option<&E> {
        match self {
            DeepChange::Remove { element, .. } => Some(element),
            DeepChange::Update { old, .. } => Some(old),
            _ => None,
        }
    }

    /// The element introduced by this change.
    pub fn new_element(&self) -> Option<&E> {
        match self {
            DeepChange::Insert { element, .. } => Some(element),
            DeepChange::Update { new, .. } => Some(new),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&[DeepChange<E>]> {
        match self {
            DeepChange::Composite(children) => Some(children),
            _ => None,
        }
    }
}

impl<E: Clone> DeepChange<E> {
    /// Returns this event as seen from one level further up the tree:
    /// `index` is prepended to every leaf path, recursively through
    /// `Composite`.
    pub fn increased_depth(&self, index: usize) -> Self {
        let shift = |path: &Path| {
            let mut shifted = Vec::with_capacity(path.len() + 1);
            shifted.push(index);
            shifted.extend_from_slice(path);
            shifted
        };
        match self {
            DeepChange::Insert { path, element } => DeepChange::Insert {
                path: shift(path),
                element: element.clone(),
            },
            DeepChange::Remove { path, element } => DeepChange::Remove {
                path: shift(path),
                element: element.clone(),
            },
            DeepChange::Update { path, old, new } => DeepChange::Update {
                path: shift(path),
                old: old.clone(),
                new: new.clone(),
            },
            DeepChange::Composite(children) => DeepChange::Composite(
                children.iter().map(|child| child.increased_depth(index)).collect(),
            ),
        }
    }

    /// Attempts the flat projection of this event.
    ///
    /// Leaf events flatten iff their path has length 1. A `Composite`
    /// flattens each child and discards the unrepresentable ones; when
    /// nothing survives the composite itself has no flat projection.
    pub fn flatten(&self) -> Option<FlatChange<E>> {
        match self {
            DeepChange::Insert { path, element } if path.len() == 1 => Some(FlatChange::Insert {
                index: path[0],
                element: element.clone(),
            }),
            DeepChange::Remove { path, element } if path.len() == 1 => Some(FlatChange::Remove {
                index: path[0],
                element: element.clone(),
            }),
            DeepChange::Update { path, old, new } if path.len() == 1 => Some(FlatChange::Update {
                index: path[0],
                old: old.clone(),
                new: new.clone(),
            }),
            DeepChange::Composite(children) => {
                let kept: Vec<FlatChange<E>> =
                    children.iter().filter_map(|child| child.flatten()).collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(FlatChange::Composite(kept))
                }
            }
            _ => None,
        }
    }
}

impl<E> FlatChange<E> {
    pub fn kind(&self) -> Option<ChangeKind> {
        match self {
            FlatChange::Insert { .. } => Some(ChangeKind::Insertion),
            FlatChange::Remove { .. } => Some(ChangeKind::Removal),
            FlatChange::Update { .. } => Some(ChangeKind::Update),
            FlatChange::Composite(_) => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            FlatChange::Insert { index, .. }
            | FlatChange::Remove { index, .. }
            | FlatChange::Update { index, .. } => Some(*index),
            FlatChange::Composite(_) => None,
        }
    }

    pub fn old_element(&self) -> Option<&E> {
        match self {
            FlatChange::Remove { element, .. } => Some(element),
            FlatChange::Update { old, .. } => Some(old),
            _ => None,
        }
    }

    pub fn new_element(&self) -> Option<&E> {
        match self {
            FlatChange::Insert { element, .. } => Some(element),
            FlatChange::Update { new, .. } => Some(new),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&[FlatChange<E>]> {
        match self {
            FlatChange::Composite(children) => Some(children),
            _ => None,
        }
    }
}
