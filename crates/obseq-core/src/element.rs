//! The Leaf/Node sum type stored in a collection slot.

use crate::seq::ObservableSeq;

/// A single slot of an [`ObservableSeq`]: either a plain value or a nested
/// collection of the same element type.
///
/// Algorithms that care whether a slot is a sub-collection branch on this
/// tag; there is no runtime downcasting anywhere.
#[derive(Debug)]
pub enum Element<T> {
    Leaf(T),
    Node(ObservableSeq<T>),
}

impl<T> Element<T> {
    pub fn leaf(value: T) -> Self {
        Element::Leaf(value)
    }

    pub fn node(seq: ObservableSeq<T>) -> Self {
        Element::Node(seq)
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Element::Node(_))
    }

    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            Element::Leaf(value) => Some(value),
            Element::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&ObservableSeq<T>> {
        match self {
            Element::Leaf(_) => None,
            Element::Node(seq) => Some(seq),
        }
    }
}

/// `Leaf` clones the value; `Node` shares the same underlying collection.
impl<T: Clone> Clone for Element<T> {
    fn clone(&self) -> Self {
        match self {
            Element::Leaf(value) => Element::Leaf(value.clone()),
            Element::Node(seq) => Element::Node(seq.clone()),
        }
    }
}

/// `Leaf`s compare by value, `Node`s by handle identity; the variants are
/// never equal to each other.
impl<T: PartialEq> PartialEq for Element<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Element::Leaf(a), Element::Leaf(b)) => a == b,
            (Element::Node(a), Element::Node(b)) => a.same_node(b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_equality_is_by_value() {
        assert_eq!(Element::leaf(3), Element::leaf(3));
        assert_ne!(Element::leaf(3), Element::leaf(4));
    }

    #[test]
    fn node_equality_is_by_identity() {
        let a: ObservableSeq<i32> = ObservableSeq::new();
        let b: ObservableSeq<i32> = ObservableSeq::new();
        assert_eq!(Element::node(a.clone()), Element::node(a.clone()));
        assert_ne!(Element::node(a.clone()), Element::node(b));
        assert_ne!(Element::node(a), Element::leaf(0));
    }

    #[test]
    fn tag_accessors() {
        let leaf: Element<i32> = Element::leaf(1);
        assert!(!leaf.is_node());
        assert_eq!(leaf.as_leaf(), Some(&1));
        assert!(leaf.as_node().is_none());

        let node: Element<i32> = Element::node(ObservableSeq::new());
        assert!(node.is_node());
        assert!(node.as_leaf().is_none());
        assert!(node.as_node().is_some());
    }
}
