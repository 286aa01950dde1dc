//! Stable handles for the nodes of the queried declaration graph.
//!
//! Requests key declarations by [`Id`] instead of by address. An id stays
//! meaningful for as long as its [`Arena`] lives, whether or not the host
//! moves the underlying nodes around.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::Index,
};

/// A typed index into an [`Arena<T>`].
///
/// `Id<T>` is `Copy`, ordered and hashable regardless of `T`.
pub struct Id<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    /// Creates an id from a raw index.
    #[must_use]
    pub const fn from_raw(index: u32) -> Self {
        Self { index, _marker: PhantomData }
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn raw(self) -> u32 { self.index }

    /// Returns the index as a `usize`.
    #[must_use]
    pub const fn index(self) -> usize { self.index as usize }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self { *self }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool { self.index == other.index }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering { self.index.cmp(&other.index) }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) { self.index.hash(state); }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Append-only storage handing out [`Id`]s.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self { Self { items: Vec::new() } }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Stores `item` and returns its id.
    ///
    /// # Panics
    ///
    /// Panics if the arena already holds `u32::MAX` items.
    pub fn alloc(&mut self, item: T) -> Id<T> {
        let index = u32::try_from(self.items.len())
            .ok()
            .filter(|index| *index != u32::MAX)
            .unwrap_or_else(|| panic!("arena exhausted its id space"));

        self.items.push(item);

        Id::from_raw(index)
    }

    /// Returns the item of `id`, if the id belongs to this arena.
    #[must_use]
    pub fn get(&self, id: Id<T>) -> Option<&T> { self.items.get(id.index()) }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize { self.items.len() }

    /// Returns whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Iterates over the items with their ids, in allocation order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (Id<T>, &T)> {
        self.items.iter().enumerate().map(|(index, item)| {
            #[allow(clippy::cast_possible_truncation)]
            (Id::from_raw(index as u32), item)
        })
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: Id<T>) -> &T { &self.items[id.index()] }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::{Arena, Id};

    #[derive(Debug, PartialEq)]
    struct Class(&'static str);

    #[test]
    fn ids_are_allocation_order() {
        let mut arena = Arena::new();

        let object = arena.alloc(Class("NSObject"));
        let view = arena.alloc(Class("UIView"));

        assert!(object < view);
        assert_eq!(view.raw(), 1);
        assert_eq!(arena[object], Class("NSObject"));
        assert_eq!(arena.get(view), Some(&Class("UIView")));
        assert_eq!(arena.get(Id::from_raw(2)), None);
        assert_eq!(
            arena.iter().map(|(id, class)| (id, class.0)).collect::<Vec<_>>(),
            [(object, "NSObject"), (view, "UIView")]
        );
    }

    #[test]
    fn ids_hash_by_index() {
        // `Class` is neither `Hash` nor `Copy`; the id still is
        let first = Id::<Class>::from_raw(4);
        let again = first;

        let set = [first, again, Id::from_raw(5)]
            .into_iter()
            .collect::<HashSet<_>>();

        assert_eq!(set.len(), 2);
        assert_eq!(format!("{first:?}"), "#4");
    }
}
