/// A simple slab.
///
/// A `Slab` stores values in a contiguous array and hands out stable
/// indices. A removed value's index is reused by a later insertion.
pub(crate) struct Slab<T> {
    /// Storage for items; `None` marks a free slot.
    items: Vec<Option<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates an empty slab.
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Inserts a value and returns its index.
    ///
    /// The most recently freed slot is reused first; otherwise the slab
    /// grows by one.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        let index = match self.free.pop() {
            Some(i) => {
                self.items[i] = Some(item);
                i
            }
            None => {
                self.items.push(Some(item));
                self.items.len() - 1
            }
        };

        self.len += 1;
        index
    }

    /// Removes and returns the value at `index`, if occupied.
    pub(crate) fn remove(&mut self, index: usize) -> Option<T> {
        let item = self.items.get_mut(index)?.take()?;

        self.free.push(index);
        self.len -= 1;

        Some(item)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)?.as_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Iterates over occupied slots with their indices.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|item| (i, item)))
    }

    /// Removes every value for which `keep` returns `false`.
    ///
    /// Returns the number of values removed.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&mut T) -> bool) -> usize {
        let mut removed = 0;

        for (i, slot) in self.items.iter_mut().enumerate() {
            let drop_it = match slot {
                Some(item) => !keep(item),
                None => false,
            };

            if drop_it {
                *slot = None;
                self.free.push(i);
                removed += 1;
            }
        }

        self.len -= removed;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_index_is_reused() {
        let mut slab = Slab::new();
        let a = slab.insert("a");
        let b = slab.insert("b");
        assert_ne!(a, b);

        assert_eq!(slab.remove(a), Some("a"));
        assert_eq!(slab.remove(a), None);

        let c = slab.insert("c");
        assert_eq!(c, a);
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn retain_frees_slots() {
        let mut slab = Slab::new();
        for n in 0..6 {
            slab.insert(n);
        }

        let removed = slab.retain(|n| *n % 2 == 0);
        assert_eq!(removed, 3);
        assert_eq!(slab.len(), 3);

        let kept: Vec<i32> = slab.iter_mut().map(|(_, n)| *n).collect();
        assert_eq!(kept, vec![0, 2, 4]);

        assert_eq!(slab.get_mut(1), None);
        assert_eq!(slab.get_mut(2).copied(), Some(2));
    }
}
