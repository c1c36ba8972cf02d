/// Live merge cursors kept in descending order, so the smallest sits at the tail and is
/// removed without shifting. Reinsertion finds its slot with a binary search.
pub(crate) struct WorkingSet<T: Ord> {
    items: Vec<T>,
}

impl<T: Ord> WorkingSet<T> {
    pub(crate) fn new(mut items: Vec<T>) -> WorkingSet<T> {
        items.sort_unstable_by(|a, b| b.cmp(a));
        WorkingSet {
            items,
        }
    }

    pub(crate) fn pop_min(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub(crate) fn insert(&mut self, item: T) {
        let index = match self.items.binary_search_by(|probe| item.cmp(probe)) {
            Ok(index) | Err(index) => index,
        };
        self.items.insert(index, item);
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
