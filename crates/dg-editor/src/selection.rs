use crate::controller::ControllerId;

/// Ordered selection; the last item is the primary selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionModel {
    items: Vec<ControllerId>,
}

impl SelectionModel {
    pub fn items(&self) -> &[ControllerId] {
        &self.items
    }

    pub fn primary(&self) -> Option<ControllerId> {
        self.items.last().copied()
    }

    pub fn contains(&self, id: ControllerId) -> bool {
        self.items.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move `id` to the end. Returns the previous primary.
    pub fn append(&mut self, id: ControllerId) -> Option<ControllerId> {
        let previous = self.primary();
        self.items.retain(|c| *c != id);
        self.items.push(id);
        previous
    }

    pub fn remove(&mut self, id: ControllerId) -> bool {
        let before = self.items.len();
        self.items.retain(|c| *c != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) -> Vec<ControllerId> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::NodeIndex;

    fn id(n: u32) -> ControllerId {
        ControllerId(NodeIndex::new(n as usize))
    }

    #[test]
    fn append_moves_to_primary() {
        let mut s = SelectionModel::default();
        assert_eq!(s.append(id(1)), None);
        assert_eq!(s.append(id(2)), Some(id(1)));
        assert_eq!(s.append(id(1)), Some(id(2)));
        assert_eq!(s.items(), &[id(2), id(1)]);
        assert_eq!(s.primary(), Some(id(1)));
    }

    #[test]
    fn remove_promotes_previous() {
        let mut s = SelectionModel::default();
        s.append(id(1));
        s.append(id(2));
        assert!(s.remove(id(2)));
        assert!(!s.remove(id(2)));
        assert_eq!(s.primary(), Some(id(1)));
    }
}
