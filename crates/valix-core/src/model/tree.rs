use derive_more::{Display, From};

///
/// NodeId
///
/// Structural node identifier. Ids are assigned in level order, so a parent
/// always sorts before its children and siblings are contiguous.
///

#[derive(Clone, Copy, Debug, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(u64);

impl NodeId {
    pub const ROOT: Self = Self(1);

    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

///
/// TreeNumbering
///
/// Level-order numbering of one document tree. Every node on level `l` has
/// room for `fanout[l]` children; the root is id 1 on level 0. Parent and
/// level are pure arithmetic on the id.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreeNumbering {
    fanout: Vec<u64>,
    level_start: Vec<u64>,
}

impl TreeNumbering {
    /// Build a numbering from per-level child capacities. A zero capacity
    /// ends the tree at that level.
    #[must_use]
    pub fn new(fanout: &[u64]) -> Self {
        let mut level_start = vec![NodeId::ROOT.get()];
        let mut level_width = 1u64;
        let mut kept = Vec::with_capacity(fanout.len());

        for &capacity in fanout {
            if capacity == 0 {
                break;
            }
            let Some(next_width) = level_width.checked_mul(capacity) else {
                break;
            };
            let Some(next_start) = level_start
                .last()
                .and_then(|start| start.checked_add(level_width))
            else {
                break;
            };

            kept.push(capacity);
            level_start.push(next_start);
            level_width = next_width;
        }

        Self {
            fanout: kept,
            level_start,
        }
    }

    /// Number of levels, the root level included.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.level_start.len()
    }

    /// Level of `node`; ids beyond the last level count as the last level.
    #[must_use]
    pub fn level(&self, node: NodeId) -> u32 {
        let level = self
            .level_start
            .partition_point(|&start| start <= node.get())
            .saturating_sub(1);

        u32::try_from(level).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        let level = self.level(node) as usize;
        if level == 0 || node.get() < NodeId::ROOT.get() {
            return None;
        }

        let offset = node.get() - self.level_start[level];
        let parent_offset = offset / self.fanout[level - 1];

        Some(NodeId::new(self.level_start[level - 1] + parent_offset))
    }

    /// Id of the first child slot of `node`, if the tree has a next level.
    #[must_use]
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        let level = self.level(node) as usize;
        let next_start = *self.level_start.get(level + 1)?;
        let offset = node.get().checked_sub(self.level_start[level])?;

        offset
            .checked_mul(self.fanout[level])
            .and_then(|o| o.checked_add(next_start))
            .map(NodeId::new)
    }

    /// True when `node` lies strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            if parent == ancestor {
                return true;
            }
            if parent < ancestor {
                return false;
            }
            current = parent;
        }

        false
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{NodeId, TreeNumbering};

    // root(1) -> children 2..=4 -> each with two children 5..=10
    fn small_tree() -> TreeNumbering {
        TreeNumbering::new(&[3, 2])
    }

    #[test]
    fn levels_follow_level_order_numbering() {
        let tree = small_tree();

        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.level(NodeId::ROOT), 0);
        assert_eq!(tree.level(NodeId::new(4)), 1);
        assert_eq!(tree.level(NodeId::new(5)), 2);
        assert_eq!(tree.level(NodeId::new(10)), 2);
    }

    #[test]
    fn parent_and_first_child_are_inverse() {
        let tree = small_tree();

        assert_eq!(tree.parent(NodeId::ROOT), None);
        assert_eq!(tree.first_child(NodeId::ROOT), Some(NodeId::new(2)));
        assert_eq!(tree.first_child(NodeId::new(3)), Some(NodeId::new(7)));
        assert_eq!(tree.parent(NodeId::new(7)), Some(NodeId::new(3)));
        assert_eq!(tree.parent(NodeId::new(8)), Some(NodeId::new(3)));
        assert_eq!(tree.parent(NodeId::new(10)), Some(NodeId::new(4)));
        assert_eq!(tree.first_child(NodeId::new(9)), None);
    }

    #[test]
    fn descendant_test_walks_parent_chain() {
        let tree = small_tree();

        assert!(tree.is_descendant(NodeId::ROOT, NodeId::new(9)));
        assert!(tree.is_descendant(NodeId::new(3), NodeId::new(8)));
        assert!(!tree.is_descendant(NodeId::new(3), NodeId::new(9)));
        assert!(!tree.is_descendant(NodeId::new(3), NodeId::new(3)));
    }

    #[test]
    fn zero_capacity_truncates_tree() {
        let tree = TreeNumbering::new(&[4, 0, 9]);

        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.first_child(NodeId::new(2)), None);
    }
}
