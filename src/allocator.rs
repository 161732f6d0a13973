use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// An axis-aligned rectangle inside the atlas.
///
/// Equality is componentwise. A region handed back from [`AtlasManager::free`]
/// becomes [`INVALID_REGION`]; the caller should treat it as surrendered.
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Sentinel returned in place of a region that no longer refers to anything
/// (a failed [`AtlasManager::allocate`], or the caller's handle after
/// [`AtlasManager::free`]). Never appears as a real node's region.
pub const INVALID_REGION: Region = Region {
    x: u32::MAX,
    y: u32::MAX,
    width: 0,
    height: 0,
};

impl Region {
    /// True iff this region covers no area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn overlaps(&self, other: &Region) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// A handle into the node arena. `NONE` marks the absence of a parent (the
/// root) and is never returned from a lookup that is expected to succeed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct NodeIndex(u32);

impl NodeIndex {
    const NONE: NodeIndex = NodeIndex(u32::MAX);

    fn index(self) -> usize {
        self.0 as usize
    }

    fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

const MAX_CHILDREN: usize = 3;

/// A split produces 2 or 3 children; a fixed-capacity inline buffer avoids
/// a heap allocation per split for what is, at most, a 3-element list.
#[derive(Clone, Copy, Debug)]
struct Children {
    items: [NodeIndex; MAX_CHILDREN],
    len: u8,
}

impl Children {
    fn none() -> Self {
        Children {
            items: [NodeIndex::NONE; MAX_CHILDREN],
            len: 0,
        }
    }

    fn push(&mut self, idx: NodeIndex) {
        debug_assert!((self.len as usize) < MAX_CHILDREN, "a split never produces more than 3 children");
        self.items[self.len as usize] = idx;
        self.len += 1;
    }

    fn as_slice(&self) -> &[NodeIndex] {
        &self.items[..self.len as usize]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeState {
    Free,
    Allocated,
    Internal,
    /// A recycled slot sitting on the arena's free-slot stack. Never
    /// reachable from the tree and never registered in any index.
    Unused,
}

#[derive(Clone, Debug)]
struct Node {
    parent: NodeIndex,
    region: Region,
    state: NodeState,
    children: Children,
}

/// Orders regions primarily by width, then height, then position, matching
/// the `by-width` free index from the data model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WidthKey(Region);

impl PartialOrd for WidthKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WidthKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0.width, self.0.height, self.0.x, self.0.y)
            .cmp(&(other.0.width, other.0.height, other.0.x, other.0.y))
    }
}

/// Orders regions primarily by height, then width, then position, matching
/// the `by-height` free index from the data model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct HeightKey(Region);

impl PartialOrd for HeightKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeightKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0.height, self.0.width, self.0.x, self.0.y)
            .cmp(&(other.0.height, other.0.width, other.0.x, other.0.y))
    }
}

/// A dynamic 2D rectangle atlas allocator using a guillotine-style
/// partition tree with best-fit placement and merge-on-free.
///
/// ## The data structure
///
/// The atlas is represented as a tree of nodes held in a single arena
/// (`Vec<Node>`), referenced by small copyable `NodeIndex` handles rather
/// than pointers. The root covers the whole atlas. A leaf is either a free
/// rectangle or an allocated one; an internal node has no region of its
/// own beyond the union of its 2 or 3 children, which tile it exactly.
///
/// Two ordered indices (`by_width`, `by_height`) track every free leaf so
/// that `allocate` can find a best-fit candidate without visiting the
/// whole tree, and a hash map tracks every allocated leaf keyed by the
/// exact region handed back to the caller, so `free` is a single lookup.
///
/// ## Splitting
///
/// When the chosen free leaf is larger than the request in exactly one
/// dimension, it splits into two children: the placed rectangle and a
/// single leftover strip. When it is larger in both dimensions, it splits
/// into three: the placed rectangle, and two strips covering the rest,
/// laid out along whichever axis (width or height) was longer before the
/// split.
///
/// ## Merging
///
/// Freeing a leaf walks up towards the root: whenever every child of the
/// current node is a free leaf, the children are dropped and the parent
/// itself becomes a single free leaf covering their union, continuing the
/// walk from there. This restores the tree to the shape it had before the
/// corresponding `allocate` call whenever nothing else was carved out of
/// its siblings in the meantime.
pub struct AtlasManager {
    nodes: Vec<Node>,
    free_slots: Vec<NodeIndex>,
    by_width: BTreeMap<WidthKey, NodeIndex>,
    by_height: BTreeMap<HeightKey, NodeIndex>,
    allocated: HashMap<Region, NodeIndex>,
    root: NodeIndex,
    width: u32,
    height: u32,
}

impl AtlasManager {
    /// Create an atlas allocator covering `(0, 0, width, height)`.
    ///
    /// `width` or `height` of zero is accepted: the manager is built
    /// normally but its single root leaf is then empty, so it can never
    /// satisfy an allocation (every `allocate` call requires strictly
    /// positive dimensions).
    pub fn new(width: u32, height: u32) -> Self {
        let region = Region {
            x: 0,
            y: 0,
            width,
            height,
        };

        let mut manager = AtlasManager {
            nodes: vec![Node {
                parent: NodeIndex::NONE,
                region,
                state: NodeState::Free,
                children: Children::none(),
            }],
            free_slots: Vec::new(),
            by_width: BTreeMap::new(),
            by_height: BTreeMap::new(),
            allocated: HashMap::new(),
            root: NodeIndex(0),
            width,
            height,
        };

        manager.register_node(manager.root);

        manager
    }

    /// The atlas width this manager was constructed with.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The atlas height this manager was constructed with.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Allocate a `width x height` rectangle, picking the best-fit free
    /// leaf by area. Returns [`INVALID_REGION`] if no free leaf is large
    /// enough, or if `width` or `height` is zero; the latter is a caller
    /// bug, reported to stderr and otherwise folded into the same harmless
    /// capacity-failure return rather than a panic, so a stray zero-size
    /// request can never take the process down.
    pub fn allocate(&mut self, width: u32, height: u32) -> Region {
        if width == 0 || height == 0 {
            eprintln!(
                "rect-atlas: allocate() called with a zero dimension ({width}x{height})",
            );
            return INVALID_REGION;
        }

        let chosen_region = match self.find_candidate(width, height) {
            Some(region) => region,
            None => return INVALID_REGION,
        };

        let chosen_idx = *self
            .by_width
            .get(&WidthKey(chosen_region))
            .expect("a region returned by find_candidate is always a registered free leaf");

        self.unregister_node(chosen_idx);

        let placed = if chosen_region.width == width && chosen_region.height == height {
            self.nodes[chosen_idx.index()].state = NodeState::Allocated;
            self.register_node(chosen_idx);
            chosen_region
        } else {
            self.split(chosen_idx, chosen_region, width, height)
        };

        #[cfg(feature = "checks")]
        self.check_invariants();

        placed
    }

    /// Release a region previously returned by `allocate`, merging it with
    /// free siblings as far up the tree as the shape of the current
    /// packing allows.
    ///
    /// Calling this with a region that is not currently allocated is a
    /// caller bug; it is reported to stderr and otherwise treated as a
    /// no-op, deliberately without panicking (a stray double-free must not
    /// bring the process down from inside a call that returns `()`).
    pub fn free(&mut self, region: Region) {
        let idx = match self.allocated.get(&region) {
            Some(&idx) => idx,
            None => {
                eprintln!(
                    "rect-atlas: free() called with a region that is not currently allocated: {region:?}",
                );
                return;
            }
        };

        self.unregister_node(idx);
        self.nodes[idx.index()].state = NodeState::Free;
        self.register_node(idx);

        let mut node = idx;
        loop {
            let parent = self.nodes[node.index()].parent;
            if parent.is_none() || !self.all_children_are_free_leaves(parent) {
                break;
            }

            let children: [NodeIndex; MAX_CHILDREN] = {
                let mut buf = [NodeIndex::NONE; MAX_CHILDREN];
                let slice = self.nodes[parent.index()].children.as_slice();
                buf[..slice.len()].copy_from_slice(slice);
                buf
            };
            let child_count = self.nodes[parent.index()].children.len as usize;

            for &child in &children[..child_count] {
                self.unregister_node(child);
                self.recycle_node(child);
            }

            self.nodes[parent.index()].state = NodeState::Free;
            self.nodes[parent.index()].children = Children::none();
            self.register_node(parent);

            node = parent;
        }

        #[cfg(feature = "checks")]
        self.check_invariants();
    }

    /// Visit every currently free leaf's region. Debug/test introspection
    /// only; never used by `allocate` or `free` themselves.
    pub fn for_each_free_region<F: FnMut(Region)>(&self, mut f: F) {
        for key in self.by_width.keys() {
            f(key.0);
        }
    }

    /// Visit every currently allocated region. Debug/test introspection
    /// only; never used by `allocate` or `free` themselves.
    pub fn for_each_allocated_region<F: FnMut(Region)>(&self, mut f: F) {
        for region in self.allocated.keys() {
            f(*region);
        }
    }

    fn find_candidate(&self, width: u32, height: u32) -> Option<Region> {
        let a = self.find_by_width(width, height);
        let b = self.find_by_height(width, height);

        match (a, b) {
            (Some(ra), Some(rb)) => Some(if ra.area() <= rb.area() { ra } else { rb }),
            (Some(ra), None) => Some(ra),
            (None, Some(rb)) => Some(rb),
            (None, None) => None,
        }
    }

    fn find_by_width(&self, width: u32, height: u32) -> Option<Region> {
        let start = WidthKey(Region { x: 0, y: 0, width, height: 0 });
        self.by_width
            .range(start..)
            .find(|(key, _)| key.0.height >= height)
            .map(|(key, _)| key.0)
    }

    fn find_by_height(&self, width: u32, height: u32) -> Option<Region> {
        let start = HeightKey(Region { x: 0, y: 0, width: 0, height });
        self.by_height
            .range(start..)
            .find(|(key, _)| key.0.width >= width)
            .map(|(key, _)| key.0)
    }

    /// Split `chosen_idx` (whose region is `r`) to place a `width x height`
    /// rectangle in its bottom-left corner, turning it into an internal
    /// node with 2 or 3 children. Returns the placed rectangle.
    fn split(&mut self, chosen_idx: NodeIndex, r: Region, width: u32, height: u32) -> Region {
        let placed = Region { x: r.x, y: r.y, width, height };
        let exceeds_width = r.width > width;
        let exceeds_height = r.height > height;

        let mut siblings: [Option<Region>; 2] = [None, None];
        if exceeds_width && !exceeds_height {
            siblings[0] = Some(Region {
                x: r.x + width,
                y: r.y,
                width: r.width - width,
                height: r.height,
            });
        } else if exceeds_height && !exceeds_width {
            siblings[0] = Some(Region {
                x: r.x,
                y: r.y + height,
                width: r.width,
                height: r.height - height,
            });
        } else {
            debug_assert!(exceeds_width && exceeds_height);
            if r.width > r.height {
                // Long axis horizontal: full-height right strip, then the
                // top-of-remaining strip above the placed rectangle.
                siblings[0] = Some(Region {
                    x: r.x + width,
                    y: r.y,
                    width: r.width - width,
                    height: r.height,
                });
                siblings[1] = Some(Region {
                    x: r.x,
                    y: r.y + height,
                    width,
                    height: r.height - height,
                });
            } else {
                // Long axis vertical: full-width top strip, then the
                // right-of-placed strip beside the placed rectangle.
                siblings[0] = Some(Region {
                    x: r.x,
                    y: r.y + height,
                    width: r.width,
                    height: r.height - height,
                });
                siblings[1] = Some(Region {
                    x: r.x + width,
                    y: r.y,
                    width: r.width - width,
                    height,
                });
            }
        }

        self.nodes[chosen_idx.index()].state = NodeState::Internal;

        let mut children = Children::none();

        let child0 = self.new_node(chosen_idx, placed, NodeState::Allocated);
        self.register_node(child0);
        children.push(child0);

        for sibling in siblings.iter().flatten() {
            let idx = self.new_node(chosen_idx, *sibling, NodeState::Free);
            self.register_node(idx);
            children.push(idx);
        }

        self.nodes[chosen_idx.index()].children = children;

        placed
    }

    fn all_children_are_free_leaves(&self, idx: NodeIndex) -> bool {
        self.nodes[idx.index()]
            .children
            .as_slice()
            .iter()
            .all(|&child| self.nodes[child.index()].state == NodeState::Free)
    }

    /// The only place nodes enter an index: allocated leaves go into the
    /// allocated map, free leaves go into both ordered indices. Internal
    /// and unused nodes are never registered.
    fn register_node(&mut self, idx: NodeIndex) {
        let node = &self.nodes[idx.index()];
        match node.state {
            NodeState::Allocated => {
                self.allocated.insert(node.region, idx);
            }
            NodeState::Free => {
                self.by_width.insert(WidthKey(node.region), idx);
                self.by_height.insert(HeightKey(node.region), idx);
            }
            NodeState::Internal | NodeState::Unused => {
                unreachable!("internal and unused nodes are never registered");
            }
        }
    }

    /// The exact inverse of `register_node`. Must be called while the
    /// node's state and region still reflect how it was registered.
    fn unregister_node(&mut self, idx: NodeIndex) {
        let node = &self.nodes[idx.index()];
        match node.state {
            NodeState::Allocated => {
                self.allocated.remove(&node.region);
            }
            NodeState::Free => {
                self.by_width.remove(&WidthKey(node.region));
                self.by_height.remove(&HeightKey(node.region));
            }
            NodeState::Internal | NodeState::Unused => {
                unreachable!("internal and unused nodes are never registered");
            }
        }
    }

    /// Allocate a node slot, reusing a recycled one if the arena's
    /// free-slot stack is non-empty.
    fn new_node(&mut self, parent: NodeIndex, region: Region, state: NodeState) -> NodeIndex {
        if let Some(idx) = self.free_slots.pop() {
            self.nodes[idx.index()] = Node { parent, region, state, children: Children::none() };
            idx
        } else {
            self.nodes.push(Node { parent, region, state, children: Children::none() });
            NodeIndex(self.nodes.len() as u32 - 1)
        }
    }

    fn recycle_node(&mut self, idx: NodeIndex) {
        let node = &mut self.nodes[idx.index()];
        node.state = NodeState::Unused;
        node.children = Children::none();
        self.free_slots.push(idx);
    }

    #[cfg(feature = "checks")]
    fn check_invariants(&self) {
        self.check_node(self.root);

        assert_eq!(
            self.by_width.len(),
            self.by_height.len(),
            "the by-width and by-height free indices have diverged in size",
        );
        for key in self.by_width.keys() {
            assert!(
                self.by_height.contains_key(&HeightKey(key.0)),
                "region {:?} is registered in by-width but missing from by-height",
                key.0,
            );
        }

        let allocated: Vec<Region> = self.allocated.keys().copied().collect();
        for (i, a) in allocated.iter().enumerate() {
            assert!(!a.is_empty(), "allocated region {a:?} must not be empty");
            assert!(
                a.x + a.width <= self.width && a.y + a.height <= self.height,
                "allocated region {a:?} escapes the {}x{} atlas",
                self.width,
                self.height,
            );
            for b in &allocated[i + 1..] {
                assert!(!a.overlaps(b), "allocated regions {a:?} and {b:?} overlap");
            }
        }

        let total_area = self.sum_leaf_areas(self.root);
        assert_eq!(
            total_area,
            self.width as u64 * self.height as u64,
            "leaf areas do not sum to the atlas area",
        );
    }

    #[cfg(feature = "checks")]
    fn check_node(&self, idx: NodeIndex) {
        let node = &self.nodes[idx.index()];
        match node.state {
            NodeState::Unused => panic!("an unused (recycled) node must never be reachable from the tree"),
            NodeState::Free | NodeState::Allocated => {
                assert!(node.children.as_slice().is_empty(), "a leaf must not have children");
            }
            NodeState::Internal => {
                let children = node.children.as_slice();
                assert!(
                    children.len() == 2 || children.len() == 3,
                    "an internal node must have 2 or 3 children, found {}",
                    children.len(),
                );

                let mut covered_area = 0u64;
                for (i, &child) in children.iter().enumerate() {
                    let child_node = &self.nodes[child.index()];
                    assert_eq!(child_node.parent, idx, "child's parent back-reference is wrong");
                    assert!(
                        region_inside(child_node.region, node.region),
                        "child region {:?} is not strictly inside parent {:?}",
                        child_node.region,
                        node.region,
                    );
                    for &other in &children[i + 1..] {
                        assert!(
                            !child_node.region.overlaps(&self.nodes[other.index()].region),
                            "sibling regions overlap under parent {:?}",
                            node.region,
                        );
                    }
                    covered_area += child_node.region.area();
                    self.check_node(child);
                }

                assert_eq!(
                    covered_area,
                    node.region.area(),
                    "children do not tile parent {:?} exactly",
                    node.region,
                );
            }
        }
    }

    #[cfg(feature = "checks")]
    fn sum_leaf_areas(&self, idx: NodeIndex) -> u64 {
        let node = &self.nodes[idx.index()];
        match node.state {
            NodeState::Free | NodeState::Allocated => node.region.area(),
            NodeState::Internal => node
                .children
                .as_slice()
                .iter()
                .map(|&child| self.sum_leaf_areas(child))
                .sum(),
            NodeState::Unused => 0,
        }
    }
}

#[cfg(feature = "checks")]
fn region_inside(inner: Region, outer: Region) -> bool {
    inner.x >= outer.x
        && inner.y >= outer.y
        && inner.x + inner.width <= outer.x + outer.width
        && inner.y + inner.height <= outer.y + outer.height
}

impl Drop for AtlasManager {
    /// Destruction requires the tree be back in its initial state: a
    /// single free root leaf and an empty allocated map. Violating this is
    /// a caller bug (regions were never freed), reported to stderr. This
    /// never panics, even with `debug_assertions` on: unwinding out of a
    /// destructor that may itself be running during another unwind risks
    /// aborting the process outright, which is worse than a leaked-region
    /// warning on stderr.
    fn drop(&mut self) {
        let root_is_free_leaf = self.nodes[self.root.index()].state == NodeState::Free;
        let healthy = root_is_free_leaf
            && self.by_width.len() == 1
            && self.by_height.len() == 1
            && self.allocated.is_empty();

        if !healthy {
            eprintln!(
                "rect-atlas: AtlasManager dropped with {} outstanding allocation(s) and {} free leaf/leaves \
                 (expected 0 and 1); regions were leaked instead of freed.",
                self.allocated.len(),
                self.by_width.len(),
            );
        }
    }
}
