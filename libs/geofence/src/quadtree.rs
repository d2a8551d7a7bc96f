use crate::geo::{Bounds, Point};
use crate::segment::Corridor;

/// Corridors a leaf holds before it splits.
pub const DEFAULT_LEAF_CAPACITY: usize = 32;
/// Leaves at this depth never split, whatever they hold.
pub const DEFAULT_MAX_DEPTH: usize = 12;

#[derive(Debug, Clone, Copy)]
pub struct QuadTreeConfig {
    pub leaf_capacity: usize,
    pub max_depth: usize,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Region quadtree over corridor boxes.
///
/// A corridor overlapping several quadrants is stored in each of them, so a
/// query only ever descends one path from the root.
#[derive(Debug)]
pub struct QuadTree {
    bounds: Bounds,
    depth: usize,
    config: QuadTreeConfig,
    corridors: Vec<Corridor>,
    children: Option<Box<[QuadTree; 4]>>,
}

impl QuadTree {
    pub fn new(bounds: Bounds, config: QuadTreeConfig) -> Self {
        Self::with_depth(bounds, config, 0)
    }

    fn with_depth(bounds: Bounds, config: QuadTreeConfig, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            config,
            corridors: Vec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Inserts a corridor into every leaf it overlaps. Returns false when the
    /// corridor lies entirely outside the tree.
    pub fn insert(&mut self, corridor: Corridor) -> bool {
        if !self.bounds.intersects(&corridor.bounds) {
            return false;
        }

        if let Some(children) = self.children.as_mut() {
            let mut stored = false;
            for child in children.iter_mut() {
                stored |= child.insert(corridor);
            }
            return stored;
        }

        self.corridors.push(corridor);
        if self.corridors.len() > self.config.leaf_capacity && self.depth < self.config.max_depth
        {
            self.split();
        }
        true
    }

    fn split(&mut self) {
        let [sw, se, nw, ne] = self.bounds.quadrants();
        let depth = self.depth + 1;
        let mut children = Box::new([
            QuadTree::with_depth(sw, self.config, depth),
            QuadTree::with_depth(se, self.config, depth),
            QuadTree::with_depth(nw, self.config, depth),
            QuadTree::with_depth(ne, self.config, depth),
        ]);

        for corridor in self.corridors.drain(..) {
            for child in children.iter_mut() {
                child.insert(corridor);
            }
        }
        self.children = Some(children);
    }

    /// Corridors stored in the leaf covering `point`; empty outside the tree.
    pub fn candidates(&self, point: Point) -> &[Corridor] {
        if !self.bounds.contains(point) {
            return &[];
        }

        match self.children.as_ref() {
            Some(children) => children
                .iter()
                .find(|child| child.bounds.contains(point))
                .map(|child| child.candidates(point))
                .unwrap_or(&[]),
            None => &self.corridors,
        }
    }

    /// First corridor whose box contains `point`.
    pub fn find_containing(&self, point: Point) -> Option<&Corridor> {
        self.candidates(point)
            .iter()
            .find(|corridor| corridor.contains(point))
    }

    pub fn depth(&self) -> usize {
        match self.children.as_ref() {
            Some(children) => 1 + children.iter().map(QuadTree::depth).max().unwrap_or(0),
            None => 0,
        }
    }

    /// Stored corridor entries, counting duplicates across leaves.
    pub fn entry_count(&self) -> usize {
        match self.children.as_ref() {
            Some(children) => children.iter().map(QuadTree::entry_count).sum(),
            None => self.corridors.len(),
        }
    }
}
