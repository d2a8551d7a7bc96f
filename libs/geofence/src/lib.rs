//! Road-corridor geofence for connected-vehicle privacy filtering.
//!
//! The index is built once from road segments and then answers a single
//! question: does a position fall inside any corridor? Each corridor is the
//! segment's bounding box inflated by a buffer distance that absorbs GPS error
//! and road width. The test is box containment only; positions near a
//! diagonal road but outside its true buffer still count as inside.
//!
//! A built [`Geofence`] is immutable and can be shared behind an `Arc` by any
//! number of threads.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

pub mod geo;
pub mod quadtree;
pub mod segment;

pub use geo::{Bounds, Point};
pub use quadtree::{QuadTree, QuadTreeConfig};
pub use segment::{Corridor, Segment};

/// The only capability the processing engine needs from a spatial index.
pub trait GeofenceIndex {
    fn is_within(&self, point: Point) -> bool;
}

#[derive(Debug, Error)]
pub enum GeofenceError {
    #[error("invalid geofence bounds: sw={sw:?} ne={ne:?}")]
    InvalidBounds { sw: Point, ne: Point },

    #[error("invalid buffer distance: {0} meters")]
    InvalidExtension(f64),

    #[error("failed to read segment file '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse segment file '{path}'")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug)]
pub struct Geofence {
    tree: QuadTree,
    extension_m: f64,
    segment_count: usize,
}

impl Geofence {
    /// Builds the index. Segments with invalid coordinates, or whose corridor
    /// falls outside `bounds`, are skipped.
    pub fn build(
        bounds: Bounds,
        segments: &[Segment],
        extension_m: f64,
        config: QuadTreeConfig,
    ) -> Result<Self, GeofenceError> {
        if !bounds.is_valid() {
            return Err(GeofenceError::InvalidBounds {
                sw: bounds.sw,
                ne: bounds.ne,
            });
        }
        if !extension_m.is_finite() || extension_m < 0.0 {
            return Err(GeofenceError::InvalidExtension(extension_m));
        }

        let mut tree = QuadTree::new(bounds, config);
        let mut segment_count = 0;
        for segment in segments {
            if !segment.is_valid() {
                debug!(segment_id = segment.id, "skipping segment with invalid coordinates");
                continue;
            }
            if tree.insert(Corridor::from_segment(segment, extension_m)) {
                segment_count += 1;
            } else {
                debug!(segment_id = segment.id, "segment outside geofence bounds");
            }
        }

        info!(
            segments = segment_count,
            entries = tree.entry_count(),
            depth = tree.depth(),
            extension_m,
            "geofence index built"
        );

        Ok(Self {
            tree,
            extension_m,
            segment_count,
        })
    }

    /// An index with no corridors; every query answers false.
    pub fn empty(bounds: Bounds) -> Result<Self, GeofenceError> {
        Self::build(bounds, &[], 0.0, QuadTreeConfig::default())
    }

    pub fn extension_m(&self) -> f64 {
        self.extension_m
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn bounds(&self) -> &Bounds {
        self.tree.bounds()
    }

    /// Id of the first segment whose corridor contains `point`.
    pub fn containing_segment(&self, point: Point) -> Option<u64> {
        self.tree
            .find_containing(point)
            .map(|corridor| corridor.segment_id)
    }
}

impl GeofenceIndex for Geofence {
    fn is_within(&self, point: Point) -> bool {
        point.is_valid() && self.tree.find_containing(point).is_some()
    }
}

/// Reads a JSON array of [`Segment`]s.
pub fn load_segments(path: &Path) -> Result<Vec<Segment>, GeofenceError> {
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| GeofenceError::Io {
        path: display.clone(),
        source,
    })?;
    let segments: Vec<Segment> =
        serde_json::from_str(&raw).map_err(|source| GeofenceError::Parse {
            path: display,
            source,
        })?;
    debug!(count = segments.len(), "loaded road segments");
    Ok(segments)
}
