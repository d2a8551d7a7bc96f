use serde::{Deserialize, Serialize};

use crate::geo::{Bounds, Point};

/// One straight piece of road geometry between two vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: u64,
    pub a: Point,
    pub b: Point,
    /// Free-form road classification carried from the map source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub way_type: Option<String>,
}

impl Segment {
    pub fn new(id: u64, a: Point, b: Point) -> Self {
        Self {
            id,
            a,
            b,
            way_type: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.a.is_valid() && self.b.is_valid()
    }
}

/// The region a segment contributes to the geofence: the segment's bounding
/// box inflated by the buffer distance.
///
/// This is a box test, not a distance-to-line test. Diagonal segments cover
/// more area than a true buffered corridor would.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corridor {
    pub segment_id: u64,
    pub bounds: Bounds,
}

impl Corridor {
    pub fn from_segment(segment: &Segment, extension_m: f64) -> Self {
        Self {
            segment_id: segment.id,
            bounds: Bounds::around(segment.a, segment.b).extend_meters(extension_m),
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        self.bounds.contains(point)
    }
}
