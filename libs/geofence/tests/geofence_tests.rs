//! Index behaviour over a realistic road grid.

use std::io::Write;
use std::sync::Arc;

use cvdp_geofence::geo::METERS_PER_DEGREE;
use cvdp_geofence::{
    load_segments, Bounds, Geofence, GeofenceError, GeofenceIndex, Point, QuadTreeConfig, Segment,
};

/// A 20x20 grid of short east-west road pieces around Knoxville, TN.
fn grid_segments() -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut id = 0;
    for row in 0..20 {
        for col in 0..20 {
            let lat = 35.90 + row as f64 * 0.005;
            let lon = -84.00 + col as f64 * 0.005;
            segments.push(Segment::new(id, Point::new(lat, lon), Point::new(lat, lon + 0.002)));
            id += 1;
        }
    }
    segments
}

fn knoxville() -> Bounds {
    Bounds::new(Point::new(35.8, -84.1), Point::new(36.1, -83.8))
}

fn build(extension_m: f64) -> Geofence {
    Geofence::build(
        knoxville(),
        &grid_segments(),
        extension_m,
        QuadTreeConfig {
            leaf_capacity: 8,
            max_depth: 10,
        },
    )
    .unwrap()
}

#[test]
fn test_points_on_roads_are_within() {
    let fence = build(10.0);
    assert_eq!(fence.segment_count(), 400);

    for segment in grid_segments() {
        let mid = Point::new(segment.a.lat, (segment.a.lon + segment.b.lon) / 2.0);
        assert!(fence.is_within(mid), "segment {} midpoint", segment.id);
    }
}

#[test]
fn test_buffer_distance_decides_near_misses() {
    let offset = 8.0 / METERS_PER_DEGREE;
    let near = Point::new(35.90 + offset, -83.999);

    assert!(build(10.0).is_within(near));
    assert!(!build(5.0).is_within(near));
}

#[test]
fn test_points_between_roads_are_outside() {
    let fence = build(10.0);
    // halfway between two rows, and in the gap between two pieces of one row
    assert!(!fence.is_within(Point::new(35.9025, -83.999)));
    assert!(!fence.is_within(Point::new(35.905, -83.9965)));
}

#[test]
fn test_points_outside_index_bounds() {
    let fence = build(10.0);
    assert!(!fence.is_within(Point::new(40.0, -84.0)));
    assert!(!fence.is_within(Point::new(35.9, -90.0)));
}

#[test]
fn test_shared_across_threads() {
    let fence: Arc<dyn GeofenceIndex + Send + Sync> = Arc::new(build(10.0));

    std::thread::scope(|scope| {
        for row in 0..4 {
            let fence = Arc::clone(&fence);
            scope.spawn(move || {
                let lat = 35.90 + row as f64 * 0.005;
                assert!(fence.is_within(Point::new(lat, -83.999)));
                assert!(!fence.is_within(Point::new(lat + 0.0025, -83.999)));
            });
        }
    });
}

#[test]
fn test_load_segments_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[{{"id":1,"a":{{"lat":35.95,"lon":-83.93}},"b":{{"lat":35.951,"lon":-83.92}},"way_type":"primary"}}]"#
    )
    .unwrap();

    let segments = load_segments(file.path()).unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].way_type.as_deref(), Some("primary"));

    let fence =
        Geofence::build(knoxville(), &segments, 10.0, QuadTreeConfig::default()).unwrap();
    assert!(fence.is_within(Point::new(35.9505, -83.925)));
}

#[test]
fn test_load_segments_reports_bad_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();

    let result = load_segments(file.path());
    assert!(matches!(result, Err(GeofenceError::Parse { .. })));
}

#[test]
fn test_load_segments_reports_missing_file() {
    let result = load_segments(std::path::Path::new("/nonexistent/segments.json"));
    assert!(matches!(result, Err(GeofenceError::Io { .. })));
}
