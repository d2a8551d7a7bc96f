use serde::{Deserialize, Serialize};

/// Mean length of one degree of latitude in meters.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Longitude degrees shrink towards the poles; clamp the cosine so padding
/// stays finite near them.
const MIN_COS_LATITUDE: f64 = 0.01;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Axis-aligned latitude/longitude box with inclusive edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub sw: Point,
    pub ne: Point,
}

impl Bounds {
    pub const WORLD: Bounds = Bounds {
        sw: Point::new(-90.0, -180.0),
        ne: Point::new(90.0, 180.0),
    };

    pub fn new(sw: Point, ne: Point) -> Self {
        Self { sw, ne }
    }

    /// Smallest box containing both points, in either order.
    pub fn around(a: Point, b: Point) -> Self {
        Self {
            sw: Point::new(a.lat.min(b.lat), a.lon.min(b.lon)),
            ne: Point::new(a.lat.max(b.lat), a.lon.max(b.lon)),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sw.is_valid()
            && self.ne.is_valid()
            && self.sw.lat <= self.ne.lat
            && self.sw.lon <= self.ne.lon
    }

    pub fn contains(&self, point: Point) -> bool {
        point.lat >= self.sw.lat
            && point.lat <= self.ne.lat
            && point.lon >= self.sw.lon
            && point.lon <= self.ne.lon
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.sw.lat <= other.ne.lat
            && self.ne.lat >= other.sw.lat
            && self.sw.lon <= other.ne.lon
            && self.ne.lon >= other.sw.lon
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.sw.lat + self.ne.lat) / 2.0,
            (self.sw.lon + self.ne.lon) / 2.0,
        )
    }

    /// Grows the box by `meters` on every side. Longitude padding uses the
    /// latitude farthest from the equator so the result never under-covers.
    pub fn extend_meters(&self, meters: f64) -> Bounds {
        let dlat = meters / METERS_PER_DEGREE;
        let widest = self.sw.lat.abs().max(self.ne.lat.abs()).min(90.0);
        let cos = widest.to_radians().cos().max(MIN_COS_LATITUDE);
        let dlon = meters / (METERS_PER_DEGREE * cos);

        Bounds {
            sw: Point::new(self.sw.lat - dlat, self.sw.lon - dlon),
            ne: Point::new(self.ne.lat + dlat, self.ne.lon + dlon),
        }
    }

    /// Splits the box into its four quadrants: SW, SE, NW, NE.
    pub fn quadrants(&self) -> [Bounds; 4] {
        let c = self.center();
        [
            Bounds::new(self.sw, c),
            Bounds::new(Point::new(self.sw.lat, c.lon), Point::new(c.lat, self.ne.lon)),
            Bounds::new(Point::new(c.lat, self.sw.lon), Point::new(self.ne.lat, c.lon)),
            Bounds::new(c, self.ne),
        ]
    }
}
