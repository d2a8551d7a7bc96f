use cvdp_geofence::Point;
use serde::Serialize;

/// The fields of a Basic Safety Message the handler inspects or redacts.
///
/// Everything else in the message lives only in the parsed value tree. The
/// `*_pointer` members are JSON pointers into that tree, recorded while
/// parsing so redaction can find its targets without searching.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bsm {
    pub id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub width: Option<f64>,
    pub length: Option<f64>,

    #[serde(skip)]
    pub(crate) id_pointer: Option<String>,
    #[serde(skip)]
    pub(crate) width_pointer: Option<String>,
    #[serde(skip)]
    pub(crate) length_pointer: Option<String>,
    #[serde(skip)]
    pub(crate) partii_pointer: Option<String>,
}

impl Bsm {
    pub fn reset(&mut self) {
        *self = Bsm::default();
    }

    /// Position, once both coordinates have been seen.
    pub fn position(&self) -> Option<Point> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Point::new(lat, lon)),
            _ => None,
        }
    }
}
