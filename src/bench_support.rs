use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use cvdp_geofence::{Bounds, Geofence, Point, QuadTreeConfig, Segment};
use cvdp_ppm::config::{keys, ConfigMap};
use cvdp_ppm::{BsmHandler, PpmConfig, ServiceConfig};
use rand::Rng;
use serde_json::json;
use tempfile::TempDir;

// Re-export external crates needed by the pipeline tests and benches
pub use cvdp_geofence;
pub use cvdp_ppm;
pub use serde_json;

/// Routes handler logs to the test writer. Honours `RUST_LOG`; safe to call
/// from every test.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .compact()
        .try_init();
}

pub const GRID_ROWS: usize = 40;
pub const GRID_COLS: usize = 40;
pub const GRID_ORIGIN: Point = Point {
    lat: 42.20,
    lon: -83.80,
};
pub const GRID_STEP_DEG: f64 = 0.004;
pub const ROAD_LENGTH_DEG: f64 = 0.002;

/// East-west road pieces laid out on a regular grid near Ann Arbor, MI.
pub fn grid_segments() -> Vec<Segment> {
    let mut segments = Vec::with_capacity(GRID_ROWS * GRID_COLS);
    for row in 0..GRID_ROWS {
        for col in 0..GRID_COLS {
            let a = grid_point(row, col);
            let b = Point::new(a.lat, a.lon + ROAD_LENGTH_DEG);
            segments.push(Segment::new((row * GRID_COLS + col) as u64, a, b));
        }
    }
    segments
}

pub fn grid_point(row: usize, col: usize) -> Point {
    Point::new(
        GRID_ORIGIN.lat + row as f64 * GRID_STEP_DEG,
        GRID_ORIGIN.lon + col as f64 * GRID_STEP_DEG,
    )
}

pub fn grid_bounds() -> Bounds {
    let ne = grid_point(GRID_ROWS, GRID_COLS);
    Bounds::new(
        Point::new(GRID_ORIGIN.lat - 0.01, GRID_ORIGIN.lon - 0.01),
        Point::new(ne.lat + 0.01, ne.lon + 0.01),
    )
}

/// Configuration map matching the grid, with typical redaction rules.
pub fn default_config_map() -> ConfigMap {
    let bounds = grid_bounds();
    [
        (keys::VELOCITY_MIN, "2.235".to_string()),
        (keys::VELOCITY_MAX, "35.763".to_string()),
        (keys::GEOFENCE_EXTENSION, "10".to_string()),
        (keys::GEOFENCE_SW_LAT, bounds.sw.lat.to_string()),
        (keys::GEOFENCE_SW_LON, bounds.sw.lon.to_string()),
        (keys::GEOFENCE_NE_LAT, bounds.ne.lat.to_string()),
        (keys::GEOFENCE_NE_LON, bounds.ne.lon.to_string()),
        (keys::ID_INCLUDED, "BEA10000,BEA10001,BEA10002".to_string()),
        (keys::PARTII_FIELDS, "vendorId,classDetails".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub struct HandlerBenchFixture {
    pub config: PpmConfig,
    pub geofence: Arc<Geofence>,
}

impl HandlerBenchFixture {
    pub fn new() -> Self {
        let config = PpmConfig::from_map(&default_config_map()).expect("fixture config");
        let geofence = Geofence::build(
            config.geofence.bounds,
            &grid_segments(),
            config.geofence.extension_m,
            QuadTreeConfig::default(),
        )
        .expect("fixture geofence");
        Self {
            config,
            geofence: Arc::new(geofence),
        }
    }

    pub fn handler(&self) -> BsmHandler {
        BsmHandler::new(self.geofence.clone(), &self.config)
    }
}

impl Default for HandlerBenchFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A config file and map file on disk, wired the way the service reads them.
pub struct ServiceFixture {
    pub temp_dir: TempDir,
    pub config_file: PathBuf,
    pub map_file: PathBuf,
    pub properties_file: PathBuf,
}

impl ServiceFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("tempdir");

        let map_file = temp_dir.path().join("roads.json");
        std::fs::write(
            &map_file,
            serde_json::to_string(&grid_segments()).expect("serialize segments"),
        )
        .expect("write map file");

        let properties_file = temp_dir.path().join("redaction.properties");
        std::fs::write(&properties_file, "# PartII members\nvendorId\nclassDetails\n")
            .expect("write redaction properties");

        let config_file = temp_dir.path().join("ppm.properties");
        let mut file = std::fs::File::create(&config_file).expect("create config file");
        let mut entries: Vec<_> = default_config_map()
            .into_iter()
            .filter(|(key, _)| key != keys::PARTII_FIELDS)
            .collect();
        entries.sort();
        for (key, value) in entries {
            writeln!(file, "{key}={value}").expect("write config entry");
        }

        Self {
            temp_dir,
            config_file,
            map_file,
            properties_file,
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            config_file: Some(self.config_file.clone()),
            map_file: Some(self.map_file.clone()),
            redaction_properties: Some(self.properties_file.clone()),
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ServiceFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// An ODE-style BSM envelope.
pub fn ode_message(id: &str, position: Point, speed: f64) -> String {
    json!({
        "metadata": {
            "logFileName": "",
            "recordType": "bsmTx",
            "receivedMessageDetails": {
                "locationData": {"latitude": "", "longitude": "", "elevation": "", "speed": "", "heading": ""},
                "rxSource": "RV"
            },
            "payloadType": "us.dot.its.jpo.ode.model.OdeBsmPayload",
            "odeReceivedAt": "2024-05-01T13:04:11.120Z"
        },
        "payload": {
            "dataType": "us.dot.its.jpo.ode.plugin.j2735.J2735Bsm",
            "data": {
                "coreData": {
                    "msgCnt": 17,
                    "id": id,
                    "secMark": 45200,
                    "position": {"latitude": position.lat, "longitude": position.lon, "elevation": 259.8},
                    "accelSet": {"accelYaw": 0},
                    "accuracy": {"semiMajor": 2.0, "semiMinor": 2.0},
                    "speed": speed,
                    "heading": 90.0,
                    "brakes": {"wheelBrakes": {"leftFront": false, "rightFront": false}},
                    "size": {"width": 190, "length": 570}
                },
                "partII": [
                    {"id": "VehicleSafetyExtensions", "value": {"pathHistory": {"crumbData": []}}},
                    {
                        "id": "SupplementalVehicleExtensions",
                        "value": {"classDetails": {"role": "basicVehicle"}, "vendorId": "acme"}
                    }
                ]
            }
        }
    })
    .to_string()
}

/// Messages that land on grid roads with in-range speeds.
pub fn retained_messages(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let road = grid_point(rng.gen_range(0..GRID_ROWS), rng.gen_range(0..GRID_COLS));
            let position = Point::new(road.lat, road.lon + ROAD_LENGTH_DEG / 2.0);
            let speed = rng.gen_range(5.0..30.0);
            ode_message(&format!("BEA1{:04}", i % 10_000), position, speed)
        })
        .collect()
}

/// Messages rejected by the first field the filters look at.
pub fn speeding_messages(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            json!({"speed": 40.0 + i as f64, "id": "BEA10000", "lat": 0.0, "lon": 0.0})
                .to_string()
        })
        .collect()
}

/// Positions between grid rows, away from every road.
pub fn off_road_messages(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let road = grid_point(rng.gen_range(0..GRID_ROWS), rng.gen_range(0..GRID_COLS));
            let position = Point::new(road.lat + GRID_STEP_DEG / 2.0, road.lon);
            ode_message(&format!("BEA2{:04}", i % 10_000), position, 15.0)
        })
        .collect()
}
