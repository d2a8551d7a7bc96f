use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;
use cvdp_geofence::Point;
use cvdp_hub::bench_support::{
    grid_point, init_test_tracing, ode_message, ServiceFixture, ROAD_LENGTH_DEG,
};
use cvdp_ppm::{BsmHandler, Feature, ResultStatus, StreamRunner};

#[test]
fn test_service_config_loads_files_from_disk() -> Result<()> {
    let fixture = ServiceFixture::new();
    let config = fixture.service_config().load_ppm_config()?;
    config.validate()?;

    assert!(config.features.is_active(Feature::GeofenceFilter));
    assert_eq!(config.ruleset.partii_members(), ["vendorId", "classDetails"]);
    assert!(config.ruleset.is_id_redaction_eligible("BEA10001"));
    assert_eq!(config.geofence.mapfile.as_deref(), Some(fixture.map_file.as_path()));

    let geofence = config.build_geofence()?;
    assert_eq!(geofence.segment_count(), 1600);
    Ok(())
}

#[test]
fn test_loaded_service_processes_stream() -> Result<()> {
    init_test_tracing();
    let fixture = ServiceFixture::new();
    let config = fixture.service_config().load_ppm_config()?;
    let geofence = config.build_geofence()?;
    let handler = BsmHandler::new(Arc::new(geofence), &config);

    let road = grid_point(10, 10);
    let on_road = Point::new(road.lat, road.lon + ROAD_LENGTH_DEG / 2.0);
    let input = [
        ode_message("BEA10001", on_road, 20.0),
        ode_message("BEA10001", on_road, 1.0),
    ]
    .join("\n");

    let mut runner = StreamRunner::new(handler);
    let mut output = Vec::new();
    let summary = runner.run(Cursor::new(input), &mut output)?;

    assert_eq!(summary.retained, 1);
    assert_eq!(summary.count(ResultStatus::Speed), 1);
    let text = String::from_utf8(output)?;
    assert!(text.contains(r#""id":"FFFFFFFF""#));
    assert!(!text.contains("BEA10001"));
    Ok(())
}

#[test]
fn test_missing_map_file_is_an_error() -> Result<()> {
    let fixture = ServiceFixture::new();
    let mut service = fixture.service_config();
    service.map_file = Some(fixture.temp_dir.path().join("absent.json"));

    let config = service.load_ppm_config()?;
    assert!(config.build_geofence().is_err());
    Ok(())
}

#[test]
fn test_without_map_file_geofence_suppresses_everything() -> Result<()> {
    let fixture = ServiceFixture::new();
    let mut service = fixture.service_config();
    service.map_file = None;

    let config = service.load_ppm_config()?;
    let mut handler = BsmHandler::new(Arc::new(config.build_geofence()?), &config);
    let road = grid_point(0, 0);
    assert!(handler.process(&ode_message("BEA10000", road, 10.0)));
    assert_eq!(handler.result(), ResultStatus::Geoposition);
    Ok(())
}
