use std::io::Cursor;
use std::sync::Arc;

use anyhow::Result;
use cvdp_geofence::Point;
use cvdp_hub::bench_support::{
    grid_point, init_test_tracing, off_road_messages, ode_message, retained_messages,
    speeding_messages, HandlerBenchFixture, ROAD_LENGTH_DEG,
};
use cvdp_ppm::{BsmHandler, ResultStatus, StreamRunner};
use serde_json::Value;

fn on_road(row: usize, col: usize) -> Point {
    let road = grid_point(row, col);
    Point::new(road.lat, road.lon + ROAD_LENGTH_DEG / 2.0)
}

#[test]
fn test_mixed_stream_keeps_only_retained_messages() -> Result<()> {
    init_test_tracing();
    let fixture = HandlerBenchFixture::new();
    let mut lines = retained_messages(30);
    lines.extend(speeding_messages(10));
    lines.extend(off_road_messages(10));
    lines.push("{\"payload\":".to_string());
    lines.push(String::new());

    let mut runner = StreamRunner::new(fixture.handler());
    let mut output = Vec::new();
    let summary = runner.run(Cursor::new(lines.join("\n")), &mut output)?;

    assert_eq!(summary.processed, 51);
    assert_eq!(summary.retained, 30);
    assert_eq!(summary.count(ResultStatus::Speed), 10);
    assert_eq!(summary.count(ResultStatus::Geoposition), 10);
    assert_eq!(summary.count(ResultStatus::Parse), 1);
    assert_eq!(summary.suppressed, 21);

    let text = String::from_utf8(output)?;
    assert_eq!(text.lines().count(), 30);
    for line in text.lines() {
        let message: Value = serde_json::from_str(line)?;
        let data = &message["payload"]["data"];
        assert!(data["coreData"]["speed"].is_number());
        assert!(!line.contains("vendorId"));
        assert!(!line.contains("classDetails"));
        assert_eq!(data["partII"][0]["id"], "VehicleSafetyExtensions");
    }
    Ok(())
}

#[test]
fn test_included_ids_are_replaced_in_stream_output() -> Result<()> {
    let fixture = HandlerBenchFixture::new();
    let input = [
        ode_message("BEA10000", on_road(3, 4), 12.0),
        ode_message("C0FFEE00", on_road(3, 5), 12.0),
        ode_message("BEA10002", on_road(3, 6), 12.0),
    ]
    .join("\n");

    let mut runner = StreamRunner::new(fixture.handler());
    let mut output = Vec::new();
    runner.run(Cursor::new(input), &mut output)?;

    let ids: Vec<String> = String::from_utf8(output)?
        .lines()
        .map(|line| {
            let message: Value = serde_json::from_str(line).expect("retained line is JSON");
            message["payload"]["data"]["coreData"]["id"]
                .as_str()
                .expect("id is a string")
                .to_string()
        })
        .collect();
    assert_eq!(ids, ["FFFFFFFF", "C0FFEE00", "FFFFFFFF"]);
    Ok(())
}

#[test]
fn test_buffer_distance_at_grid_edges() {
    let fixture = HandlerBenchFixture::new();
    let mut handler = fixture.handler();
    let road = grid_point(0, 0);

    // 5 m south of the first road is inside its 10 m corridor
    let near = Point::new(road.lat - 5.0 / 111_320.0, road.lon + 0.001);
    assert!(handler.process(&ode_message("BEA10000", near, 10.0)));
    assert_eq!(handler.result(), ResultStatus::Success);

    let far = Point::new(road.lat - 50.0 / 111_320.0, road.lon + 0.001);
    assert!(handler.process(&ode_message("BEA10000", far, 10.0)));
    assert_eq!(handler.result(), ResultStatus::Geoposition);
}

#[test]
fn test_handler_pool_shares_one_index() {
    let fixture = HandlerBenchFixture::new();
    let ruleset = Arc::new(fixture.config.ruleset.clone());
    let messages = retained_messages(40);

    let retained: usize = std::thread::scope(|scope| {
        let workers: Vec<_> = messages
            .chunks(10)
            .map(|chunk| {
                let mut handler = BsmHandler::with_ruleset(
                    fixture.geofence.clone(),
                    Arc::clone(&ruleset),
                    &fixture.config,
                );
                scope.spawn(move || {
                    chunk
                        .iter()
                        .filter(|message| {
                            handler.process(message);
                            !handler.json().is_empty()
                        })
                        .count()
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("worker thread"))
            .sum()
    });

    assert_eq!(retained, 40);
    assert_eq!(Arc::strong_count(&fixture.geofence), 1);
}
