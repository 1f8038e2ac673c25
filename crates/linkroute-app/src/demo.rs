//! The sample diagram and the update cycles run over it.

use kurbo::{Point, Vec2};
use linkroute_core::{
    AvoidRouter, ConnectionId, CycleReport, Diagram, Endpoint, Port, PortGroup, RoutingOptions,
    Shape, ShapeId,
};
use linkroute_router::Router;
use serde_json::{Value, json};

use crate::AppError;

fn ported_shape(x: f64, y: f64) -> Shape {
    Shape::new(Point::new(x, y), 100.0, 100.0).with_ports([
        Port::new("port1", PortGroup::Top),
        Port::new("port2", PortGroup::Top),
        Port::new("port3", PortGroup::Right),
        Port::new("port4", PortGroup::Left),
    ])
}

/// Three ported shapes chained by port connections, plus two plain shapes
/// linked both ways.
fn build_scene(diagram: &mut Diagram) -> Option<ShapeId> {
    let c1 = diagram.add_shape(ported_shape(100.0, 100.0));
    let c2 = diagram.duplicate_shape(c1, Vec2::new(200.0, 200.0))?;
    let c3 = diagram.duplicate_shape(c1, Vec2::new(400.0, 0.0))?;
    let c4 = diagram.add_shape(Shape::new(Point::new(100.0, 400.0), 100.0, 100.0));
    let c5 = diagram.duplicate_shape(c4, Vec2::new(400.0, -100.0))?;

    diagram.connect(Endpoint::port(c1, "port4"), Endpoint::port(c2, "port4"));
    diagram.connect(Endpoint::port(c2, "port2"), Endpoint::port(c3, "port4"));
    diagram.connect(Endpoint::shape(c4), Endpoint::shape(c5));
    diagram.connect(Endpoint::shape(c5), Endpoint::shape(c4));
    Some(c2)
}

fn log_report(label: &str, report: &CycleReport) {
    log::info!(
        "{}: generation {}, {} dirty, {} updated, {} deleted, {} unroutable",
        label,
        report.generation,
        report.dirty,
        report.updated.len(),
        report.deleted.len(),
        report.unroutable.len()
    );
}

fn routes_json(diagram: &Diagram, ids: &[ConnectionId]) -> Value {
    let routes: serde_json::Map<String, Value> = ids
        .iter()
        .filter_map(|&id| {
            let path = diagram.connection_path(id)?;
            let points: Vec<Value> = path.iter().map(|p| json!([p.x, p.y])).collect();
            Some((id.to_string(), Value::Array(points)))
        })
        .collect();
    Value::Object(routes)
}

/// Route the sample diagram, move a shape, reroute and tear down.
pub fn run(options: RoutingOptions) -> Result<(), AppError> {
    let mut diagram = Diagram::new();
    let mut router: AvoidRouter<Router> = AvoidRouter::new(options);

    // Edits made while the engine loads are queued and replayed.
    let Some(moved) = build_scene(&mut diagram) else {
        log::warn!("Sample scene could not be built");
        return Ok(());
    };
    let loading = router.process_cycle(&mut diagram);
    log::info!("{} events queued while loading", loading.queued);

    let engine = pollster::block_on(router.initialize())?;
    let report = router.engine_ready(engine, &mut diagram);
    log_report("Initial routing", &report);
    let initial = routes_json(&diagram, &report.updated);

    diagram.translate_shape(moved, Vec2::new(40.0, -60.0));
    let report = router.process_cycle(&mut diagram);
    log_report("After move", &report);
    let after_move = routes_json(&diagram, &report.updated);

    let output = json!({
        "options": serde_json::to_value(router.options())?,
        "initial": initial,
        "afterMove": after_move,
        "diagram": serde_json::from_str::<Value>(&diagram.to_json()?)?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    let released = router.teardown();
    log::info!("Released {} engine handles", released);
    Ok(())
}
