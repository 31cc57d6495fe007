//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p vehicle_server -- [--config vehicle.json] [--tick-hz 64] [--ticks 640]
//!
//! Runs a headless flat world with one gyrodyne and a few animals wandering
//! into it, then logs where everything ended up.

use std::env;

use anyhow::Context;
use tracing::info;
use vehicle_server::VehicleServer;
use vehicle_shared::{
    config::VehicleConfig,
    controls::ControlAxes,
    flat::FlatWorld,
    math::Vec3,
    physics::HoverController,
    transform::Pose,
    vehicle::VehicleSpec,
    world::EntityKind,
};

struct Args {
    cfg: VehicleConfig,
    ticks: u32,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut cfg = VehicleConfig::default();
    let mut tick_hz = None;
    let mut ticks = 640;
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                let path = &args[i + 1];
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("read config {path}"))?;
                cfg = VehicleConfig::from_json_str(&text)
                    .with_context(|| format!("parse config {path}"))?;
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                tick_hz = args[i + 1].parse().ok();
                i += 2;
            }
            "--ticks" if i + 1 < args.len() => {
                ticks = args[i + 1].parse().unwrap_or(ticks);
                i += 2;
            }
            _ => i += 1,
        }
    }
    if let Some(hz) = tick_hz {
        cfg.tick_hz = hz;
    }
    Ok(Args { cfg, ticks })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Args { cfg, ticks } = parse_args()?;
    info!(tick_hz = cfg.tick_hz, ticks, "Starting server");

    let mut server = VehicleServer::new(cfg, FlatWorld::new(64.0));
    let id = server.spawn_vehicle(
        VehicleSpec::gyrodyne(),
        Box::new(HoverController::default()),
        Pose::at(Vec3::new(0.5, 64.0, 0.5)),
    );
    for x in [0.6, 1.0] {
        server.spawn_rider(EntityKind::Animal, Vec3::new(x, 64.0, 0.5));
    }

    server.step()?;
    if let Some(v) = server.vehicle_mut(id) {
        v.set_inputs(ControlAxes::new(0.5, 1.0, 1.0));
    }
    server.run_for_ticks(ticks).await?;

    if let Some(v) = server.vehicle(id) {
        info!(
            tick = server.tick(),
            position = ?v.position(),
            yaw = v.pose().yaw,
            passengers = v.seating().occupancy(),
            "Final vehicle state"
        );
    }
    Ok(())
}
