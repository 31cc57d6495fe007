//! Observer sync runner.
//!
//! Flies a scripted route with one server and one client in-process and
//! prints, per tick, how far the client's copy of the vehicle trails the
//! authoritative pose. Output is one JSON object per line.
//!
//! Usage:
//!   cargo run -p vehicle_tests --bin sync_runner -- [--ticks 200] [--hold forward,up,left]

use std::env;

use anyhow::Context;
use serde::Serialize;
use tracing::info;
use vehicle_client::input::KeyboardState;
use vehicle_server::VehicleServer;
use vehicle_shared::{
    config::VehicleConfig, flat::FlatWorld, math::Vec3, physics::HoverController,
    transform::Pose, vehicle::VehicleSpec,
};
use vehicle_tests::connect_client;

#[derive(Debug, Serialize)]
struct Sample {
    tick: u32,
    server: Vec3,
    client: Vec3,
    divergence: f64,
    yaw_error: f32,
}

struct Args {
    ticks: u32,
    hold: String,
}

fn parse_args() -> Args {
    let mut out = Args {
        ticks: 200,
        hold: "forward,up,left".to_string(),
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ticks" if i + 1 < args.len() => {
                out.ticks = args[i + 1].parse().unwrap_or(out.ticks);
                i += 2;
            }
            "--hold" if i + 1 < args.len() => {
                out.hold = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    out
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let mut keys = KeyboardState::from_held(&args.hold).context("parse --hold")?;

    let mut server = VehicleServer::new(VehicleConfig::default(), FlatWorld::new(64.0));
    let id = server.spawn_vehicle(
        VehicleSpec::gyrodyne(),
        Box::new(HoverController::default()),
        Pose::at(Vec3::new(0.5, 64.0, 0.5)),
    );
    let mut client = connect_client(&mut server).await?;
    anyhow::ensure!(server.interact(id, client.player)?, "player could not board");

    let mut worst = 0.0_f64;
    for _ in 0..args.ticks {
        client.step(&mut keys)?;
        server.step()?;

        let authority = server.vehicle(id).context("server vehicle")?.pose();
        let observed = client.vehicle(id).context("client vehicle")?.pose();
        let sample = Sample {
            tick: client.tick(),
            server: authority.position,
            client: observed.position,
            divergence: authority.position.distance_sq(observed.position).sqrt(),
            yaw_error: observed.yaw - authority.yaw,
        };
        worst = worst.max(sample.divergence);
        println!("{}", serde_json::to_string(&sample).context("serialize sample")?);
    }

    info!(ticks = args.ticks, worst, "Sync run finished");
    Ok(())
}
