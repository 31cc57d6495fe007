//! Helpers shared by the integration tests and the sync runner.

use vehicle_client::VehicleClient;
use vehicle_server::VehicleServer;
use vehicle_shared::{flat::FlatWorld, net::link_pair};

/// Queue depth of in-process links; enough for several seconds of
/// replication without draining.
pub const LINK_CAPACITY: usize = 4096;

/// Connects a fresh client to `server` over an in-process link.
pub async fn connect_client(server: &mut VehicleServer) -> anyhow::Result<VehicleClient> {
    let (server_end, client_end) = link_pair(LINK_CAPACITY);
    let cfg = server.cfg.clone();
    let world = FlatWorld::new(server.world().ground_y());
    let (accepted, client) = tokio::join!(
        server.accept(server_end),
        VehicleClient::connect(client_end, cfg, world)
    );
    accepted?;
    client
}
