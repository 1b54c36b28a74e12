//! Two pipe runs joined by a pressure pump; one run is then cut in half.
//!
//! Run with `RUST_LOG=manifold_graph=debug,manifold_atmos=debug` to watch
//! nets being created, split and merged.

use manifold_atmos::gas::{Gas, T20C};
use manifold_atmos::test_utils::PipeWorld;
use manifold_atmos::{AtmosSystem, GasMixture, PipeNet, PressurePump};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "manifold_graph=info,manifold_atmos=info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut world = PipeWorld::new();
    let left = world.pipe_row(0, 9, 0);
    let pump = world.device(10, 0);
    let right = world.pipe_row(11, 20, 0);
    world.recompute();

    let Some(net) = world.graph.state_as_mut::<PipeNet>(left[0]) else {
        tracing::error!("left run has no pipe net");
        return;
    };
    net.air_mut().merge(
        GasMixture::new(0.0)
            .with_moles(Gas::Oxygen, 210.0)
            .with_moles(Gas::Nitrogen, 790.0)
            .with_temperature(T20C),
    );

    let (graph, mut spatial) = world.into_parts();
    let mut system = AtmosSystem::new(graph);
    system.add_appliance(PressurePump::new(pump, "inlet", "outlet", 101_325.0, 5.0));

    for _ in 0..20 {
        let report = system.tick(&spatial);
        tracing::info!(tick = report.tick, moved = report.moved(), "pumped");
    }

    // Cut the right run in the middle by unanchoring one pipe.
    if let Some(entity) = system.graph().node(right[5]).map(|n| n.entity()) {
        if let Ok(event) = spatial.unanchor(entity) {
            system.graph_mut().notify(&spatial, entity, event);
        }
    }
    let report = system.tick(&spatial);
    for event in &report.events {
        tracing::info!(?event, "graph event");
    }

    for (label, node) in [("left", left[0]), ("right head", right[0]), ("right tail", right[9])] {
        if let Some(net) = system.graph().state_as::<PipeNet>(node) {
            let air = net.air();
            tracing::info!(
                net = label,
                volume = air.volume(),
                moles = air.total_moles(),
                pressure = air.pressure(),
                "final state"
            );
        }
    }
}
