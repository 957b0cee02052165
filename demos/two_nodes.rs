use std::sync::Arc;
use std::time::Duration;

use nodo_mesh::actuator::{Actuator, InputMirror, LoggingPin, SimulatedInput, DEFAULT_MIRROR_PERIOD};
use nodo_mesh::core::HardwareAddress;
use nodo_mesh::network::{MemoryMedium, Transport};
use nodo_mesh::node::{CommandSource, Destinations, OutboundMode};
use nodo_mesh::time::{Clock, MonotonicClock};
use nodo_mesh::{Dispatcher, NodeConfig};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

// Presence node reporting to a controller that toggles the presence node's LED,
// next to a valve node mirroring two inputs onto its valves.
// Pass a JSON file to override the presence node's configuration.
#[tokio::main]
async fn main() -> nodo_mesh::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let sensor_addr: HardwareAddress = "58:bf:25:05:6f:01".parse()?;
    let controller_addr: HardwareAddress = "58:bf:25:05:6f:02".parse()?;

    let sensor_config = match std::env::args().nth(1) {
        Some(path) => NodeConfig::from_json_file(path)?,
        None => NodeConfig::for_address(sensor_addr),
    };
    let controller_config = NodeConfig {
        outbound: OutboundMode::Command {
            source: CommandSource::Toggle,
        },
        destinations: Destinations::ConnectedPeers,
        tick_interval: Duration::from_secs(1),
        peers: vec![sensor_config.address],
        ..NodeConfig::for_address(controller_addr)
    };

    let medium = MemoryMedium::with_loss(0.1, 42);
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());

    let (transport, sensor_events) = medium.attach(sensor_config.address)?;
    println!("Presence node {}", transport.local_address());
    let mut celsius = 21.0_f32;
    let sensor = Dispatcher::new(
        sensor_config,
        transport,
        move || -> nodo_mesh::Result<f32> {
            celsius += 0.25;
            Ok(celsius)
        },
        Actuator::new("sensor-led", LoggingPin { label: "sensor-led" }),
        Arc::clone(&clock),
    )?;

    let (transport, controller_events) = medium.attach(controller_addr)?;
    let controller = Dispatcher::new(
        controller_config,
        transport,
        nodo_mesh::sensor::NoTemperature,
        Actuator::new("controller-led", LoggingPin { label: "controller-led" }),
        Arc::clone(&clock),
    )?;

    let valve_inputs = [SimulatedInput::default(), SimulatedInput::default()];
    let valves = InputMirror::new()
        .with_channel(
            valve_inputs[0].clone(),
            Actuator::new("valve-1", LoggingPin { label: "valve-1" }),
        )
        .with_channel(
            valve_inputs[1].clone(),
            Actuator::new("valve-2", LoggingPin { label: "valve-2" }),
        );
    let (valves_stop, valves_shutdown) = watch::channel(false);
    let valves_task = tokio::spawn(valves.run(DEFAULT_MIRROR_PERIOD, valves_shutdown));

    let sensor_handle = sensor.handle();
    let controller_handle = controller.handle();
    let sensor_task = tokio::spawn(sensor.run(sensor_events));
    let controller_task = tokio::spawn(controller.run(controller_events));

    // PIR edges every 1.5 s
    let latches = sensor_handle.latches();
    let pulses = tokio::spawn({
        let clock = Arc::clone(&clock);
        async move {
            for round in 0..4 {
                latches.pir.trigger(clock.now());
                valve_inputs[round % 2].set(round < 2);
                sleep(Duration::from_millis(1_500)).await;
            }
        }
    });

    let _ = pulses.await;
    let connected: Vec<_> = controller_handle.registry().connected().collect();
    println!("Controller table: {:?}", connected);

    // Presence node drops out; the controller notices after the disconnect timeout
    sensor_handle.shutdown();
    let _ = sensor_task.await;
    medium.detach(&sensor_handle.address())?;
    sleep(Duration::from_secs(4)).await;
    let connected: Vec<_> = controller_handle.registry().connected().collect();
    println!("Controller table: {:?}", connected);

    controller_handle.shutdown();
    let _ = controller_task.await;
    let _ = valves_stop.send(true);
    let _ = valves_task.await;
    Ok(())
}
