use std::path::PathBuf;

use clap::Parser;
use embassy_executor::{Executor, Spawner};
use serde::Deserialize;
use static_cell::StaticCell;
use stepnode_core::{
    mk_static,
    utils::{
        Delay, Dispatcher, MotionController, NodeConfig, NodeState, Timer,
        connection::transport::NodeAddress,
        controllers::{
            EnergySampler, MotionChannel, MotionReceiver, MotionRequest, SelfTest, SharedSampler,
            StepperMotor,
        },
        pipeline::{self, PacketChannel, PacketReceiver, PacketSender},
    },
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod sim;
use sim::{LoggedPin, SimMesh, SimRadio, SimulatedSensor};

type PeerController =
    MotionController<'static, LoggedPin, LoggedPin, LoggedPin, SimulatedSensor, Delay>;
type NodeDispatcher = Dispatcher<'static, SimRadio, SimulatedSensor>;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// Mesh address of the simulated peer
    #[clap(long, default_value_t = 7)]
    peer_address: NodeAddress,
    /// Shaft position (in steps) where the simulated beam is strongest
    #[clap(long, default_value_t = 130)]
    beam_at: u16,
    /// JSON file with `node` config overrides and a `self_test` list
    #[clap(long)]
    config: Option<PathBuf>,
    /// Motions the peer replays after each completed motion, e.g. `scan,move:-20`
    #[clap(long, value_delimiter = ',', value_parser = parse_motion)]
    self_test: Vec<MotionRequest>,
    /// Have the coordinator move the peer by this many steps once it is up
    #[clap(long, allow_hyphen_values = true)]
    nudge: Option<i8>,
    /// Override the delay after each step-output edge
    #[clap(long)]
    step_delay_ms: Option<u32>,
    /// Override the settle time before each scan sample
    #[clap(long)]
    settle_delay_ms: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    node: NodeConfig,
    self_test: Vec<MotionRequest>,
}

struct Settings {
    node: NodeConfig,
    peer_address: NodeAddress,
    beam_at: u16,
    self_test: Vec<MotionRequest>,
    nudge: Option<i8>,
}

fn parse_motion(s: &str) -> Result<MotionRequest, String> {
    match s.trim().split_once(':') {
        None if s.trim() == "scan" => Ok(MotionRequest::Scan),
        Some(("move", n)) => n
            .trim()
            .parse::<i8>()
            .map(|steps| MotionRequest::Move { steps })
            .map_err(|e| format!("bad step count `{n}`: {e}")),
        _ => Err(format!("expected `scan` or `move:<steps>`, got `{s}`")),
    }
}

fn load_settings(opts: Opts) -> Result<Settings, String> {
    let file = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("reading {}: {e}", path.display()))?;
            serde_json::from_str::<FileConfig>(&text)
                .map_err(|e| format!("parsing {}: {e}", path.display()))?
        }
        None => FileConfig::default(),
    };

    let mut node = file.node;
    if let Some(ms) = opts.step_delay_ms {
        node.step_delay_ms = ms;
    }
    if let Some(ms) = opts.settle_delay_ms {
        node.settle_delay_ms = ms;
    }
    node.validate().map_err(|e| format!("invalid config: {e}"))?;
    if opts.peer_address == node.coordinator_address {
        return Err(format!(
            "peer address {} collides with the coordinator address",
            opts.peer_address
        ));
    }

    Ok(Settings {
        node,
        peer_address: opts.peer_address,
        beam_at: opts.beam_at,
        self_test: if opts.self_test.is_empty() {
            file.self_test
        } else {
            opts.self_test
        },
        nudge: opts.nudge,
    })
}

#[embassy_executor::task(pool_size = 2)]
async fn receiver_task(
    radio: &'static SimRadio,
    packets: PacketSender<'static>,
    config: NodeConfig,
) -> ! {
    pipeline::receiver_loop(radio, packets, config).await
}

#[embassy_executor::task(pool_size = 2)]
async fn dispatch_task(
    mut dispatcher: NodeDispatcher,
    packets: PacketReceiver<'static>,
) -> ! {
    pipeline::dispatch_loop(&mut dispatcher, packets).await
}

#[embassy_executor::task(pool_size = 2)]
async fn keepalive_task(
    radio: &'static SimRadio,
    state: &'static NodeState,
    config: NodeConfig,
) -> ! {
    pipeline::keepalive_loop(radio, state, config).await
}

#[embassy_executor::task]
async fn motion_task(
    mut controller: PeerController,
    requests: MotionReceiver<'static>,
) -> ! {
    pipeline::motion_loop(&mut controller, requests).await
}

#[embassy_executor::task]
async fn nudge_task(
    dispatcher: NodeDispatcher,
    peer: NodeAddress,
    steps: i8,
) {
    Timer::after_secs(3).await;
    info!(peer, steps, "nudging peer");
    if let Err(e) = dispatcher.command_move(peer, steps).await {
        error!(error = %e, "nudge failed");
    }
}

#[embassy_executor::task]
async fn main_task(
    spawner: Spawner,
    settings: Settings,
) {
    let config = settings.node;
    let coordinator = config.coordinator_address;
    let peer = settings.peer_address;
    let rev = config.steps_per_revolution;
    let mesh: &'static SimMesh = mk_static!(SimMesh, SimMesh::new([coordinator, peer]));

    // Coordinator
    let radio: &'static SimRadio = mk_static!(SimRadio, SimRadio::new(coordinator, mesh));
    let state: &'static NodeState = mk_static!(NodeState, NodeState::new());
    let sampler: &'static SharedSampler<SimulatedSensor> = mk_static!(
        SharedSampler<SimulatedSensor>,
        SharedSampler::new(EnergySampler::from_config(
            SimulatedSensor::new(state, 0, rev),
            &config
        ))
    );
    let packets: &'static PacketChannel = mk_static!(PacketChannel, PacketChannel::new());
    let motion: &'static MotionChannel = mk_static!(MotionChannel, MotionChannel::new());

    let dispatcher = Dispatcher::new(radio, motion.sender(), state, sampler, config);
    spawner.spawn(receiver_task(radio, packets.sender(), config)).unwrap();
    spawner.spawn(dispatch_task(dispatcher, packets.receiver())).unwrap();
    spawner.spawn(keepalive_task(radio, state, config)).unwrap();
    if let Some(steps) = settings.nudge {
        let dispatcher = Dispatcher::new(radio, motion.sender(), state, sampler, config);
        spawner.spawn(nudge_task(dispatcher, peer, steps)).unwrap();
    }
    info!(address = coordinator, "coordinator up");

    // Peer
    let radio: &'static SimRadio = mk_static!(SimRadio, SimRadio::new(peer, mesh));
    let state: &'static NodeState = mk_static!(NodeState, NodeState::new());
    let sampler: &'static SharedSampler<SimulatedSensor> = mk_static!(
        SharedSampler<SimulatedSensor>,
        SharedSampler::new(EnergySampler::from_config(
            SimulatedSensor::new(state, settings.beam_at, rev),
            &config
        ))
    );
    let packets: &'static PacketChannel = mk_static!(PacketChannel, PacketChannel::new());
    let motion: &'static MotionChannel = mk_static!(MotionChannel, MotionChannel::new());

    let motor = StepperMotor::new(
        LoggedPin::new("dir"),
        LoggedPin::new("enable"),
        LoggedPin::new("step"),
        rev,
    );
    let mut controller = MotionController::new(motor, sampler, Delay, state, config);
    if !settings.self_test.is_empty() {
        controller = controller.with_self_test(SelfTest::new(&settings.self_test));
    }

    let dispatcher = Dispatcher::new(radio, motion.sender(), state, sampler, config);
    spawner.spawn(receiver_task(radio, packets.sender(), config)).unwrap();
    spawner.spawn(dispatch_task(dispatcher, packets.receiver())).unwrap();
    spawner.spawn(motion_task(controller, motion.receiver())).unwrap();
    spawner.spawn(keepalive_task(radio, state, config)).unwrap();
    info!(address = peer, beam_at = settings.beam_at, "peer up");
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match load_settings(Opts::parse()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner, settings)).unwrap();
    });
}
