//! `darp-bench`: a thin CLI that runs a scenario through the engine and harness and
//! dumps telemetry. Not a launcher for arbitrary experiments — just enough to drive the
//! simulation/algorithm thread pair and write out the `.dat`/`.sol` files.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use darp_core::engine::Engine;
use darp_core::formats::{read_edges, read_instance, read_options, read_rnet};
use darp_core::harness::Harness;
use darp_core::ids::{CustId, NodeId, Tick, VehlId};
use darp_core::network::{network_from_rnet_rows, GtreeOracle, RoadNetwork, ShortestPathOracle};
use darp_core::options::Options;
use darp_core::telemetry::{EventLog, SolutionSummary};
use darp_core::trip::{Customer, Route, Schedule, Stop, StopType, Trip, Vehicle, VehicleStatus, Wayp};

use darp_bench::greedy::Greedy;
use darp_bench::scenario;

#[derive(Parser)]
#[command(name = "darp-bench", about = "Run a ridesharing-benchmark scenario and dump telemetry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bundled in-memory demo scenario (no input files required).
    Demo {
        #[arg(long, default_value_t = 20)]
        vehicles: u32,
        #[arg(long, default_value_t = 60)]
        customers: u32,
        #[arg(long, default_value = "demo.dat")]
        dataout: PathBuf,
    },
    /// Run a scenario loaded from the five file formats (`.rnet`/`.edges`/`.gtree`/
    /// `.instance`/TOML options).
    Run {
        /// TOML config file (see `Options`).
        #[arg(long)]
        options: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Demo { vehicles, customers, dataout } => run_demo(vehicles, customers, dataout),
        Commands::Run { options } => run_from_files(options),
    }
}

fn run_demo(vehicle_count: u32, customer_count: u32, dataout: PathBuf) -> Result<()> {
    let network_len = (vehicle_count + customer_count + 10).max(20) as usize;
    let oracle = Arc::new(scenario::line_network(network_len, 100));

    let store = {
        let vehicles: Vec<_> = (0..vehicle_count)
            .map(|i| {
                let origin = i as u32 % (network_len as u32 / 2);
                let destination = network_len as u32 - 1 - (i % (network_len as u32 / 2));
                scenario::bare_vehicle(&oracle, i + 1, origin, destination, 0, Tick::MAX, 4)
            })
            .collect();
        let customers: Vec<_> = (0..customer_count)
            .map(|i| {
                let origin = (i * 7) % network_len as u32;
                let destination = (origin + 5) % network_len as u32;
                scenario::customer(i + 1, origin, destination, (i as u64) * 2, Tick::MAX, 1)
            })
            .collect();
        scenario::seed_store(vehicles, customers)
    };

    let log = Arc::new(Mutex::new(EventLog::new(
        File::create(&dataout).with_context(|| format!("creating {}", dataout.display()))?,
    )));
    let done = Arc::new(AtomicBool::new(false));

    let grid = darp_core::grid::Grid::new(32, oracle.network().bounding_box());
    let algorithm: Box<dyn darp_core::harness::RsAlgorithm> = Box::new(Greedy::new(grid));

    let options = Options {
        path_to_roadnet: "demo.rnet".into(),
        path_to_edges: "demo.edges".into(),
        path_to_gtree: None,
        path_to_problem: "demo.instance".into(),
        path_to_solution: None,
        path_to_dataout: Some(dataout.clone()),
        time_multiplier: 1,
        vehicle_speed: 10,
        matching_period: 30,
        strict_mode: false,
        static_mode: false,
        gps_timing: 5,
    };

    run_both_threads(options, oracle, store, done, Some(log), algorithm, 5)?;
    info!("demo run complete, telemetry written to {}", dataout.display());
    Ok(())
}

fn run_from_files(options_path: PathBuf) -> Result<()> {
    let options = read_options(&options_path).context("reading options file")?;
    options.validate().context("validating options")?;

    let rnet_rows = read_rnet(&options.path_to_roadnet).context("reading road network")?;
    let (network, node_index) = network_from_rnet_rows(
        &rnet_rows
            .iter()
            .map(|r| (r.edge_id, r.from, r.to, r.from_point, r.to_point))
            .collect::<Vec<_>>(),
    );
    let edge_rows = read_edges(&options.path_to_edges).context("reading edge weights")?;
    let network = apply_edge_weights(network, &edge_rows, &node_index);
    let oracle = Arc::new(GtreeOracle::new(network));

    let instance = read_instance(&options.path_to_problem).context("reading problem instance")?;
    let store = {
        let mut vehicles = Vec::new();
        let mut customers = Vec::new();
        for rows in instance.trips.values() {
            for row in rows {
                let origin = *node_index.get(&row.origin).unwrap_or(&NodeId(row.origin));
                if row.load < 0 {
                    let capacity = row.load.unsigned_abs() as i32;
                    vehicles.push(match row.destination {
                        Some(raw_dest) => {
                            let destination = *node_index.get(&raw_dest).unwrap_or(&NodeId(raw_dest));
                            vehicle_with_route(&oracle, row.id, origin, destination, row.early, row.late.unwrap_or(Tick::MAX), capacity)
                        }
                        None => taxi_vehicle(row.id, origin, row.early, capacity),
                    });
                } else {
                    let raw_dest = row.destination.unwrap_or(row.origin);
                    let destination = *node_index.get(&raw_dest).unwrap_or(&NodeId(raw_dest));
                    customers.push(Customer::new(
                        CustId(row.id),
                        origin,
                        destination,
                        row.early,
                        row.late.unwrap_or(Tick::MAX),
                        row.load,
                    ));
                }
            }
        }
        scenario::seed_store(vehicles, customers)
    };

    let log = options
        .path_to_dataout
        .as_ref()
        .map(|p| File::create(p).with_context(|| format!("creating {}", p.display())))
        .transpose()?
        .map(|f| Arc::new(Mutex::new(EventLog::new(f))));
    let done = Arc::new(AtomicBool::new(false));

    let grid = darp_core::grid::Grid::new(64, oracle.network().bounding_box());
    let algorithm: Box<dyn darp_core::harness::RsAlgorithm> = Box::new(Greedy::new(grid));

    let matched_before = store.all_customer_ids().len();
    let batch_time_ticks = (options.matching_period / 2).max(1);
    run_both_threads(options.clone(), oracle, store.clone(), done, log.clone(), algorithm, batch_time_ticks)?;

    if let Some(path) = &options.path_to_solution {
        let matched = store
            .all_customer_ids()
            .iter()
            .filter(|id| store.customer(**id).map(|c| c.assigned_to.is_some()).unwrap_or(false))
            .count();
        let summary = SolutionSummary {
            problem_name: instance.name.clone(),
            road_network_name: instance.road_network_name.clone(),
            vehicle_count: instance.vehicle_count,
            customer_count: instance.customer_count,
            base_cost: 0,
            solution_cost: 0,
            matched_count: matched,
            canceled_count: matched_before.saturating_sub(matched),
            average_pickup_delay: 0.0,
            average_trip_delay: 0.0,
        };
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        summary.write_to(file)?;
    }
    if let Some(log) = &log {
        log.lock().expect("event log mutex poisoned").flush()?;
    }
    Ok(())
}

/// Spin up the simulation thread (`Engine::run`) and the algorithm thread
/// (`Harness::run`), and join both.
fn run_both_threads(
    options: Options,
    oracle: Arc<GtreeOracle>,
    store: Arc<darp_core::store::FleetStore>,
    done: Arc<AtomicBool>,
    log: Option<Arc<Mutex<EventLog>>>,
    algorithm: Box<dyn darp_core::harness::RsAlgorithm>,
    batch_time_ticks: u64,
) -> Result<()> {
    let oracle_dyn: Arc<dyn ShortestPathOracle> = oracle;
    let vehicle_speed = options.vehicle_speed;
    let strict_mode = options.strict_mode;

    // `tmin` bounds how long the simulation must keep ticking even if every vehicle
    // finishes early; 0 lets a demo run stop the instant the fleet empties out.
    let mut engine = Engine::new(options, oracle_dyn.clone(), store.clone(), done.clone(), 0, Tick::MAX);
    if let Some(log) = &log {
        engine = engine.with_event_log(log.clone());
    }
    let shared_now = engine.shared_now();

    let mut harness = Harness::new(
        store.clone(),
        oracle_dyn,
        done.clone(),
        batch_time_ticks,
        std::time::Duration::from_millis(1),
        vehicle_speed,
    )
    .with_strict_mode(strict_mode);
    if let Some(log) = &log {
        harness = harness.with_event_log(log.clone());
    }

    let harness_handle = thread::spawn(move || {
        harness.run(algorithm, move || shared_now.load(std::sync::atomic::Ordering::Relaxed));
    });

    engine.run();
    harness_handle.join().map_err(|_| anyhow::anyhow!("harness thread panicked"))?;
    Ok(())
}

fn apply_edge_weights(network: RoadNetwork, edges: &[darp_core::formats::EdgeRow], node_index: &std::collections::HashMap<u32, NodeId>) -> RoadNetwork {
    let coords: Vec<_> = (0..network.node_count()).map(|i| network.point_of(NodeId(i as u32))).collect();
    let weighted: Vec<_> = edges
        .iter()
        .filter_map(|e| {
            let from = *node_index.get(&e.from)?;
            let to = *node_index.get(&e.to)?;
            Some((from, to, e.weight))
        })
        .collect();
    RoadNetwork::new(coords, &weighted, false)
}

fn vehicle_with_route(oracle: &GtreeOracle, id: u32, origin: NodeId, destination: NodeId, early: Tick, late: Tick, capacity: i32) -> Vehicle {
    let path = oracle.find_path(origin, destination);
    let mut data = Vec::with_capacity(path.len());
    let mut cumulative = 0;
    data.push(Wayp { dist: 0, node: origin });
    for pair in path.windows(2) {
        cumulative += oracle.distance(pair[0], pair[1]);
        data.push(Wayp { dist: cumulative, node: pair[1] });
    }
    Vehicle {
        trip: Trip {
            id: VehlId(id).into(),
            origin,
            destination: Some(destination),
            early,
            late: Some(late),
            load: -capacity,
        },
        id: VehlId(id),
        route: Route::new(VehlId(id), data),
        schedule: Schedule::new(
            VehlId(id),
            vec![
                Stop::new(VehlId(id).into(), origin, StopType::VehlOrig, early, late),
                Stop::new(VehlId(id).into(), destination, StopType::VehlDest, early, late),
            ],
        ),
        idx_last_visited_node: 0,
        next_node_distance: 0,
        queued: 0,
        status: VehicleStatus::Enroute,
    }
}

fn taxi_vehicle(id: u32, origin: NodeId, early: Tick, capacity: i32) -> Vehicle {
    Vehicle {
        trip: Trip {
            id: VehlId(id).into(),
            origin,
            destination: None,
            early,
            late: None,
            load: -capacity,
        },
        id: VehlId(id),
        route: Route::new(VehlId(id), vec![Wayp { dist: 0, node: origin }]),
        schedule: Schedule::new(
            VehlId(id),
            vec![
                Stop::new(VehlId(id).into(), origin, StopType::VehlOrig, early, Tick::MAX),
                Stop::new(VehlId(id).into(), origin, StopType::VehlDest, early, Tick::MAX),
            ],
        ),
        idx_last_visited_node: 0,
        next_node_distance: 0,
        queued: 0,
        status: VehicleStatus::Enroute,
    }
}
