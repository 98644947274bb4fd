//! Main docking executable entry point.
//!
//! # Architecture
//!
//! The executable wires the docking components together over the network:
//!
//!     - Ground truth fiducial poses and rail telemetry are subscribed to
//!     - The station finder publishes the list of stations currently in view
//!     - If a station to dock with is given on the command line, a docking controller is started
//!       which commands the vehicle until it has docked or given up
//!
//! Every component runs on its own thread, the main thread only waits for the controller to
//! finish, or for the requested run time to elapse.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::info;
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// Internal
use comms_if::{
    eqpt::{
        dock::TelemetryMsg,
        fiducial::{DockingStation, PoseSample},
    },
    net::{
        pubsub::{ZmqPublisher, ZmqSubscriber},
        zmq, NetParams,
    },
};
use dock_lib::{
    bg_thread::LISTENER_POLL_TIMEOUT_MS,
    cmd_client::ZmqCommandClient,
    docker::{Collaborators, DockingController},
    params::DockExecParams,
    planner::{ArcPlanner, RailIkSolver},
    pose_source::{GroundTruthPoseSource, PoseSource},
    station_db,
    station_finder::StationFinder,
    telem_source::RailTelemetrySource,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period at which the main thread checks whether it should exit.
const WAIT_PERIOD: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Docking executable
#[derive(Debug, StructOpt)]
#[structopt(name = "dock_exec")]
struct Opt {
    /// ID of the station to dock with.
    ///
    /// If not given only the station finder is run.
    #[structopt(long)]
    dock: Option<i32>,

    /// Exit after this many seconds, even if still docking.
    #[structopt(long)]
    run_time_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("dock_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Docking Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;
    let params: DockExecParams =
        util::params::load("dock_exec.toml").wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    let db_path = host::get_dock_sw_root()
        .wrap_err("The DOCK_SW_ROOT environment variable is not set")?
        .join(&params.station_db_path);
    let stations = station_db::load(&db_path)
        .wrap_err_with(|| format!("Could not load the station database from {:?}", db_path))?;

    info!(
        "Loaded {} stations: {:?}\n",
        stations.len(),
        stations.iter().map(|s| s.station_id).collect::<Vec<_>>()
    );

    // Check the station exists before bringing anything up
    let dock_station: Option<DockingStation> = match opt.dock {
        Some(id) => Some(
            station_db::find_station(&stations, id)
                .ok_or_else(|| eyre!("Station {} is not in the station database", id))?
                .clone(),
        ),
        None => None,
    };

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let finder_poses: Arc<dyn PoseSource> = Arc::new(
        pose_source(&zmq_ctx, &net_params, &params).wrap_err("Failed to start the pose source")?,
    );

    let station_list_pub = ZmqPublisher::new(&zmq_ctx, &net_params.station_list_endpoint)
        .wrap_err("Failed to create the station list publisher")?;

    // ---- START COMPONENTS ----

    let mut finder = StationFinder::new(
        finder_poses,
        Box::new(station_list_pub),
        Duration::from_millis(params.station_finder.publish_interval_ms),
        params.station_finder.topic.clone(),
        stations.clone(),
    )
    .wrap_err("Failed to start the station finder")?;

    info!("StationFinder started");

    let mut controller = match dock_station {
        Some(station) => {
            // Ground truth samples are handed off once, so the controller gets its own source
            // rather than competing with the finder for samples
            let controller_poses: Arc<dyn PoseSource> = Arc::new(
                pose_source(&zmq_ctx, &net_params, &params)
                    .wrap_err("Failed to start the controller's pose source")?,
            );

            let telem_sub: ZmqSubscriber<TelemetryMsg> = ZmqSubscriber::new(
                &zmq_ctx,
                &net_params.telemetry_endpoint,
                &params.telemetry_topic,
                LISTENER_POLL_TIMEOUT_MS,
            )
            .wrap_err("Failed to create the telemetry subscriber")?;
            let telem_source = RailTelemetrySource::new(Box::new(telem_sub))
                .wrap_err("Failed to start the telemetry source")?;

            let cmd_client = ZmqCommandClient::new(
                &zmq_ctx,
                &net_params.command_endpoint,
                params.controller.command_timeout_ms,
            )
            .wrap_err("Failed to create the command client")?;

            let status_pub = ZmqPublisher::new(&zmq_ctx, &net_params.dock_status_endpoint)
                .wrap_err("Failed to create the docking status publisher")?;

            // No marker detector is built into this executable, so only ground truth poses are
            // available
            let collaborators = Collaborators {
                ground_truth_source: Some(controller_poses),
                detector_source: None,
                telem_source: Arc::new(telem_source),
                planner: Box::new(ArcPlanner::new(params.arc_planner.clone())),
                ik_solver: Box::new(RailIkSolver::new(params.rail_ik.clone())),
                cmd_transport: Box::new(cmd_client),
                status_publisher: Box::new(status_pub),
            };

            let c = DockingController::new(params.controller.clone(), station, collaborators)
                .wrap_err("Failed to start the docking controller")?;
            info!("DockingController started");
            Some(c)
        }
        None => {
            info!("No station to dock with, only the StationFinder will run");
            None
        }
    };

    info!("Initialisation complete\n");

    // ---- WAIT ----

    let start = Instant::now();

    loop {
        if let Some(ref c) = controller {
            if !c.is_running() {
                info!("Docking finished: {:?}", c.state());
                break;
            }
        }

        if let Some(run_time_s) = opt.run_time_s {
            if start.elapsed().as_secs_f64() >= run_time_s {
                info!("Run time of {} s elapsed", run_time_s);
                break;
            }
        }

        thread::sleep(WAIT_PERIOD);
    }

    // ---- SHUTDOWN ----

    if let Some(ref mut c) = controller {
        c.stop();
    }
    finder.stop();

    info!("End of execution");

    Ok(())
}

/// Create a ground truth pose source subscribed to the fiducial endpoint.
fn pose_source(
    ctx: &zmq::Context,
    net_params: &NetParams,
    params: &DockExecParams,
) -> Result<GroundTruthPoseSource, Report> {
    let sub: ZmqSubscriber<PoseSample> = ZmqSubscriber::new(
        ctx,
        &net_params.fiducial_endpoint,
        &params.pose_topic,
        LISTENER_POLL_TIMEOUT_MS,
    )
    .wrap_err("Failed to create the pose subscriber")?;

    GroundTruthPoseSource::new(Box::new(sub)).wrap_err("Failed to start the pose listener")
}
