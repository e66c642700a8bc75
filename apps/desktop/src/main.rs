use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, LocalEventHub, MissingDropZone, Orchestrator, OrchestratorHandle,
    SessionSnapshot, SessionState, UiCommand,
};
use shared::domain::{Destination, TransferMode, TransportProtocol};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod simulator;

use simulator::SimulatedBackend;

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Command,
    /// Make the simulated transport fail every connection.
    #[arg(long)]
    simulate_downtime: bool,
    #[arg(long, default_value_t = 150)]
    chunk_delay_ms: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send files to a destination.
    Send {
        #[arg(long)]
        address: String,
        /// Defaults to the configured port.
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        udp: bool,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Listen for incoming files for a while, then stop.
    Receive {
        #[arg(long, default_value_t = 5)]
        duration_secs: u64,
        #[arg(long = "incoming", default_value = "incoming.bin")]
        incoming: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let settings = load_settings();

    let incoming = match &args.command {
        Command::Receive { incoming, .. } => incoming.clone(),
        Command::Send { .. } => Vec::new(),
    };
    let hub = Arc::new(LocalEventHub::new());
    let backend = Arc::new(SimulatedBackend::new(
        hub.clone(),
        Duration::from_millis(args.chunk_delay_ms),
        incoming,
    ));

    let (handle, commands) = OrchestratorHandle::channel(&settings);
    let default_port = settings.default_port.clone();
    let orchestrator = Orchestrator::new(settings, backend, hub, Arc::new(MissingDropZone))?;
    let mut view = orchestrator.subscribe();
    let renderer = tokio::spawn(render(orchestrator.subscribe()));
    let session = tokio::spawn(orchestrator.run(commands));

    if args.simulate_downtime {
        handle.dispatch(UiCommand::SetDowntimeSimulation(true))?;
    }

    match args.command {
        Command::Send {
            address,
            port,
            udp,
            paths,
        } => {
            let protocol = if udp {
                TransportProtocol::Udp
            } else {
                TransportProtocol::Tcp
            };
            let destination = destination(address, port, default_port)?;
            handle.dispatch(UiCommand::SetProtocol(protocol))?;
            handle.dispatch(UiCommand::AddFiles(paths))?;
            handle.dispatch(UiCommand::SetDestination(destination))?;
            handle.dispatch(UiCommand::Send)?;

            let outcome = view
                .wait_for(|s| {
                    s.state == SessionState::Error
                        || (s.state == SessionState::Idle
                            && s.destination.has_address()
                            && s.files.is_empty())
                })
                .await?
                .state;
            if outcome == SessionState::Error {
                view.wait_for(|s| s.state == SessionState::Idle).await?;
            }
        }
        Command::Receive { duration_secs, .. } => {
            handle.dispatch(UiCommand::SetMode(TransferMode::Receive))?;
            let state = view
                .wait_for(|s| s.mode == TransferMode::Receive && s.state != SessionState::Starting)
                .await?
                .state;
            if state != SessionState::Active {
                bail!("receive loop failed to start");
            }

            tokio::time::sleep(Duration::from_secs(duration_secs)).await;
            handle.dispatch(UiCommand::SetMode(TransferMode::Transmit))?;
            view.wait_for(|s| s.mode == TransferMode::Transmit && s.state == SessionState::Idle)
                .await?;
        }
    }

    drop(handle);
    session.await?;
    renderer.await?;
    info!("done");
    Ok(())
}

// The loop only logs a rejected send, so an unusable destination has to be
// caught before anything is dispatched.
fn destination(
    address: String,
    port: Option<String>,
    default_port: String,
) -> Result<Destination> {
    let destination = Destination::new(address, port.unwrap_or(default_port));
    if !destination.has_address() {
        bail!("destination address is empty");
    }
    if !destination.has_port() {
        bail!("destination port is empty");
    }
    Ok(destination)
}

async fn render(mut view: watch::Receiver<SessionSnapshot>) {
    let mut announced = HashSet::new();
    while view.changed().await.is_ok() {
        let snapshot = view.borrow_and_update().clone();
        let progress = snapshot
            .progress
            .as_ref()
            .map(|p| {
                format!(
                    "{} {}/{} {:.0}%",
                    p.file_name, p.current_file_index, p.total_files, p.percentage
                )
            })
            .unwrap_or_default();
        info!(
            mode = ?snapshot.mode,
            state = ?snapshot.state,
            protocol = %snapshot.protocol,
            files = snapshot.files.len(),
            progress = %progress,
            "session"
        );
        for note in &snapshot.notifications {
            if announced.insert(note.id) {
                info!(severity = ?note.severity, id = %note.id, "{}", note.text);
            }
        }
    }
}
