use chordcontroller::cli::Args;
use chordcontroller::config::{self, LoadedConfig};
use chordcontroller::controller::ControllerHandle;
use chordcontroller::mapping::{run_engine, ChordEngine};
use chordcontroller::output::{
    run_output_worker, Instrument, MidirSink, Performer, QueuedDispatcher, OUTPUT_QUEUE_CAPACITY,
};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup(args.log_level.into())?;

    if args.list_ports {
        let ports = MidirSink::list_ports().map_err(|e| eyre!("Failed to list MIDI ports: {}", e))?;
        if ports.is_empty() {
            println!("No MIDI output ports available");
        }
        for port in ports {
            println!("{}", port);
        }
        return Ok(());
    }

    let config = load_config(&args).await?;
    info!("Using profile: {}", config.source);

    let sink = MidirSink::open(args.port_name(config.output.port_name.as_deref()))
        .map_err(|e| eyre!("Failed to open MIDI output: {}", e))?;
    info!("MIDI output: {}", sink.port_name());

    let shutdown = CancellationToken::new();

    let performer = Performer::new(Instrument::new(sink, config.output.instrument));
    let (dispatcher, jobs) = QueuedDispatcher::channel(OUTPUT_QUEUE_CAPACITY);
    let output_task = tokio::spawn(run_output_worker(jobs, performer, shutdown.clone()));

    let mut controller = ControllerHandle::spawn(args.controller_settings(), shutdown.clone());
    let events = controller
        .take_receiver()
        .ok_or_else(|| eyre!("Controller event receiver already taken"))?;

    let engine = ChordEngine::new(config.profile.clone(), dispatcher);
    let engine_task = tokio::spawn(run_engine(engine, events, shutdown.clone()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Ctrl-C received, shutting down");
        }
        _ = shutdown.cancelled() => {
            info!("Shutdown requested");
        }
    }
    shutdown.cancel();

    let controller_result = controller.join().await;
    // Dropping the engine closes the output queue
    drop(engine_task.await?);

    let mut performer = output_task.await?;
    if let Err(e) = performer.instrument_mut().release() {
        error!("Failed to release notes on shutdown: {}", e);
    }

    controller_result.map_err(|e| eyre!("Controller failed: {}", e))
}

async fn load_config(args: &Args) -> Result<LoadedConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => match config::default_config_path() {
            Some(path) => path,
            None => {
                info!("No config directory available, using built-in profile");
                return LoadedConfig::builtin()
                    .map_err(|e| eyre!("Failed to load default profile: {}", e));
            }
        },
    };
    config::load_or_default(&path, args.quit_on_parse_failure).await
}

fn setup(level: Level) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(level);
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
