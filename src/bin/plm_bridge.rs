//! plm-bridge command line
//!
//! Runs the browser watcher, or exercises single pieces of the pipeline
//! (extraction, delivery, port probing, title decoding) from the shell.

use anyhow::Context;
use clap::{Parser, Subcommand};
use plm_bridge::browser::{BrowserSession, CdpHost, ConnectionOptions, LaunchOptions, TabWatcher};
use plm_bridge::extractor::AgentTimings;
use plm_bridge::{ActivityMonitor, AllowList, BridgeConfig, DeliveryPipeline, Extractor, MetadataRecord, TitleTag};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "plm-bridge")]
#[command(version)]
#[command(about = "Sync the PLM record open in the browser to the local companion application", long_about = None)]
struct Cli {
    /// User settings file (default: ./settings.json)
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// First port of the companion's port range
    #[arg(long, value_name = "PORT", global = true)]
    base_port: Option<u16>,

    /// Write records to this file when the companion is unreachable
    #[arg(long, value_name = "FILE", global = true)]
    fallback_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the browser and keep the companion in sync
    Watch {
        /// Launch the browser without a window
        #[arg(long)]
        headless: bool,

        /// Path to custom browser executable
        #[arg(long, value_name = "PATH")]
        executable_path: Option<PathBuf>,

        /// WebSocket endpoint of an already running browser
        #[arg(long, value_name = "URL")]
        ws_endpoint: Option<String>,

        /// Persistent browser profile directory
        #[arg(long, value_name = "DIR")]
        user_data_dir: Option<PathBuf>,

        /// Tab polling interval in milliseconds
        #[arg(long, default_value = "1000")]
        poll_ms: u64,
    },

    /// Extract metadata from a saved HTML page and print it
    Extract {
        /// HTML file to read
        file: PathBuf,

        /// Page URL to report (default: file:// URL of the input)
        #[arg(long)]
        url: Option<String>,

        /// Also deliver the record to the companion
        #[arg(long)]
        deliver: bool,
    },

    /// Deliver a JSON record to the companion
    Deliver {
        /// Record as JSON, e.g. '{"plm_id":"P123456-7890","url":"..."}'
        record: String,
    },

    /// Scan the port range for a live companion
    Probe,

    /// Decode a `[PLM_CTX:...]` window title
    Decode {
        title: String,
    },

    /// Run the reference companion receiver
    #[cfg(feature = "companion")]
    Companion,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = BridgeConfig::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(port) = cli.base_port {
        config.delivery.base_port = port;
    }
    if let Some(path) = cli.fallback_file {
        config.delivery.fallback_file = Some(path);
    }
    config.validate()?;

    match cli.command {
        Command::Watch {
            headless,
            executable_path,
            ws_endpoint,
            user_data_dir,
            poll_ms,
        } => {
            let mut options = LaunchOptions::new().headless(headless);
            options.chrome_path = executable_path;
            options.user_data_dir = user_data_dir;
            watch(config, options, ws_endpoint, Duration::from_millis(poll_ms)).await?;
        }
        Command::Extract { file, url, deliver } => {
            let html = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let url = match url {
                Some(url) => url,
                None => format!("file:///{}", file.canonicalize()?.display().to_string().trim_start_matches('/')),
            };

            let extractor = Extractor::new(&config.extractor)?;
            let record = extractor.extract_html(&html, &url);
            println!("{}", serde_json::to_string_pretty(&record)?);

            if deliver {
                let pipeline = DeliveryPipeline::from_config(&config.delivery)?;
                println!("{:?}", pipeline.deliver(&record).await);
            }
        }
        Command::Deliver { record } => {
            let record: MetadataRecord = serde_json::from_str(&record).context("Record is not valid JSON")?;
            let pipeline = DeliveryPipeline::from_config(&config.delivery)?;
            println!("{:?}", pipeline.deliver(&record).await);
        }
        Command::Probe => {
            let pipeline = DeliveryPipeline::from_config(&config.delivery)?;
            match pipeline.scan_for_port().await {
                Some(port) => println!("Companion alive on port {}", port),
                None => println!("No companion on ports {:?}", config.delivery.port_candidates()),
            }
        }
        Command::Decode { title } => match TitleTag::parse(&title) {
            Some(tag) => println!("{}", serde_json::to_string_pretty(&tag.into_record("Ghost Bridge (Active Window)"))?),
            None => println!("No context tag in title"),
        },
        #[cfg(feature = "companion")]
        Command::Companion => {
            use plm_bridge::companion;

            let (listener, port) =
                companion::bind_first_free(&config.delivery.host, &config.delivery.port_candidates()).await?;
            eprintln!("Companion receiver listening on http://{}:{}", config.delivery.host, port);
            companion::serve(listener, Arc::new(companion::ContextStore::new())).await?;
        }
    }

    Ok(())
}

async fn watch(
    config: BridgeConfig,
    options: LaunchOptions,
    ws_endpoint: Option<String>,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    let session = tokio::task::spawn_blocking(move || match ws_endpoint {
        Some(ws) => {
            eprintln!("Connecting to browser at {}", ws);
            BrowserSession::connect(ConnectionOptions::new(ws))
        }
        None => {
            eprintln!("Browser mode: {}", if options.headless { "headless" } else { "headed" });
            BrowserSession::launch(options)
        }
    })
    .await??;

    let allow_list = Arc::new(AllowList::from_config(&config.scope));
    let extractor = Arc::new(Extractor::new(&config.extractor)?);
    let host = Arc::new(CdpHost::new(
        Arc::new(session),
        extractor,
        Arc::clone(&allow_list),
        AgentTimings::from(&config.extractor),
    ));
    let pipeline = Arc::new(DeliveryPipeline::from_config(&config.delivery)?);
    let monitor =
        Arc::new(ActivityMonitor::new(Arc::clone(&host), pipeline, allow_list).with_policy(config.scope.on_scope_miss));

    let (tx, rx) = mpsc::channel(64);
    let shutdown = CancellationToken::new();
    let watcher = TabWatcher::new(host, tx, poll_interval);

    let watch_task = tokio::spawn(watcher.run(shutdown.clone()));
    let monitor_task = tokio::spawn(monitor.run(rx));
    eprintln!("Watching browser tabs, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    eprintln!("Shutting down...");
    shutdown.cancel();

    watch_task.await?;
    monitor_task.await?;
    Ok(())
}
