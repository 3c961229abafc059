use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reqstash::{Config, Method, OfflineLayer, Request, SYNC_TAG};

#[derive(Parser, Debug)]
#[command(name = "reqstash")]
#[command(about = "Offline-tolerant request cache and replay queue for web clients")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/reqstash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch the precache manifest into the configured cache generation
  Install,
  /// Purge cache generations superseded by the configured tag
  Activate,
  /// List requests waiting to be replayed
  Pending,
  /// Replay queued requests against the backend
  Sync {
    /// Sync tag to react to
    #[arg(long, default_value = SYNC_TAG)]
    tag: String,
  },
  /// Route one request through the offline layer
  Fetch {
    /// HTTP method (GET, POST, ...)
    method: String,
    /// Resource URL
    url: String,
    /// Request body
    #[arg(long, default_value = "")]
    body: String,
    /// Treat the connection as down
    #[arg(long)]
    offline: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  // Initialize logging
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "reqstash=info".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let layer = OfflineLayer::open(&config)?;

  match args.command {
    Command::Install => {
      let count = layer.install().await?;
      println!(
        "Cached {} resource(s) under generation {}",
        count,
        layer.cache_tag()
      );
    }
    Command::Activate => {
      let purged = layer.activate()?;
      if purged.is_empty() {
        println!("No stale generations; {} is current", layer.cache_tag());
      } else {
        println!(
          "Purged {}; {} is current",
          purged.join(", "),
          layer.cache_tag()
        );
      }
    }
    Command::Pending => {
      let pending = layer.pending()?;
      if pending.is_empty() {
        println!("Queue is empty");
      } else {
        for record in pending {
          println!(
            "{:>4}  {:<6}  {}  {}",
            record.id,
            record.method.as_str(),
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.url
          );
        }
      }
    }
    Command::Sync { tag } => match layer.sync_event(&tag).await? {
      Some(report) => println!(
        "Replayed {} request(s): {} delivered, {} still queued",
        report.attempted(),
        report.delivered(),
        report.failed()
      ),
      None => println!("Nothing to do for tag {}", tag),
    },
    Command::Fetch {
      method,
      url,
      body,
      offline,
    } => {
      let method: Method = method.parse().map_err(|e: String| eyre!(e))?;
      if offline {
        layer.connectivity().set_online(false);
      }

      let response = layer.handle(Request::new(method, url).with_body(body)).await?;
      println!("HTTP {} ({:?})", response.status, response.source);
      if let Some(content_type) = &response.content_type {
        println!("Content-Type: {}", content_type);
      }
      println!("{}", response.text());
    }
  }

  Ok(())
}
