mod app;
mod cache;
mod config;
mod constants;
mod display;
mod error;
mod graphics;
mod input;
mod player;
mod sentinel;
mod session;
mod theme;
mod ui;
mod youtube;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::{Config, Overrides, Settings};
use constants::constants;
use display::CliDisplayMode;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Browse and play YouTube playlists by genre", long_about = None)]
struct Args {
  /// YouTube Data API key (overrides prefs.toml)
  #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
  api_key: Option<String>,

  /// Thumbnail rendering: 'auto', 'direct' (half-blocks) or 'ascii'
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Open this genre directly instead of showing the genre list
  #[arg(short, long)]
  genre: Option<String>,

  /// Region code sent with searches, e.g. KR or US
  #[arg(long)]
  region: Option<String>,

  /// Relevance language sent with searches, e.g. ko or en
  #[arg(long)]
  language: Option<String>,

  /// Never advance to the next video on a timer
  #[arg(long)]
  no_autoplay: bool,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,
}

// --- Logging ---

/// Log to a daily file in the data dir; the terminal belongs to the UI.
fn init_logging() -> Option<WorkerGuard> {
  let dirs = ProjectDirs::from("", "", "genrebox")?;
  let log_dir = dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let appender = tracing_appender::rolling::daily(&log_dir, "genrebox.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env("GENREBOX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "genrebox", &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = init_logging();

  let config = Config::load();
  let overrides = Overrides {
    api_key: args.api_key.clone(),
    region_code: args.region.clone(),
    relevance_language: args.language.clone(),
    no_autoplay: args.no_autoplay,
  };
  let settings = Settings::resolve(overrides, &config);
  if settings.api_key.is_none() {
    bail!("No YouTube API key. Pass --api-key, set YOUTUBE_API_KEY, or add api_key to {}", prefs_display());
  }

  let genres = &constants().genres;
  let start_genre = match args.genre.as_deref() {
    Some(name) => Some(
      genres
        .iter()
        .position(|g| g.eq_ignore_ascii_case(name))
        .with_context(|| format!("Unknown genre '{}'. Choose one of: {}", name, genres.join(", ")))?,
    ),
    None => None,
  };

  let display_mode = display::resolve_display_mode(args.display_mode);
  let mut app = App::new(settings, config, config::prefs_path(), display_mode)?;
  info!(version = env!("CARGO_PKG_VERSION"), display = display_mode.label(), "genrebox starting");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  if let Some(index) = start_genre {
    app.open_genre(index).await;
  }

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, &mut app).await;
  ratatui::restore();
  app.shutdown().await;
  info!("genrebox exiting");
  result
}

fn prefs_display() -> String {
  config::prefs_path().map_or_else(|| "prefs.toml".to_string(), |p| p.display().to_string())
}

async fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
  loop {
    app.pump().await;

    terminal.draw(|frame| ui::ui(frame, app)).context("Failed to draw frame")?;
    app.observe_sentinel();

    if event::poll(Duration::from_millis(100)).context("Failed to poll terminal events")? {
      match event::read().context("Failed to read terminal event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(app, key).await;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }
  Ok(())
}
