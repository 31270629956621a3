use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::Verbosity;

/// Shortest allowed time between two status renders.
const MIN_INTERVAL_MS: u64 = 100;

/// Configuration parsed from command-line arguments.
#[derive(Debug, Parser, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Preferred player, e.g. "spotify" for org.mpris.MediaPlayer2.spotify
    #[arg(short = 'P', long = "player", default_value = "")]
    pub player: String,
    /// Metadata format string
    #[arg(long = "format", default_value = "{title} - {artist}")]
    pub format: String,
    /// Tooltip format string
    #[arg(long = "tooltip-format", default_value = "{title}\n{artist}\n{album}")]
    pub tooltip_format: String,
    /// Milliseconds between status updates (minimum 100)
    #[arg(short = 'i', long = "interval", default_value_t = 1000)]
    pub interval: u64,
    /// Show time elapsed since the track started
    #[arg(short = 'p', long = "position", default_value_t = false, action = clap::ArgAction::SetTrue)]
    pub position_enabled: bool,
    #[command(flatten)]
    pub verbosity: Verbosity,
    #[arg(skip)]
    pub delay: Duration,
}

impl Config {
    /// Parse arguments and compute derived fields.
    pub fn parse() -> Self {
        Self::finish(<Self as Parser>::parse())
    }

    fn finish(mut config: Self) -> Self {
        config.delay = Duration::from_millis(config.interval.max(MIN_INTERVAL_MS));
        config.player = config.player.trim().to_string();
        config
    }
}
