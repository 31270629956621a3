use nowplaying::{Metadata, Ticker};
use serde::Serialize;

use crate::config::Config;

/// One line of JSON output for a status bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusLine {
    pub text: String,
    pub class: &'static str,
    pub tooltip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub art: String,
}

impl StatusLine {
    fn empty() -> Self {
        Self {
            text: String::new(),
            class: "none",
            tooltip: String::new(),
            art: String::new(),
        }
    }
}

fn format_metadata(format: &str, meta: &Metadata) -> String {
    format
        .replace("{title}", meta.title.trim())
        .replace("{artist}", meta.artists.trim())
        .replace("{album}", meta.album.trim())
        .trim()
        .to_string()
}

/// Formats time (in seconds) to a mm:ss or hh:mm:ss string.
pub fn format_position(seconds: u64) -> String {
    if seconds >= 3600 {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        let seconds = seconds % 60;
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        let minutes = seconds / 60;
        let seconds = seconds % 60;
        format!("{:02}:{:02}", minutes, seconds)
    }
}

pub fn render(config: &Config, meta: &Metadata, ticker: &Ticker) -> StatusLine {
    if !meta.valid {
        return StatusLine::empty();
    }

    let mut text = format_metadata(&config.format, meta);
    if config.position_enabled && meta.playing {
        text = format!("{} {}", text, format_position(ticker.elapsed().as_secs()));
    }

    StatusLine {
        text,
        class: if meta.playing { "playing" } else { "paused" },
        tooltip: format_metadata(&config.tooltip_format, meta),
        art: meta.art_url.clone(),
    }
}

/// Print the status line, only if output changes.
pub fn print_status(line: &StatusLine, last_output: &mut String) -> serde_json::Result<()> {
    let json_output = serde_json::to_string(line)?;
    if *last_output != json_output {
        println!("{}", json_output);
        *last_output = json_output;
    }
    Ok(())
}
