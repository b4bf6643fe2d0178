use crate::format::ColorMode;
use std::time::Duration;

/// Settings for one run, fixed once parsed.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub terminal: bool,
    pub output: Output,
    /// Pause between consecutive batch commands.
    pub wait: Option<Duration>,
    /// Batch commands; empty in terminal mode.
    pub commands: Vec<String>,
}

/// How command responses are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub silent: bool,
    pub color: ColorMode,
}

impl Output {
    pub fn new(silent: bool, disable_colors: bool, raw: bool) -> Self {
        let color = if raw {
            ColorMode::Raw
        } else if disable_colors {
            ColorMode::Strip
        } else {
            ColorMode::Ansi
        };
        Output { silent, color }
    }
}

/// Commands that end an interactive session.
pub fn is_quit(line: &str) -> bool {
    line.eq_ignore_ascii_case("q")
}

/// The server is known to misbehave after `stop`, so nothing is sent after it.
pub fn is_stop(cmd: &str) -> bool {
    cmd.eq_ignore_ascii_case("stop")
}
