//! Fusetui: two-gem fusion combat puzzle in the terminal.

mod app;
mod encounter;
mod fusion;
mod grid;
mod input;
mod opponent;
mod theme;
mod token;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};
use opponent::OpponentStats;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Simulation parameters derived from CLI (board size, speeds, hp pools, dt clamp).
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub cols: usize,
    pub rows: usize,
    /// Falling speed in rows per second.
    pub fall_speed: f64,
    pub player_hp: i32,
    pub opponent: OpponentStats,
    /// Upper bound on the per-frame dt handed to the simulation.
    pub max_dt: f64,
    /// Fixed RNG seed for spawn colours; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cols: 6,
            rows: 10,
            fall_speed: 4.0,
            player_hp: 30,
            opponent: OpponentStats::default(),
            max_dt: 0.033,
            seed: None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("board must be at least 1×1 (got {cols}×{rows})")]
    EmptyBoard { cols: usize, rows: usize },
    #[error("{name} must be a positive number of seconds or rows (got {value})")]
    NonPositiveRate { name: &'static str, value: f64 },
    #[error("{name} must be positive (got {value})")]
    NonPositiveHp { name: &'static str, value: i32 },
    #[error("strike damage cannot be negative (got {0})")]
    NegativeStrike(i32),
}

impl GameConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let config = Self {
            cols: args.cols as usize,
            rows: args.rows as usize,
            fall_speed: args.fall_speed,
            player_hp: args.player_hp,
            opponent: OpponentStats {
                max_hp: args.opponent_hp,
                windup: args.windup,
                strike: args.strike,
            },
            max_dt: args.max_dt,
            seed: args.seed,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cols == 0 || self.rows == 0 {
            return Err(ConfigError::EmptyBoard {
                cols: self.cols,
                rows: self.rows,
            });
        }
        for (name, value) in [
            ("fall speed", self.fall_speed),
            ("wind-up", self.opponent.windup),
            ("max dt", self.max_dt),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositiveRate { name, value });
            }
        }
        for (name, value) in [
            ("player hp", self.player_hp),
            ("opponent hp", self.opponent.max_hp),
        ] {
            if value <= 0 {
                return Err(ConfigError::NonPositiveHp { name, value });
            }
        }
        if self.opponent.strike < 0 {
            return Err(ConfigError::NegativeStrike(self.opponent.strike));
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref());
    let config = GameConfig::from_args(&args)?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        tracing::warn!("theme not loaded, using defaults: {e}");
        theme::Theme::default_for_palette(args.palette)
    });
    tracing::info!(?config, "starting");
    let mut app = App::new(config, theme);
    app.run()?;
    Ok(())
}

/// Install the subscriber. Without a log file nothing is written: stdout/stderr belong to the TUI.
fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = log_file.and_then(|path| {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && std::fs::create_dir_all(parent).is_err()
        {
            return None;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    match file {
        Some(file) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
        }
        None => tracing_subscriber::registry().with(env_filter).init(),
    }
}

/// Fuse pairs of gems into heals, blocks, poison and hits before the slime lands its strike.
#[derive(Debug, Parser)]
#[command(
    name = "fusetui",
    version,
    about = "Two-gem fusion combat puzzle in the terminal. Fuse adjacent gems to heal, block, poison and strike.",
    long_about = "Fusetui is a terminal puzzle-combat game.\n\n\
        Gems fall one at a time into the well. Drag across two orthogonally adjacent settled gems to \
        fuse them: Red heals, Blue blocks, Green poisons, Yellow strikes. The opponent winds up and \
        attacks on a timer; every attack strips your block. Die and the run starts over.\n\n\
        CONTROLS (mouse):\n  Press on a gem, drag onto a neighbour, release to fuse.\n\n\
        CONTROLS (keyboard):\n  Arrows / hjkl  Move cursor    Space/Enter  Grab / fuse    c / Backspace  Drop selection\n  \
        p              Pause          q / Esc      Quit menu"
)]
pub struct Args {
    /// Board width in cells.
    #[arg(long, default_value = "6", value_name = "COLS")]
    pub cols: u16,

    /// Board height in cells.
    #[arg(long, default_value = "10", value_name = "ROWS")]
    pub rows: u16,

    /// Falling speed in rows per second.
    #[arg(long, default_value = "4.0", value_name = "RATE")]
    pub fall_speed: f64,

    /// Starting (and maximum) player hp.
    #[arg(long, default_value = "30", value_name = "HP")]
    pub player_hp: i32,

    /// Starting (and maximum) opponent hp.
    #[arg(long, default_value = "40", value_name = "HP")]
    pub opponent_hp: i32,

    /// Opponent wind-up before each strike, in seconds.
    #[arg(long, default_value = "3.0", value_name = "SECS")]
    pub windup: f64,

    /// Opponent base strike damage.
    #[arg(long, default_value = "6", value_name = "DMG")]
    pub strike: i32,

    /// Largest simulation step per frame, in seconds.
    #[arg(long, default_value = "0.033", value_name = "SECS")]
    pub max_dt: f64,

    /// Seed for spawn colours (reproducible runs).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses built-in colours if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Append logs to this file (RUST_LOG controls the filter).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_default_config() {
        let args = Args::parse_from(["fusetui"]);
        let config = GameConfig::from_args(&args).unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn test_args_override() {
        let args = Args::parse_from([
            "fusetui",
            "--cols",
            "8",
            "--windup",
            "1.5",
            "--seed",
            "42",
            "--palette",
            "contrast",
        ]);
        let config = GameConfig::from_args(&args).unwrap();
        assert_eq!(config.cols, 8);
        assert_eq!(config.opponent.windup, 1.5);
        assert_eq!(config.seed, Some(42));
        assert_eq!(args.palette, Palette::HighContrast);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_board = GameConfig {
            rows: 0,
            ..GameConfig::default()
        };
        assert_eq!(
            bad_board.validate(),
            Err(ConfigError::EmptyBoard { cols: 6, rows: 0 })
        );

        let bad_speed = GameConfig {
            fall_speed: f64::NAN,
            ..GameConfig::default()
        };
        assert!(matches!(
            bad_speed.validate(),
            Err(ConfigError::NonPositiveRate { name: "fall speed", .. })
        ));

        let mut bad_windup = GameConfig::default();
        bad_windup.opponent.windup = 0.0;
        assert!(matches!(
            bad_windup.validate(),
            Err(ConfigError::NonPositiveRate { name: "wind-up", .. })
        ));

        let bad_hp = GameConfig {
            player_hp: 0,
            ..GameConfig::default()
        };
        assert_eq!(
            bad_hp.validate(),
            Err(ConfigError::NonPositiveHp {
                name: "player hp",
                value: 0
            })
        );

        let mut bad_strike = GameConfig::default();
        bad_strike.opponent.strike = -1;
        assert_eq!(bad_strike.validate(), Err(ConfigError::NegativeStrike(-1)));
    }
}
