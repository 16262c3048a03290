//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: evaluate schedules (preview / force)
//! - command / set: change one episode's access
//! - schedules: administer the schedule list
//! - sync-episodes: fill episode numbers from titles
//! - series / episode: seed and inspect the content store
//! - status / daemon

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use unlockr::domain::{AccessTier, AnchorTime};

/// Unlockr - scheduled access-tier unlocks for serialized episodes
#[derive(Parser, Debug)]
#[command(name = "unlockr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate every unlock schedule now
    Run {
        /// Report what would happen without changing anything
        #[arg(short, long)]
        preview: bool,

        /// Treat every enabled schedule as due
        #[arg(short, long, conflicts_with = "preview")]
        force: bool,
    },

    /// Interpret a natural-language command, e.g. "Make episode 5 free"
    Command {
        /// Command text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Set an episode's access directly by episode number
    Set {
        /// Episode number
        episode: i64,

        /// free or advance
        access: AccessTier,
    },

    /// Show settings, field names and the next scheduled run
    Status,

    /// Schedule administration
    Schedules {
        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// Fill episode numbers from episode titles
    SyncEpisodes {
        /// Write the numbers (default is preview)
        #[arg(short, long)]
        apply: bool,
    },

    /// Series management
    Series {
        #[command(subcommand)]
        command: SeriesCommands,
    },

    /// Episode management
    Episode {
        #[command(subcommand)]
        command: EpisodeCommands,
    },

    /// Run the recurring unlock trigger in the foreground
    Daemon,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ScheduleCommands {
    /// List schedules with their next due dates
    List,

    /// Add a schedule for a series
    Add {
        /// Series ID
        series_id: i64,

        /// Interval in days (1-365)
        #[arg(short, long, default_value_t = 1)]
        every: u32,

        /// Anchor time of day (HH:MM)
        #[arg(short, long, default_value = "02:00")]
        at: AnchorTime,

        /// Count Saturdays and Sundays toward the interval
        #[arg(long)]
        include_weekends: bool,

        /// Episode title substring (defaults to the series title)
        #[arg(short, long)]
        search_term: Option<String>,
    },

    /// Remove the schedule at a position
    Remove { position: usize },

    /// Enable the schedule at a position
    Enable { position: usize },

    /// Disable the schedule at a position
    Disable { position: usize },

    /// Clear all next-due dates so they re-initialize
    Reset,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SeriesCommands {
    /// Add a series
    Add { title: String },

    /// List series
    List,
}

#[derive(Subcommand, Debug, Clone)]
pub enum EpisodeCommands {
    /// Add an episode
    Add {
        title: String,

        /// Episode number
        #[arg(short, long)]
        number: Option<i64>,

        /// Initial access tier
        #[arg(short, long)]
        access: Option<AccessTier>,

        /// Subscription-platform post ID
        #[arg(short, long)]
        post_id: Option<String>,

        /// Body text
        #[arg(long, default_value = "")]
        content: String,
    },

    /// List episodes with number and access tier
    List {
        /// Only episodes classified advance
        #[arg(long)]
        advance: bool,
    },
}
