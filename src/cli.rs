//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::lifecycle::Selection;

/// Plugin-based chat bot with optional web, feed and stats services.
#[derive(Debug, Clone, Parser)]
#[command(name = "guildbot", version, about)]
pub struct Cli {
    /// Run the gateway client loop
    #[arg(long)]
    pub bot: bool,

    /// Run the HTTP listener
    #[arg(long)]
    pub web: bool,

    /// Run the feed poller
    #[arg(long)]
    pub reddit: bool,

    /// Run the periodic stats loop
    #[arg(long)]
    pub stats: bool,

    /// Run every service
    #[arg(long)]
    pub all: bool,

    /// Run a single action and exit (e.g. "connected")
    #[arg(short = 'a', long, value_name = "NAME")]
    pub action: Option<String>,

    /// HTTP listen address, overriding the config file
    #[arg(long, value_name = "ADDR")]
    pub addr: Option<String>,

    /// Path to the configuration file
    #[arg(long, value_name = "PATH", default_value = "config.toml")]
    pub conf: PathBuf,

    /// Include timestamps in log output
    #[arg(long)]
    pub ts: bool,
}

impl Cli {
    /// The startup selection these flags describe.
    pub fn selection(&self) -> Selection {
        Selection {
            bot: self.bot,
            web: self.web,
            reddit: self.reddit,
            stats: self.stats,
            all: self.all,
            action: self.action.clone(),
        }
    }
}
