use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use listsync_core::SourceId;
use log::LevelFilter;
use sync_logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "listsync", version, about = "Sync import lists into a book library")]
pub struct Cli {
    /// RON file with sources, credentials and engine settings.
    #[arg(long, short, env = "LISTSYNC_CONFIG", default_value = "listsync.ron")]
    pub config: PathBuf,

    /// RON export of the current library and its exclusions.
    #[arg(long, short)]
    pub library: Option<PathBuf>,

    /// Directory holding source health between runs.
    #[arg(long, default_value = ".")]
    pub state_dir: PathBuf,

    /// Write the report as JSON here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    #[arg(long, short)]
    pub verbose: bool,

    /// Run sources even while they are backing off.
    #[arg(long)]
    pub ignore_backoff: bool,

    /// Run only this source.
    #[arg(long)]
    pub source: Option<SourceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

impl Cli {
    pub fn level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, LogTarget};

    #[test]
    fn defaults_apply() {
        let cli = Cli::try_parse_from(["listsync"]).unwrap();
        assert_eq!(cli.log, LogTarget::Terminal);
        assert_eq!(cli.source, None);
        assert!(!cli.ignore_backoff);
    }

    #[test]
    fn single_source_run() {
        let cli = Cli::try_parse_from([
            "listsync",
            "--config",
            "lists.ron",
            "--source",
            "3",
            "--ignore-backoff",
            "--log",
            "both",
        ])
        .unwrap();
        assert_eq!(cli.source, Some(3));
        assert!(cli.ignore_backoff);
        assert_eq!(cli.log, LogTarget::Both);
        assert_eq!(cli.config.to_str(), Some("lists.ron"));
    }
}
