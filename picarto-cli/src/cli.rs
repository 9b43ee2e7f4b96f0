use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "picarto",
    version,
    about = "Check whether Picarto artists are live and get notified when they go live"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to <config dir>/picarto/config.toml)
    #[arg(short, long, global = true, env = "PICARTO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging, including probe disconnects
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether an artist is live right now
    Check {
        /// Artist name
        artist: String,

        /// Seconds to wait for the stream before giving up
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Watch artists and print a line whenever one goes live (Ctrl-C to stop)
    Watch {
        /// Artist names
        #[arg(required = true, num_args = 1..)]
        artists: Vec<String>,

        /// Print notifications as JSON lines
        #[arg(long)]
        json: bool,

        /// Also print disconnects and probe failures
        #[arg(long)]
        events: bool,
    },

    /// Show or reset the configuration file
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Overwrite the configuration file with defaults
        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_check() {
        let args = Args::parse_from(["picarto", "check", "alice", "--timeout", "10"]);
        match args.command {
            Commands::Check {
                artist,
                timeout,
                json,
            } => {
                assert_eq!(artist, "alice");
                assert_eq!(timeout, Some(10));
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_watch_requires_artists() {
        assert!(Args::try_parse_from(["picarto", "watch"]).is_err());
        let args = Args::parse_from(["picarto", "-v", "watch", "alice", "bob"]);
        assert!(args.verbose);
        assert!(matches!(args.command, Commands::Watch { ref artists, .. } if artists.len() == 2));
    }
}
