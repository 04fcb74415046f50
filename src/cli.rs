use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "slicer-handoff",
    version,
    about = "Open 3D models from slicer links in your own slicer"
)]
pub struct Cli {
    /// Use this config file instead of the XDG default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a link, download the model and open it through the native host
    Open {
        /// Page link: a direct http(s) URL or a slicer deep link
        href: String,
    },
    /// Print the file URL a link resolves to
    Resolve { href: String },
    /// Check that the native host is installed and answering
    Ping,
    /// Show the config file location and effective settings
    Config,
    /// Read one trigger message as JSON from stdin and answer on stdout
    Trigger,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_open() {
        let cli = Cli::try_parse_from(["slicer-handoff", "open", "cura://open?file=x"]).unwrap();
        assert!(matches!(cli.command, Command::Open { href } if href == "cura://open?file=x"));
        assert!(!cli.verbose);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["slicer-handoff", "ping", "-v", "--config", "/tmp/c.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn requires_subcommand() {
        assert!(Cli::try_parse_from(["slicer-handoff"]).is_err());
    }
}
