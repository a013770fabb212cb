//! Command-line argument definitions for the Floorplan CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the input payloads, the orientation
//! oracle, the output directory, the optional execution handoff,
//! configuration file selection, and logging verbosity.

use clap::Parser;

/// Command-line arguments for the Floorplan layout compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the detection document (JSON)
    #[arg(help = "Path to the detection document")]
    pub input: String,

    /// Path to the extracted properties payload (JSON)
    #[arg(short, long)]
    pub properties: Option<String>,

    /// Path to a recorded orientation judgment payload
    #[arg(short, long, conflicts_with = "oracle_command")]
    pub judgments: Option<String>,

    /// Program answering orientation requests (JSON request on stdin)
    #[arg(long)]
    pub oracle_command: Option<String>,

    /// Extra argument passed to the oracle program (repeatable)
    #[arg(long = "oracle-arg", requires = "oracle_command", allow_hyphen_values = true)]
    pub oracle_args: Vec<String>,

    /// Source image reference forwarded to the oracle
    #[arg(long)]
    pub image: Option<String>,

    /// Directory receiving document.json and target.json
    #[arg(short, long, default_value = "out")]
    pub out_dir: String,

    /// Destination of the built simulation model
    #[arg(short, long)]
    pub destination: Option<String>,

    /// Hand the target graph to the execution collaborator
    #[arg(long)]
    pub execute: bool,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["floorplan", "layout.json"]).unwrap();

        assert_eq!(args.input, "layout.json");
        assert_eq!(args.out_dir, "out");
        assert_eq!(args.log_level, "info");
        assert!(!args.execute);
        assert!(args.judgments.is_none());
        assert!(args.oracle_args.is_empty());
    }

    #[test]
    fn test_oracle_sources_are_exclusive() {
        let result = Args::try_parse_from([
            "floorplan",
            "layout.json",
            "--judgments",
            "j.json",
            "--oracle-command",
            "judge",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_oracle_args_require_command() {
        let result = Args::try_parse_from(["floorplan", "layout.json", "--oracle-arg", "-v"]);
        assert!(result.is_err());

        let args = Args::try_parse_from([
            "floorplan",
            "layout.json",
            "--oracle-command",
            "judge",
            "--oracle-arg",
            "--model",
            "--oracle-arg",
            "vision",
        ])
        .unwrap();
        assert_eq!(args.oracle_args, vec!["--model", "vision"]);
    }
}
