//! CLI module for Referat.

pub mod commands;
mod output;

pub use output::{format_duration, Output};

use crate::config::Settings;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Referat - batch video summarizer
///
/// Extracts the audio of every video in a folder, transcribes it with a local
/// or hosted speech model and summarizes the transcript with a local LLM.
#[derive(Parser, Debug)]
#[command(name = "referat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe and summarize every video in a folder
    Run(RunArgs),

    /// List the models served by the LLM endpoint
    Models {
        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// LLM endpoint overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// Host of the LLM endpoint
    #[arg(long, env = "REFERAT_LLM_HOST")]
    pub llm_host: Option<String>,

    /// Port of the LLM endpoint
    #[arg(long, env = "REFERAT_LLM_PORT")]
    pub llm_port: Option<u16>,
}

impl LlmArgs {
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(host) = &self.llm_host {
            settings.llm.host = host.clone();
        }
        if let Some(port) = self.llm_port {
            settings.llm.port = port;
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Folder containing the videos to process
    pub input: PathBuf,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// LLM model used for summaries (prompted for when omitted)
    #[arg(long, env = "REFERAT_LLM_MODEL")]
    pub llm_model: Option<String>,

    /// Speech model size (tiny, base, small, medium, large-v3, ...)
    #[arg(long, env = "REFERAT_MODEL_SIZE")]
    pub model_size: Option<String>,

    /// Transcription backend (local or hosted)
    #[arg(long, env = "REFERAT_BACKEND")]
    pub backend: Option<String>,

    /// Output folder (defaults to <input>_Output next to the input folder)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    /// Overlay the command-line values on the loaded settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        self.llm.apply_to(settings);
        if let Some(model) = &self.llm_model {
            settings.llm.model = Some(model.clone());
        }
        if let Some(size) = &self.model_size {
            settings.transcription.model_size = size.clone();
        }
        if let Some(backend) = &self.backend {
            settings.transcription.backend = backend.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "referat",
            "-vv",
            "run",
            "/videos/lectures",
            "--llm-host",
            "10.0.0.5",
            "--llm-port",
            "8080",
            "--llm-model",
            "mistral",
            "--model-size",
            "small",
            "--backend",
            "hosted",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.input, PathBuf::from("/videos/lectures"));

        let mut settings = Settings::default();
        args.apply_to(&mut settings);
        assert_eq!(settings.llm.host, "10.0.0.5");
        assert_eq!(settings.llm.port, 8080);
        assert_eq!(settings.llm.model.as_deref(), Some("mistral"));
        assert_eq!(settings.transcription.model_size, "small");
        assert_eq!(settings.transcription.backend, "hosted");
    }

    #[test]
    fn test_run_without_overrides_keeps_settings() {
        let cli = Cli::try_parse_from(["referat", "run", "in"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let mut settings = Settings::default();
        settings.llm.port = 9999;
        args.apply_to(&mut settings);
        assert_eq!(settings.llm.port, 9999);
        assert_eq!(settings.transcription.backend, "local");
    }

    #[test]
    fn test_parse_run_report_path() {
        let cli = Cli::try_parse_from(["referat", "run", "in", "--report", "out/report.json"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.report, Some(PathBuf::from("out/report.json")));
        assert!(args.output.is_none());
    }

    #[test]
    fn test_run_requires_input() {
        assert!(Cli::try_parse_from(["referat", "run"]).is_err());
    }

    #[test]
    fn test_parse_config_actions() {
        let cli = Cli::try_parse_from(["referat", "config", "path"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { action: ConfigAction::Path }));
    }
}
