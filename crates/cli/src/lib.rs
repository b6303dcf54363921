pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use partsline_core::config::{ClassifierKind, ConfigOverrides, LoadOptions};

const LONG_ABOUT: &str = "Route customer questions about orders, refunds, subscriptions and \
parts to the right backend operation.";

const AFTER_HELP: &str = "Examples:
  partsline chat
  partsline ask \"Check order status for order W174191 with zip 20020\"
  partsline --classifier llm ask \"Is part 1366 compatible with model 3352573?\"
  partsline tools";

#[derive(Debug, Parser)]
#[command(
    name = "partsline",
    about = "Parts store customer assistant",
    long_about = LONG_ABOUT,
    after_help = AFTER_HELP
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Config file (default: partsline.toml or config/partsline.toml)"
    )]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "URL", help = "Parts API base URL override")]
    api_url: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        help = "Log level override (trace|debug|info|warn|error)"
    )]
    log_level: Option<String>,
    #[arg(
        long,
        global = true,
        value_name = "KIND",
        value_parser = parse_classifier,
        help = "Classifier override (rules|llm)"
    )]
    classifier: Option<ClassifierKind>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive conversation on stdin")]
    Chat,
    #[command(about = "Route a single query and print the outcome as JSON")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "The customer query")]
        query: Vec<String>,
    },
    #[command(about = "List the backend operations and their parameters")]
    Tools,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                api_base_url: self.api_url.clone(),
                classifier_kind: self.classifier,
                log_level: self.log_level.clone(),
            },
        }
    }
}

fn parse_classifier(value: &str) -> Result<ClassifierKind, String> {
    value.parse::<ClassifierKind>().map_err(|error| error.to_string())
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Chat => commands::chat::run(options).await,
        Command::Ask { query } => commands::ask::run(options, &query.join(" ")).await,
        Command::Tools => commands::tools::run(),
        Command::Config => commands::config::run(options),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use partsline_core::config::ClassifierKind;

    use super::Cli;

    #[test]
    fn global_flags_become_config_overrides() {
        let cli = match Cli::try_parse_from([
            "partsline",
            "--config",
            "custom.toml",
            "--api-url",
            "http://127.0.0.1:9000",
            "--classifier",
            "llm",
            "tools",
        ]) {
            Ok(cli) => cli,
            Err(error) => panic!("parse: {error}"),
        };

        let options = cli.load_options();

        assert_eq!(options.config_path, Some(PathBuf::from("custom.toml")));
        assert!(options.require_file);
        assert_eq!(options.overrides.api_base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(options.overrides.classifier_kind, Some(ClassifierKind::Llm));
        assert_eq!(options.overrides.log_level, None);
    }
}
