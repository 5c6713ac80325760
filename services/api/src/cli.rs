use crate::commands::{run_assess, run_redact, AssessArgs, RedactArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use pod_quality::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "pod-quality",
    about = "Score proof-of-delivery photos and redact faces before they are shared",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Assess one delivery event against local assets and print the record
    Assess(AssessArgs),
    /// Blur faces in a local image
    Redact(RedactArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Assess(args) => run_assess(args).await,
        Command::Redact(args) => run_redact(args).await,
    }
}
