use crate::demo::{run_demo, run_evaluate, run_sweep, DemoArgs, EvaluateArgs, SweepArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use payouts::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Automatic Payouts",
    about = "Evaluate and settle hubber payout requests",
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
    /// Evaluate one payout request against the seeded demo ledger
    Evaluate(EvaluateArgs),
    /// Evaluate every pending request in the seeded demo ledger
    Sweep(SweepArgs),
    /// Walk through the reference scenarios with automatic payouts enabled
    Demo(DemoArgs),
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
        Command::Evaluate(args) => run_evaluate(args).await,
        Command::Sweep(args) => run_sweep(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
