use crate::demo::{run_demo, run_recall, DemoArgs, RecallRunArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use rider_recall::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Rider Recall",
    about = "Run the capacity-gap rider recall service or drive a recall from the command line",
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
    /// Run recall workflows against the simulated collaborators
    Recall {
        #[command(subcommand)]
        command: RecallCommand,
    },
    /// Walk through three canned recall scenarios
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RecallCommand {
    /// Run one workflow for a site and date and print the result
    Run(RecallRunArgs),
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
        Command::Recall {
            command: RecallCommand::Run(args),
        } => run_recall(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
