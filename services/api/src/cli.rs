use crate::demo::{run_demo, run_fare_quote, DemoArgs, FareQuoteArgs};
use crate::server;
use cargolink::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "CargoLink Dispatch",
    about = "Run and exercise the capacity-constrained cargo dispatch engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service; the default when no subcommand is given
    Serve(ServeArgs),
    /// Inspect the deterministic fare model
    Fare {
        #[command(subcommand)]
        command: FareCommand,
    },
    /// Run an end-to-end CLI demo covering matching, custody, and settlement
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum FareCommand {
    /// Compute a fare breakdown from trip parameters
    Quote(FareQuoteArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Bind host, overriding `APP_HOST`
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Bind port, overriding `APP_PORT`
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Fare {
            command: FareCommand::Quote(args),
        } => run_fare_quote(args),
        Command::Demo(args) => run_demo(args),
    }
}
