use crate::demo::{run_demo, DemoArgs};
use crate::quote::{run_shift_quote, run_timesheet_quote, ShiftQuoteArgs, TimesheetQuoteArgs};
use crate::server;
use care_rota::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Care Rota",
    about = "Run the care-home shift staffing service or price shifts from the command line",
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
    /// Price a shift or a worked period without storing anything
    Quote {
        #[command(subcommand)]
        command: QuoteCommand,
    },
    /// Walk a shift from posting to payout against an in-memory store
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum QuoteCommand {
    /// Resolve a shift schedule and its planned pay
    Shift(ShiftQuoteArgs),
    /// Split worked time into regular and overtime pay
    Timesheet(TimesheetQuoteArgs),
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
        Command::Quote {
            command: QuoteCommand::Shift(args),
        } => run_shift_quote(args),
        Command::Quote {
            command: QuoteCommand::Timesheet(args),
        } => run_timesheet_quote(args),
        Command::Demo(args) => run_demo(args),
    }
}
