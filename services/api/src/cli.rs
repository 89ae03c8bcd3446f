use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use microfin::error::AppError;
use microfin::identifier::IdentifierKind;
use microfin::sequence::{FileSequenceStore, SequenceStore};
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "microfin-api",
    about = "Run the microfinance lending service and its maintenance commands",
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
    /// Inspect or reset identifier counters in a file-backed sequence store
    Counter {
        #[command(subcommand)]
        command: CounterCommand,
    },
    /// Walk a member from intake to a fully repaid loan in memory
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum CounterCommand {
    /// Print the last issued value of a counter
    Show(CounterArgs),
    /// Reset a counter to zero. Existing identifiers issued from it may be reissued.
    Reset {
        #[command(flatten)]
        counter: CounterArgs,
        /// Required acknowledgement that identifiers may collide after the reset
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Args, Debug)]
pub(crate) struct CounterArgs {
    /// Counter name, e.g. membership, loanApplication, loan
    pub(crate) name: String,
    /// Path of the JSON counter file (the service's APP_SEQUENCE_FILE)
    #[arg(long)]
    pub(crate) file: PathBuf,
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
        Command::Counter {
            command: CounterCommand::Show(args),
        } => {
            let counter = show_counter(&args)?;
            match counter.last_issued {
                Some(last) => println!("{} = {} (last issued {})", args.name, counter.value, last),
                None => println!("{} = {} (nothing issued yet)", args.name, counter.value),
            }
            Ok(())
        }
        Command::Counter {
            command: CounterCommand::Reset { counter, confirm },
        } => {
            reset_counter(&counter, confirm)?;
            println!("{} reset to 0 in {}", counter.name, counter.file.display());
            Ok(())
        }
        Command::Demo(args) => run_demo(args),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct CounterState {
    pub(crate) value: u64,
    pub(crate) last_issued: Option<String>,
}

fn counter_kind(name: &str) -> Result<IdentifierKind, AppError> {
    IdentifierKind::from_sequence_name(name).ok_or_else(|| {
        AppError::Refused(format!(
            "unknown counter '{name}'; expected membership, loanApplication or loan"
        ))
    })
}

pub(crate) fn show_counter(args: &CounterArgs) -> Result<CounterState, AppError> {
    let kind = counter_kind(&args.name)?;
    let store = FileSequenceStore::open(&args.file)?;
    let value = store.current(kind.sequence_name())?;
    let last_issued = match value {
        0 => None,
        issued => Some(kind.format(issued).map_err(|err| AppError::Engine(err.into()))?),
    };
    Ok(CounterState { value, last_issued })
}

pub(crate) fn reset_counter(args: &CounterArgs, confirm: bool) -> Result<(), AppError> {
    let kind = counter_kind(&args.name)?;
    if !confirm {
        return Err(AppError::Refused(format!(
            "resetting counter '{}' requires --confirm",
            args.name
        )));
    }

    let store = FileSequenceStore::open(&args.file)?;
    let previous = store.current(kind.sequence_name())?;
    warn!(
        counter = %args.name,
        previous,
        file = %args.file.display(),
        "resetting counter; identifiers already issued from it may be issued again"
    );
    store.reset_to(kind.sequence_name(), 0)?;
    Ok(())
}
