//! `qserv`: administrative CLI for the distributed spatial query engine's
//! CSS (register/unregister/show) and worker export directory layout.

mod commands;

use clap::Parser;
use trogging::cli::LoggingConfig;

#[derive(Debug, clap::Parser)]
#[clap(name = "qserv", about = "Administrative CLI for the qserv catalog")]
struct Args {
    #[clap(flatten)]
    logging: LoggingConfig,

    #[clap(subcommand)]
    command: commands::Command,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = args.logging.builder().install() {
        eprintln!("warning: failed to install logging: {e}");
    }

    if let Err(e) = commands::command(args.command) {
        observability_deps::tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(exit_code(&e));
    }
}

/// Maps a top-level command error to a non-zero process exit code, per
/// spec §6 ("non-zero is the underlying error number"). The specific
/// numbering isn't meaningful to callers beyond "nonzero means failure";
/// it just distinguishes the four subcommand families.
fn exit_code(error: &commands::Error) -> i32 {
    match error {
        commands::Error::Register { .. } => 1,
        commands::Error::Unregister { .. } => 2,
        commands::Error::Show { .. } => 3,
        commands::Error::Export { .. } => 4,
    }
}
