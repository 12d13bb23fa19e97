use clap::Parser;
use otpvault::cli::commands;
use otpvault::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr; OTPVAULT_LOG=debug turns them up.
    let filter = EnvFilter::try_from_env("OTPVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { no_password } => commands::init::execute(&cli, no_password),
        Commands::Import {
            ref files,
            ref text,
        } => commands::import_cmd::execute(&cli, files, text.as_ref()),
        Commands::Add {
            ref name,
            ref issuer,
            ref secret,
        } => commands::add::execute(&cli, name, issuer, secret.as_deref()),
        Commands::List => commands::list::execute(&cli),
        Commands::Codes => commands::list::execute_codes(&cli),
        Commands::Remove { ref id, force } => commands::remove::execute(&cli, id, force),
        Commands::Export { ref output } => commands::export::execute(&cli, output.as_deref()),
        Commands::Passwd => commands::passwd::execute(&cli),
        Commands::DisablePassword { force } => commands::passwd::execute_disable(&cli, force),
        Commands::Reset { force } => commands::reset::execute(&cli, force),
        #[cfg(feature = "audit-log")]
        Commands::Audit { last, ref since } => {
            commands::audit_cmd::execute(&cli, last, since.as_deref())
        }
    };

    if let Err(e) = result {
        otpvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
