//! grant CLI binary entry point.

use grant::cli::{Cli, Commands};
use grant::config::GrantConfig;
use grant::error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    grant::cli::init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.flow.apply(GrantConfig::from_env()?);
    let engine = grant::cli::auth::build_engine(config)?;

    match cli.command {
        None => grant::cli::auth::handle_token(&engine, cli.verbose).await,
        Some(Commands::Clone(args)) => {
            grant::cli::clone::handle_clone(&engine, &args.repository_url, cli.verbose).await
        }
        Some(Commands::Status) => grant::cli::auth::handle_status(&engine),
        Some(Commands::Logout) => grant::cli::auth::handle_logout(&engine),
    }
}
