use lead_triage::cli::{self, CommandLine};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "lead_triage=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let commands = CommandLine::parse_args();
    cli::execute(commands.command).await
}
