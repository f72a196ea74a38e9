//! Hub voter binary entry point.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hub_voter_bin::cli::run_cli().await
}
