#[tokio::main]
async fn main() -> anyhow::Result<()> {
    autofarm_cli::cli::app::run().await
}
