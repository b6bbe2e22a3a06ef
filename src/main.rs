use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    locator_cli::cli::app::run().await
}
