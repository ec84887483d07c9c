use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    diffview::run_from_env().await
}
