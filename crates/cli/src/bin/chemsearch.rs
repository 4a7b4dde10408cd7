use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    chemsearch_cli::main_entry().await
}
