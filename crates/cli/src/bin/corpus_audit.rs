use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    corpus_audit_cli::main_entry().await
}
