use monitor::runtime::{boot, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = boot::load_dotenv();
    let log_control = boot::init_logging();
    if let Some(path) = dotenv {
        tracing::info!("Loaded environment from {}", path.display());
    }
    let hosts = boot::boot(log_control).await?;
    serve::serve(hosts).await
}
