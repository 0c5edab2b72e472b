use quay::config::{AppConfig, get_env_or, load_dotenv};
use quay::observability::TracingConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();
    TracingConfig::new().init();

    let config = AppConfig::from_env()?;
    let addr = get_env_or("QUAY_ADDR", "127.0.0.1:8000");

    quay_demo::create_app(config).listen(&addr).await?;
    Ok(())
}
