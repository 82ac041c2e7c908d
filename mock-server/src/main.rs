use mock_server::MockConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let mut config = MockConfig::default();
    if let Ok(app_id) = std::env::var("PARSE_APPLICATION_ID") {
        config.application_id = app_id;
    }
    if let Ok(master_key) = std::env::var("PARSE_MASTER_KEY") {
        config.master_key = master_key;
    }

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, base_url = %format!("http://{addr}{}", mock_server::API_PREFIX), "mock parse server listening");
    mock_server::run_with(listener, config).await
}
