//! `pmos serve`: start the HTTP gateway.

use crate::runtime::{self, BoxError};

pub async fn run(port_override: Option<u16>) -> Result<(), BoxError> {
    let mut config = runtime::load_config()?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    runtime::require_api_key(&config)?;

    let service = runtime::build_service(&config).await?;

    println!("PM OS Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:     {}", service.store().name());
    println!("   Threshold: {}", config.router.confidence_threshold);

    pmos_gateway::start(&config, service).await?;

    Ok(())
}
