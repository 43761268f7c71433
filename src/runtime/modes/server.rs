//! Server mode
//!
//! This module contains the HTTP server startup logic.

use actix_web::{App, HttpServer, middleware::DefaultHeaders, web};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::configure_app;
use crate::api::middleware::RequestIdMiddleware;
use crate::api::services::AppStartTime;
use crate::api::services::relay::api_governor_config;
use crate::config::get_config;
use crate::runtime::lifetime;

pub async fn run_server() -> Result<()> {
    // Record application start time
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    let config = get_config();

    let startup = lifetime::startup::prepare_startup(&config).map_err(|e| {
        tracing::error!("Server startup failed: {}", e);
        e
    })?;
    let dispatch = startup.dispatch.clone();
    let consent = startup.consent.clone();

    // 所有 worker 共享同一个限流器
    let governor = api_governor_config(&config.api)?;

    if config.api.token.is_empty() {
        warn!("API is disabled (api.token is empty)");
    } else {
        info!("API available at /api/v1");
    }
    if config.callbacks.token.is_empty() {
        warn!("Callbacks at /callbacks are not authenticated (callbacks.token is empty)");
    }

    let cpu_count = config.server.cpu_count.clamp(1, 32);
    info!("Using {} CPU cores for the server", cpu_count);

    let app_config = config.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestIdMiddleware)
            .wrap(
                DefaultHeaders::new()
                    .add(("Cache-Control", "no-cache, no-store, must-revalidate")),
            )
            .app_data(web::PayloadConfig::new(app_config.api.max_body_bytes))
            .configure(|cfg| {
                configure_app(
                    cfg,
                    &app_config,
                    dispatch.clone(),
                    app_start_time.clone(),
                    &governor,
                )
            })
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .workers(cpu_count);

    // Bind to Unix socket or TCP address
    #[cfg(unix)]
    let server = match config.server.unix_socket.as_deref().filter(|s| !s.is_empty()) {
        Some(socket_path) => {
            info!("Starting server on Unix socket: {}", socket_path);
            if std::path::Path::new(socket_path).exists() {
                std::fs::remove_file(socket_path)
                    .with_context(|| format!("Failed to remove stale socket {}", socket_path))?;
            }
            server
                .bind_uds(socket_path)
                .with_context(|| format!("Failed to bind Unix socket {}", socket_path))?
        }
        None => {
            let bind_address = format!("{}:{}", config.server.host, config.server.port);
            info!("Starting server at http://{}", bind_address);
            server
                .bind(&bind_address)
                .with_context(|| format!("Failed to bind {}", bind_address))?
        }
    };

    #[cfg(not(unix))]
    let server = {
        let bind_address = format!("{}:{}", config.server.host, config.server.port);
        info!("Starting server at http://{}", bind_address);
        server
            .bind(&bind_address)
            .with_context(|| format!("Failed to bind {}", bind_address))?
    };

    let server = server.run();

    // Wait for server or shutdown signal
    tokio::select! {
        res = server => {
            res?;
            lifetime::shutdown::flush_state(consent).await;
        }
        _ = lifetime::shutdown::listen_for_shutdown(consent.clone()) => {
            warn!("Graceful shutdown: all tasks completed");
        }
    }

    Ok(())
}
