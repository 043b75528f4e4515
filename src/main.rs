use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use hrm_leave::config::{Config, StoreBackend};
use hrm_leave::db::init_db;
use hrm_leave::docs::ApiDoc;
use hrm_leave::routes;
use hrm_leave::state::AppState;
use hrm_leave::store::{LeaveStore, MemoryLeaveStore, MySqlLeaveStore};
use hrm_leave::workflow::{HttpTicketingClient, HttpTokenProvider, TicketingApi, TokenProvider};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let store: Arc<dyn LeaveStore> = match config.store_backend {
        StoreBackend::MySql => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            Arc::new(MySqlLeaveStore::new(init_db(url).await?))
        }
        StoreBackend::Memory => {
            warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryLeaveStore::new())
        }
    };

    let ticketing = match &config.ticketing {
        Some(ticketing) => {
            let api: Arc<dyn TicketingApi> = Arc::new(HttpTicketingClient::new(ticketing)?);
            let tokens: Arc<dyn TokenProvider> = Arc::new(HttpTokenProvider::new(ticketing)?);
            Some((api, tokens))
        }
        None => {
            info!("ticketing not configured; approvals are manual only");
            None
        }
    };

    let state = AppState::new(store, &config, ticketing);

    // Pick up requests left pending by a previous run
    if let Some(poller) = &state.poller {
        poller.ensure_running();
    }

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();
    let app_state = state.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(app_state.clone()))
            .configure(|cfg| routes::configure(cfg, &config_data))
    })
    .bind(server_addr)?
    .run()
    .await?;

    if let Some(poller) = &state.poller {
        poller.shutdown();
    }
    info!("Server stopped");
    Ok(())
}
