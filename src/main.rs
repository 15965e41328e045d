use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use reward_engine::{
    chain::{EvmTokenGateway, TokenGateway},
    config::Config,
    database::PgUserTable,
    handlers,
    services::AppState,
    store::LedgerStore,
};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Starting Reward Engine on port {}", config.server.port);

    let table = PgUserTable::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to database");
    table
        .run_migrations()
        .await
        .expect("Failed to run database migrations");
    let store = Arc::new(LedgerStore::new(Arc::new(table)));

    let gateway: Arc<dyn TokenGateway> = Arc::new(
        EvmTokenGateway::connect(&config.chain.rpc_url, &config.chain.admin_private_key)
            .await
            .expect("Failed to connect to chain RPC"),
    );
    info!("Admin signing address: {}", gateway.admin_address());

    let state = web::Data::new(AppState::new(store, gateway));

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(state.clone())
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
