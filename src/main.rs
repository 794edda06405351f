// src/main.rs
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use storefront_api::config::AppConfig;
use storefront_api::{api, docs, s3_utils, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Storefront API is running"
    }))
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{context}: {err}");
    std::io::Error::new(std::io::ErrorKind::Other, format!("{context}: {err}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().map_err(|e| startup_error("invalid configuration", e))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|e| startup_error("failed to connect to DB", e))?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| startup_error("failed to run migrations", e))?;

    let s3_client = s3_utils::build_client(&config).await;
    if config.mock_s3 {
        log::warn!("MOCK_S3 is set, product images are not uploaded");
    }

    let state = web::Data::new(AppState::new(&config, pool, s3_client));
    let bind = (config.host.clone(), config.port);
    log::info!("listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(api::auth::SessionMiddleware)
            .wrap(Logger::default())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await
}
