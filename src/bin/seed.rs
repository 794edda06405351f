// src/bin/seed.rs
//
// Usage: seed [all|users|products|orders]

use dotenvy::dotenv;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;

use storefront_api::config::SeedConfig;
use storefront_api::seed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    All,
    Users,
    Products,
    Orders,
}

fn parse_target(arg: Option<&str>) -> Result<Target, String> {
    match arg.unwrap_or("all") {
        "all" => Ok(Target::All),
        "users" => Ok(Target::Users),
        "products" => Ok(Target::Products),
        "orders" => Ok(Target::Orders),
        other => Err(format!(
            "unknown seed target '{other}', expected all, users, products or orders"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let arg = std::env::args().nth(1);
    let target = parse_target(arg.as_deref())?;
    let config = SeedConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    let mut rng = StdRng::from_entropy();

    if matches!(target, Target::All | Target::Users) {
        seed::seed_users(&pool, &mut rng, &config.password, config.users).await?;
        log::info!("fixed accounts: admin@example.com and user@example.com share SEED_PASSWORD");
    }
    if matches!(target, Target::All | Target::Products) {
        seed::seed_products(&pool, &mut rng).await?;
    }
    if matches!(target, Target::All | Target::Orders) {
        seed::seed_orders(&pool, &mut rng, &config.pricing, config.orders).await?;
    }

    Ok(())
}
