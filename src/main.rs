use anyhow::Context as _;
use std::sync::Arc;
use warp::Filter;

use wk_ingest::config::Config;
use wk_ingest::db;
use wk_ingest::http;
use wk_ingest::pipeline::Pipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(config.use_ansi)
        .init();

    let db = db::mongo::MongoDb::new(&config.mongodb_uri, &config.mongodb_database)
        .await
        .context("failed to get mongodb instance")?;

    let pipeline = Arc::new(Pipeline::new(db.clone(), db, config.heartbeats));

    let route = http::routes(pipeline).with(warp::filters::trace::request());

    tracing::info!(addr = %config.listen_addr, "listening");
    warp::serve(route).bind(config.listen_addr).await;

    Ok(())
}
