use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use crewlog_api::{AuthToken, Uuid};

mod db;
mod error;
mod extractors;
mod feeds;
mod handlers;

#[cfg(test)]
mod fuzz;

use error::Error;
use extractors::{AppState, Backend};
use feeds::PostFeeds;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(structopt::StructOpt)]
struct Opt {
    /// PostgreSQL connection string
    #[structopt(long, env = "DATABASE_URL")]
    database_url: String,

    #[structopt(long = "listen", env = "LISTEN_ADDR", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Bearer token allowing to create users and posts; admin endpoints are disabled if unset
    #[structopt(long, env = "ADMIN_TOKEN")]
    admin_token: Option<Uuid>,

    #[structopt(long, default_value = "16")]
    max_connections: u32,
}

pub fn app(backend: Arc<dyn Backend>, feeds: PostFeeds, admin_token: Option<AuthToken>) -> Router {
    let state = AppState {
        backend,
        feeds,
        admin_token,
    };
    Router::new()
        .route("/api/admin/create-user", post(handlers::admin_create_user))
        .route("/api/admin/create-post", post(handlers::admin_create_post))
        .route("/api/whoami", get(handlers::whoami))
        .route(
            "/api/feedback/:post_id/comments",
            get(handlers::list_comments)
                .post(handlers::add_comment)
                .patch(handlers::edit_comment)
                .delete(handlers::delete_comment),
        )
        .route(
            "/ws/feedback/:post_id/comments",
            get(handlers::comment_feed),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(opt.max_connections)
        .connect(&opt.database_url)
        .await
        .with_context(|| format!("Error opening database {:?}", opt.database_url))?;
    MIGRATOR
        .run(&db)
        .await
        .context("running pending migrations")?;

    if opt.admin_token.is_none() {
        tracing::warn!("no ADMIN_TOKEN set, users and posts cannot be created");
    }
    let app = app(
        Arc::new(db::PgBackend::new(db)),
        PostFeeds::new(),
        opt.admin_token.map(AuthToken),
    );

    tracing::info!("listening on {}", opt.listen);
    axum::Server::bind(&opt.listen)
        .serve(app.into_make_service())
        .await
        .context("serving axum webserver")
}
