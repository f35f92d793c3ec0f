use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mafia::chat::{EventBus, EventBusGateway};
use mafia::config::Config;
use mafia::game::{handlers as game_handlers, MatchManager, RandomRoleAllocator};
use mafia::shared::AppState;
use mafia::stats::{handlers as stats_handlers, JsonFileStatsRepository, StatsService};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mafia=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mafia game server");

    let config = Config::from_env();

    // The event bus is the outbound boundary: a platform adapter subscribes
    // to it and relays chat to wherever the players actually are.
    let bus = EventBus::new();
    let gateway = Arc::new(EventBusGateway::new(bus));

    let stats = Arc::new(StatsService::new(Arc::new(JsonFileStatsRepository::new(
        config.stats_path.clone(),
    ))));
    let manager = Arc::new(MatchManager::new(
        gateway,
        stats.clone(),
        Arc::new(RandomRoleAllocator),
        config.engine.clone(),
    ));

    let app_state = AppState::new(manager, stats);

    let app = Router::new()
        .route("/channels/:channel_id/join", post(game_handlers::join_match))
        .route(
            "/channels/:channel_id/start",
            post(game_handlers::start_match),
        )
        .route("/channels/:channel_id/votes", post(game_handlers::cast_vote))
        .route(
            "/channels/:channel_id/night-actions",
            post(game_handlers::submit_night_action),
        )
        .route(
            "/channels/:channel_id/players/:player_id/role",
            get(game_handlers::player_role),
        )
        .route(
            "/channels/:channel_id/reset",
            post(game_handlers::reset_match),
        )
        .route("/stats", get(stats_handlers::all_stats))
        .route("/stats/recent", get(stats_handlers::recent_games))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap();
    info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app).await.unwrap();
}
