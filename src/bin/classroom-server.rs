use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use classroom::adapters::MemoryDatabaseAdapter;
use classroom::plugins::{
    AssignmentPlugin, ExportPlugin, GradePlugin, QuizPlugin, SessionPlugin, SubmissionPlugin,
    UploadPlugin,
};
use classroom::{
    AppConfig, AxumIntegration, ClassroomBuilder, EnvConfig, GovernorRateLimiter, RateLimitConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_env("CLASSROOM_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let env = match EnvConfig::from_env() {
        Ok(env) => env,
        Err(err) => {
            tracing::error!(error = %err, "invalid environment");
            return Err(err.into());
        }
    };

    let config = env.apply(AppConfig::new());
    let secure_cookies = config.base_url.starts_with("https://");
    let config = config.session_cookie_secure(secure_cookies);

    let app = Arc::new(
        ClassroomBuilder::new(config)
            .database(MemoryDatabaseAdapter::new())
            .rate_limiter(GovernorRateLimiter::new(RateLimitConfig::default()))
            .plugin(SessionPlugin::new())
            .plugin(AssignmentPlugin::new())
            .plugin(GradePlugin::new())
            .plugin(QuizPlugin::new())
            .plugin(SubmissionPlugin::new())
            .plugin(UploadPlugin::new())
            .plugin(ExportPlugin::new())
            .build()
            .await?,
    );

    tracing::info!(
        plugins = ?app.plugin_names(),
        database = %env.database_url.host_str().unwrap_or("unknown"),
        "classroom service configured"
    );

    let router = app.axum_router().layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(env.bind_addr).await?;
    tracing::info!(
        addr = %env.bind_addr,
        trusted_proxy_hops = env.trusted_proxy_hops,
        "listening"
    );
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
