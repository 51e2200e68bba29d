use officesync::{create_app, db, docs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let port = listen_port();

    let pool = db::init().await?;
    let app = create_app(pool).await?;

    let openapi = docs::build_openapi(port)?;
    let app = app.merge(docs::swagger_routes(openapi));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "officesync listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// `APP_PORT`, or 8000 when unset or unparsable.
fn listen_port() -> u16 {
    match std::env::var("APP_PORT").map(|raw| raw.trim().parse::<u16>()) {
        Ok(Ok(port)) => port,
        Ok(Err(_)) => {
            eprintln!("APP_PORT is not a valid port, falling back to 8000");
            8000
        }
        Err(_) => 8000,
    }
}

/// `.env` from the working directory, else the one next to `Cargo.toml`.
fn load_env() {
    let loaded = dotenvy::dotenv()
        .map(|_| ())
        .or_else(|_| dotenvy::from_path(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env")));
    if loaded.is_err() {
        eprintln!("no .env file found, using the process environment");
    }
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("officesync=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
