use std::sync::Arc;

use anyhow::Context;

use karigar::app::{App, build_app};
use karigar::config::{AppConfig, ProviderKind};
use karigar::session::{InMemoryProvider, SupabaseClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  export KARIGAR_SUPABASE_URL=https://<project>.supabase.co");
            eprintln!("  export KARIGAR_SUPABASE_ANON_KEY=<anon key>");
            eprintln!("  or KARIGAR_PROVIDER=memory to run without a project");
            std::process::exit(1);
        }
    };

    eprintln!("🛠  Karigar Online v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Site: {}", config.site_url);
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);

    let App {
        router,
        subscription,
    } = match (config.provider, &config.supabase) {
        (ProviderKind::Supabase, Some(supabase)) => {
            eprintln!("   Provider: supabase ({})", supabase.url);
            build_app(Arc::new(SupabaseClient::new(supabase)), &config.site_url).await?
        }
        _ => {
            eprintln!("   Provider: in-memory (accounts are lost on exit)");
            build_app(Arc::new(InMemoryProvider::new()), &config.site_url).await?
        }
    };

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "API server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    subscription.unsubscribe();
    Ok(())
}
