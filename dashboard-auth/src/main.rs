use anyhow::Context;
use clap::Parser;
use dashboard_auth::config::get_configuration;
use dashboard_auth::startup::{build_pipeline, login_persistence};
use dashboard_auth::{BroadcastNavigator, LoginRequest, NavigationEvent, RequestDescriptor};
use dashboard_core::observability::init_tracing;
use dotenvy::dotenv;
use secrecy::Secret;
use std::sync::Arc;
use tracing::info;

/// Fetch dashboard API resources through the authenticated pipeline.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API paths to GET, relative to the configured base URL
    #[arg(required = true)]
    paths: Vec<String>,

    /// Log in with this user when no session is stored
    #[arg(short, long, env = "DASHBOARD_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "DASHBOARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Keep the session across restarts
    #[arg(long)]
    remember: bool,

    /// Log out once all paths have been fetched
    #[arg(long)]
    logout: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "dashboard-auth",
        &configuration.logging.level,
        configuration.logging.otlp_endpoint.as_deref(),
    )?;

    let navigator = Arc::new(BroadcastNavigator::default());
    let mut navigation = navigator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = navigation.recv().await {
            if event == NavigationEvent::Login {
                tracing::warn!("Session ended; log in again to continue");
            }
        }
    });

    let pipeline = build_pipeline(&configuration, navigator).context("Failed to build pipeline")?;

    if !pipeline.credentials().has_session() {
        let (Some(username), Some(password)) = (args.username, args.password) else {
            anyhow::bail!("No stored session; pass --username and --password to log in");
        };
        let record = pipeline
            .login(
                LoginRequest {
                    username,
                    password: Secret::new(password),
                },
                login_persistence(&configuration, args.remember),
            )
            .await
            .context("Login failed")?;
        info!(user_id = %record.user_id(), "Logged in");
    }

    for path in &args.paths {
        match pipeline.send(RequestDescriptor::get(path.as_str())).await {
            Ok(response) => println!(
                "{} {} ({} bytes)",
                response.status,
                path,
                response.body.len()
            ),
            Err(e) => {
                tracing::error!(path = %path, "Request failed: {}", e);
                eprintln!("{} failed: {}", path, e);
                if e.is_escalation() {
                    break;
                }
            }
        }
    }

    if args.logout {
        pipeline.logout().await.context("Logout failed")?;
        info!("Logged out");
    }

    Ok(())
}
