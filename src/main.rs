//! remotedocker - main entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use remotedocker::{
    auth::CredentialCodec,
    config::{AuthConfig, Config},
    gateway::{GatewayApi, GatewayState},
    runtime::{ComposeRunner, DockerRuntime},
};

#[derive(Parser, Debug)]
#[command(name = "remotedocker")]
#[command(about = "Authenticated HTTP gateway for a remote Docker daemon")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway (the default when no command is given)
    Serve {
        /// Listen address (overrides REMOTEDOCKER_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides REMOTEDOCKER_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Issue a bearer token signed with REMOTEDOCKER_SECRET_KEY
    Token {
        /// Subject to embed in the token
        #[arg(short, long, default_value = "api_user")]
        username: String,

        /// Lifetime in minutes (defaults to REMOTEDOCKER_TOKEN_TTL_MINUTES)
        #[arg(short, long)]
        expires: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("remotedocker=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    match args.command {
        Some(Command::Token { username, expires }) => issue_token(&username, expires),
        Some(Command::Serve { host, port }) => serve(host, port).await,
        None => serve(None, None).await,
    }
}

fn issue_token(username: &str, expires_minutes: Option<u64>) -> anyhow::Result<()> {
    let auth = AuthConfig::from_env()?;
    let codec = CredentialCodec::from_config(&auth);

    let ttl = expires_minutes.map(|m| Duration::from_secs(m * 60));
    let issued = codec.issue(username, ttl)?;

    println!("\n=== Bearer Token ===");
    println!("{}", issued.token);
    println!(
        "\nSubject: {}\nExpires: {}",
        issued.subject,
        issued.expires_at.to_rfc3339()
    );
    println!("\n=== Usage Example ===");
    println!("curl -X GET http://localhost:5000/version \\");
    println!("  -H \"Authorization: Bearer {}\"", issued.token);
    println!("\n=== Build Example ===");
    println!("curl -X POST http://localhost:5000/build \\");
    println!("  -H \"Authorization: Bearer {}\" \\", issued.token);
    println!("  -F context=@context.tar -F tag=myimage:latest");

    Ok(())
}

async fn serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    tracing::info!("Starting remotedocker...");

    let mut config = Config::from_env()?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    tracing::info!(
        token_ttl_minutes = config.auth.token_ttl.as_secs() / 60,
        docker_bin = %config.docker.binary,
        "Loaded configuration"
    );

    let runtime = DockerRuntime::connect()
        .await
        .context("failed to connect to the Docker daemon")?;
    tracing::info!("Connected to Docker daemon");

    let codec = Arc::new(CredentialCodec::from_config(&config.auth));
    let state = GatewayState::new(
        codec,
        Arc::new(runtime),
        ComposeRunner::new(config.docker.binary.clone()),
    )
    .with_max_upload_bytes(config.gateway.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.gateway.host, config.gateway.port
            )
        })?;

    let (_, server) = GatewayApi::start(state, addr, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await?;

    server.await??;
    tracing::info!("Gateway stopped");
    Ok(())
}
