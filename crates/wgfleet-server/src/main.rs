// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! wgfleet control plane binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use wgfleet_common_config::SecretString;
use wgfleet_server::{create_app_state, create_router, telemetry, version, ServerConfig};
use wgfleet_server_remote::{EventKind, RemoteEvent};
use wgfleet_server_tunnel::{BootstrapRequest, NodeAccess, TunnelServices};

/// wgfleet server - WireGuard peer provisioning control plane.
#[derive(Parser, Debug)]
#[command(name = "wgfleet-server", about = "WireGuard peer provisioning control plane", version)]
struct Args {
	/// Configuration file; defaults to /etc/wgfleet/server.toml when present.
	#[arg(long, global = true, env = "WGFLEET_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the HTTP server (default)
	Serve,

	/// Set up a fresh edge node and register it as a region
	Bootstrap {
		/// Address of the node
		#[arg(long)]
		host: String,

		/// SSH user, overriding ssh.user
		#[arg(long)]
		user: Option<String>,

		/// First three octets of the region's /24, e.g. 10.66.12
		#[arg(long)]
		base_ip: String,

		#[arg(long)]
		region_id: String,

		/// Display name; defaults to the region id
		#[arg(long)]
		name: Option<String>,

		/// SSH password when no key is configured
		#[arg(long, env = "WGFLEET_BOOTSTRAP_PASSWORD", hide_env_values = true)]
		password: Option<String>,
	},

	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => wgfleet_server_config::load_config_with_file(path.clone()),
		None => wgfleet_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	telemetry::init_tracing(&config.logging);

	let pool = wgfleet_server_db::create_pool(&config.database.url)
		.await
		.context("failed to open database")?;
	wgfleet_server_db::run_migrations(&pool)
		.await
		.context("failed to run migrations")?;

	if !config.ssh.has_credentials() {
		tracing::warn!("no SSH key or password configured; node operations will fail");
	}
	let node = NodeAccess::from_config(&config.ssh);

	match args.command {
		Some(Command::Bootstrap {
			host,
			user,
			base_ip,
			region_id,
			name,
			password,
		}) => {
			let services = TunnelServices::new(pool, &config, node);
			let request = BootstrapRequest {
				host,
				username: user,
				base_ip,
				region_id,
				region_name: name,
				password: password.map(SecretString::new),
			};
			bootstrap(&services, request).await
		}
		_ => serve(pool, &config, node).await,
	}
}

async fn serve(pool: sqlx::SqlitePool, config: &ServerConfig, node: NodeAccess) -> anyhow::Result<()> {
	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting wgfleet-server"
	);

	let state = create_app_state(pool, config, node);
	let app = create_router(state).layer(TraceLayer::new_for_http());

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	tracing::info!("listening on {}", addr);

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}

async fn bootstrap(services: &TunnelServices, request: BootstrapRequest) -> anyhow::Result<()> {
	let (tx, mut rx) = mpsc::channel::<RemoteEvent>(256);
	let printer = tokio::spawn(async move {
		while let Some(event) = rx.recv().await {
			print_event(&event);
		}
	});

	let result = services.bootstrap.bootstrap(request, tx).await;
	// The sender is gone once bootstrap returns, so the printer drains and exits.
	let _ = printer.await;
	let outcome = result.context("bootstrap failed")?;

	if let Some(region) = &outcome.region {
		println!("Region {} is live at {}", region.id, region.endpoint);
	}
	if let Some(warning) = &outcome.warning {
		eprintln!("warning: {warning}");
	}
	if outcome.manual_follow_up() {
		println!("Node is set up; register the region manually with its server key and endpoint.");
	}
	Ok(())
}

fn print_event(event: &RemoteEvent) {
	match event.kind {
		EventKind::Info => println!("==> {}", event.text),
		EventKind::Log => println!("{}", event.text),
		EventKind::Error => eprintln!("{}", event.text),
		EventKind::Success => println!("ok: {}", event.text),
	}
}
