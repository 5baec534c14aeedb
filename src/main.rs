// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use voting_enrollment_server::{
    account::AccountService,
    api::router,
    auth::SessionTokens,
    blockchain::{EvmLedger, Ledger},
    config::{AppConfig, LogFormat, LOG_FORMAT_ENV},
    custody::KeyCustody,
    enrollment::{
        EnrollmentDeps, EnrollmentService, InMemoryPendingStore, OtpManager, PendingStore,
        RedbPendingStore, Sweeper,
    },
    notify::{LogNotifier, Notifier, WebhookNotifier},
    state::AppState,
    wallet::{BalanceMaintainer, WalletProvisioner},
};

type StartupError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    let log_format = match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    };
    init_tracing(log_format);

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let (json, pretty) = match format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Pretty => (
            None,
            Some(tracing_subscriber::fmt::layer().with_target(true)),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;

    let ledger: Arc<dyn Ledger> = Arc::new(EvmLedger::connect(
        &config.ledger.rpc_url,
        &config.ledger.contract_address,
        &config.ledger.funder_private_key,
    )?);
    tracing::info!(funder = %ledger.funder_address(), "Ledger client configured");

    let custody = Arc::new(KeyCustody::from_hex(&config.custody_key_hex)?);
    let tokens = Arc::new(SessionTokens::new(
        config.session_secret.as_bytes(),
        config.session_ttl,
    )?);

    let pending: Arc<dyn PendingStore> = match &config.pending_db_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using durable pending store");
            Arc::new(RedbPendingStore::open(path, config.pending_ttl)?)
        }
        None => {
            tracing::info!(
                capacity = config.pending_capacity,
                "Using in-memory pending store"
            );
            Arc::new(InMemoryPendingStore::new(
                config.pending_capacity,
                config.pending_ttl,
            ))
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone(), config.webhook_token.clone())?),
        None => {
            tracing::warn!("NOTIFY_WEBHOOK_URL not set; enrollment codes will not be delivered");
            Arc::new(LogNotifier)
        }
    };

    let codes = Arc::new(OtpManager::new(config.otp.clone()));

    let enrollment = EnrollmentService::new(EnrollmentDeps {
        ledger: ledger.clone(),
        provisioner: WalletProvisioner::new(ledger.clone(), config.funding.initial),
        custody: custody.clone(),
        pending: pending.clone(),
        codes: codes.clone(),
        notifier,
        tokens: tokens.clone(),
        policy: config.policy.clone(),
    });
    let accounts = AccountService::new(
        ledger.clone(),
        custody,
        BalanceMaintainer::new(ledger.clone(), config.funding.min_balance, config.funding.top_up),
        tokens.clone(),
    );

    let shutdown = CancellationToken::new();
    let sweeper = Sweeper::new(codes, pending)
        .with_interval(config.sweep_interval)
        .spawn(shutdown.clone());

    let app = router(AppState::new(enrollment, accounts, tokens, ledger));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        "Voting enrollment server listening (docs at /docs)"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown.cancel();
    sweeper.stop().await;
    tracing::info!("Server stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
