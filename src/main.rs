use std::net::SocketAddr;
use std::sync::Arc;
use vendorpay::disbursement::HttpDisbursementGateway;
use vendorpay::jobs::spawn_scheduler;
use vendorpay::ledger::{CommissionService, PayoutService, WalletService};
use vendorpay::{api, config::Config, db::init_db, DisbursementRail, Repository};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let rail: Arc<dyn DisbursementRail> =
        Arc::new(HttpDisbursementGateway::new(config.gateway_url.clone()));
    let commissions = Arc::new(CommissionService::new(
        repo.clone(),
        config.default_commission_pct,
    ));
    let wallets = Arc::new(WalletService::new(repo.clone(), config.holding_period()));
    let payouts = Arc::new(PayoutService::new(
        repo.clone(),
        wallets.clone(),
        rail,
        config.fee_schedule(),
        config.min_payout_amount,
        config.rate_limit_window(),
        config.auto_withdraw_auto_approve,
    ));

    // Background reconciliation jobs
    let _job_handles = spawn_scheduler(repo.clone(), wallets.clone(), payouts.clone());

    // Create router
    let app = api::create_router(api::AppState::new(
        repo,
        config,
        commissions,
        wallets,
        payouts,
    ));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
