use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use billing_service::clients::{HttpPaymentGateway, HttpVideoHost, PaymentGateway, VideoHost};
use billing_service::handlers;
use billing_service::jobs::{PromoGranter, PurchaseExpirer, ReservationReaper};
use billing_service::{db, Config};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct HealthState {
    db_pool: sqlx::Pool<sqlx::Postgres>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    status: ComponentStatus,
    checks: HashMap<String, ComponentCheck>,
    timestamp: String,
}

impl HealthState {
    async fn check_postgres(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.db_pool)
            .await
            .map(|_| ())
    }
}

async fn health_summary(state: web::Data<HealthState>) -> HttpResponse {
    match state.check_postgres().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "billing-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "billing-service"
        })),
    }
}

async fn readiness_summary(state: web::Data<HealthState>) -> HttpResponse {
    let mut checks = HashMap::new();
    let mut ready = true;

    let start = Instant::now();
    let pg_result = state.check_postgres().await;
    let pg_latency = Some(start.elapsed().as_millis() as u64);
    let postgres_check = match pg_result {
        Ok(_) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: "PostgreSQL connection successful".to_string(),
            latency_ms: pg_latency,
        },
        Err(e) => {
            ready = false;
            ComponentCheck {
                status: ComponentStatus::Unhealthy,
                message: format!("PostgreSQL connection failed: {}", e),
                latency_ms: pg_latency,
            }
        }
    };
    checks.insert("postgresql".to_string(), postgres_check);

    let status = if ready {
        ComponentStatus::Healthy
    } else {
        ComponentStatus::Unhealthy
    };

    let response = ReadinessResponse {
        ready,
        status,
        checks,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

/// Billing Service
///
/// Owns the creator storage-block quota subsystem: ledgers, admission
/// control, upload reservations, and asynchronous block purchases.
///
/// # Routes
///
/// - `/api/v1/creator-blocks/*` - Ledger summaries, calculation, admission,
///   the add-video reservation flow and purchases
/// - `/api/v1/payment/webhook` - Asynchronous payment confirmations
///
/// # Architecture
///
/// - HTTP handlers with request/response conversion
/// - PostgreSQL for ledgers, intents and purchases; every ledger mutation is
///   a row-locked transaction
/// - Payment gateway and video host consumed as HTTP collaborators
/// - Reconciliation jobs for stale reservations, abandoned purchases and
///   seasonal promotional credits
#[actix_web::main]
async fn main() -> io::Result<()> {
    // Support container healthchecks via CLI subcommand
    {
        let mut args = std::env::args();
        let _bin = args.next();
        if let Some(cmd) = args.next() {
            if cmd == "healthcheck" || cmd == "healthcheck-http" {
                let port = std::env::var("BILLING_SERVICE_PORT")
                    .unwrap_or_else(|_| "8086".to_string());
                let url = format!("http://127.0.0.1:{}/api/v1/health", port);
                match reqwest::Client::new().get(&url).send().await {
                    Ok(resp) if resp.status().is_success() => return Ok(()),
                    Ok(resp) => {
                        eprintln!("healthcheck HTTP status: {}", resp.status());
                        return Err(io::Error::new(io::ErrorKind::Other, "healthcheck failed"));
                    }
                    Err(e) => {
                        eprintln!("healthcheck HTTP error: {}", e);
                        return Err(io::Error::new(io::ErrorKind::Other, "healthcheck error"));
                    }
                }
            }
        }
    }

    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting billing-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    // Initialize database connection pool
    let db_pool = match db::create_pool(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {:#}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(&db_pool).await {
        tracing::error!("Database migration failed: {:#}", e);
        return Err(io::Error::new(io::ErrorKind::Other, e.to_string()));
    }

    tracing::info!("Connected to database, migrations applied");

    // Collaborator clients
    let payment_gateway: Arc<dyn PaymentGateway> =
        Arc::new(HttpPaymentGateway::new(&config.payment));
    let video_host: Arc<dyn VideoHost> = Arc::new(HttpVideoHost::new(&config.video_host));

    // Background jobs
    let reaper = ReservationReaper::new(db_pool.clone(), config.billing.clone(), &config.jobs);
    let expirer = PurchaseExpirer::new(db_pool.clone(), &config.jobs);
    let granter = PromoGranter::new(db_pool.clone(), config.billing.clone(), &config.jobs);

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let config_data = web::Data::new(config.clone());
    let pool_data = web::Data::new(db_pool.clone());
    let gateway_data = web::Data::new(payment_gateway.clone());
    let video_host_data = web::Data::new(video_host.clone());
    let health_state = web::Data::new(HealthState {
        db_pool: db_pool.clone(),
    });

    let allowed_origins = config.cors.allowed_origins.clone();

    // Create HTTP server
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in allowed_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(pool_data.clone())
            .app_data(config_data.clone())
            .app_data(gateway_data.clone())
            .app_data(video_host_data.clone())
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route(
                "/metrics",
                web::get().to(billing_service::metrics::serve_metrics),
            )
            // Health check endpoints
            .route("/api/v1/health", web::get().to(health_summary))
            .route("/api/v1/health/ready", web::get().to(readiness_summary))
            .route("/api/v1/health/live", web::get().to(liveness_check))
            .service(
                web::scope("/api/v1")
                    .service(
                        web::scope("/creator-blocks")
                            // literal segments before {creator_id}
                            .route("/calculate", web::post().to(handlers::calculate))
                            .route("/estimate", web::post().to(handlers::estimate))
                            .service(
                                web::resource("/{creator_id}")
                                    .route(web::get().to(handlers::get_creator_blocks)),
                            )
                            .route(
                                "/{creator_id}/approve",
                                web::post().to(handlers::approve_creator),
                            )
                            .route(
                                "/{creator_id}/check-upload",
                                web::post().to(handlers::check_upload),
                            )
                            .route(
                                "/{creator_id}/add-video",
                                web::post().to(handlers::add_video),
                            )
                            .route(
                                "/{creator_id}/uploads/{intent_id}",
                                web::get().to(handlers::get_upload_intent),
                            )
                            .route(
                                "/{creator_id}/uploads/{intent_id}/finalize",
                                web::post().to(handlers::finalize_upload),
                            )
                            .route(
                                "/{creator_id}/uploads/{intent_id}/abort",
                                web::post().to(handlers::abort_upload),
                            )
                            .route(
                                "/{creator_id}/purchase",
                                web::post().to(handlers::create_purchase),
                            )
                            .route(
                                "/{creator_id}/purchases/{purchase_id}",
                                web::get().to(handlers::get_purchase),
                            ),
                    )
                    .route(
                        "/payment/webhook",
                        web::post().to(handlers::payment_webhook),
                    ),
            )
    })
    .bind(&bind_address)?
    .workers(4)
    .run();

    let server_handle = server.handle();

    // Spawn HTTP server and background jobs concurrently
    let mut tasks: JoinSet<io::Result<()>> = JoinSet::new();

    tasks.spawn(async move {
        tracing::info!("HTTP server is running");
        server.await
    });

    tasks.spawn(async move {
        reaper.run().await;
        Ok(())
    });

    tasks.spawn(async move {
        expirer.run().await;
        Ok(())
    });

    tasks.spawn(async move {
        granter.run().await;
        Ok(())
    });

    let mut first_error: Option<io::Error> = None;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = tasks.join_next() => {
                match result {
                    Some(Ok(Ok(_))) => {
                        tracing::info!("Background task completed");
                    }
                    Some(Ok(Err(e))) => {
                        tracing::error!("Task returned error: {}", e);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("Task join error: {}", e);
                        if first_error.is_none() {
                            first_error = Some(io::Error::new(io::ErrorKind::Other, e.to_string()));
                        }
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                server_handle.stop(true).await;
                tasks.shutdown().await;
                break;
            }
        }
    }

    tracing::info!("Billing-service shutting down");

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
