use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use travel_core::{
    api, cli, config,
    pricing::{self, TravellerInput},
    store::CaseStore,
    tariff::{Rules, Tariff},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "travel-core"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .expect("failed to install OpenTelemetry tracer");
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "travel_core=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Tariff { command }) => handle_tariff_command(&cfg, command).await,
        Some(cli::Commands::Case { command }) => handle_case_command(&cfg, command).await,
        None => run_server(cfg, 8080).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = CaseStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    tracing::info!("Loading tariff table from {:?}", cfg.tariff_csv);
    let tariff = Arc::new(Tariff::load(&cfg.tariff_csv)?);
    tracing::info!("Loading rules from {:?}", cfg.rules_yaml);
    let rules = Arc::new(Rules::load(&cfg.rules_yaml)?);

    let state = Arc::new(AppState {
        db,
        config: cfg,
        tariff,
        rules,
    });

    let app = axum::Router::new()
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .route("/readyz", axum::routing::get(readiness_check))
        .merge(api::api_router(state.clone()))
        .with_state(state)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::AllowOrigin;
            let dashboard_origin = std::env::var("DASHBOARD_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string());
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("x-webhook-secret"),
                    HeaderName::from_static("x-request-id"),
                ])
        })
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("travel-core listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_tariff_command(
    cfg: &config::Config,
    cmd: cli::TariffCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::TariffCommands::Validate { csv, yaml } => {
            let csv_path = csv.map(Into::into).unwrap_or_else(|| cfg.tariff_csv.clone());
            let yaml_path = yaml
                .map(Into::into)
                .unwrap_or_else(|| cfg.rules_yaml.clone());

            let tariff = Tariff::load(&csv_path)?;
            println!("Tariff OK: {} row(s) loaded from {:?}", tariff.len(), csv_path);

            let rules = Rules::load(&yaml_path)?;
            println!(
                "Rules OK: kb_version={} loaded from {:?}",
                rules.kb_version, yaml_path
            );
        }

        cli::TariffCommands::Reload { csv, yaml } => {
            let csv_path = csv.map(Into::into).unwrap_or_else(|| cfg.tariff_csv.clone());
            let yaml_path = yaml
                .map(Into::into)
                .unwrap_or_else(|| cfg.rules_yaml.clone());

            let tariff = Tariff::load(&csv_path)?;
            let rules = Rules::load(&yaml_path)?;
            println!(
                "Loaded candidate tariff ({} rows, {:?}) and rules (kb_version={}, {:?}).",
                tariff.len(),
                csv_path,
                rules.kb_version,
                yaml_path
            );
            println!("Re-pricing golden scenarios (spec.md §8) against the candidate file:\n");

            let mut mismatches = 0;
            for scenario in golden_scenarios() {
                let result = pricing::calculate_premium(
                    &tariff,
                    &rules,
                    scenario.scope,
                    scenario.plan,
                    scenario.days,
                    &scenario.travellers,
                    scenario.sports,
                );
                match result {
                    Ok(priced) => {
                        let total = format!("{:.2}", priced.total);
                        let status = if total == scenario.expected_total {
                            "ok"
                        } else {
                            mismatches += 1;
                            "MISMATCH"
                        };
                        println!(
                            "  [{status}] {} -> total={} (expected {})",
                            scenario.name, total, scenario.expected_total
                        );
                    }
                    Err(e) => {
                        mismatches += 1;
                        println!("  [MISMATCH] {} -> pricing error: {e}", scenario.name);
                    }
                }
            }

            if mismatches == 0 {
                println!("\nAll golden scenarios price identically under the candidate file.");
            } else {
                anyhow::bail!(
                    "{mismatches} golden scenario(s) priced differently under the candidate file"
                );
            }
        }
    }
    Ok(())
}

struct GoldenScenario {
    name: &'static str,
    scope: &'static str,
    plan: &'static str,
    days: i32,
    travellers: Vec<TravellerInput>,
    sports: bool,
    expected_total: &'static str,
}

/// The concrete end-to-end scenarios pinned in spec.md §8, used by
/// `tariff reload` to validate a candidate tariff/rules file offline
/// before it's rolled into a deployment.
fn golden_scenarios() -> Vec<GoldenScenario> {
    vec![
        GoldenScenario {
            name: "Silver/Worldwide/7d/1 traveller age 30/no sports",
            scope: "WORLDWIDE",
            plan: "Silver",
            days: 7,
            travellers: vec![TravellerInput { age_at_travel: 30 }],
            sports: false,
            expected_total: "30.00",
        },
        GoldenScenario {
            name: "Silver/Worldwide/7d/1 traveller age 80/no sports",
            scope: "WORLDWIDE",
            plan: "Silver",
            days: 7,
            travellers: vec![TravellerInput { age_at_travel: 80 }],
            sports: false,
            expected_total: "52.50",
        },
        GoldenScenario {
            name: "Silver/Worldwide/7d/1 traveller age 30/sports",
            scope: "WORLDWIDE",
            plan: "Silver",
            days: 7,
            travellers: vec![TravellerInput { age_at_travel: 30 }],
            sports: true,
            expected_total: "45.00",
        },
        GoldenScenario {
            name: "Silver/Worldwide/7d/15 travellers age 30/no sports",
            scope: "WORLDWIDE",
            plan: "Silver",
            days: 7,
            travellers: (0..15).map(|_| TravellerInput { age_at_travel: 30 }).collect(),
            sports: false,
            expected_total: "427.50",
        },
        GoldenScenario {
            name: "Silver/WW_EXCL_US_CA/7d/1 traveller age 30",
            scope: "WW_EXCL_US_CA",
            plan: "Silver",
            days: 7,
            travellers: vec![TravellerInput { age_at_travel: 30 }],
            sports: false,
            expected_total: "25.00",
        },
    ]
}

async fn handle_case_command(cfg: &config::Config, cmd: cli::CaseCommands) -> anyhow::Result<()> {
    match cmd {
        cli::CaseCommands::Show { case_id } => {
            let id = uuid::Uuid::parse_str(&case_id)?;
            let db = CaseStore::connect(&cfg.database_url).await?;
            match db.get_case(id).await? {
                Some(case) => {
                    println!("case_id:    {}", case.case_id);
                    println!("route:      {}", case.route);
                    println!("direction:  {:?}", case.direction);
                    println!("scope:      {:?}", case.scope);
                    println!("plan:       {:?}", case.plan);
                    println!("days:       {:?}", case.days);
                    println!("total:      {:?} {}", case.premium_total, case.currency);
                    println!("missing:    {}", case.missing_fields);

                    let travellers = db.list_travellers(id).await?;
                    for t in travellers {
                        println!(
                            "  traveller: {} ({}) age={:?} senior={}",
                            t.full_name, t.passport_number, t.age_at_travel, t.is_senior
                        );
                    }
                }
                None => println!("case not found: {}", case_id),
            }
        }
    }
    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response so clients
/// can correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn readiness_check() -> &'static str {
    "ok"
}

/// Middleware: injects standard hardening headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("Cache-Control", "no-store".parse().unwrap());
    headers.insert("Referrer-Policy", "no-referrer".parse().unwrap());
    headers.remove("Server");

    resp
}
