use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub webhook_secret: String,
    pub tariff_csv: PathBuf,
    pub rules_yaml: PathBuf,
    pub screenshot_dir: PathBuf,
    pub issuance_url: Option<String>,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let webhook_secret = std::env::var("TRAVEL_WEBHOOK_SECRET")
        .unwrap_or_else(|_| "CHANGE_ME_WEBHOOK_SECRET".into());

    if webhook_secret == "CHANGE_ME_WEBHOOK_SECRET" {
        let env_mode = std::env::var("TRAVEL_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "TRAVEL_WEBHOOK_SECRET is still the insecure placeholder. \
                 Set a real shared secret before running in production."
            );
        }
        eprintln!(
            "⚠️  TRAVEL_WEBHOOK_SECRET is not set — using insecure placeholder. Set a real secret for production."
        );
    }

    Ok(Config {
        port: std::env::var("TRAVEL_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/travel_core".into()),
        webhook_secret,
        tariff_csv: std::env::var("TRAVEL_TARIFF_CSV")
            .unwrap_or_else(|_| "data/tariffs.csv".into())
            .into(),
        rules_yaml: std::env::var("TRAVEL_RULES_YAML")
            .unwrap_or_else(|_| "data/rules.yml".into())
            .into(),
        screenshot_dir: std::env::var("TRAVEL_SCREENSHOT_DIR")
            .unwrap_or_else(|_| "/tmp/issuance_screenshots".into())
            .into(),
        issuance_url: std::env::var("TRAVEL_ISSUANCE_URL").ok(),
    })
}
