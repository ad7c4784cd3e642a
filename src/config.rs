use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stripe: StripeConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Overridable to point the client at a local stand-in of the API.
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    /// Custom S3-compatible endpoint (e.g. MinIO); AWS default when unset.
    pub endpoint: Option<String>,
    pub public_base_url: String,
}

pub fn load() -> Result<Config> {
    let bucket = env_or("S3_BUCKET", "storefront-videos");
    let public_base_url = std::env::var("S3_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| format!("https://{bucket}.s3.amazonaws.com"));

    Ok(Config {
        server: ServerConfig {
            port: env_or("PORT", "3000")
                .parse()
                .context("PORT must be a valid port number")?,
        },
        database: DatabaseConfig {
            url: required("DATABASE_URL")?,
        },
        stripe: StripeConfig {
            secret_key: required("STRIPE_SECRET_KEY")?,
            api_base: env_or("STRIPE_API_BASE", "https://api.stripe.com"),
        },
        storage: StorageConfig {
            bucket,
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            public_base_url,
        },
    })
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
