use std::env;

const DEFAULT_DATABASE: &str = "earnwale";
const DEFAULT_BUCKET: &str = "earnwale-uploads";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// AppConfig
///
/// Holds the application's entire configuration. Immutable once loaded and
/// pulled into handlers and extractors via `FromRef`.
#[derive(Clone)]
pub struct AppConfig {
    // MongoDB connection string.
    pub mongodb_uri: String,
    // Database holding the `games` and `clicks` collections.
    pub mongodb_database: String,
    // Static secret expected in `Authorization: Bearer ...` on admin routes.
    pub admin_token: String,
    // S3-compatible storage endpoint URL (MinIO in local, Supabase in prod).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    // Bucket holding uploaded images.
    pub s3_bucket: String,
    // Prefix of the public URLs handed back after an upload.
    pub public_base_url: String,
    pub bind_addr: String,
    pub env: Env,
}

/// Env
///
/// Runtime context: local development (MinIO, defaults) or production
/// (Supabase, every secret mandatory).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_database: "earnwale_test".to_string(),
            admin_token: "test-admin-token".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "earnwale-test".to_string(),
            public_base_url: "http://localhost:9000/earnwale-test".to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics if a variable required for the current environment is missing, so
    /// the service never starts half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let mongodb_uri = env::var("MONGODB_URI").expect("FATAL: MONGODB_URI must be set");
        let mongodb_database =
            env::var("MONGODB_DB").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        match env {
            Env::Local => {
                let s3_endpoint = "http://localhost:9000".to_string();
                let s3_bucket =
                    env::var("S3_BUCKET_NAME").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());
                Self {
                    env: Env::Local,
                    mongodb_uri,
                    mongodb_database,
                    // Unset means empty, and an empty secret matches no token.
                    admin_token: env::var("ADMIN_TOKEN").unwrap_or_default(),
                    // MinIO is served path-style, so the public URL is endpoint/bucket.
                    public_base_url: format!("{}/{}", s3_endpoint, s3_bucket),
                    s3_endpoint,
                    s3_region: "us-east-1".to_string(),
                    s3_key: "admin".to_string(),
                    s3_secret: "password".to_string(),
                    s3_bucket,
                    bind_addr,
                }
            }
            Env::Production => {
                let project_url =
                    env::var("SUPABASE_URL").expect("FATAL: SUPABASE_URL required in prod");
                let project_url = project_url.trim_end_matches('/');
                let s3_bucket =
                    env::var("S3_BUCKET_NAME").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());

                Self {
                    env: Env::Production,
                    mongodb_uri,
                    mongodb_database,
                    admin_token: env::var("ADMIN_TOKEN")
                        .expect("FATAL: ADMIN_TOKEN required in prod"),
                    s3_endpoint: format!("{}/storage/v1/s3", project_url),
                    public_base_url: format!(
                        "{}/storage/v1/object/public/{}",
                        project_url, s3_bucket
                    ),
                    // Region is a stub behind the Supabase gateway.
                    s3_region: "stub".to_string(),
                    s3_key: env::var("S3_ACCESS_KEY")
                        .expect("FATAL: S3_ACCESS_KEY required in prod"),
                    s3_secret: env::var("S3_SECRET_KEY")
                        .expect("FATAL: S3_SECRET_KEY required in prod"),
                    s3_bucket,
                    bind_addr,
                }
            }
        }
    }
}
