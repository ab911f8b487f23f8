use pathway_core::ValidatorConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    /// A lone `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Budget for one full validation before the API gives up with a 503.
    pub validation_budget_ms: u64,
    /// Upper bound on each id list in a selection request.
    pub max_selection_size: usize,
    /// Tuning passed through to the validation engine.
    pub validator: ValidatorConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `HOST`                         | `0.0.0.0`               |
    /// | `PORT`                         | `3000`                  |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `30`                    |
    /// | `VALIDATION_BUDGET_MS`         | `2000`                  |
    /// | `MAX_SELECTION_SIZE`           | `500`                   |
    /// | `PATHWAY_MAX_SUGGESTIONS`      | `20`                    |
    /// | `PATHWAY_MAX_SUBSTITUTIONS`    | `3`                     |
    /// | `PATHWAY_INCLUDE_ENHANCEMENTS` | `true`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let validation_budget_ms: u64 = std::env::var("VALIDATION_BUDGET_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .expect("VALIDATION_BUDGET_MS must be a valid u64");

        let max_selection_size: usize = std::env::var("MAX_SELECTION_SIZE")
            .unwrap_or_else(|_| "500".into())
            .parse()
            .expect("MAX_SELECTION_SIZE must be a valid usize");

        let validator = validator_config_from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            validation_budget_ms,
            max_selection_size,
            validator,
        }
    }
}

/// Engine tuning; unset variables keep the engine defaults.
fn validator_config_from_env() -> ValidatorConfig {
    let defaults = ValidatorConfig::default();

    let max_suggestions: usize = std::env::var("PATHWAY_MAX_SUGGESTIONS")
        .map(|v| {
            v.parse()
                .expect("PATHWAY_MAX_SUGGESTIONS must be a valid usize")
        })
        .unwrap_or(defaults.max_suggestions);

    let max_substitutions: usize = std::env::var("PATHWAY_MAX_SUBSTITUTIONS")
        .map(|v| {
            v.parse()
                .expect("PATHWAY_MAX_SUBSTITUTIONS must be a valid usize")
        })
        .unwrap_or(defaults.max_substitutions);

    let include_enhancements: bool = std::env::var("PATHWAY_INCLUDE_ENHANCEMENTS")
        .map(|v| {
            v.parse()
                .expect("PATHWAY_INCLUDE_ENHANCEMENTS must be true or false")
        })
        .unwrap_or(defaults.include_enhancements);

    ValidatorConfig {
        max_suggestions,
        max_substitutions,
        include_enhancements,
    }
}
