//! Environment-driven configuration, following the same
//! serde-default-per-field pattern used throughout this codebase.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_redis_addr")]
    pub addr: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub db: i64,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,

    #[serde(default = "default_redis_job_ttl_hours")]
    pub job_ttl_hours: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_redis_addr(),
            password: None,
            db: 0,
            pool_size: default_redis_pool_size(),
            job_ttl_hours: default_redis_job_ttl_hours(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            environment: default_environment(),
            redis: RedisConfig::default(),
            max_workers: default_max_workers(),
            queue_size: default_queue_size(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_redis_addr() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_pool_size() -> u32 {
    10
}

fn default_redis_job_ttl_hours() -> u64 {
    24
}

fn default_max_workers() -> usize {
    5
}

fn default_queue_size() -> usize {
    100
}

impl Config {
    /// Load configuration from the process environment, the single
    /// contract this service exposes to the surrounding CLI/deploy
    /// tooling (see the env var table in the external-interfaces docs).
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = match std::env::var("ENVIRONMENT").as_deref() {
            Ok("production") => Self::production(),
            _ => Self::development(),
        };

        if let Ok(port) = std::env::var("PORT") {
            cfg.port = port
                .parse()
                .map_err(|_| crate::Error::config("invalid PORT"))?;
        }
        if let Ok(env) = std::env::var("ENVIRONMENT") {
            cfg.environment = env;
        }
        if let Ok(v) = std::env::var("REDIS_ENABLED") {
            cfg.redis.enabled = v == "true" || v == "1";
        }
        if let Ok(addr) = std::env::var("REDIS_ADDR") {
            cfg.redis.addr = addr;
        }
        if let Ok(pw) = std::env::var("REDIS_PASSWORD") {
            cfg.redis.password = Some(pw);
        }
        if let Ok(db) = std::env::var("REDIS_DB") {
            cfg.redis.db = db
                .parse()
                .map_err(|_| crate::Error::config("invalid REDIS_DB"))?;
        }
        if let Ok(pool) = std::env::var("REDIS_POOL_SIZE") {
            cfg.redis.pool_size = pool
                .parse()
                .map_err(|_| crate::Error::config("invalid REDIS_POOL_SIZE"))?;
        }
        if let Ok(ttl) = std::env::var("REDIS_JOB_TTL_HOURS") {
            cfg.redis.job_ttl_hours = ttl
                .parse()
                .map_err(|_| crate::Error::config("invalid REDIS_JOB_TTL_HOURS"))?;
        }
        if let Ok(w) = std::env::var("MAX_WORKERS") {
            cfg.max_workers = w
                .parse()
                .map_err(|_| crate::Error::config("invalid MAX_WORKERS"))?;
        }
        if let Ok(q) = std::env::var("QUEUE_SIZE") {
            cfg.queue_size = q
                .parse()
                .map_err(|_| crate::Error::config("invalid QUEUE_SIZE"))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn development() -> Self {
        Self::default()
    }

    pub fn production() -> Self {
        Self {
            environment: "production".to_string(),
            redis: RedisConfig {
                enabled: true,
                ..RedisConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.port == 0 {
            return Err(crate::Error::config("port must be nonzero"));
        }
        if self.max_workers == 0 {
            return Err(crate::Error::config("max_workers must be > 0"));
        }
        if self.queue_size == 0 {
            return Err(crate::Error::config("queue_size must be > 0"));
        }
        Ok(())
    }

    /// True when the runtime environment looks like a Kubernetes cluster,
    /// selecting the `ClusterJob` sandbox backend at startup.
    pub fn cluster_detected() -> bool {
        std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.max_workers, 5);
        assert_eq!(cfg.queue_size, 100);
        assert!(!cfg.redis.enabled);
    }

    #[test]
    fn test_production_enables_redis() {
        let cfg = Config::production();
        assert!(cfg.redis.enabled);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut cfg = Config::default();
        cfg.max_workers = 0;
        assert!(cfg.validate().is_err());
    }
}
