//! Environment-driven configuration (spec.md §6.4). Loaded once at startup;
//! nothing here is reloaded at runtime.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub redis_addr: Option<String>,
    /// 32-byte key for the at-rest content codec, base64-encoded in env.
    pub content_codec_key: [u8; 32],
    /// Key used to sign/verify bearer auth tokens.
    pub auth_token_key: Vec<u8>,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub max_frame_size: usize,
    pub handler_timeout: Duration,
    pub rate_limit_rps: u32,
    pub rate_limit_burst: u32,
    pub edit_window: chrono::Duration,
    pub edit_max: i32,
    pub unsend_window: chrono::Duration,
    pub presence_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let redis_addr = env::var("REDIS_ADDR").ok();

        let content_codec_key = decode_key32(
            &env::var("CONTENT_CODEC_KEY").expect("CONTENT_CODEC_KEY must be set (base64, 32 bytes)"),
        );
        let auth_token_key = base64_decode(
            &env::var("AUTH_TOKEN_KEY").expect("AUTH_TOKEN_KEY must be set (base64)"),
        );

        let pong_wait = Duration::from_secs(env_u64("PONG_WAIT_SECS", 60));
        let ping_period = Duration::from_secs(env_u64("PING_PERIOD_SECS", 25));
        let max_frame_size = env_u64("MAX_FRAME_SIZE", 64 * 1024) as usize;
        let handler_timeout = Duration::from_secs(env_u64("HANDLER_TIMEOUT_SECS", 30));
        let rate_limit_rps = env_u64("RATE_LIMIT_RPS", 20) as u32;
        let rate_limit_burst = env_u64("RATE_LIMIT_BURST", 40) as u32;
        let edit_window = chrono::Duration::minutes(env_u64("EDIT_WINDOW_MINUTES", 15) as i64);
        let edit_max = env_u64("EDIT_MAX", 10) as i32;
        let unsend_window = chrono::Duration::minutes(env_u64("UNSEND_WINDOW_MINUTES", 60) as i64);
        let presence_ttl = Duration::from_secs(env_u64("PRESENCE_TTL_SECS", 300));

        let config = Self {
            bind_addr,
            database_url,
            redis_addr,
            content_codec_key,
            auth_token_key,
            pong_wait,
            ping_period,
            max_frame_size,
            handler_timeout,
            rate_limit_rps,
            rate_limit_burst,
            edit_window,
            edit_max,
            unsend_window,
            presence_ttl,
        };
        config.validate();
        config
    }

    /// Cheap sanity checks on top of the per-field parsing above. A value
    /// that parses fine but is obviously unusable (a rate limit that admits
    /// nothing, a zero-length deadline) should fail at startup, not the
    /// first time a handler hits it.
    fn validate(&self) {
        assert!(self.rate_limit_rps > 0, "RATE_LIMIT_RPS must be greater than zero");
        assert!(self.rate_limit_burst > 0, "RATE_LIMIT_BURST must be greater than zero");
        assert!(self.edit_max > 0, "EDIT_MAX must be greater than zero");
        assert!(
            self.edit_window > chrono::Duration::zero(),
            "EDIT_WINDOW_MINUTES must be greater than zero"
        );
        assert!(
            self.unsend_window > chrono::Duration::zero(),
            "UNSEND_WINDOW_MINUTES must be greater than zero"
        );
        assert!(self.max_frame_size > 0, "MAX_FRAME_SIZE must be greater than zero");
        assert!(
            self.ping_period < self.pong_wait,
            "PING_PERIOD_SECS must be less than PONG_WAIT_SECS, or pings alone would trip the timeout"
        );
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn base64_decode(s: &str) -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s.trim())
        .expect("value must be valid base64")
}

fn decode_key32(s: &str) -> [u8; 32] {
    let bytes = base64_decode(s);
    bytes
        .try_into()
        .unwrap_or_else(|v: Vec<u8>| panic!("CONTENT_CODEC_KEY must decode to 32 bytes, got {}", v.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            bind_addr: "0.0.0.0:8080".to_owned(),
            database_url: "postgres://localhost/chat".to_owned(),
            redis_addr: None,
            content_codec_key: [0u8; 32],
            auth_token_key: vec![0u8; 32],
            pong_wait: Duration::from_secs(60),
            ping_period: Duration::from_secs(25),
            max_frame_size: 64 * 1024,
            handler_timeout: Duration::from_secs(30),
            rate_limit_rps: 20,
            rate_limit_burst: 40,
            edit_window: chrono::Duration::minutes(15),
            edit_max: 10,
            unsend_window: chrono::Duration::minutes(60),
            presence_ttl: Duration::from_secs(300),
        }
    }

    #[test]
    fn defaults_pass_validation() {
        base_config().validate();
    }

    #[test]
    #[should_panic(expected = "RATE_LIMIT_RPS")]
    fn zero_rate_limit_rps_rejected() {
        let mut config = base_config();
        config.rate_limit_rps = 0;
        config.validate();
    }

    #[test]
    #[should_panic(expected = "RATE_LIMIT_BURST")]
    fn zero_rate_limit_burst_rejected() {
        let mut config = base_config();
        config.rate_limit_burst = 0;
        config.validate();
    }

    #[test]
    #[should_panic(expected = "PING_PERIOD_SECS")]
    fn ping_period_not_shorter_than_pong_wait_rejected() {
        let mut config = base_config();
        config.ping_period = Duration::from_secs(90);
        config.validate();
    }
}
