use std::env;

use crate::error::ConfigError;

/**
 * The port the accessory server is published on unless HAP_PORT overrides it.
 */
pub const DEFAULT_ACCESSORY_PORT: u16 = 47129;

/// Runtime configuration, sourced from the environment. There is no config
/// file; the daemon needs exactly the accessory pairing pin and optionally
/// a port.
#[derive(Debug, Clone)]
pub struct Config {
    /// Setup pin presented when pairing the accessory (HAP_PIN, required).
    pub pin: String,
    /// Port for the accessory server (HAP_PORT, optional).
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let pin = required_env("HAP_PIN")?;

        let port = match env::var("HAP_PORT") {
            Ok(value) => value.parse().map_err(|source| ConfigError::InvalidEnv {
                name: "HAP_PORT",
                source,
            })?,
            Err(_) => DEFAULT_ACCESSORY_PORT,
        };

        Ok(Config { pin, port })
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnv { name })
}

#[cfg(test)]
mod tests {
    use super::*;

    // The process environment is shared across test threads, so only this
    // one test mutates it.
    #[test]
    fn config_comes_from_the_environment() {
        env::remove_var("HAP_PIN");
        env::remove_var("HAP_PORT");
        match Config::from_env() {
            Err(ConfigError::MissingEnv { name }) => assert_eq!(name, "HAP_PIN"),
            other => panic!("expected a missing-variable error, got {:?}", other),
        }

        env::set_var("HAP_PIN", "123-45-678");
        let config = Config::from_env().unwrap();
        assert_eq!(config.pin, "123-45-678");
        assert_eq!(config.port, DEFAULT_ACCESSORY_PORT);

        env::set_var("HAP_PORT", "8080");
        assert_eq!(Config::from_env().unwrap().port, 8080);

        env::set_var("HAP_PORT", "not-a-port");
        match Config::from_env() {
            Err(ConfigError::InvalidEnv { name, .. }) => assert_eq!(name, "HAP_PORT"),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }
}
