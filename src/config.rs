//! Configuration management for the sportsbook service.
//! Supports environment variables and default values for server, odds
//! volatility, and cashout parameters.

use crate::bet::CashoutConfig;
use crate::money::Currency;
use crate::odds::VolatilityConfig;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub volatility: VolatilityConfig,
    pub cashout: CashoutConfig,
    pub currency: Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Requests per caller IP per `rate_limit_window_secs` before 429s kick in.
    pub rate_limit_per_window: u32,
    pub rate_limit_window_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0:8080".to_string(),
            rate_limit_per_window: 100,
            rate_limit_window_secs: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            volatility: VolatilityConfig::default(),
            cashout: CashoutConfig::default(),
            currency: Currency::USD,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything missing or unparseable.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(bind_addr) = env::var("SPORTSBOOK_BIND_ADDR") {
            config.server.bind_addr = bind_addr;
        }
        if let Ok(limit) = env::var("SPORTSBOOK_RATE_LIMIT_PER_WINDOW") {
            config.server.rate_limit_per_window = limit.parse().unwrap_or(config.server.rate_limit_per_window);
        }
        if let Ok(window) = env::var("SPORTSBOOK_RATE_LIMIT_WINDOW_SECS") {
            config.server.rate_limit_window_secs = window.parse().unwrap_or(config.server.rate_limit_window_secs);
        }

        if let Ok(window) = env::var("VOLATILITY_WINDOW_MINUTES") {
            config.volatility.window_minutes = window.parse().unwrap_or(config.volatility.window_minutes);
        }
        if let Ok(medium) = env::var("VOLATILITY_MEDIUM_THRESHOLD") {
            config.volatility.medium_threshold = medium.parse().unwrap_or(config.volatility.medium_threshold);
        }
        if let Ok(high) = env::var("VOLATILITY_HIGH_THRESHOLD") {
            config.volatility.high_threshold = high.parse().unwrap_or(config.volatility.high_threshold);
        }
        if let Ok(extreme) = env::var("VOLATILITY_EXTREME_THRESHOLD") {
            config.volatility.extreme_threshold = extreme.parse().unwrap_or(config.volatility.extreme_threshold);
        }

        if let Ok(discount) = env::var("CASHOUT_DISCOUNT_FACTOR") {
            config.cashout.discount_factor = discount.parse().unwrap_or(config.cashout.discount_factor);
        }
        if let Ok(minimum) = env::var("CASHOUT_MINIMUM_PAYOUT") {
            config.cashout.minimum_payout = minimum.parse().unwrap_or(config.cashout.minimum_payout);
        }

        if let Ok(currency) = env::var("SPORTSBOOK_CURRENCY") {
            if let Ok(parsed) = Currency::parse(&currency) {
                config.currency = parsed;
            } else {
                eprintln!("invalid SPORTSBOOK_CURRENCY: {currency}, using default");
            }
        }

        config.validate();
        config
    }

    /// Clamps values that would otherwise leave the service in a nonsensical
    /// state, warning on stderr and falling back to the documented default.
    fn validate(&mut self) {
        if self.server.rate_limit_per_window == 0 {
            eprintln!("invalid rate_limit_per_window: 0, using default");
            self.server.rate_limit_per_window = ServerConfig::default().rate_limit_per_window;
        }
        if self.volatility.window_minutes <= 0 {
            eprintln!("invalid volatility window_minutes: {}, using default", self.volatility.window_minutes);
            self.volatility.window_minutes = VolatilityConfig::default().window_minutes;
        }
        if !(self.volatility.medium_threshold < self.volatility.high_threshold
            && self.volatility.high_threshold < self.volatility.extreme_threshold)
        {
            eprintln!("volatility thresholds out of order, using defaults");
            let default = VolatilityConfig::default();
            self.volatility.medium_threshold = default.medium_threshold;
            self.volatility.high_threshold = default.high_threshold;
            self.volatility.extreme_threshold = default.extreme_threshold;
        }
        if self.cashout.discount_factor <= rust_decimal::Decimal::ZERO || self.cashout.discount_factor > rust_decimal::Decimal::ONE {
            eprintln!("invalid cashout discount_factor: {}, using default", self.cashout.discount_factor);
            self.cashout.discount_factor = CashoutConfig::default().discount_factor;
        }
        if self.cashout.minimum_payout < rust_decimal::Decimal::ZERO {
            eprintln!("invalid cashout minimum_payout: {}, using default", self.cashout.minimum_payout);
            self.cashout.minimum_payout = CashoutConfig::default().minimum_payout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = Config::default();
        assert!(config.volatility.medium_threshold < config.volatility.high_threshold);
        assert!(config.volatility.high_threshold < config.volatility.extreme_threshold);
    }

    #[test]
    fn validate_rejects_out_of_order_thresholds() {
        let mut config = Config::default();
        config.volatility.medium_threshold = 60.0;
        config.validate();
        assert_eq!(config.volatility.medium_threshold, VolatilityConfig::default().medium_threshold);
    }

    #[test]
    fn validate_rejects_zero_rate_limit() {
        let mut config = Config::default();
        config.server.rate_limit_per_window = 0;
        config.validate();
        assert_eq!(config.server.rate_limit_per_window, ServerConfig::default().rate_limit_per_window);
    }
}
