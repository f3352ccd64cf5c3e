use std::env;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

/// Process-wide configuration, read from the environment once at startup and
/// passed explicitly to the upstream clients.
///
/// Missing API keys are deliberately not an error here: a misconfigured key
/// surfaces when the affected endpoint is invoked, not at boot.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind, `HOST` (default `0.0.0.0`).
    pub host: String,
    /// Listen port, `PORT` (default 3000).
    pub port: u16,
    /// Generative-language credential, `GEMINI_API_KEY`.
    pub gemini_api_key: Option<String>,
    /// Weather-provider credential, `WEATHER_API_KEY`.
    pub weather_api_key: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Config::from_env`], but with an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("HOST")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    log::warn!("ignoring unparseable PORT value {raw:?}, using {DEFAULT_PORT}");
                    DEFAULT_PORT
                }
            },
            None => DEFAULT_PORT,
        };

        Self {
            host,
            port,
            gemini_api_key: lookup("GEMINI_API_KEY").filter(|v| !v.trim().is_empty()),
            weather_api_key: lookup("WEATHER_API_KEY").filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |name| map.get(name).map(|v| (*v).to_string())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let cfg = Config::from_lookup(|_| None);

        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(cfg.gemini_api_key.is_none());
        assert!(cfg.weather_api_key.is_none());
    }

    #[test]
    fn reads_port_and_keys() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("PORT", "5000"),
            ("GEMINI_API_KEY", "gem-key"),
            ("WEATHER_API_KEY", "wx-key"),
        ]));

        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.gemini_api_key.as_deref(), Some("gem-key"));
        assert_eq!(cfg.weather_api_key.as_deref(), Some("wx-key"));
    }

    #[test]
    fn unparseable_port_falls_back_to_default() {
        let cfg = Config::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let cfg = Config::from_lookup(lookup_from(&[("WEATHER_API_KEY", "   ")]));
        assert!(cfg.weather_api_key.is_none());
    }

    #[test]
    fn bind_addr_pairs_host_and_port() {
        let cfg = Config::from_lookup(lookup_from(&[("HOST", "127.0.0.1"), ("PORT", "8080")]));
        assert_eq!(cfg.bind_addr(), ("127.0.0.1".to_string(), 8080));
    }
}
