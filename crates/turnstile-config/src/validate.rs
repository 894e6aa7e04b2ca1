//! Parsing helpers for individual environment values.

use std::net::IpAddr;
use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn parse_port(field: &'static str, raw: &str) -> ConfigResult<u16> {
    let port: u32 = raw.parse().map_err(|_| invalid(field, raw, "not_an_integer"))?;
    if !(1..=65_535).contains(&port) {
        return Err(invalid(field, raw, "out_of_range"));
    }
    u16::try_from(port).map_err(|_| invalid(field, raw, "out_of_range"))
}

pub(crate) fn parse_ip(field: &'static str, raw: &str) -> ConfigResult<IpAddr> {
    raw.parse().map_err(|_| invalid(field, raw, "not_an_ip_address"))
}

pub(crate) fn parse_millis(field: &'static str, raw: &str) -> ConfigResult<Duration> {
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| invalid(field, raw, "not_a_non_negative_integer"))
}

pub(crate) fn parse_secs(field: &'static str, raw: &str) -> ConfigResult<Duration> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| invalid(field, raw, "not_a_non_negative_integer"))
}

pub(crate) fn parse_positive_u32(field: &'static str, raw: &str) -> ConfigResult<u32> {
    match raw.parse::<u32>() {
        Ok(0) => Err(invalid(field, raw, "must_be_positive")),
        Ok(value) => Ok(value),
        Err(_) => Err(invalid(field, raw, "not_an_integer")),
    }
}

pub(crate) fn parse_flag(field: &'static str, raw: &str) -> ConfigResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(field, raw, "not_a_boolean")),
    }
}

pub(crate) fn parse_base_url(field: &'static str, raw: &str) -> ConfigResult<Url> {
    let url = Url::parse(raw).map_err(|_| invalid(field, raw, "not_a_url"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(field, raw, "unsupported_scheme"));
    }
    if url.cannot_be_a_base() {
        return Err(invalid(field, raw, "not_a_base_url"));
    }
    Ok(url)
}

pub(crate) fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.trim_end_matches('/').to_string())
        .collect()
}

fn invalid(field: &'static str, raw: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidField {
        field,
        value: Some(raw.to_string()),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason_of<T: std::fmt::Debug>(result: ConfigResult<T>) -> Option<&'static str> {
        match result {
            Err(ConfigError::InvalidField { reason, .. }) => Some(reason),
            _ => None,
        }
    }

    #[test]
    fn port_bounds_are_enforced() -> anyhow::Result<()> {
        assert_eq!(parse_port("P", "8000")?, 8000);
        assert_eq!(reason_of(parse_port("P", "0")), Some("out_of_range"));
        assert_eq!(reason_of(parse_port("P", "70000")), Some("out_of_range"));
        assert_eq!(reason_of(parse_port("P", "http")), Some("not_an_integer"));
        Ok(())
    }

    #[test]
    fn flags_accept_common_spellings() -> anyhow::Result<()> {
        assert!(parse_flag("F", "1")?);
        assert!(parse_flag("F", "TRUE")?);
        assert!(!parse_flag("F", "0")?);
        assert!(!parse_flag("F", "off")?);
        assert_eq!(reason_of(parse_flag("F", "maybe")), Some("not_a_boolean"));
        Ok(())
    }

    #[test]
    fn positive_counts_reject_zero() -> anyhow::Result<()> {
        assert_eq!(parse_positive_u32("N", "5")?, 5);
        assert_eq!(reason_of(parse_positive_u32("N", "0")), Some("must_be_positive"));
        assert_eq!(reason_of(parse_positive_u32("N", "-1")), Some("not_an_integer"));
        Ok(())
    }

    #[test]
    fn durations_parse_from_integers() -> anyhow::Result<()> {
        assert_eq!(parse_millis("T", "1500")?, Duration::from_millis(1500));
        assert_eq!(parse_secs("T", "30")?, Duration::from_secs(30));
        assert_eq!(
            reason_of(parse_millis("T", "1.5s")),
            Some("not_a_non_negative_integer")
        );
        Ok(())
    }

    #[test]
    fn base_url_requires_http_scheme() -> anyhow::Result<()> {
        let url = parse_base_url("U", "http://users:8083")?;
        assert_eq!(url.host_str(), Some("users"));
        assert_eq!(reason_of(parse_base_url("U", "ftp://users")), Some("unsupported_scheme"));
        assert_eq!(reason_of(parse_base_url("U", "users:8083")), Some("unsupported_scheme"));
        assert_eq!(reason_of(parse_base_url("U", "not a url")), Some("not_a_url"));
        Ok(())
    }

    #[test]
    fn origins_are_trimmed_and_normalised() {
        assert_eq!(
            parse_origins(" http://localhost:8080/ ,,http://127.0.0.1:8080"),
            vec![
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string()
            ]
        );
    }

    #[test]
    fn ip_addresses_parse() -> anyhow::Result<()> {
        assert!(parse_ip("B", "0.0.0.0")?.is_unspecified());
        assert_eq!(reason_of(parse_ip("B", "localhost")), Some("not_an_ip_address"));
        Ok(())
    }
}
