use crate::utils::error::{BootcampError, Result};
use crate::utils::validation::validate_port;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5000);
const ANY: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Inputs to listen address resolution.
#[derive(Debug, Clone, Default)]
pub struct HostingOptions {
    pub cloud_hosting: bool,
    /// Value of the platform's `PORT` variable.
    pub platform_port: Option<String>,
    /// Port used when running outside the platform.
    pub run_local_port: Option<u16>,
    /// `urls` setting.
    pub urls: Option<String>,
}

pub fn resolve_listen_addr(options: &HostingOptions) -> Result<SocketAddr> {
    if options.cloud_hosting {
        if let Some(port) = options.platform_port.as_deref().filter(|p| !p.trim().is_empty()) {
            return Ok(SocketAddr::new(ANY, validate_port("PORT", port)?));
        }
        if let Some(port) = options.run_local_port {
            return Ok(SocketAddr::new(ANY, port));
        }
    }

    match options.urls.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(urls) => parse_url_addr(urls),
        None => Ok(DEFAULT_ADDR),
    }
}

/// First entry of a `;`-separated `urls` list, e.g. `http://0.0.0.0:8080;https://...`.
fn parse_url_addr(urls: &str) -> Result<SocketAddr> {
    let first = urls.split(';').next().unwrap_or(urls).trim();
    let authority = first
        .strip_prefix("http://")
        .unwrap_or(first)
        .trim_end_matches('/');

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, validate_port("urls", port)?),
        None => (authority, 80),
    };

    let ip = match host {
        "*" | "+" | "0.0.0.0" | "" => ANY,
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .trim_matches(|c| c == '[' || c == ']')
            .parse::<IpAddr>()
            .map_err(|e| BootcampError::InvalidConfigValueError {
                field: "urls".to_string(),
                value: urls.to_string(),
                reason: e.to_string(),
            })?,
    };
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(platform_port: Option<&str>, run_local_port: Option<u16>) -> HostingOptions {
        HostingOptions {
            cloud_hosting: true,
            platform_port: platform_port.map(str::to_string),
            run_local_port,
            urls: Some("http://127.0.0.1:7000".to_string()),
        }
    }

    #[test]
    fn test_platform_port_wins() {
        let addr = resolve_listen_addr(&cloud(Some("8080"), Some(5555))).unwrap();
        assert_eq!(addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_run_local_port_without_platform() {
        let addr = resolve_listen_addr(&cloud(None, Some(5555))).unwrap();
        assert_eq!(addr, "0.0.0.0:5555".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_urls_then_default() {
        let addr = resolve_listen_addr(&cloud(None, None)).unwrap();
        assert_eq!(addr, "127.0.0.1:7000".parse::<SocketAddr>().unwrap());

        let addr = resolve_listen_addr(&HostingOptions::default()).unwrap();
        assert_eq!(addr, DEFAULT_ADDR);
    }

    #[test]
    fn test_platform_port_ignored_without_cloud_hosting() {
        let options = HostingOptions {
            cloud_hosting: false,
            platform_port: Some("8080".to_string()),
            run_local_port: Some(5555),
            urls: None,
        };
        assert_eq!(resolve_listen_addr(&options).unwrap(), DEFAULT_ADDR);
    }

    #[test]
    fn test_url_forms() {
        assert_eq!(parse_url_addr("http://*:9000").unwrap(), "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(
            parse_url_addr("http://localhost:9001/;http://0.0.0.0:9002").unwrap(),
            "127.0.0.1:9001".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_url_addr("[::1]:9003").unwrap(), "[::1]:9003".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_invalid_values() {
        assert!(resolve_listen_addr(&cloud(Some("eighty"), None)).is_err());
        assert!(parse_url_addr("http://example.com:8080").is_err());
    }
}
