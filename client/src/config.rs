//! Client configuration: CLI flags (spec.md §6) plus the per-SOCKS-connection
//! override resolution (spec.md §4.8). Mirrors the server's `clap::Parser`
//! pattern.

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

#[derive(Parser, Debug, Clone)]
#[command(
    about = "httptun client: accepts local SOCKS connections and tunnels them over HTTP polling",
    version
)]
pub struct Cli {
    /// Default absolute URL to POST to, used when a SOCKS connection doesn't
    /// supply its own `url` arg.
    #[arg(long)]
    pub url: Option<String>,

    /// Default domain-fronting DNS name to substitute for the URL's host.
    #[arg(long)]
    pub front: Option<String>,

    /// Default uTLS Client-Hello id.
    #[arg(long)]
    pub utls: Option<String>,

    /// Address of an external HTTP helper process; when set, all
    /// connections use the helper round-tripper and reject per-connection
    /// `utls` overrides.
    #[arg(long)]
    pub helper: Option<String>,

    /// Outbound proxy URL (http/https/socks5, or http/socks5/socks4a
    /// without user-info when --helper is in use).
    #[arg(long)]
    pub proxy: Option<String>,

    /// Append-mode log file path.
    #[arg(long)]
    pub log: Option<std::path::PathBuf>,

    /// Log verbosity.
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,

    /// Local SOCKS listen port.
    #[arg(long, default_value_t = 4455)]
    pub port: u16,
}

impl Cli {
    pub fn load() -> Result<Self> {
        let cli = Self::parse();
        cli.log_level
            .parse::<log::LevelFilter>()
            .with_context(|| format!("invalid --log-level: {}", cli.log_level))?;
        Ok(cli)
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Which round-tripper a resolved connection should use (spec.md §4.8's
/// selection order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundTripperKind {
    Native,
    /// Address of the helper process. Out of scope per spec.md §1; see
    /// `crate::roundtripper::HelperRoundTripper`.
    Helper(String),
    /// Client-Hello id plus the proxy URL to dial through. Out of scope
    /// per spec.md §1; see `crate::roundtripper::UtlsRoundTripper`.
    Utls { client_hello: String, proxy: Option<String> },
}

/// Per-SOCKS-connection request parameters, resolved from SOCKS args
/// overriding CLI defaults (spec.md §4.8).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: Url,
    pub host_override: Option<String>,
    pub round_tripper: RoundTripperKind,
}

/// Arguments a SOCKS client may pass per-connection (the username/password
/// fields of the SOCKS handshake, repurposed as `key=value` pairs — see
/// `crate::socks`).
#[derive(Debug, Clone, Default)]
pub struct SocksArgs {
    pub url: Option<String>,
    pub front: Option<String>,
    pub utls: Option<String>,
}

/// Why a connection was rejected during per-connection resolution
/// (spec.md §4.8).
#[derive(Debug)]
pub enum ResolveError {
    /// No usable URL from SOCKS args or the `--url` default.
    NoUsableUrl,
    /// A connection requested `utls` while `--helper` is globally
    /// configured; the two round-trippers are incompatible (spec.md §4.8).
    UtlsIncompatibleWithHelper,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoUsableUrl => write!(f, "no url resolved from SOCKS args or --url default"),
            Self::UtlsIncompatibleWithHelper => {
                write!(f, "utls was requested but --helper is configured; the two are incompatible")
            }
        }
    }
}
impl std::error::Error for ResolveError {}

/// Resolve one connection's effective configuration. `url` must end up
/// parseable or the connection is rejected (spec.md §4.8).
pub fn resolve(cli: &Cli, args: &SocksArgs) -> Result<ConnectionConfig, ResolveError> {
    let raw_url = args
        .url
        .as_deref()
        .or(cli.url.as_deref())
        .ok_or(ResolveError::NoUsableUrl)?;
    let mut url = Url::parse(raw_url).map_err(|_| ResolveError::NoUsableUrl)?;

    let front = args.front.as_deref().or(cli.front.as_deref());
    let host_override = front.map(|_| url.host_str().unwrap_or_default().to_string());
    if let Some(front) = front {
        let _ = url.set_host(Some(front));
    }

    let utls = args.utls.as_deref().or(cli.utls.as_deref());
    let round_tripper = if let Some(helper) = &cli.helper {
        if utls.is_some() {
            return Err(ResolveError::UtlsIncompatibleWithHelper);
        }
        RoundTripperKind::Helper(helper.clone())
    } else if let Some(client_hello) = utls {
        RoundTripperKind::Utls {
            client_hello: client_hello.to_string(),
            proxy: cli.proxy.clone(),
        }
    } else {
        RoundTripperKind::Native
    };

    Ok(ConnectionConfig {
        url,
        host_override,
        round_tripper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["httptun-client"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn socks_arg_url_overrides_cli_default() {
        let cli = cli(&["--url", "https://default.example/"]);
        let args = SocksArgs {
            url: Some("https://override.example/".to_string()),
            ..Default::default()
        };
        let resolved = resolve(&cli, &args).unwrap();
        assert_eq!(resolved.url.host_str(), Some("override.example"));
    }

    #[test]
    fn missing_url_everywhere_is_rejected() {
        let cli = cli(&[]);
        assert!(resolve(&cli, &SocksArgs::default()).is_err());
    }

    #[test]
    fn front_sets_host_header_and_replaces_url_host() {
        let cli = cli(&["--url", "https://cdn.example/path"]);
        let args = SocksArgs {
            front: Some("front.example".to_string()),
            ..Default::default()
        };
        let resolved = resolve(&cli, &args).unwrap();
        assert_eq!(resolved.host_override.as_deref(), Some("cdn.example"));
        assert_eq!(resolved.url.host_str(), Some("front.example"));
    }

    #[test]
    fn helper_is_used_when_no_utls_override_is_requested() {
        let cli = cli(&[
            "--url",
            "https://cdn.example/",
            "--helper",
            "127.0.0.1:9000",
        ]);
        let resolved = resolve(&cli, &SocksArgs::default()).unwrap();
        assert_eq!(
            resolved.round_tripper,
            RoundTripperKind::Helper("127.0.0.1:9000".to_string())
        );
    }

    #[test]
    fn utls_override_is_rejected_as_incompatible_when_helper_is_configured() {
        let cli = cli(&[
            "--url",
            "https://cdn.example/",
            "--helper",
            "127.0.0.1:9000",
        ]);
        let args = SocksArgs {
            utls: Some("chrome_120".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve(&cli, &args).unwrap_err(),
            ResolveError::UtlsIncompatibleWithHelper
        ));
    }

    #[test]
    fn utls_used_when_no_helper_configured() {
        let cli = cli(&["--url", "https://cdn.example/"]);
        let args = SocksArgs {
            utls: Some("chrome_120".to_string()),
            ..Default::default()
        };
        let resolved = resolve(&cli, &args).unwrap();
        assert!(matches!(resolved.round_tripper, RoundTripperKind::Utls { .. }));
    }

    #[test]
    fn native_round_tripper_is_the_default() {
        let cli = cli(&["--url", "https://cdn.example/"]);
        let resolved = resolve(&cli, &SocksArgs::default()).unwrap();
        assert_eq!(resolved.round_tripper, RoundTripperKind::Native);
    }
}
