//! Server configuration: CLI flags only (spec.md §6), following the
//! teacher's `clap::Parser` + per-field `#[serde(default = ...)]` pattern in
//! spirit, minus the json5 config file — every flag in this component is
//! already listed by name in the spec, so there is no config-file layer to
//! add on top.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

/// One of the three mutually exclusive ways the server terminates TLS (or
/// doesn't).
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// `--disable-tls`: plain HTTP, no TLS at all.
    Disabled,
    /// `--cert` + `--key`: a supplied certificate chain and private key.
    Static { cert: PathBuf, key: PathBuf },
    /// `--acme-hostnames` + `--acme-email`: automatic certificate issuance.
    /// The issuance step itself is a documented stub in this build (see
    /// `crate::tls::acme_provision`); the mode selection and the mutual
    /// exclusivity enforcement below are fully implemented.
    Acme { hostnames: Vec<String>, email: String },
}

/// Where the server relays tunnelled bytes to.
#[derive(Debug, Clone)]
pub enum DownstreamTarget {
    /// `--external-service host:port`.
    External(SocketAddr),
    /// `--socks <port>`: the built-in SOCKS5 fallback used when no external
    /// downstream is configured. Out of scope per spec.md §1; represented
    /// here only as a loopback address so the rest of the server's dial
    /// logic doesn't need to know the difference.
    BuiltinSocks(u16),
}

impl DownstreamTarget {
    pub fn addr(&self) -> SocketAddr {
        match self {
            Self::External(addr) => *addr,
            Self::BuiltinSocks(port) => SocketAddr::from(([127, 0, 0, 1], *port)),
        }
    }
}

/// The cover identity served on GET "/" (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct Cover {
    pub mask: Option<PathBuf>,
    pub redirect: Option<String>,
}

#[derive(Parser, Debug)]
#[command(
    about = "httptun server: the downstream-facing half of a session-multiplexed HTTP-polling tunnel",
    version
)]
struct Cli {
    /// Listen port (required, nonzero).
    #[arg(long)]
    port: u16,

    /// TLS certificate chain file. Requires --key.
    #[arg(long)]
    cert: Option<PathBuf>,

    /// TLS private key file. Requires --cert.
    #[arg(long)]
    key: Option<PathBuf>,

    /// Comma-separated hostnames to request ACME certificates for.
    #[arg(long = "acme-hostnames", value_delimiter = ',')]
    acme_hostnames: Vec<String>,

    /// Contact email for ACME registration.
    #[arg(long = "acme-email")]
    acme_email: Option<String>,

    /// Serve plain HTTP with no TLS at all.
    #[arg(long = "disable-tls")]
    disable_tls: bool,

    /// Append-mode log file path. Logging still goes to stderr regardless.
    #[arg(long)]
    log: Option<PathBuf>,

    /// Log verbosity.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    /// HTML file served verbatim on GET "/" when no redirect is configured.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Redirect URL served on GET "/"; overrides --mask when present.
    #[arg(long)]
    redirect: Option<String>,

    /// Downstream address (host:port) the server relays tunnelled bytes to.
    #[arg(long = "external-service")]
    external_service: Option<String>,

    /// Port for the built-in SOCKS5 fallback, used only when
    /// --external-service is not configured.
    #[arg(long, default_value_t = 1080)]
    socks: u16,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub tls: TlsMode,
    pub log_path: Option<PathBuf>,
    pub log_level: log::LevelFilter,
    pub cover: Cover,
    pub downstream: DownstreamTarget,
}

impl Config {
    /// Parse CLI flags and validate them into a `Config`. Fatal on any
    /// conflicting or missing-nonzero configuration (spec.md §4.9, §7).
    pub fn load() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Result<Self> {
        if cli.port == 0 {
            bail!("--port must be nonzero");
        }

        let has_static = cli.cert.is_some() || cli.key.is_some();
        let has_acme = !cli.acme_hostnames.is_empty() || cli.acme_email.is_some();
        let modes_selected = [cli.disable_tls, has_static, has_acme]
            .iter()
            .filter(|enabled| **enabled)
            .count();

        if modes_selected == 0 {
            bail!("exactly one TLS mode must be selected: --disable-tls, --cert/--key, or --acme-hostnames/--acme-email");
        }
        if modes_selected > 1 {
            bail!("--disable-tls, --cert/--key and --acme-hostnames/--acme-email are mutually exclusive");
        }

        let tls = if cli.disable_tls {
            TlsMode::Disabled
        } else if has_static {
            let cert = cli.cert.context("--key was given without --cert")?;
            let key = cli.key.context("--cert was given without --key")?;
            TlsMode::Static { cert, key }
        } else {
            if cli.acme_hostnames.is_empty() {
                bail!("--acme-email was given without --acme-hostnames");
            }
            let email = cli
                .acme_email
                .context("--acme-hostnames was given without --acme-email")?;
            TlsMode::Acme {
                hostnames: cli.acme_hostnames,
                email,
            }
        };

        let downstream = match cli.external_service {
            Some(addr) => DownstreamTarget::External(
                addr.parse()
                    .with_context(|| format!("invalid --external-service address: {addr}"))?,
            ),
            None => DownstreamTarget::BuiltinSocks(cli.socks),
        };

        let log_level = cli
            .log_level
            .parse()
            .with_context(|| format!("invalid --log-level: {}", cli.log_level))?;

        Ok(Config {
            port: cli.port,
            tls,
            log_path: cli.log,
            log_level,
            cover: Cover {
                mask: cli.mask,
                redirect: cli.redirect,
            },
            downstream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["httptun-server"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn disable_tls_is_accepted_alone() {
        let cfg = Config::from_cli(cli(&["--port", "8080", "--disable-tls"])).unwrap();
        assert!(matches!(cfg.tls, TlsMode::Disabled));
    }

    #[test]
    fn static_cert_requires_both_cert_and_key() {
        let err = Config::from_cli(cli(&["--port", "8080", "--cert", "a.pem"])).unwrap_err();
        assert!(err.to_string().contains("--key"));
    }

    #[test]
    fn tls_modes_are_mutually_exclusive() {
        let err = Config::from_cli(cli(&[
            "--port",
            "8080",
            "--disable-tls",
            "--cert",
            "a.pem",
            "--key",
            "a.key",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn no_tls_mode_is_fatal() {
        let err = Config::from_cli(cli(&["--port", "8080"])).unwrap_err();
        assert!(err.to_string().contains("exactly one TLS mode"));
    }

    #[test]
    fn zero_port_is_fatal() {
        let err = Config::from_cli(cli(&["--port", "0", "--disable-tls"])).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn redirect_and_mask_can_both_be_set_redirect_wins_at_request_time() {
        let cfg = Config::from_cli(cli(&[
            "--port",
            "8080",
            "--disable-tls",
            "--mask",
            "index.html",
            "--redirect",
            "https://example.org/",
        ]))
        .unwrap();
        assert!(cfg.cover.mask.is_some());
        assert!(cfg.cover.redirect.is_some());
    }

    #[test]
    fn default_downstream_is_builtin_socks() {
        let cfg = Config::from_cli(cli(&["--port", "8080", "--disable-tls"])).unwrap();
        assert!(matches!(cfg.downstream, DownstreamTarget::BuiltinSocks(1080)));
    }

    #[test]
    fn external_service_overrides_builtin_socks() {
        let cfg = Config::from_cli(cli(&[
            "--port",
            "8080",
            "--disable-tls",
            "--external-service",
            "127.0.0.1:9001",
        ]))
        .unwrap();
        assert!(matches!(cfg.downstream, DownstreamTarget::External(_)));
    }
}
