//! Hand-rolled SOCKS4/SOCKS4a/SOCKS5 acceptor (spec.md §4.8).
//!
//! No crate in this corpus implements SOCKS wire parsing (the teacher hand
//! rolls STUN/TURN attribute parsing instead in `crates/codec`), so this is
//! written directly against `tokio::net::TcpStream` the same way.
//!
//! Per-connection SOCKS args (`url`, `front`, `utls`) ride in the SOCKS5
//! username/password auth fields, or the SOCKS4 userid field, as
//! `key=value` pairs joined by `;` — the same convention Tor's own
//! pluggable-transport SOCKS clients use to pass extra arguments through a
//! protocol that has no native concept of them.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::SocksArgs;

const SOCKS4_VERSION: u8 = 0x04;
const SOCKS5_VERSION: u8 = 0x05;
const SOCKS5_NO_AUTH: u8 = 0x00;
const SOCKS5_USER_PASS: u8 = 0x02;
const SOCKS5_CMD_CONNECT: u8 = 0x01;
const SOCKS5_ATYP_V4: u8 = 0x01;
const SOCKS5_ATYP_DOMAIN: u8 = 0x03;
const SOCKS5_ATYP_V6: u8 = 0x04;

#[derive(Debug)]
pub enum SocksError {
    Io(std::io::Error),
    UnsupportedVersion(u8),
    UnsupportedCommand(u8),
    UnsupportedAddressType(u8),
    NoAcceptableAuthMethod,
}

impl From<std::io::Error> for SocksError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::fmt::Display for SocksError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "socks io error: {e}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported socks version {v:#x}"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported socks command {c:#x}"),
            Self::UnsupportedAddressType(a) => write!(f, "unsupported socks address type {a:#x}"),
            Self::NoAcceptableAuthMethod => write!(f, "client offered no acceptable auth method"),
        }
    }
}

impl std::error::Error for SocksError {}

/// Perform the SOCKS handshake on a freshly accepted connection. A no-op
/// bind address is always granted (spec.md §4.8) regardless of the
/// requested destination, since the real destination is determined by the
/// tunnel's own configuration, not by the local application.
pub async fn handshake(stream: &mut TcpStream) -> Result<SocksArgs, SocksError> {
    let version = stream.read_u8().await?;
    match version {
        SOCKS4_VERSION => handshake_v4(stream).await,
        SOCKS5_VERSION => handshake_v5(stream).await,
        other => Err(SocksError::UnsupportedVersion(other)),
    }
}

async fn handshake_v4(stream: &mut TcpStream) -> Result<SocksArgs, SocksError> {
    let cmd = stream.read_u8().await?;
    if cmd != SOCKS5_CMD_CONNECT {
        return Err(SocksError::UnsupportedCommand(cmd));
    }

    let mut port_and_ip = [0u8; 6];
    stream.read_exact(&mut port_and_ip).await?;
    let is_socks4a = port_and_ip[2..5] == [0, 0, 0] && port_and_ip[5] != 0;

    let userid = read_null_terminated(stream).await?;
    if is_socks4a {
        // SOCKS4a: a destination domain name follows the userid field.
        let _domain = read_null_terminated(stream).await?;
    }

    stream
        .write_all(&[0x00, 0x5A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
        .await?;

    Ok(parse_args(&userid))
}

async fn handshake_v5(stream: &mut TcpStream) -> Result<SocksArgs, SocksError> {
    let nmethods = stream.read_u8().await?;
    let mut methods = vec![0u8; nmethods as usize];
    stream.read_exact(&mut methods).await?;

    let args = if methods.contains(&SOCKS5_USER_PASS) {
        stream.write_all(&[SOCKS5_VERSION, SOCKS5_USER_PASS]).await?;
        negotiate_user_pass(stream).await?
    } else if methods.contains(&SOCKS5_NO_AUTH) {
        stream.write_all(&[SOCKS5_VERSION, SOCKS5_NO_AUTH]).await?;
        SocksArgs::default()
    } else {
        stream.write_all(&[SOCKS5_VERSION, 0xFF]).await?;
        return Err(SocksError::NoAcceptableAuthMethod);
    };

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let [ver, cmd, _rsv, atyp] = header;
    if ver != SOCKS5_VERSION {
        return Err(SocksError::UnsupportedVersion(ver));
    }
    if cmd != SOCKS5_CMD_CONNECT {
        return Err(SocksError::UnsupportedCommand(cmd));
    }

    match atyp {
        SOCKS5_ATYP_V4 => {
            let mut addr = [0u8; 4 + 2];
            stream.read_exact(&mut addr).await?;
        }
        SOCKS5_ATYP_V6 => {
            let mut addr = [0u8; 16 + 2];
            stream.read_exact(&mut addr).await?;
        }
        SOCKS5_ATYP_DOMAIN => {
            let len = stream.read_u8().await? as usize;
            let mut addr = vec![0u8; len + 2];
            stream.read_exact(&mut addr).await?;
        }
        other => return Err(SocksError::UnsupportedAddressType(other)),
    }

    stream
        .write_all(&[
            SOCKS5_VERSION,
            0x00,
            0x00,
            SOCKS5_ATYP_V4,
            0,
            0,
            0,
            0,
            0,
            0,
        ])
        .await?;

    Ok(args)
}

async fn negotiate_user_pass(stream: &mut TcpStream) -> Result<SocksArgs, SocksError> {
    let ver = stream.read_u8().await?;
    let ulen = stream.read_u8().await? as usize;
    let mut username = vec![0u8; ulen];
    stream.read_exact(&mut username).await?;
    let plen = stream.read_u8().await? as usize;
    let mut password = vec![0u8; plen];
    stream.read_exact(&mut password).await?;

    stream.write_all(&[ver, 0x00]).await?;

    let mut combined = username;
    combined.push(b';');
    combined.extend_from_slice(&password);
    Ok(parse_args(&combined))
}

async fn read_null_terminated(stream: &mut TcpStream) -> Result<Vec<u8>, std::io::Error> {
    let mut bytes = Vec::new();
    loop {
        let b = stream.read_u8().await?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(bytes)
}

fn parse_args(raw: &[u8]) -> SocksArgs {
    let text = String::from_utf8_lossy(raw);
    let mut args = SocksArgs::default();
    for pair in text.split(';') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key.trim() {
            "url" => args.url = Some(value.to_string()),
            "front" => args.front = Some(value.to_string()),
            "utls" => args.utls = Some(value.to_string()),
            _ => {}
        }
    }
    args
}
