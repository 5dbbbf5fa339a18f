// File: target.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::error::InputError;
use async_trait::async_trait;
use log::trace;
use std::net::IpAddr;
use url::{Host, Url};

/// A parsed target URL and the addresses it will be probed on.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub url: Url,
    pub ips: Vec<IpAddr>,
}

/// Name to address lookup used when resolution is enabled.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, String>;
}

/// Resolves through the operating system resolver.
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, String> {
        let addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| e.to_string())?;

        let mut ips = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        Ok(ips)
    }
}

/// Lines that carry no target: blanks and `#` comments.
pub fn is_target_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

pub fn parse_url(raw: &str) -> Result<Url, InputError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|e| InputError::InvalidUrl(raw.to_string(), e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(InputError::UnsupportedScheme(raw.to_string()));
    }

    if url.host().is_none() {
        return Err(InputError::InvalidUrl(
            raw.to_string(),
            "no host in URL".to_string(),
        ));
    }

    Ok(url)
}

/// Turns one input line into a target: either `<ip>,<url>` when resolution is
/// disabled, or a bare URL whose host is looked up through `resolver`.
pub async fn resolve_line(
    line: &str,
    no_resolve: bool,
    resolver: &dyn Resolver,
) -> Result<Target, InputError> {
    let line = line.trim();

    if no_resolve {
        let Some((ip, url)) = line.split_once(',') else {
            return Err(InputError::InvalidLine(line.to_string()));
        };

        let ip: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| InputError::InvalidIp(ip.trim().to_string()))?;
        let url = parse_url(url)?;

        return Ok(Target { url, ips: vec![ip] });
    }

    let url = parse_url(line)?;
    let ips = match url.host() {
        Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(Host::Domain(domain)) => {
            let ips = resolver
                .lookup(domain)
                .await
                .map_err(|e| InputError::Resolve(domain.to_string(), e))?;
            if ips.is_empty() {
                return Err(InputError::Resolve(
                    domain.to_string(),
                    "no addresses found".to_string(),
                ));
            }
            ips
        }
        None => {
            return Err(InputError::InvalidUrl(
                line.to_string(),
                "no host in URL".to_string(),
            ))
        }
    };

    trace!("Resolved {} to {:?}", url, ips);
    Ok(Target { url, ips })
}
