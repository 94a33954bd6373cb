// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client IP policy: CIDR allowlists and trusted-proxy forwarded-for
//! resolution.

use std::net::IpAddr;

/// One parsed network entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Network {
    addr: u128,
    prefix: u8,
    v4: bool,
}

impl Network {
    fn parse(entry: &str) -> Option<Self> {
        let (addr_part, prefix_part) = match entry.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (entry, None),
        };
        let addr: IpAddr = addr_part.trim().parse().ok()?;
        let (bits, max, v4) = match addr {
            IpAddr::V4(v4) => (u128::from(u32::from(v4)), 32u8, true),
            IpAddr::V6(v6) => (u128::from(v6), 128u8, false),
        };
        let prefix = match prefix_part {
            Some(p) => {
                let p: u8 = p.trim().parse().ok()?;
                if p > max {
                    return None;
                }
                p
            }
            None => max,
        };
        let mask = Self::mask(prefix, max);
        Some(Self { addr: bits & mask, prefix, v4 })
    }

    fn mask(prefix: u8, max: u8) -> u128 {
        if prefix == 0 {
            return 0;
        }
        let width_mask = if max == 128 { !0u128 } else { (1u128 << max) - 1 };
        // prefix >= 1, so the shift is at most max - 1 and never overflows.
        (width_mask << u32::from(max - prefix)) & width_mask
    }

    fn contains(&self, ip: IpAddr) -> bool {
        let (bits, max, v4) = match ip {
            IpAddr::V4(v4) => (u128::from(u32::from(v4)), 32u8, true),
            IpAddr::V6(v6) => (u128::from(v6), 128u8, false),
        };
        if v4 != self.v4 {
            return false;
        }
        bits & Self::mask(self.prefix, max) == self.addr
    }
}

/// A comma-separated list of IPs and CIDRs.
///
/// Bare addresses are widened to /32 (v4) or /128 (v6). If any entry fails
/// to parse, the list fails closed: nothing matches.
#[derive(Debug, Clone, Default)]
pub struct CidrList {
    networks: Vec<Network>,
    invalid: bool,
}

impl CidrList {
    /// Parse a comma-separated list. Returns `None` for an empty/blank
    /// input (policy disabled).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        let mut list = Self::default();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match Network::parse(entry) {
                Some(net) => list.networks.push(net),
                None => list.invalid = true,
            }
        }
        Some(list)
    }

    /// Like [`parse`](Self::parse), but invalid entries are dropped instead
    /// of poisoning the list. Used for trusted-proxy CIDRs, where a typo
    /// must not grant forwarded-for trust to anyone.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let mut list = Self::parse(raw)?;
        list.invalid = false;
        Some(list)
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        if self.invalid {
            return false;
        }
        self.networks.iter().any(|net| net.contains(ip))
    }
}

/// Resolve the effective client address.
///
/// The client IP is the peer's source address unless the peer is inside the
/// trusted-proxy set, in which case the left-most valid address of the
/// forwarded-for chain is honored. Untrusted peers can never spoof via
/// X-Forwarded-For.
pub fn client_ip(
    peer: IpAddr,
    forwarded_for: Option<&str>,
    trusted_proxies: Option<&CidrList>,
) -> IpAddr {
    if let (Some(forwarded), Some(trusted)) = (forwarded_for, trusted_proxies) {
        if trusted.contains(peer) {
            if let Some(first) = forwarded.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }
    peer
}

#[cfg(test)]
#[path = "ipnet_tests.rs"]
mod tests;
