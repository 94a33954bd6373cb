// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap_or(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST))
}

#[test]
fn empty_allowlist_is_disabled() {
    assert!(CidrList::parse("").is_none());
    assert!(CidrList::parse("   ").is_none());
}

#[test]
fn bare_ip_matches_only_itself() {
    let list = CidrList::parse("192.168.1.10").unwrap_or_default();
    assert!(list.contains(ip("192.168.1.10")));
    assert!(!list.contains(ip("192.168.1.11")));
}

#[test]
fn cidr_matches_range() {
    let list = CidrList::parse("10.0.0.0/24, 172.16.0.0/12").unwrap_or_default();
    assert!(list.contains(ip("10.0.0.200")));
    assert!(!list.contains(ip("10.0.1.1")));
    assert!(list.contains(ip("172.20.3.4")));
    assert!(!list.contains(ip("192.168.0.1")));
}

#[test]
fn ipv6_host_entry_matches_only_exact_host() {
    let list = CidrList::parse("2001:db8::1").unwrap_or_default();
    assert!(list.contains(ip("2001:db8::1")));
    assert!(!list.contains(ip("2001:db8::2")));
    // Families never cross-match.
    assert!(!list.contains(ip("127.0.0.1")));
}

#[test]
fn invalid_entry_fails_the_whole_list_closed() {
    let list = CidrList::parse("10.0.0.0/24, not-an-ip").unwrap_or_default();
    assert!(!list.contains(ip("10.0.0.5")));
}

#[test]
fn lenient_parse_drops_invalid_entries() {
    let list = CidrList::parse_lenient("10.0.0.0/24, not-an-ip").unwrap_or_default();
    assert!(list.contains(ip("10.0.0.5")));
    assert!(!list.contains(ip("11.0.0.5")));
}

#[test]
fn forwarded_for_requires_trusted_peer() {
    let trusted = CidrList::parse("127.0.0.1").unwrap_or_default();

    // Untrusted peer: forwarded-for is ignored.
    let got = client_ip(ip("203.0.113.9"), Some("198.51.100.7"), Some(&trusted));
    assert_eq!(got, ip("203.0.113.9"));

    // Trusted peer: left-most valid hop wins.
    let got = client_ip(ip("127.0.0.1"), Some("198.51.100.7, 10.0.0.1"), Some(&trusted));
    assert_eq!(got, ip("198.51.100.7"));

    // Garbage forwarded-for falls back to the peer.
    let got = client_ip(ip("127.0.0.1"), Some("banana"), Some(&trusted));
    assert_eq!(got, ip("127.0.0.1"));
}
