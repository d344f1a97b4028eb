//! Sweep output parsing.
//!
//! The host-discovery sweep (`nmap -sn -n`) writes human-readable text:
//! a host-report line carrying an IP, optionally followed by a
//! hardware-address line carrying a MAC. That text is the only contract
//! with the tool. Two patterns are recognized; every other line
//! (banners, latency, the run summary) is skipped.

use std::net::IpAddr;

use lanwarden_core::DeviceIdentity;

const HOST_LINE_MARKER: &str = "Nmap scan report for";
const MAC_LINE_MARKER: &str = "MAC Address:";

/// Parse sweep output into identities, preserving report order.
///
/// A MAC line attaches to the most recently reported host; a host with
/// no MAC line before the next host keeps an empty MAC (the sweep never
/// reads the hardware address of the scanning machine itself, and may
/// miss others). Malformed lines are ignored, never fatal.
pub fn parse_sweep_output(output: &str) -> Vec<DeviceIdentity> {
    let mut identities: Vec<DeviceIdentity> = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(HOST_LINE_MARKER) {
            if let Some(ip) = parse_host_ip(rest) {
                identities.push(DeviceIdentity::new(ip, ""));
            }
        } else if let Some(rest) = line.strip_prefix(MAC_LINE_MARKER) {
            if let (Some(mac), Some(last)) = (parse_mac(rest), identities.last_mut()) {
                if !last.has_mac() {
                    last.mac = mac;
                }
            }
        }
    }

    identities
}

/// Extract the IP from the remainder of a host-report line.
///
/// With `-n` the line is `... for 192.168.1.1`; without it the address
/// sits in parentheses after the name: `... for router.lan (192.168.1.1)`.
fn parse_host_ip(rest: &str) -> Option<IpAddr> {
    let token = match (rest.find('('), rest.find(')')) {
        (Some(open), Some(close)) if open < close => &rest[open + 1..close],
        _ => rest.split_whitespace().last()?,
    };
    token.trim().parse().ok()
}

/// Extract the MAC token from the remainder of a hardware-address line
/// (`MAC Address: AA:BB:CC:DD:EE:01 (Vendor Name)`).
fn parse_mac(rest: &str) -> Option<String> {
    let token = rest.split_whitespace().next()?;
    if is_mac(token) {
        Some(token.to_ascii_uppercase())
    } else {
        None
    }
}

fn is_mac(token: &str) -> bool {
    let groups: Vec<&str> = token.split(':').collect();
    groups.len() == 6
        && groups
            .iter()
            .all(|g| g.len() == 2 && g.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUICK_SWEEP_OUTPUT: &str = "\
Starting Nmap 7.94 ( https://nmap.org ) at 2026-02-24 10:00 UTC
Nmap scan report for 192.168.1.1
Host is up (0.0042s latency).
MAC Address: AA:BB:CC:DD:EE:01 (Ubiquiti Networks)
Nmap scan report for 192.168.1.23
Host is up (0.11s latency).
MAC Address: aa:bb:cc:dd:ee:10 (Espressif)
Nmap scan report for 192.168.1.42
Host is up (0.00019s latency).
Nmap done: 256 IP addresses (3 hosts up) scanned in 2.49 seconds
";

    #[test]
    fn test_parse_quick_sweep() {
        let identities = parse_sweep_output(QUICK_SWEEP_OUTPUT);
        assert_eq!(identities.len(), 3);

        assert_eq!(identities[0].ip.to_string(), "192.168.1.1");
        assert_eq!(identities[0].mac, "AA:BB:CC:DD:EE:01");

        assert_eq!(identities[1].ip.to_string(), "192.168.1.23");
        assert_eq!(identities[1].mac, "AA:BB:CC:DD:EE:10");

        // The scanning machine itself reports no MAC line.
        assert_eq!(identities[2].ip.to_string(), "192.168.1.42");
        assert!(!identities[2].has_mac());
    }

    #[test]
    fn test_parse_resolved_hostname_form() {
        let output = "\
Nmap scan report for router.lan (192.168.1.1)
Host is up (0.0042s latency).
MAC Address: AA:BB:CC:DD:EE:01 (Ubiquiti Networks)
";
        let identities = parse_sweep_output(output);
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].ip.to_string(), "192.168.1.1");
        assert_eq!(identities[0].mac, "AA:BB:CC:DD:EE:01");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let output = "\
%%% corrupted banner %%%
Nmap scan report for not-an-address
Nmap scan report for 10.0.0.5
MAC Address: ZZ:ZZ:ZZ:ZZ:ZZ:ZZ (Broken)
MAC Address: AA:BB:CC:DD:EE:01 (Vendor)
random noise line
Nmap scan report for 10.0.0.9
MAC Address: AA:BB:CC:DD:EE:02 (Vendor)
";
        let identities = parse_sweep_output(output);
        assert_eq!(identities.len(), 2);
        assert_eq!(identities[0].ip.to_string(), "10.0.0.5");
        assert_eq!(identities[0].mac, "AA:BB:CC:DD:EE:01");
        assert_eq!(identities[1].ip.to_string(), "10.0.0.9");
        assert_eq!(identities[1].mac, "AA:BB:CC:DD:EE:02");
    }

    #[test]
    fn test_mac_line_before_any_host_is_ignored() {
        let output = "MAC Address: AA:BB:CC:DD:EE:01 (Vendor)\n";
        assert!(parse_sweep_output(output).is_empty());
    }

    #[test]
    fn test_first_mac_line_wins() {
        let output = "\
Nmap scan report for 10.0.0.5
MAC Address: AA:BB:CC:DD:EE:01 (Vendor)
MAC Address: AA:BB:CC:DD:EE:99 (Other)
";
        let identities = parse_sweep_output(output);
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].mac, "AA:BB:CC:DD:EE:01");
    }

    #[test]
    fn test_empty_output() {
        assert!(parse_sweep_output("").is_empty());
        assert!(parse_sweep_output("Nmap done: 256 IP addresses (0 hosts up)\n").is_empty());
    }

    #[test]
    fn test_ipv6_host_line() {
        let output = "Nmap scan report for fe80::1\n";
        let identities = parse_sweep_output(output);
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].ip.to_string(), "fe80::1");
    }
}
