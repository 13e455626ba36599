//! Network origin of a request, used as the first half of a rate limit key.

use std::net::IpAddr;

/// Number of leading IPv6 segments kept, i.e. a /64 prefix.
const IPV6_PREFIX_SEGMENTS: usize = 4;

/// Origin used when no address can be determined.
const UNKNOWN_ORIGIN: &str = "unknown";

/// The client's network origin as a rate-limit key component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientOrigin(String);

impl ClientOrigin {
    /// Resolve the origin from proxy headers and the peer address.
    ///
    /// Takes the first parseable address in `X-Forwarded-For`, then
    /// `X-Real-IP`, then the peer address. Falls back to `"unknown"`, which
    /// makes every such request share one bucket.
    pub fn from_headers(
        x_forwarded_for: Option<&str>,
        x_real_ip: Option<&str>,
        peer: Option<IpAddr>,
    ) -> Self {
        let forwarded = x_forwarded_for
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());

        let real = || x_real_ip.and_then(|value| value.trim().parse::<IpAddr>().ok());

        match forwarded.or_else(real).or(peer) {
            Some(ip) => Self::from_ip(ip),
            None => Self::unknown(),
        }
    }

    /// Origin for a known address. IPv6 addresses collapse to their /64.
    pub fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self(v4.to_string()),
            IpAddr::V6(v6) => {
                if let Some(v4) = v6.to_ipv4_mapped() {
                    return Self(v4.to_string());
                }
                let seg = v6.segments();
                let prefix: Vec<String> = seg[..IPV6_PREFIX_SEGMENTS]
                    .iter()
                    .map(|s| format!("{:x}", s))
                    .collect();
                Self(format!("{}::/64", prefix.join(":")))
            }
        }
    }

    /// Origin used when no client address can be determined.
    pub fn unknown() -> Self {
        Self(UNKNOWN_ORIGIN.to_string())
    }

    /// The bucket key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_forwarded_for_takes_first_address() {
        let origin = ClientOrigin::from_headers(
            Some("203.0.113.50, 70.41.3.18"),
            Some("198.51.100.25"),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
        );
        assert_eq!(origin.as_str(), "203.0.113.50");
    }

    #[test]
    fn test_falls_back_in_order() {
        let peer = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));

        let origin = ClientOrigin::from_headers(Some("garbage"), Some(" 198.51.100.25 "), peer);
        assert_eq!(origin.as_str(), "198.51.100.25");

        let origin = ClientOrigin::from_headers(None, None, peer);
        assert_eq!(origin.as_str(), "10.0.0.1");

        let origin = ClientOrigin::from_headers(None, None, None);
        assert_eq!(origin, ClientOrigin::unknown());
        assert_eq!(origin.to_string(), "unknown");
    }

    #[test]
    fn test_ipv6_collapses_to_prefix() {
        let a = ClientOrigin::from_ip(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0x85a3, 0x1234, 0, 0, 0, 1)));
        let b = ClientOrigin::from_ip(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0x85a3, 0x1234, 9, 9, 9, 9)));
        assert_eq!(a.as_str(), "2001:db8:85a3:1234::/64");
        assert_eq!(a, b);
    }

    #[test]
    fn test_ipv4_mapped_ipv6_reads_as_ipv4() {
        let ip: IpAddr = "::ffff:192.0.2.7".parse().unwrap();
        assert_eq!(ClientOrigin::from_ip(ip).as_str(), "192.0.2.7");
    }
}
