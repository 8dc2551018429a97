//! Service address carried in masternode broadcasts.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NetAddr {
    pub ip: IpAddr,
    pub port: u16,
}

impl NetAddr {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn is_ipv4(&self) -> bool {
        self.ip.is_ipv4()
    }

    pub fn is_ipv6(&self) -> bool {
        self.ip.is_ipv6()
    }

    pub fn is_rfc1918(&self) -> bool {
        match self.ip {
            IpAddr::V4(ip) => ip.is_private(),
            IpAddr::V6(_) => false,
        }
    }

    pub fn is_local(&self) -> bool {
        match self.ip {
            IpAddr::V4(ip) => ip.is_loopback() || ip.octets()[0] == 0,
            IpAddr::V6(ip) => ip.is_loopback(),
        }
    }

    pub fn is_routable(&self) -> bool {
        if self.is_local() || self.is_rfc1918() {
            return false;
        }
        match self.ip {
            IpAddr::V4(ip) => !(ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast()),
            IpAddr::V6(ip) => !ip.is_unspecified(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl From<SocketAddr> for NetAddr {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

impl Encodable for NetAddr {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        let v6 = match self.ip {
            IpAddr::V4(ip) => ip.to_ipv6_mapped(),
            IpAddr::V6(ip) => ip,
        };
        encoder.write_bytes(&v6.octets());
        encoder.write_bytes(&self.port.to_be_bytes());
    }
}

impl Decodable for NetAddr {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let octets = decoder.read_fixed::<16>()?;
        let port = u16::from_be_bytes(decoder.read_fixed::<2>()?);
        let v6 = Ipv6Addr::from(octets);
        let ip = match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        };
        Ok(Self { ip, port })
    }
}

impl Default for NetAddr {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{decode, encode};

    #[test]
    fn ipv4_is_mapped_on_the_wire() {
        let addr = NetAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)), 29_500);
        let bytes = encode(&addr);
        assert_eq!(bytes.len(), 18);
        assert_eq!(&bytes[10..12], &[0xff, 0xff]);
        assert_eq!(&bytes[16..], &29_500u16.to_be_bytes());
        let decoded: NetAddr = decode(&bytes).expect("decode");
        assert_eq!(decoded, addr);
    }

    #[test]
    fn classification() {
        let private = NetAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)), 1);
        assert!(private.is_rfc1918());
        assert!(!private.is_routable());
        let local = NetAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1);
        assert!(local.is_local());
        let public = NetAddr::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), 1);
        assert!(public.is_routable());
        assert!(public.is_ipv4());
    }
}
