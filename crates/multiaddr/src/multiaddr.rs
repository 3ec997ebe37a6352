use std::{
    borrow::Cow,
    fmt::{self, Debug, Display},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    str::FromStr,
};

use libp2p_identity::PeerId;
use multihash::Multihash;

use crate::{
    codec::Value,
    errors::{Error, FormatError, Result},
    registry::{global_registry, well_known, Registry, P2P_CODE},
    segment::Segment,
};

/// A self-describing network address: an ordered stack of protocol segments,
/// outermost first.
///
/// ```
/// use xstack_multiaddr::Multiaddr;
///
/// let addr: Multiaddr = "/ip4/127.0.0.1/udp/1234".parse().unwrap();
///
/// assert_eq!(addr.to_vec(), [0x04, 127, 0, 0, 1, 0x91, 0x02, 0x04, 0xd2]);
/// assert_eq!(addr.to_string(), "/ip4/127.0.0.1/udp/1234");
/// ```
///
/// A `Multiaddr` never changes once built. The peer id helpers return a
/// [`Cow`] that borrows `self` when nothing needs to change.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Multiaddr {
    segments: Vec<Segment>,
}

impl Multiaddr {
    /// Create an address without segments.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Parse text form with the [`global_registry`].
    ///
    /// Empty and whitespace-only input yields an empty address.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(text, global_registry())
    }

    /// Like [`parse`](Self::parse), a `None` input yields an empty address.
    pub fn parse_opt(text: Option<&str>) -> Result<Self> {
        match text {
            Some(text) => Self::parse(text),
            None => Ok(Self::empty()),
        }
    }

    /// Parse text form, resolving protocol names with `registry`.
    pub fn parse_with(text: &str, registry: &Registry) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }

        let mut tokens = text.split('/');

        if tokens.next() != Some("") {
            return Err(FormatError::MissingLeadingSlash(text.to_owned()).into());
        }

        let mut segments = vec![];

        while let Some(name) = tokens.next() {
            if name.is_empty() {
                return Err(FormatError::MissingProtocolName.into());
            }

            let protocol = registry
                .lookup_by_name(name)
                .map_err(|_| FormatError::UnknownProtocolName(name.to_owned()))?;

            let value = if protocol.kind().has_value() {
                tokens
                    .next()
                    .ok_or_else(|| FormatError::MissingValue(protocol.name().to_owned()))?
            } else {
                ""
            };

            segments.push(Segment::from_text(protocol, value)?);
        }

        log::trace!("parse multiaddr text={}, segments={}", text, segments.len());

        Ok(Self { segments })
    }

    /// Parse binary form with the [`global_registry`].
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        Self::from_bytes_with(buf, global_registry())
    }

    /// Parse binary form, resolving protocol codes with `registry`.
    pub fn from_bytes_with(mut buf: &[u8], registry: &Registry) -> Result<Self> {
        let mut segments = vec![];

        while !buf.is_empty() {
            let (segment, rest) = Segment::decode(registry, buf)?;

            segments.push(segment);

            buf = rest;
        }

        log::trace!("parse multiaddr binary, segments={}", segments.len());

        Ok(Self { segments })
    }

    /// Parse text form, returns `None` on any failure.
    pub fn try_parse(text: &str) -> Option<Self> {
        match Self::parse(text) {
            Ok(addr) => Some(addr),
            Err(err) => {
                log::debug!("try_parse '{}' failed: {}", text, err);
                None
            }
        }
    }

    /// Parse binary form, returns `None` on any failure.
    pub fn try_from_bytes(buf: &[u8]) -> Option<Self> {
        match Self::from_bytes(buf) {
            Ok(addr) => Some(addr),
            Err(err) => {
                log::debug!("try_from_bytes, len={} failed: {}", buf.len(), err);
                None
            }
        }
    }

    /// Returns the binary form.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = vec![];

        for segment in &self.segments {
            segment.encode(&mut buf);
        }

        buf
    }

    /// Returns a new address with `segment` appended.
    pub fn with(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the protocol names, outermost first.
    pub fn protocol_stack(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|segment| segment.name())
    }

    /// Returns the multihash of the trailing `p2p`/`ipfs` segment.
    pub fn peer_id_multihash(&self) -> Option<Multihash<64>> {
        let segment = self.segments.last()?;

        if segment.code() != P2P_CODE {
            return None;
        }

        match segment.value() {
            Value::PeerId(multihash) => Some(*multihash),
            _ => None,
        }
    }

    /// Returns true if the last segment is a peer id, under either `p2p` or `ipfs`.
    pub fn has_peer_id(&self) -> bool {
        self.peer_id_multihash().is_some()
    }

    /// Returns the trailing peer id.
    ///
    /// Fails with [`Error::PeerId`] if the multihash is not a libp2p peer id
    /// (sha2-256 or identity).
    pub fn peer_id(&self) -> Result<PeerId> {
        let multihash = self.peer_id_multihash().ok_or(Error::MissingPeerId)?;

        Ok(PeerId::from_bytes(&multihash.to_bytes())?)
    }

    /// Returns an address that ends with `/p2p/<peer_id>`.
    ///
    /// Borrows `self` if it already ends with `peer_id`, fails with
    /// [`Error::PeerIdMismatch`] if it ends with another peer id.
    pub fn with_peer_id(&self, peer_id: PeerId) -> Result<Cow<'_, Self>> {
        let expected = Multihash::from(peer_id);

        match self.peer_id_multihash() {
            Some(actual) if actual == expected => Ok(Cow::Borrowed(self)),
            Some(actual) => Err(Error::PeerIdMismatch {
                expected: peer_id,
                actual,
            }),
            None => {
                let segment =
                    Segment::unchecked(well_known().p2p.clone(), Value::PeerId(expected));

                Ok(Cow::Owned(self.clone().with(segment)))
            }
        }
    }

    /// Returns an address without the trailing peer id segment.
    ///
    /// Borrows `self` if there is no trailing peer id.
    pub fn without_peer_id(&self) -> Cow<'_, Self> {
        if !self.has_peer_id() {
            return Cow::Borrowed(self);
        }

        let segments = self.segments[..self.segments.len() - 1].to_vec();

        Cow::Owned(Self { segments })
    }
}

impl Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }

        Ok(())
    }
}

impl Debug for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiaddr({})", self)
    }
}

impl FromStr for Multiaddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Multiaddr {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Multiaddr {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&[u8]> for Multiaddr {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        Self::from_bytes(value)
    }
}

impl TryFrom<Vec<u8>> for Multiaddr {
    type Error = Error;

    fn try_from(value: Vec<u8>) -> Result<Self> {
        Self::from_bytes(&value)
    }
}

impl FromIterator<Segment> for Multiaddr {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Multiaddr {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl From<Ipv4Addr> for Multiaddr {
    fn from(value: Ipv4Addr) -> Self {
        Self::empty().with(Segment::unchecked(
            well_known().ip4.clone(),
            Value::Ip4(value),
        ))
    }
}

impl From<Ipv6Addr> for Multiaddr {
    fn from(value: Ipv6Addr) -> Self {
        Self::empty().with(Segment::unchecked(
            well_known().ip6.clone(),
            Value::Ip6(value),
        ))
    }
}

impl From<IpAddr> for Multiaddr {
    fn from(value: IpAddr) -> Self {
        match value {
            IpAddr::V4(addr) => addr.into(),
            IpAddr::V6(addr) => addr.into(),
        }
    }
}

impl From<SocketAddr> for Multiaddr {
    /// Returns `/ip4/<ip>/tcp/<port>` or `/ip6/<ip>/tcp/<port>`.
    fn from(value: SocketAddr) -> Self {
        Self::from(value.ip()).with(Segment::unchecked(
            well_known().tcp.clone(),
            Value::Port(value.port()),
        ))
    }
}

/// A trait convert object to [`SocketAddr`]
pub trait ToSockAddr {
    type Error;
    fn to_sockaddr(&self) -> std::result::Result<SocketAddr, Self::Error>;
}

impl ToSockAddr for Multiaddr {
    type Error = Error;

    /// Convert `/ip{4,6}/<ip>/{tcp,udp}/<port>...` into a [`SocketAddr`].
    fn to_sockaddr(&self) -> Result<SocketAddr> {
        let unsupported = || Error::Argument(format!("'{}' is not an ip/port multiaddr", self));

        let mut iter = self.iter();

        let ip = match iter.next().map(|segment| segment.value()) {
            Some(Value::Ip4(ip)) => IpAddr::from(*ip),
            Some(Value::Ip6(ip)) => IpAddr::from(*ip),
            _ => return Err(unsupported()),
        };

        match iter.next() {
            Some(segment) if matches!(segment.name(), "tcp" | "udp") => match segment.value() {
                Value::Port(port) => Ok(SocketAddr::new(ip, *port)),
                _ => Err(unsupported()),
            },
            _ => Err(unsupported()),
        }
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::*;

    use super::*;

    fn builtin_segment(name: &str, value: Value) -> Segment {
        Segment::new(global_registry().lookup_by_name(name).unwrap(), value).unwrap()
    }

    impl Arbitrary for Multiaddr {
        fn arbitrary(g: &mut Gen) -> Multiaddr {
            let len = usize::arbitrary(g) % 6;

            (0..len)
                .map(|_| match u8::arbitrary(g) % 6 {
                    0 => builtin_segment("ip4", Value::Ip4(Ipv4Addr::arbitrary(g))),
                    1 => builtin_segment("ip6", Value::Ip6(Ipv6Addr::arbitrary(g))),
                    2 => builtin_segment("tcp", Value::Port(u16::arbitrary(g))),
                    3 => builtin_segment("udp", Value::Port(u16::arbitrary(g))),
                    4 => builtin_segment("ipcidr", Value::Prefix(u8::arbitrary(g))),
                    _ => builtin_segment(
                        g.choose(&["ws", "wss", "quic", "p2p-circuit"]).unwrap(),
                        Value::Empty,
                    ),
                })
                .collect()
        }
    }

    #[test]
    fn text_round_trip() {
        fn prop(addr: Multiaddr) -> bool {
            Multiaddr::parse(&addr.to_string()).unwrap() == addr
        }
        quickcheck(prop as fn(_) -> _)
    }

    #[test]
    fn binary_round_trip() {
        fn prop(addr: Multiaddr) -> bool {
            let buf = addr.to_vec();
            let decoded = Multiaddr::from_bytes(&buf).unwrap();

            decoded == addr && decoded.to_vec() == buf
        }
        quickcheck(prop as fn(_) -> _)
    }

    #[test]
    fn socket_addr_round_trip() {
        fn prop(addr: SocketAddr) -> bool {
            // flowinfo and scope id of v6 addresses are not carried.
            let decoded = Multiaddr::from(addr).to_sockaddr().unwrap();

            decoded.ip() == addr.ip() && decoded.port() == addr.port()
        }
        quickcheck(prop as fn(_) -> _)
    }

    #[test]
    fn to_sockaddr_rejects() {
        for addr in ["/ip4/127.0.0.1", "/dns/ipfs.io/tcp/80", "/ip4/127.0.0.1/ws"] {
            let addr = Multiaddr::parse(addr).unwrap();

            assert!(matches!(addr.to_sockaddr(), Err(Error::Argument(_))));
        }

        assert_eq!(
            Multiaddr::parse("/ip6/::1/udp/4001/quic")
                .unwrap()
                .to_sockaddr()
                .unwrap(),
            "[::1]:4001".parse().unwrap()
        );
    }

    #[test]
    fn protocol_stack() {
        let addr = Multiaddr::parse("/ip4/1.2.3.4/tcp/80/ws").unwrap();

        assert_eq!(
            addr.protocol_stack().collect::<Vec<_>>(),
            ["ip4", "tcp", "ws"]
        );
        assert_eq!(format!("{:?}", addr), "Multiaddr(/ip4/1.2.3.4/tcp/80/ws)");
    }
}
