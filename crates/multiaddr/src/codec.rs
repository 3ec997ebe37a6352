//! Value grammars of the multiaddr protocols.
//!
//! Every registered protocol owns one [`Codec`], which converts between the
//! canonical [`Value`] and its text/binary forms. The binary framing (fixed
//! length or varint length prefix) is derived from [`ValueKind`] by the
//! address stack, so a codec only ever sees its own payload.

use std::{
    fmt::{self, Display},
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use data_encoding::BASE32_NOPAD;
use multihash::Multihash;

use crate::errors::ValueError;

/// The shape of a protocol value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The protocol carries no value.
    None,
    /// A value with a statically known byte length.
    Fixed(usize),
    /// Raw bytes prefixed with a varint length.
    LengthPrefixed,
    /// UTF8 text prefixed with a varint length.
    Utf8,
}

impl ValueKind {
    /// Returns true if the protocol is followed by a value token in text form.
    pub fn has_value(&self) -> bool {
        !matches!(self, ValueKind::None)
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::None => write!(f, "none"),
            ValueKind::Fixed(len) => write!(f, "fixed({})", len),
            ValueKind::LengthPrefixed => write!(f, "length-prefixed"),
            ValueKind::Utf8 => write!(f, "utf8"),
        }
    }
}

/// Canonical in-memory value of one multiaddr segment.
///
/// Equality and hashing of segments are defined on this representation,
/// independent of the text that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Empty,
    Ip4(Ipv4Addr),
    Ip6(Ipv6Addr),
    Port(u16),
    /// CIDR routing prefix length.
    Prefix(u8),
    Text(String),
    /// Arbitrary payload of a length-prefixed protocol.
    Bytes(Vec<u8>),
    /// Multihash of a peer identity.
    PeerId(Multihash<64>),
    /// Tor hidden service id plus its virtual port.
    Onion { service: Vec<u8>, port: u16 },
}

/// The four value operations of one protocol.
pub trait Codec: Send + Sync {
    /// Returns the wire shape of the values handled by this codec.
    fn kind(&self) -> ValueKind;

    /// Returns true if `value` has the shape this codec produces.
    fn accepts(&self, value: &Value) -> bool;

    /// Parse the text token that follows the protocol name.
    fn parse_text(&self, text: &str) -> Result<Value, ValueError>;

    /// Write the text token of `value`.
    fn format_text(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    /// Decode the value payload, without its framing.
    fn read_binary(&self, buf: &[u8]) -> Result<Value, ValueError>;

    /// Encode the value payload, without its framing.
    fn write_binary(&self, value: &Value, buf: &mut Vec<u8>);
}

fn check_len(buf: &[u8], expected: usize) -> Result<(), ValueError> {
    if buf.len() != expected {
        return Err(ValueError::Length {
            expected,
            actual: buf.len(),
        });
    }

    Ok(())
}

fn parse_decimal<T: FromStr<Err = std::num::ParseIntError>>(text: &str) -> Result<T, ValueError> {
    if text.is_empty() || !text.bytes().all(|c| c.is_ascii_digit()) {
        return Err(ValueError::NotDigits(text.to_owned()));
    }

    Ok(text.parse()?)
}

/// Codec of protocols without value, e.g. `http`, `p2p-circuit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyCodec;

impl Codec for EmptyCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::None
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Empty)
    }

    fn parse_text(&self, _text: &str) -> Result<Value, ValueError> {
        Ok(Value::Empty)
    }

    fn format_text(&self, _value: &Value, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }

    fn read_binary(&self, _buf: &[u8]) -> Result<Value, ValueError> {
        Ok(Value::Empty)
    }

    fn write_binary(&self, _value: &Value, _buf: &mut Vec<u8>) {}
}

/// Codec of `ip4`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ip4Codec;

impl Codec for Ip4Codec {
    fn kind(&self) -> ValueKind {
        ValueKind::Fixed(4)
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Ip4(_))
    }

    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        Ok(Value::Ip4(text.parse()?))
    }

    fn format_text(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value {
            Value::Ip4(addr) => write!(f, "{}", addr),
            _ => Ok(()),
        }
    }

    fn read_binary(&self, buf: &[u8]) -> Result<Value, ValueError> {
        check_len(buf, 4)?;

        Ok(Value::Ip4(Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3])))
    }

    fn write_binary(&self, value: &Value, buf: &mut Vec<u8>) {
        if let Value::Ip4(addr) = value {
            buf.extend_from_slice(&addr.octets());
        }
    }
}

/// Codec of `ip6`.
///
/// A `%scope-id` suffix is accepted in text and dropped, so it never takes
/// part in formatting or equality.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ip6Codec;

impl Codec for Ip6Codec {
    fn kind(&self) -> ValueKind {
        ValueKind::Fixed(16)
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Ip6(_))
    }

    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        let addr = text.split_once('%').map_or(text, |(addr, _)| addr);

        Ok(Value::Ip6(addr.parse()?))
    }

    fn format_text(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value {
            Value::Ip6(addr) => write!(f, "{}", addr),
            _ => Ok(()),
        }
    }

    fn read_binary(&self, buf: &[u8]) -> Result<Value, ValueError> {
        check_len(buf, 16)?;

        let mut octets = [0u8; 16];
        octets.copy_from_slice(buf);

        Ok(Value::Ip6(Ipv6Addr::from(octets)))
    }

    fn write_binary(&self, value: &Value, buf: &mut Vec<u8>) {
        if let Value::Ip6(addr) = value {
            buf.extend_from_slice(&addr.octets());
        }
    }
}

/// Codec of 16-bit port protocols: `tcp`, `udp`, `dccp`, `sctp`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortCodec;

impl Codec for PortCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Fixed(2)
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Port(_))
    }

    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        Ok(Value::Port(parse_decimal(text)?))
    }

    fn format_text(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value {
            Value::Port(port) => write!(f, "{}", port),
            _ => Ok(()),
        }
    }

    fn read_binary(&self, buf: &[u8]) -> Result<Value, ValueError> {
        check_len(buf, 2)?;

        Ok(Value::Port(u16::from_be_bytes([buf[0], buf[1]])))
    }

    fn write_binary(&self, value: &Value, buf: &mut Vec<u8>) {
        if let Value::Port(port) = value {
            buf.extend_from_slice(&port.to_be_bytes());
        }
    }
}

/// Codec of `ipcidr`, a one byte routing prefix length.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrefixCodec;

impl Codec for PrefixCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Fixed(1)
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Prefix(_))
    }

    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        Ok(Value::Prefix(parse_decimal(text)?))
    }

    fn format_text(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value {
            Value::Prefix(prefix) => write!(f, "{}", prefix),
            _ => Ok(()),
        }
    }

    fn read_binary(&self, buf: &[u8]) -> Result<Value, ValueError> {
        check_len(buf, 1)?;

        Ok(Value::Prefix(buf[0]))
    }

    fn write_binary(&self, value: &Value, buf: &mut Vec<u8>) {
        if let Value::Prefix(prefix) = value {
            buf.push(*prefix);
        }
    }
}

/// Text values can't be empty or contain the `/` separator.
fn check_text(text: &str) -> Result<(), ValueError> {
    if text.is_empty() {
        return Err(ValueError::Empty);
    }

    if text.contains('/') {
        return Err(ValueError::Invalid(format!("'{}' contains '/'", text)));
    }

    Ok(())
}

/// Codec of text protocols: `dns`, `dns4`, `dns6`, `dnsaddr`, `ip6zone`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Codec;

impl Codec for Utf8Codec {
    fn kind(&self) -> ValueKind {
        ValueKind::Utf8
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Text(text) if !text.is_empty() && !text.contains('/'))
    }

    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        check_text(text)?;

        Ok(Value::Text(text.to_owned()))
    }

    fn format_text(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value {
            Value::Text(text) => f.write_str(text),
            _ => Ok(()),
        }
    }

    fn read_binary(&self, buf: &[u8]) -> Result<Value, ValueError> {
        let text = String::from_utf8(buf.to_vec())?;

        check_text(&text)?;

        Ok(Value::Text(text))
    }

    fn write_binary(&self, value: &Value, buf: &mut Vec<u8>) {
        if let Value::Text(text) = value {
            buf.extend_from_slice(text.as_bytes());
        }
    }
}

/// Codec of the peer identity protocol (`p2p`, legacy name `ipfs`).
///
/// Text form is base-58, binary form is the raw multihash bytes. Any multihash
/// with a digest of at most 64 bytes is accepted, see
/// [`Multiaddr::peer_id`](crate::Multiaddr::peer_id) for the typed conversion.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeerIdCodec;

impl Codec for PeerIdCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::LengthPrefixed
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::PeerId(_))
    }

    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        if text.is_empty() {
            return Err(ValueError::Empty);
        }

        let buf = bs58::decode(text).into_vec()?;

        self.read_binary(&buf)
    }

    fn format_text(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value {
            Value::PeerId(multihash) => {
                f.write_str(&bs58::encode(multihash.to_bytes()).into_string())
            }
            _ => Ok(()),
        }
    }

    fn read_binary(&self, buf: &[u8]) -> Result<Value, ValueError> {
        Ok(Value::PeerId(Multihash::from_bytes(buf)?))
    }

    fn write_binary(&self, value: &Value, buf: &mut Vec<u8>) {
        if let Value::PeerId(multihash) = value {
            buf.extend_from_slice(&multihash.to_bytes());
        }
    }
}

/// Codec of length-prefixed binary protocols, text form is lowercase hex.
///
/// Values can't be empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::LengthPrefixed
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(buf) if !buf.is_empty())
    }

    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        self.read_binary(&hex::decode(text)?)
    }

    fn format_text(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value {
            Value::Bytes(buf) => f.write_str(&hex::encode(buf)),
            _ => Ok(()),
        }
    }

    fn read_binary(&self, buf: &[u8]) -> Result<Value, ValueError> {
        if buf.is_empty() {
            return Err(ValueError::Empty);
        }

        Ok(Value::Bytes(buf.to_vec()))
    }

    fn write_binary(&self, value: &Value, buf: &mut Vec<u8>) {
        if let Value::Bytes(payload) = value {
            buf.extend_from_slice(payload);
        }
    }
}

/// Codec of Tor hidden service addresses, `<base32 service id>:<port>`.
///
/// `onion` ids are 10 bytes (16 chars), `onion3` ids are 35 bytes (56 chars).
/// The port must be non-zero.
#[derive(Debug, Clone, Copy)]
pub struct OnionCodec {
    service_len: usize,
}

impl OnionCodec {
    /// Codec of version 2 addresses (`onion`).
    pub const V2: OnionCodec = OnionCodec { service_len: 10 };

    /// Codec of version 3 addresses (`onion3`).
    pub const V3: OnionCodec = OnionCodec { service_len: 35 };

    fn service_chars(&self) -> usize {
        BASE32_NOPAD.encode_len(self.service_len)
    }
}

impl Codec for OnionCodec {
    fn kind(&self) -> ValueKind {
        ValueKind::Fixed(self.service_len + 2)
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Onion { service, port } if service.len() == self.service_len && *port != 0)
    }

    fn parse_text(&self, text: &str) -> Result<Value, ValueError> {
        let (service, port) = text
            .split_once(':')
            .ok_or_else(|| ValueError::Invalid(format!("'{}' has no port", text)))?;

        if service.len() != self.service_chars() {
            return Err(ValueError::Invalid(format!(
                "service id '{}' must be {} characters",
                service,
                self.service_chars()
            )));
        }

        let service = BASE32_NOPAD.decode(service.to_ascii_uppercase().as_bytes())?;

        let port: u16 = parse_decimal(port)?;

        if port == 0 {
            return Err(ValueError::ZeroPort);
        }

        Ok(Value::Onion { service, port })
    }

    fn format_text(&self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value {
            Value::Onion { service, port } => write!(
                f,
                "{}:{}",
                BASE32_NOPAD.encode(service).to_ascii_lowercase(),
                port
            ),
            _ => Ok(()),
        }
    }

    fn read_binary(&self, buf: &[u8]) -> Result<Value, ValueError> {
        check_len(buf, self.service_len + 2)?;

        let (service, port) = buf.split_at(self.service_len);

        let port = u16::from_be_bytes([port[0], port[1]]);

        if port == 0 {
            return Err(ValueError::ZeroPort);
        }

        Ok(Value::Onion {
            service: service.to_vec(),
            port,
        })
    }

    fn write_binary(&self, value: &Value, buf: &mut Vec<u8>) {
        if let Value::Onion { service, port } = value {
            buf.extend_from_slice(service);
            buf.extend_from_slice(&port.to_be_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Text<'a, C>(&'a C, &'a Value);

    impl<'a, C: Codec> Display for Text<'a, C> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.format_text(self.1, f)
        }
    }

    fn binary<C: Codec>(codec: &C, value: &Value) -> Vec<u8> {
        let mut buf = vec![];
        codec.write_binary(value, &mut buf);
        buf
    }

    #[test]
    fn ports() {
        assert_eq!(PortCodec.parse_text("65535").unwrap(), Value::Port(65535));
        assert_eq!(PortCodec.parse_text("0").unwrap(), Value::Port(0));

        assert!(matches!(
            PortCodec.parse_text("65536"),
            Err(ValueError::Int(_))
        ));

        for bad in ["x", "", "+80", "-1", " 80", "80 "] {
            assert!(
                matches!(PortCodec.parse_text(bad), Err(ValueError::NotDigits(_))),
                "{}",
                bad
            );
        }

        assert_eq!(binary(&PortCodec, &Value::Port(1234)), [0x04, 0xd2]);
        assert_eq!(
            PortCodec.read_binary(&[0x10, 0xe1]).unwrap(),
            Value::Port(4321)
        );
        assert!(PortCodec.read_binary(&[0x10]).is_err());
    }

    #[test]
    fn ip4() {
        let value = Ip4Codec.parse_text("127.0.0.1").unwrap();

        assert_eq!(binary(&Ip4Codec, &value), [127, 0, 0, 1]);
        assert_eq!(Text(&Ip4Codec, &value).to_string(), "127.0.0.1");

        for bad in ["x", "127.", "::1", "256.0.0.1"] {
            assert!(Ip4Codec.parse_text(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn ip6_scope_id() {
        let scoped = Ip6Codec.parse_text("fe80::7573:b0a8:46b0:0bad%17").unwrap();
        let plain = Ip6Codec.parse_text("fe80::7573:b0a8:46b0:0bad").unwrap();

        assert_eq!(scoped, plain);
        assert_eq!(
            Text(&Ip6Codec, &scoped).to_string(),
            "fe80::7573:b0a8:46b0:bad"
        );

        for bad in ["x", "03:", "127.0.0.1"] {
            assert!(Ip6Codec.parse_text(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn utf8() {
        assert_eq!(
            Utf8Codec.parse_text("ipfs.io").unwrap(),
            Value::Text("ipfs.io".to_owned())
        );
        assert!(matches!(Utf8Codec.parse_text(""), Err(ValueError::Empty)));
        assert!(matches!(
            Utf8Codec.read_binary(&[0xff, 0xfe]),
            Err(ValueError::Utf8(_))
        ));
        assert!(matches!(
            Utf8Codec.read_binary(b"a/b"),
            Err(ValueError::Invalid(_))
        ));
        assert!(matches!(Utf8Codec.read_binary(b""), Err(ValueError::Empty)));
        assert!(!Utf8Codec.accepts(&Value::Text("a/b".to_owned())));
    }

    #[test]
    fn onion() {
        let value = OnionCodec::V2.parse_text("aaimaq4ygg2iegci:80").unwrap();

        assert_eq!(
            binary(&OnionCodec::V2, &value),
            [0x00, 0x10, 0xc0, 0x43, 0x98, 0x31, 0xb4, 0x82, 0x18, 0x48, 0x00, 0x50]
        );

        assert_eq!(
            Text(&OnionCodec::V2, &value).to_string(),
            "aaimaq4ygg2iegci:80"
        );

        // upper case ids are accepted and normalized.
        assert_eq!(
            OnionCodec::V2.parse_text("AAIMAQ4YGG2IEGCI:80").unwrap(),
            value
        );
    }

    #[test]
    fn onion_rejected() {
        for bad in [
            "9imaq4ygg2iegci7:80",
            "aaimaq4ygg2iegci7:80",
            "timaq4ygg2iegci7:0",
            "timaq4ygg2iegci7:-1",
            "timaq4ygg2iegci7",
            "timaq4ygg2iegci@:666",
            "timaq4ygg2iegci7:65536",
        ] {
            assert!(OnionCodec::V2.parse_text(bad).is_err(), "{}", bad);
        }

        let mut zero_port = vec![0u8; 10];
        zero_port.extend_from_slice(&[0, 0]);

        assert!(matches!(
            OnionCodec::V2.read_binary(&zero_port),
            Err(ValueError::ZeroPort)
        ));
    }

    #[test]
    fn onion3() {
        let text = "vww6ybal4bd7szmgncyruucpgfkqahzddi37ktceo3ah7ngmcopnpyyd:1234";

        let value = OnionCodec::V3.parse_text(text).unwrap();

        assert_eq!(binary(&OnionCodec::V3, &value).len(), 37);
        assert_eq!(Text(&OnionCodec::V3, &value).to_string(), text);
    }

    #[test]
    fn peer_id() {
        let text = "QmcgpsyWgH8Y8ajJz1Cu72KnS5uo2Aa2LpzU7kinSupNKC";

        let value = PeerIdCodec.parse_text(text).unwrap();

        let buf = binary(&PeerIdCodec, &value);

        assert_eq!(buf.len(), 34);
        assert_eq!(&buf[..2], [0x12, 0x20]);
        assert_eq!(PeerIdCodec.read_binary(&buf).unwrap(), value);
        assert_eq!(Text(&PeerIdCodec, &value).to_string(), text);

        assert!(matches!(
            PeerIdCodec.parse_text("0OIl"),
            Err(ValueError::Base58(_))
        ));
        assert!(matches!(
            PeerIdCodec.parse_text("abc"),
            Err(ValueError::Multihash(_))
        ));
    }

    #[test]
    fn peer_id_any_multihash() {
        // sha2-512
        let text = "8VvbfVXpVqx2ULK2zvdDAUAuQAqgHwQ3wreUoC2DU3WLktWBeVV538XH68kFxSREMRsVFfga1GAvQHRX3iaaosh5xm";

        let value = PeerIdCodec.parse_text(text).unwrap();

        let buf = binary(&PeerIdCodec, &value);

        assert_eq!(buf.len(), 66);
        assert_eq!(&buf[..2], [0x13, 0x40]);
        assert_eq!(Text(&PeerIdCodec, &value).to_string(), text);

        // blake2b-256, a multi-byte hash code.
        let text = "2DrjgbEM4KVyc4CVtMDukb6C59dvx1feQT4G8RovYYegg8Vfb5";

        let value = PeerIdCodec.parse_text(text).unwrap();

        assert_eq!(&binary(&PeerIdCodec, &value)[..4], [0xa0, 0xe4, 0x02, 0x20]);

        // digest shorter than its declared size.
        assert!(PeerIdCodec.read_binary(&[0x12, 0x20, 0x01]).is_err());
    }

    #[test]
    fn bytes() {
        let value = BytesCodec.parse_text("00ff10").unwrap();

        assert_eq!(value, Value::Bytes(vec![0x00, 0xff, 0x10]));
        assert_eq!(binary(&BytesCodec, &value), [0x00, 0xff, 0x10]);
        assert_eq!(Text(&BytesCodec, &value).to_string(), "00ff10");
        assert_eq!(BytesCodec.parse_text("00FF10").unwrap(), value);

        assert!(matches!(BytesCodec.parse_text("0"), Err(ValueError::Hex(_))));
        assert!(matches!(BytesCodec.parse_text(""), Err(ValueError::Empty)));
        assert!(matches!(BytesCodec.read_binary(&[]), Err(ValueError::Empty)));
        assert!(!BytesCodec.accepts(&Value::Bytes(vec![])));
    }

    #[test]
    fn accepts() {
        assert!(PortCodec.accepts(&Value::Port(1)));
        assert!(!PortCodec.accepts(&Value::Prefix(1)));
        assert!(EmptyCodec.accepts(&Value::Empty));
        assert!(!Utf8Codec.accepts(&Value::Text(String::new())));
        assert!(!OnionCodec::V2.accepts(&Value::Onion {
            service: vec![0; 10],
            port: 0
        }));
    }
}
