use std::{
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
};

use crate::{
    codec::{Value, ValueKind},
    errors::{DataError, Error, FormatError, Result},
    registry::{Protocol, Registry},
};

/// One `(protocol, value)` layer of a [`Multiaddr`](crate::Multiaddr).
///
/// Two segments are equal when their protocol codes and canonical values are
/// equal, so the peer id aliases `p2p` and `ipfs` compare equal.
#[derive(Clone)]
pub struct Segment {
    protocol: Protocol,
    value: Value,
}

impl Segment {
    /// Create a segment from a registered protocol and a value of the shape
    /// its codec accepts.
    pub fn new(protocol: Protocol, value: Value) -> Result<Self> {
        if !protocol.codec().accepts(&value) {
            return Err(Error::Argument(format!(
                "protocol '{}' does not accept value {:?}",
                protocol.name(),
                value
            )));
        }

        Ok(Self { protocol, value })
    }

    /// Create a segment by parsing the text form of a value.
    ///
    /// `text` is ignored by protocols without value.
    pub fn from_text(protocol: Protocol, text: &str) -> Result<Self> {
        if !protocol.kind().has_value() {
            return Ok(Self::unchecked(protocol, Value::Empty));
        }

        let value =
            protocol
                .codec()
                .parse_text(text)
                .map_err(|source| FormatError::InvalidValue {
                    protocol: protocol.name().to_owned(),
                    source,
                })?;

        Ok(Self::unchecked(protocol, value))
    }

    pub(crate) fn unchecked(protocol: Protocol, value: Value) -> Self {
        Self { protocol, value }
    }

    /// The protocol this segment was parsed or built with.
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Shortcut of `self.protocol().name()`.
    pub fn name(&self) -> &str {
        self.protocol.name()
    }

    /// Shortcut of `self.protocol().code()`.
    pub fn code(&self) -> u32 {
        self.protocol.code()
    }

    /// The canonical value, [`Value::Empty`] for protocols without value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the segment, returning its value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Returns the text form of the value, empty for protocols without value.
    pub fn value_text(&self) -> String {
        ValueText(self).to_string()
    }

    /// Append the binary form, varint code followed by the framed value, to `buf`.
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        let mut code_buf = unsigned_varint::encode::u32_buffer();

        buf.extend_from_slice(unsigned_varint::encode::u32(self.code(), &mut code_buf));

        let codec = self.protocol.codec();

        match self.protocol.kind() {
            ValueKind::None => {}
            ValueKind::Fixed(_) => codec.write_binary(&self.value, buf),
            ValueKind::LengthPrefixed | ValueKind::Utf8 => {
                let mut payload = vec![];

                codec.write_binary(&self.value, &mut payload);

                let mut len_buf = unsigned_varint::encode::usize_buffer();

                buf.extend_from_slice(unsigned_varint::encode::usize(payload.len(), &mut len_buf));
                buf.extend_from_slice(&payload);
            }
        }
    }

    /// Decode one segment from the front of `buf`, returns it with the unread remainder.
    pub(crate) fn decode<'a>(registry: &Registry, buf: &'a [u8]) -> Result<(Self, &'a [u8])> {
        let (code, rest) = unsigned_varint::decode::u32(buf).map_err(DataError::from)?;

        let protocol = registry
            .lookup_by_code(code)
            .map_err(|_| DataError::UnknownCode(code))?;

        let (payload, rest) = match protocol.kind() {
            ValueKind::None => rest.split_at(0),
            ValueKind::Fixed(len) => split(rest, len)?,
            ValueKind::LengthPrefixed | ValueKind::Utf8 => {
                let (len, rest) = unsigned_varint::decode::usize(rest).map_err(DataError::from)?;

                split(rest, len)?
            }
        };

        Ok((Self::from_payload(protocol, payload)?, rest))
    }

    /// Create a segment from an unframed binary value.
    pub(crate) fn from_payload(protocol: Protocol, payload: &[u8]) -> Result<Self> {
        let value =
            protocol
                .codec()
                .read_binary(payload)
                .map_err(|source| DataError::InvalidValue {
                    protocol: protocol.name().to_owned(),
                    source,
                })?;

        Ok(Self::unchecked(protocol, value))
    }
}

fn split(buf: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if buf.len() < len {
        return Err(DataError::Truncated.into());
    }

    Ok(buf.split_at(len))
}

struct ValueText<'a>(&'a Segment);

impl<'a> Display for ValueText<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.protocol.codec().format_text(&self.0.value, f)
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code() && self.value == other.value
    }
}

impl Eq for Segment {}

impl Hash for Segment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code().hash(state);
        self.value.hash(state);
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())?;

        if self.protocol.kind().has_value() {
            write!(f, "/{}", ValueText(self))?;
        }

        Ok(())
    }
}

impl Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.name())
            .field("code", &self.code())
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use crate::registry::global_registry;

    use super::*;

    #[test]
    fn stringing() {
        let tcp = global_registry().lookup_by_name("tcp").unwrap();

        let segment = Segment::from_text(tcp, "8080").unwrap();

        assert_eq!(segment.to_string(), "/tcp/8080");
        assert_eq!(segment.value_text(), "8080");

        let circuit = global_registry().lookup_by_name("p2p-circuit").unwrap();

        assert_eq!(
            Segment::from_text(circuit, "").unwrap().to_string(),
            "/p2p-circuit"
        );
    }

    #[test]
    fn new_checks_value_shape() {
        let ip4 = global_registry().lookup_by_name("ip4").unwrap();

        assert!(Segment::new(ip4.clone(), Value::Ip4(Ipv4Addr::LOCALHOST)).is_ok());
        assert!(matches!(
            Segment::new(ip4, Value::Port(80)),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn decode_truncated() {
        let registry = global_registry();

        // ip4 with 3 of 4 address bytes.
        assert!(matches!(
            Segment::decode(registry, &[0x04, 127, 0, 0]),
            Err(Error::InvalidData(DataError::Truncated))
        ));

        // dns with length 5 and 2 bytes.
        assert!(matches!(
            Segment::decode(registry, &[0x35, 0x05, b'a', b'b']),
            Err(Error::InvalidData(DataError::Truncated))
        ));

        // unterminated varint code.
        assert!(matches!(
            Segment::decode(registry, &[0xff]),
            Err(Error::InvalidData(DataError::Varint(_)))
        ));
    }

    #[test]
    fn decode_remainder() {
        let (segment, rest) =
            Segment::decode(global_registry(), &[0x06, 0x10, 0xe1, 0xaa]).unwrap();

        assert_eq!(segment.to_string(), "/tcp/4321");
        assert_eq!(rest, [0xaa]);
    }
}
