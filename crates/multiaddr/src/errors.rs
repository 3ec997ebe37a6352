use std::{net::AddrParseError, num::ParseIntError, string::FromUtf8Error};

use libp2p_identity::PeerId;
use multihash::Multihash;

/// Reasons a protocol codec rejects a value, in text or binary form.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error(transparent)]
    Ip(#[from] AddrParseError),

    #[error(transparent)]
    Int(#[from] ParseIntError),

    #[error(transparent)]
    Base58(#[from] bs58::decode::Error),

    #[error(transparent)]
    Base32(#[from] data_encoding::DecodeError),

    #[error(transparent)]
    Multihash(#[from] multihash::Error),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    Utf8(#[from] FromUtf8Error),

    #[error("Expect {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("Value is empty")]
    Empty,

    #[error("'{0}' is not a decimal number")]
    NotDigits(String),

    #[error("Port must be non-zero")]
    ZeroPort,

    #[error("{0}")]
    Invalid(String),
}

/// Malformed multiaddr text.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("'{0}' does not start with '/'")]
    MissingLeadingSlash(String),

    #[error("Protocol name is missing")]
    MissingProtocolName,

    #[error("Unknown protocol name '{0}'")]
    UnknownProtocolName(String),

    #[error("Protocol '{0}' requires a value")]
    MissingValue(String),

    #[error("Invalid value for protocol '{protocol}': {source}")]
    InvalidValue {
        protocol: String,
        #[source]
        source: ValueError,
    },
}

/// Malformed multiaddr binary.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Unknown protocol code {0}")]
    UnknownCode(u32),

    #[error("Unexpected end of input")]
    Truncated,

    #[error(transparent)]
    Varint(#[from] unsigned_varint::decode::Error),

    #[error("Invalid value for protocol '{protocol}': {source}")]
    InvalidValue {
        protocol: String,
        #[source]
        source: ValueError,
    },
}

/// The error type of this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid multiaddr text, {0}")]
    Format(#[from] FormatError),

    #[error("Invalid multiaddr binary, {0}")]
    InvalidData(#[from] DataError),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Protocol code {0} is already registered")]
    DuplicateCode(u32),

    #[error("Protocol name '{0}' is already registered")]
    DuplicateName(String),

    #[error("Unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("Multiaddr does not end with a peer id")]
    MissingPeerId,

    #[error("Peer id multihash is not a libp2p peer id, {0}")]
    PeerId(#[from] libp2p_identity::ParseError),

    #[error(
        "Multiaddr ends with peer id {}, expect {expected}",
        bs58::encode(.actual.to_bytes()).into_string()
    )]
    PeerIdMismatch {
        expected: PeerId,
        actual: Multihash<64>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// `Result` returns by functions in this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::IoError(err) => err,
            Error::InvalidData(err) => std::io::Error::new(std::io::ErrorKind::InvalidData, err),
            err @ Error::Cancelled => std::io::Error::new(std::io::ErrorKind::Interrupted, err),
            err => std::io::Error::new(std::io::ErrorKind::Other, err),
        }
    }
}
