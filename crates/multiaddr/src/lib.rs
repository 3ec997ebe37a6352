//! An implementation of [multiaddr](https://github.com/multiformats/multiaddr):
//! self-describing, composable network addresses.
//!
//! A [`Multiaddr`] is a stack of `(protocol, value)` [`Segment`]s that round-trips
//! between a text form and a compact binary form:
//!
//! ```
//! use xstack_multiaddr::Multiaddr;
//!
//! let addr = Multiaddr::parse(
//!     "/ip4/10.1.10.10/tcp/29087/ipfs/QmVcSqVEsvm5RR9mBLjwpb2XjFVn5bPdPL69mL8PH45pPC",
//! )
//! .unwrap();
//!
//! assert_eq!(Multiaddr::from_bytes(&addr.to_vec()).unwrap(), addr);
//! assert!(addr.has_peer_id());
//! ```
//!
//! ## Protocols
//!
//! Protocol names and codes are resolved through a [`Registry`]. The
//! [`global_registry`] is populated with the built-in protocols on first use,
//! and accepts new protocols at runtime:
//!
//! ```
//! use xstack_multiaddr::{codec::PortCodec, global_registry, Multiaddr};
//!
//! let protocol = global_registry().register("x-doc-port", 0x7f0d, PortCodec).unwrap();
//!
//! assert_eq!(Multiaddr::parse("/x-doc-port/80").unwrap().to_vec(), [0x8d, 0xfe, 0x01, 0x00, 0x50]);
//!
//! global_registry().deregister(&protocol).unwrap();
//! ```
//!
//! ## Peer ids
//!
//! The peer identity protocol is registered as `p2p` with the legacy alias
//! `ipfs`. Both names share one code and compare equal.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;

mod errors;
pub use errors::*;

mod registry;
pub use registry::*;

mod segment;
pub use segment::*;

mod multiaddr;
pub use multiaddr::*;

mod io;

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
mod json;

pub use libp2p_identity::PeerId;
pub use multihash::Multihash;
