//! The process-wide table of multiaddr protocols.
//!
//! Protocols are looked up by name (case-insensitive) or by numeric code.
//! Lookups take a shared read lock and run concurrently; [`register`](Registry::register)
//! and [`deregister`](Registry::deregister) take the write lock.
//!
//! The global table is created on first access by [`global_registry`] and
//! holds every built-in protocol before any lookup can observe it.

use std::{
    collections::HashMap,
    fmt::{self, Debug, Display},
    sync::{Arc, OnceLock},
};

use parking_lot::RwLock;

use crate::{
    codec::{
        Codec, EmptyCodec, Ip4Codec, Ip6Codec, OnionCodec, PeerIdCodec, PortCodec, PrefixCodec,
        Utf8Codec, ValueKind,
    },
    errors::{Error, Result},
};

/// Code of the peer identity protocol, shared by `p2p` and its legacy name `ipfs`.
pub const P2P_CODE: u32 = 421;

/// A registered protocol: name, code and value codec.
pub struct ProtocolDescriptor {
    code: u32,
    name: String,
    codec: Arc<dyn Codec>,
    builtin: bool,
}

/// Shared handle to a registered protocol.
pub type Protocol = Arc<ProtocolDescriptor>;

impl ProtocolDescriptor {
    /// The numeric code used in binary form.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// The name used in text form.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wire shape of this protocol's values.
    pub fn kind(&self) -> ValueKind {
        self.codec.kind()
    }

    /// The codec converting this protocol's values.
    pub fn codec(&self) -> &dyn Codec {
        &*self.codec
    }

    /// Returns true if this protocol is shipped with the crate and can't be deregistered.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }
}

impl Debug for ProtocolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolDescriptor")
            .field("code", &self.code)
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("builtin", &self.builtin)
            .finish()
    }
}

impl Display for ProtocolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn builtin(code: u32, name: &str, codec: Arc<dyn Codec>) -> Protocol {
    Arc::new(ProtocolDescriptor {
        code,
        name: name.to_owned(),
        codec,
        builtin: true,
    })
}

/// Built-in protocols that address conversions build segments with.
pub(crate) struct WellKnown {
    pub(crate) ip4: Protocol,
    pub(crate) ip6: Protocol,
    pub(crate) tcp: Protocol,
    pub(crate) p2p: Protocol,
}

impl WellKnown {
    fn new() -> Self {
        Self {
            ip4: builtin(4, "ip4", Arc::new(Ip4Codec)),
            ip6: builtin(41, "ip6", Arc::new(Ip6Codec)),
            tcp: builtin(6, "tcp", Arc::new(PortCodec)),
            p2p: builtin(P2P_CODE, "p2p", Arc::new(PeerIdCodec)),
        }
    }

    fn protocols(&self) -> [&Protocol; 4] {
        [&self.ip4, &self.ip6, &self.tcp, &self.p2p]
    }
}

/// Built-in protocols other than the [`WellKnown`] ones.
fn builtins() -> Vec<(u32, &'static str, Arc<dyn Codec>)> {
    let empty: Arc<dyn Codec> = Arc::new(EmptyCodec);
    let port: Arc<dyn Codec> = Arc::new(PortCodec);
    let utf8: Arc<dyn Codec> = Arc::new(Utf8Codec);
    let prefix: Arc<dyn Codec> = Arc::new(PrefixCodec);
    let onion: Arc<dyn Codec> = Arc::new(OnionCodec::V2);
    let onion3: Arc<dyn Codec> = Arc::new(OnionCodec::V3);

    vec![
        (33, "dccp", port.clone()),
        (42, "ip6zone", utf8.clone()),
        (43, "ipcidr", prefix),
        (53, "dns", utf8.clone()),
        (54, "dns4", utf8.clone()),
        (55, "dns6", utf8.clone()),
        (56, "dnsaddr", utf8),
        (132, "sctp", port.clone()),
        (273, "udp", port),
        (275, "libp2p-webrtc-star", empty.clone()),
        (276, "libp2p-webrtc-direct", empty.clone()),
        (290, "p2p-circuit", empty.clone()),
        (301, "udt", empty.clone()),
        (302, "utp", empty.clone()),
        (443, "https", empty.clone()),
        (444, "onion", onion),
        (445, "onion3", onion3),
        (448, "tls", empty.clone()),
        (454, "noise", empty.clone()),
        (460, "quic", empty.clone()),
        (461, "quic-v1", empty.clone()),
        (465, "webtransport", empty.clone()),
        (477, "ws", empty.clone()),
        (478, "wss", empty.clone()),
        (480, "http", empty),
    ]
}

/// Legacy names, mapped to the code of their canonical protocol.
const BUILTIN_ALIASES: [(&str, u32); 1] = [("ipfs", P2P_CODE)];

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Argument("protocol name is empty".to_owned()));
    }

    if name.contains('/') || name.contains(char::is_whitespace) {
        return Err(Error::Argument(format!(
            "protocol name '{}' contains '/' or whitespace",
            name
        )));
    }

    Ok(())
}

#[derive(Default)]
struct RawRegistry {
    /// Keyed by lower case name, holds canonical entries and aliases.
    names: HashMap<String, Protocol>,
    /// Canonical entries only.
    codes: HashMap<u32, Protocol>,
}

impl RawRegistry {
    fn insert(&mut self, protocol: Protocol) {
        self.codes.insert(protocol.code, protocol.clone());
        self.insert_alias(protocol);
    }

    fn insert_alias(&mut self, protocol: Protocol) {
        self.names.insert(protocol.name.to_ascii_lowercase(), protocol);
    }
}

/// A protocol table, see the [module level documentation](self).
#[derive(Default)]
pub struct Registry(RwLock<RawRegistry>);

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in protocols.
    pub fn with_builtins() -> Self {
        Self::from_builtins(&WellKnown::new())
    }

    fn from_builtins(well_known: &WellKnown) -> Self {
        let mut raw = RawRegistry::default();

        for protocol in well_known.protocols() {
            raw.insert(protocol.clone());
        }

        for (code, name, codec) in builtins() {
            raw.insert(builtin(code, name, codec));
        }

        for (name, code) in BUILTIN_ALIASES {
            if let Some(canonical) = raw.codes.get(&code).cloned() {
                raw.insert_alias(builtin(code, name, canonical.codec.clone()));
            }
        }

        Self(RwLock::new(raw))
    }

    /// Register a new protocol.
    ///
    /// Fails with [`Error::DuplicateCode`] if `code` is taken and with
    /// [`Error::DuplicateName`] if `name` is taken, ignoring case.
    pub fn register<C>(&self, name: &str, code: u32, codec: C) -> Result<Protocol>
    where
        C: Codec + 'static,
    {
        check_name(name)?;

        let mut raw = self.0.write();

        if raw.codes.contains_key(&code) {
            return Err(Error::DuplicateCode(code));
        }

        if raw.names.contains_key(&name.to_ascii_lowercase()) {
            return Err(Error::DuplicateName(name.to_owned()));
        }

        let protocol = Arc::new(ProtocolDescriptor {
            code,
            name: name.to_owned(),
            codec: Arc::new(codec),
            builtin: false,
        });

        raw.insert(protocol.clone());

        log::info!("register protocol, name={}, code={}", name, code);

        Ok(protocol)
    }

    /// Register `name` as an alternative name of the protocol with `code`.
    ///
    /// Lookups by code keep returning the canonical protocol.
    pub fn register_alias(&self, name: &str, code: u32) -> Result<Protocol> {
        check_name(name)?;

        let mut raw = self.0.write();

        let canonical = raw
            .codes
            .get(&code)
            .cloned()
            .ok_or_else(|| Error::UnknownProtocol(code.to_string()))?;

        if raw.names.contains_key(&name.to_ascii_lowercase()) {
            return Err(Error::DuplicateName(name.to_owned()));
        }

        let protocol = Arc::new(ProtocolDescriptor {
            code,
            name: name.to_owned(),
            codec: canonical.codec.clone(),
            builtin: false,
        });

        raw.insert_alias(protocol.clone());

        log::info!(
            "register protocol alias, name={}, canonical={}",
            name,
            canonical.name
        );

        Ok(protocol)
    }

    /// Remove a protocol returned by [`register`](Self::register) or
    /// [`register_alias`](Self::register_alias).
    ///
    /// Removing a canonical protocol also removes its aliases.
    pub fn deregister(&self, protocol: &Protocol) -> Result<()> {
        if protocol.builtin {
            return Err(Error::Argument(format!(
                "built-in protocol '{}' can't be deregistered",
                protocol.name
            )));
        }

        let mut raw = self.0.write();

        let key = protocol.name.to_ascii_lowercase();

        match raw.names.get(&key) {
            Some(registered) if Arc::ptr_eq(registered, protocol) => {}
            _ => return Err(Error::UnknownProtocol(protocol.name.clone())),
        }

        raw.names.remove(&key);

        let canonical = raw
            .codes
            .get(&protocol.code)
            .is_some_and(|registered| Arc::ptr_eq(registered, protocol));

        if canonical {
            raw.codes.remove(&protocol.code);
            raw.names.retain(|_, alias| alias.code != protocol.code);
        }

        log::info!(
            "deregister protocol, name={}, code={}",
            protocol.name,
            protocol.code
        );

        Ok(())
    }

    /// Lookup protocol by name, ignoring case.
    pub fn lookup_by_name(&self, name: &str) -> Result<Protocol> {
        self.0
            .read()
            .names
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnknownProtocol(name.to_owned()))
    }

    /// Lookup the canonical protocol by code.
    pub fn lookup_by_code(&self, code: u32) -> Result<Protocol> {
        self.0
            .read()
            .codes
            .get(&code)
            .cloned()
            .ok_or_else(|| Error::UnknownProtocol(code.to_string()))
    }

    /// Returns a snapshot of every registered name, ordered by code then name.
    pub fn protocols(&self) -> Vec<Protocol> {
        let mut protocols = self.0.read().names.values().cloned().collect::<Vec<_>>();

        protocols.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.name.cmp(&b.name)));

        protocols
    }
}

struct Global {
    registry: Registry,
    well_known: WellKnown,
}

static GLOBAL: OnceLock<Global> = OnceLock::new();

fn global() -> &'static Global {
    GLOBAL.get_or_init(|| {
        let well_known = WellKnown::new();

        Global {
            registry: Registry::from_builtins(&well_known),
            well_known,
        }
    })
}

/// Returns the process-wide registry, creating it with the built-in protocols on first call.
pub fn global_registry() -> &'static Registry {
    &global().registry
}

/// Returns the handles of the well-known protocols held by the [`global_registry`].
pub(crate) fn well_known() -> &'static WellKnown {
    &global().well_known
}
