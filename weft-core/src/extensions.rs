//! Hello extensions.
//!
//! Extensions are decoded into the closed [`Extension`] enum. The shape of
//! several extensions depends on the message carrying them (key_share is a
//! list in ClientHello, a single entry in ServerHello and a bare group in
//! HelloRetryRequest), so decoding is driven by an [`ExtensionContext`].
//! Types this implementation does not know are kept verbatim as
//! [`Extension::Unknown`] so that re-encoding reproduces the input.

use bytes::{BufMut, BytesMut};

use crate::codec::{BufMutExt, Reader};
use crate::error::{Error, Result};
use crate::protocol::{
    ExtensionType, NamedGroup, ProtocolVersion, PskKeyExchangeMode, SignatureScheme,
};

/// Message an extension block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionContext {
    /// ClientHello
    ClientHello,
    /// ServerHello (TLS 1.2 and 1.3)
    ServerHello,
    /// HelloRetryRequest
    HelloRetryRequest,
    /// EncryptedExtensions
    EncryptedExtensions,
    /// NewSessionTicket
    NewSessionTicket,
    /// CertificateRequest (TLS 1.3)
    CertificateRequest,
    /// CertificateEntry (TLS 1.3)
    Certificate,
}

/// One (EC)DHE share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    /// Group of the share
    pub group: NamedGroup,
    /// Public value in the group's wire encoding
    pub key_exchange: Vec<u8>,
}

impl KeyShareEntry {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.group.to_u16());
        buf.put_vec_u16(&self.key_exchange);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let group = NamedGroup::from_u16(r.u16()?);
        let key_exchange = r.vec_u16()?;
        if key_exchange.is_empty() {
            return Err(Error::decode("empty key share"));
        }
        Ok(Self {
            group,
            key_exchange: key_exchange.to_vec(),
        })
    }
}

/// Shapes of key_share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShare {
    /// ClientHello: shares offered by the client
    ClientShares(Vec<KeyShareEntry>),
    /// ServerHello: the share chosen by the server
    ServerShare(KeyShareEntry),
    /// HelloRetryRequest: the group the client must use
    RetryGroup(NamedGroup),
}

/// Shapes of supported_versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupportedVersions {
    /// ClientHello: versions offered, in preference order
    Offered(Vec<ProtocolVersion>),
    /// ServerHello / HelloRetryRequest: the version selected
    Selected(ProtocolVersion),
}

/// A PSK identity offered by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskIdentity {
    /// Ticket label
    pub identity: Vec<u8>,
    /// Ticket age plus the ticket's age_add, mod 2^32
    pub obfuscated_ticket_age: u32,
}

/// pre_shared_key in a ClientHello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskOffer {
    /// Offered identities
    pub identities: Vec<PskIdentity>,
    /// One binder per identity
    pub binders: Vec<Vec<u8>>,
}

impl PskOffer {
    /// Encoded length of the binders list, length prefix included.
    ///
    /// The binders are always the last bytes of a ClientHello, so this is
    /// how much to cut to obtain the partial ClientHello the binders cover.
    pub fn binders_len(&self) -> usize {
        2 + self.binders.iter().map(|b| 1 + b.len()).sum::<usize>()
    }

    /// The prefix of an encoded ClientHello (header included) that the
    /// binders are computed over.
    pub fn truncate<'a>(&self, client_hello: &'a [u8]) -> Result<&'a [u8]> {
        client_hello
            .len()
            .checked_sub(self.binders_len())
            .map(|end| &client_hello[..end])
            .ok_or_else(|| Error::decode("binders longer than ClientHello"))
    }
}

/// Shapes of pre_shared_key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreSharedKey {
    /// ClientHello: identities and binders
    Offer(PskOffer),
    /// ServerHello: index of the accepted identity
    Selected(u16),
}

/// A decoded hello extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// server_name: host names in a ClientHello, empty as a server acknowledgement
    ServerName(Vec<String>),
    /// supported_groups
    SupportedGroups(Vec<NamedGroup>),
    /// ec_point_formats
    EcPointFormats(Vec<u8>),
    /// signature_algorithms
    SignatureAlgorithms(Vec<SignatureScheme>),
    /// early_data: `Some(max_early_data_size)` in NewSessionTicket, else empty
    EarlyData(Option<u32>),
    /// supported_versions
    SupportedVersions(SupportedVersions),
    /// cookie
    Cookie(Vec<u8>),
    /// psk_key_exchange_modes
    PskKeyExchangeModes(Vec<PskKeyExchangeMode>),
    /// key_share
    KeyShare(KeyShare),
    /// pre_shared_key
    PreSharedKey(PreSharedKey),
    /// renegotiation_info: empty on an initial handshake, else the binding
    RenegotiationInfo(Vec<u8>),
    /// Anything else, kept verbatim
    Unknown {
        /// Wire type
        typ: u16,
        /// Raw body
        data: Vec<u8>,
    },
}

impl Extension {
    /// Wire type of this extension.
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            Extension::ServerName(_) => ExtensionType::ServerName,
            Extension::SupportedGroups(_) => ExtensionType::SupportedGroups,
            Extension::EcPointFormats(_) => ExtensionType::EcPointFormats,
            Extension::SignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            Extension::EarlyData(_) => ExtensionType::EarlyData,
            Extension::SupportedVersions(_) => ExtensionType::SupportedVersions,
            Extension::Cookie(_) => ExtensionType::Cookie,
            Extension::PskKeyExchangeModes(_) => ExtensionType::PskKeyExchangeModes,
            Extension::KeyShare(_) => ExtensionType::KeyShare,
            Extension::PreSharedKey(_) => ExtensionType::PreSharedKey,
            Extension::RenegotiationInfo(_) => ExtensionType::RenegotiationInfo,
            Extension::Unknown { typ, .. } => ExtensionType::from_u16(*typ),
        }
    }

    /// Append `type | length | body`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.extension_type().to_u16());
        buf.put_nested_u16(|b| self.encode_body(b));
    }

    fn encode_body(&self, b: &mut BytesMut) {
        match self {
            Extension::ServerName(names) => {
                if !names.is_empty() {
                    b.put_nested_u16(|b| {
                        for name in names {
                            b.put_u8(0);
                            b.put_vec_u16(name.as_bytes());
                        }
                    });
                }
            },
            Extension::SupportedGroups(groups) => b.put_nested_u16(|b| {
                for g in groups {
                    b.put_u16(g.to_u16());
                }
            }),
            Extension::EcPointFormats(formats) => b.put_vec_u8(formats),
            Extension::SignatureAlgorithms(schemes) => b.put_nested_u16(|b| {
                for s in schemes {
                    b.put_u16(s.to_u16());
                }
            }),
            Extension::EarlyData(max) => {
                if let Some(max) = max {
                    b.put_u32(*max);
                }
            },
            Extension::SupportedVersions(SupportedVersions::Offered(versions)) => {
                b.put_nested_u8(|b| {
                    for v in versions {
                        b.put_u16(v.to_u16());
                    }
                })
            },
            Extension::SupportedVersions(SupportedVersions::Selected(v)) => b.put_u16(v.to_u16()),
            Extension::Cookie(cookie) => b.put_vec_u16(cookie),
            Extension::PskKeyExchangeModes(modes) => b.put_nested_u8(|b| {
                for m in modes {
                    b.put_u8(m.to_u8());
                }
            }),
            Extension::KeyShare(KeyShare::ClientShares(entries)) => b.put_nested_u16(|b| {
                for e in entries {
                    e.encode(b);
                }
            }),
            Extension::KeyShare(KeyShare::ServerShare(entry)) => entry.encode(b),
            Extension::KeyShare(KeyShare::RetryGroup(group)) => b.put_u16(group.to_u16()),
            Extension::PreSharedKey(PreSharedKey::Offer(offer)) => {
                b.put_nested_u16(|b| {
                    for id in &offer.identities {
                        b.put_vec_u16(&id.identity);
                        b.put_u32(id.obfuscated_ticket_age);
                    }
                });
                b.put_nested_u16(|b| {
                    for binder in &offer.binders {
                        b.put_vec_u8(binder);
                    }
                });
            },
            Extension::PreSharedKey(PreSharedKey::Selected(index)) => b.put_u16(*index),
            Extension::RenegotiationInfo(binding) => b.put_vec_u8(binding),
            Extension::Unknown { data, .. } => b.put_slice(data),
        }
    }

    /// Decode one extension body of type `typ` found in `context`.
    pub fn decode(typ: ExtensionType, data: &[u8], context: ExtensionContext) -> Result<Self> {
        use ExtensionContext as Ctx;

        let mut r = Reader::new(data);
        let ext = match typ {
            ExtensionType::ServerName => {
                let mut names = Vec::new();
                if !r.is_empty() {
                    let mut list = r.sub_u16()?;
                    if list.is_empty() {
                        return Err(Error::decode("empty server_name list"));
                    }
                    while !list.is_empty() {
                        if list.u8()? != 0 {
                            return Err(Error::decode("unsupported server name type"));
                        }
                        let name = std::str::from_utf8(list.vec_u16()?)
                            .map_err(|_| Error::decode("server name is not UTF-8"))?;
                        names.push(name.to_string());
                    }
                }
                Extension::ServerName(names)
            },
            ExtensionType::SupportedGroups => {
                let mut list = r.sub_u16()?;
                let mut groups = Vec::new();
                while !list.is_empty() {
                    groups.push(NamedGroup::from_u16(list.u16()?));
                }
                Extension::SupportedGroups(groups)
            },
            ExtensionType::EcPointFormats => Extension::EcPointFormats(r.vec_u8()?.to_vec()),
            ExtensionType::SignatureAlgorithms => {
                let mut list = r.sub_u16()?;
                let mut schemes = Vec::new();
                while !list.is_empty() {
                    schemes.push(SignatureScheme::from_u16(list.u16()?));
                }
                Extension::SignatureAlgorithms(schemes)
            },
            ExtensionType::EarlyData => match context {
                Ctx::NewSessionTicket => Extension::EarlyData(Some(r.u32()?)),
                _ => Extension::EarlyData(None),
            },
            ExtensionType::SupportedVersions => match context {
                Ctx::ClientHello => {
                    let mut list = r.sub_u8()?;
                    let mut versions = Vec::new();
                    while !list.is_empty() {
                        versions.push(ProtocolVersion::from_u16(list.u16()?));
                    }
                    Extension::SupportedVersions(SupportedVersions::Offered(versions))
                },
                Ctx::ServerHello | Ctx::HelloRetryRequest => Extension::SupportedVersions(
                    SupportedVersions::Selected(ProtocolVersion::from_u16(r.u16()?)),
                ),
                _ => return Err(misplaced(typ, context)),
            },
            ExtensionType::Cookie => {
                let cookie = r.vec_u16()?;
                if cookie.is_empty() {
                    return Err(Error::decode("empty cookie"));
                }
                Extension::Cookie(cookie.to_vec())
            },
            ExtensionType::PskKeyExchangeModes => {
                let mut list = r.sub_u8()?;
                let mut modes = Vec::new();
                while !list.is_empty() {
                    modes.push(PskKeyExchangeMode::from_u8(list.u8()?));
                }
                Extension::PskKeyExchangeModes(modes)
            },
            ExtensionType::KeyShare => match context {
                Ctx::ClientHello => {
                    let mut list = r.sub_u16()?;
                    let mut entries = Vec::new();
                    while !list.is_empty() {
                        entries.push(KeyShareEntry::decode(&mut list)?);
                    }
                    Extension::KeyShare(KeyShare::ClientShares(entries))
                },
                Ctx::ServerHello => {
                    Extension::KeyShare(KeyShare::ServerShare(KeyShareEntry::decode(&mut r)?))
                },
                Ctx::HelloRetryRequest => {
                    Extension::KeyShare(KeyShare::RetryGroup(NamedGroup::from_u16(r.u16()?)))
                },
                _ => return Err(misplaced(typ, context)),
            },
            ExtensionType::PreSharedKey => match context {
                Ctx::ClientHello => {
                    let mut ids = r.sub_u16()?;
                    let mut identities = Vec::new();
                    while !ids.is_empty() {
                        let identity = ids.vec_u16()?.to_vec();
                        let obfuscated_ticket_age = ids.u32()?;
                        identities.push(PskIdentity {
                            identity,
                            obfuscated_ticket_age,
                        });
                    }
                    let mut list = r.sub_u16()?;
                    let mut binders = Vec::new();
                    while !list.is_empty() {
                        binders.push(list.vec_u8()?.to_vec());
                    }
                    if identities.is_empty() || identities.len() != binders.len() {
                        return Err(Error::decode("pre_shared_key identity/binder mismatch"));
                    }
                    Extension::PreSharedKey(PreSharedKey::Offer(PskOffer {
                        identities,
                        binders,
                    }))
                },
                Ctx::ServerHello => Extension::PreSharedKey(PreSharedKey::Selected(r.u16()?)),
                _ => return Err(misplaced(typ, context)),
            },
            ExtensionType::RenegotiationInfo => {
                Extension::RenegotiationInfo(r.vec_u8()?.to_vec())
            },
            ExtensionType::Unknown(typ) => {
                return Ok(Extension::Unknown {
                    typ,
                    data: data.to_vec(),
                })
            },
        };
        r.expect_end("extension body")?;
        Ok(ext)
    }
}

fn misplaced(typ: ExtensionType, context: ExtensionContext) -> Error {
    Error::IllegalParameter(format!("{:?} not allowed in {:?}", typ, context))
}

/// An ordered extension block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions(Vec<Extension>);

impl Extensions {
    /// Create a new empty extension list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an extension.
    pub fn push(&mut self, extension: Extension) {
        self.0.push(extension);
    }

    /// Number of extensions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the block holds no extension.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.0.iter()
    }

    /// First extension of the given type.
    pub fn get(&self, typ: ExtensionType) -> Option<&Extension> {
        self.0.iter().find(|e| e.extension_type() == typ)
    }

    /// Whether an extension of the given type is present.
    pub fn contains(&self, typ: ExtensionType) -> bool {
        self.get(typ).is_some()
    }

    /// Drop every extension of the given type.
    pub fn remove(&mut self, typ: ExtensionType) {
        self.0.retain(|e| e.extension_type() != typ);
    }

    /// Append the `u16`-prefixed list.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_nested_u16(|b| {
            for ext in &self.0 {
                ext.encode(b);
            }
        });
    }

    /// Decode a `u16`-prefixed list from `r`.
    ///
    /// Duplicate types are rejected; in a ClientHello pre_shared_key must
    /// come last.
    pub fn decode(r: &mut Reader<'_>, context: ExtensionContext) -> Result<Self> {
        let mut list = r.sub_u16()?;
        let mut seen: Vec<u16> = Vec::new();
        let mut out = Vec::new();
        while !list.is_empty() {
            let typ = list.u16()?;
            let data = list.vec_u16()?;
            if seen.contains(&typ) {
                return Err(Error::decode(format!("duplicate extension {:#06x}", typ)));
            }
            seen.push(typ);
            out.push(Extension::decode(ExtensionType::from_u16(typ), data, context)?);
        }
        if context == ExtensionContext::ClientHello {
            if let Some(pos) = out
                .iter()
                .position(|e| e.extension_type() == ExtensionType::PreSharedKey)
            {
                if pos + 1 != out.len() {
                    return Err(Error::IllegalParameter(
                        "pre_shared_key is not the last extension".into(),
                    ));
                }
            }
        }
        Ok(Self(out))
    }

    /// server_name host names.
    pub fn server_names(&self) -> Option<&[String]> {
        match self.get(ExtensionType::ServerName)? {
            Extension::ServerName(names) => Some(names),
            _ => None,
        }
    }

    /// supported_groups.
    pub fn supported_groups(&self) -> Option<&[NamedGroup]> {
        match self.get(ExtensionType::SupportedGroups)? {
            Extension::SupportedGroups(groups) => Some(groups),
            _ => None,
        }
    }

    /// signature_algorithms.
    pub fn signature_algorithms(&self) -> Option<&[SignatureScheme]> {
        match self.get(ExtensionType::SignatureAlgorithms)? {
            Extension::SignatureAlgorithms(schemes) => Some(schemes),
            _ => None,
        }
    }

    /// supported_versions.
    pub fn supported_versions(&self) -> Option<&SupportedVersions> {
        match self.get(ExtensionType::SupportedVersions)? {
            Extension::SupportedVersions(v) => Some(v),
            _ => None,
        }
    }

    /// key_share.
    pub fn key_share(&self) -> Option<&KeyShare> {
        match self.get(ExtensionType::KeyShare)? {
            Extension::KeyShare(k) => Some(k),
            _ => None,
        }
    }

    /// pre_shared_key.
    pub fn pre_shared_key(&self) -> Option<&PreSharedKey> {
        match self.get(ExtensionType::PreSharedKey)? {
            Extension::PreSharedKey(p) => Some(p),
            _ => None,
        }
    }

    /// psk_key_exchange_modes.
    pub fn psk_modes(&self) -> Option<&[PskKeyExchangeMode]> {
        match self.get(ExtensionType::PskKeyExchangeModes)? {
            Extension::PskKeyExchangeModes(m) => Some(m),
            _ => None,
        }
    }

    /// cookie.
    pub fn cookie(&self) -> Option<&[u8]> {
        match self.get(ExtensionType::Cookie)? {
            Extension::Cookie(c) => Some(c),
            _ => None,
        }
    }

    /// early_data, with the ticket limit when carried by a NewSessionTicket.
    pub fn early_data(&self) -> Option<Option<u32>> {
        match self.get(ExtensionType::EarlyData)? {
            Extension::EarlyData(max) => Some(*max),
            _ => None,
        }
    }

    /// renegotiation_info binding.
    pub fn renegotiation_info(&self) -> Option<&[u8]> {
        match self.get(ExtensionType::RenegotiationInfo)? {
            Extension::RenegotiationInfo(b) => Some(b),
            _ => None,
        }
    }
}

impl From<Vec<Extension>> for Extensions {
    fn from(list: Vec<Extension>) -> Self {
        Self(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round_trip(ext: Extension, context: ExtensionContext) -> Vec<u8> {
        let mut buf = BytesMut::new();
        ext.encode(&mut buf);
        let mut r = Reader::new(&buf);
        let typ = ExtensionType::from_u16(r.u16().unwrap());
        let body = r.vec_u16().unwrap();
        assert_eq!(Extension::decode(typ, body, context).unwrap(), ext);
        buf.to_vec()
    }

    #[test]
    fn test_server_name_encoding() {
        let bytes = round_trip(
            Extension::ServerName(vec!["example.com".into()]),
            ExtensionContext::ClientHello,
        );
        assert_eq!(
            hex::encode(bytes),
            "00000010000e00000b6578616d706c652e636f6d"
        );
        let ack = round_trip(Extension::ServerName(vec![]), ExtensionContext::ServerHello);
        assert_eq!(ack, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_context_dependent_shapes() {
        let share = KeyShareEntry {
            group: NamedGroup::X25519,
            key_exchange: vec![9; 32],
        };
        round_trip(
            Extension::KeyShare(KeyShare::ClientShares(vec![share.clone()])),
            ExtensionContext::ClientHello,
        );
        round_trip(
            Extension::KeyShare(KeyShare::ServerShare(share)),
            ExtensionContext::ServerHello,
        );
        let retry = round_trip(
            Extension::KeyShare(KeyShare::RetryGroup(NamedGroup::Secp256r1)),
            ExtensionContext::HelloRetryRequest,
        );
        assert_eq!(retry, vec![0x00, 0x33, 0x00, 0x02, 0x00, 0x17]);
        round_trip(
            Extension::SupportedVersions(SupportedVersions::Offered(vec![
                ProtocolVersion::Tls13,
                ProtocolVersion::Tls12,
            ])),
            ExtensionContext::ClientHello,
        );
        round_trip(
            Extension::SupportedVersions(SupportedVersions::Selected(ProtocolVersion::Tls13)),
            ExtensionContext::ServerHello,
        );
        round_trip(Extension::EarlyData(Some(16384)), ExtensionContext::NewSessionTicket);
        round_trip(Extension::EarlyData(None), ExtensionContext::EncryptedExtensions);
    }

    #[test]
    fn test_psk_offer_and_binder_length() {
        let offer = PskOffer {
            identities: vec![PskIdentity {
                identity: vec![1, 2, 3],
                obfuscated_ticket_age: 0xdeadbeef,
            }],
            binders: vec![vec![0xaa; 32]],
        };
        assert_eq!(offer.binders_len(), 35);
        let bytes = round_trip(
            Extension::PreSharedKey(PreSharedKey::Offer(offer)),
            ExtensionContext::ClientHello,
        );
        assert_eq!(&bytes[bytes.len() - 35..bytes.len() - 32], &[0x00, 0x21, 0x20]);
    }

    #[test]
    fn test_unknown_extension_preserved() {
        let data = [0x00, 0x07, 0x00, 0x10, 0x00, 0x03, 0x02, 0x68, 0x32];
        let mut r = Reader::new(&data);
        let exts = Extensions::decode(&mut r, ExtensionContext::ClientHello).unwrap();
        assert_eq!(
            exts.iter().next(),
            Some(&Extension::Unknown {
                typ: 0x10,
                data: vec![0x02, 0x68, 0x32]
            })
        );
        let mut buf = BytesMut::new();
        exts.encode(&mut buf);
        assert_eq!(&buf[..], &data[..]);
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let data = [0x00, 0x0a, 0xff, 0x01, 0x00, 0x01, 0x00, 0xff, 0x01, 0x00, 0x01, 0x00];
        let mut r = Reader::new(&data);
        assert!(matches!(
            Extensions::decode(&mut r, ExtensionContext::ServerHello),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_malformed_known_extension_rejected() {
        // supported_groups with an odd-length list
        assert!(matches!(
            Extension::decode(
                ExtensionType::SupportedGroups,
                &[0x00, 0x03, 0x00, 0x1d, 0x00],
                ExtensionContext::ClientHello
            ),
            Err(Error::Decode(_))
        ));
        // trailing byte after renegotiation_info
        assert!(matches!(
            Extension::decode(
                ExtensionType::RenegotiationInfo,
                &[0x00, 0x00],
                ExtensionContext::ServerHello
            ),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_psk_must_be_last_in_client_hello() {
        let mut exts = Extensions::new();
        exts.push(Extension::PreSharedKey(PreSharedKey::Offer(PskOffer {
            identities: vec![PskIdentity {
                identity: vec![7],
                obfuscated_ticket_age: 1,
            }],
            binders: vec![vec![0; 32]],
        })));
        exts.push(Extension::RenegotiationInfo(vec![]));
        let mut buf = BytesMut::new();
        exts.encode(&mut buf);
        let mut r = Reader::new(&buf);
        assert!(matches!(
            Extensions::decode(&mut r, ExtensionContext::ClientHello),
            Err(Error::IllegalParameter(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_extension_blocks_reencode_exactly(
            groups in proptest::collection::vec(any::<u16>(), 0..8),
            cookie in proptest::collection::vec(any::<u8>(), 1..64),
            unknown in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let exts = Extensions::from(vec![
                Extension::SupportedGroups(groups.into_iter().map(NamedGroup::from_u16).collect()),
                Extension::Cookie(cookie),
                Extension::Unknown { typ: 0xfafa, data: unknown },
            ]);
            let mut buf = BytesMut::new();
            exts.encode(&mut buf);
            let mut r = Reader::new(&buf);
            let decoded = Extensions::decode(&mut r, ExtensionContext::ClientHello).unwrap();
            prop_assert_eq!(&decoded, &exts);
            let mut again = BytesMut::new();
            decoded.encode(&mut again);
            prop_assert_eq!(again, buf);
        }
    }
}
