//! TLS protocol constants and wire enums.

use weft_crypto::{KeyExchangeAlgorithm, SignatureAlgorithm};

open_u16_enum! {
    /// TLS protocol version.
    pub enum ProtocolVersion {
        /// TLS 1.0 (RFC 2246), only seen in record headers of first flights
        Tls10 = 0x0301,
        /// TLS 1.1 (RFC 4346)
        Tls11 = 0x0302,
        /// TLS 1.2 (RFC 5246)
        Tls12 = 0x0303,
        /// TLS 1.3 (RFC 8446)
        Tls13 = 0x0304,
    }
}

impl ProtocolVersion {
    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            ProtocolVersion::Tls10 => "TLS 1.0",
            ProtocolVersion::Tls11 => "TLS 1.1",
            ProtocolVersion::Tls12 => "TLS 1.2",
            ProtocolVersion::Tls13 => "TLS 1.3",
            ProtocolVersion::Unknown(_) => "unknown",
        }
    }
}

/// Record content type (RFC 8446 Section 5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    /// Change cipher spec (20)
    ChangeCipherSpec = 20,

    /// Alert (21)
    Alert = 21,

    /// Handshake (22)
    Handshake = 22,

    /// Application data (23)
    ApplicationData = 23,
}

impl ContentType {
    /// Create from wire format (u8).
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            20 => Some(ContentType::ChangeCipherSpec),
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }

    /// Convert to wire format (u8).
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Handshake message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeType {
    /// HelloRequest (TLS 1.2)
    HelloRequest = 0,
    /// ClientHello
    ClientHello = 1,
    /// ServerHello and HelloRetryRequest
    ServerHello = 2,
    /// NewSessionTicket
    NewSessionTicket = 4,
    /// EndOfEarlyData (TLS 1.3)
    EndOfEarlyData = 5,
    /// EncryptedExtensions (TLS 1.3)
    EncryptedExtensions = 8,
    /// Certificate
    Certificate = 11,
    /// ServerKeyExchange (TLS 1.2)
    ServerKeyExchange = 12,
    /// CertificateRequest
    CertificateRequest = 13,
    /// ServerHelloDone (TLS 1.2)
    ServerHelloDone = 14,
    /// CertificateVerify
    CertificateVerify = 15,
    /// ClientKeyExchange (TLS 1.2)
    ClientKeyExchange = 16,
    /// Finished
    Finished = 20,
    /// KeyUpdate (TLS 1.3)
    KeyUpdate = 24,
    /// Synthetic message replacing ClientHello1 after a HelloRetryRequest
    MessageHash = 254,
}

impl HandshakeType {
    /// Create from wire format (u8).
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(HandshakeType::HelloRequest),
            1 => Some(HandshakeType::ClientHello),
            2 => Some(HandshakeType::ServerHello),
            4 => Some(HandshakeType::NewSessionTicket),
            5 => Some(HandshakeType::EndOfEarlyData),
            8 => Some(HandshakeType::EncryptedExtensions),
            11 => Some(HandshakeType::Certificate),
            12 => Some(HandshakeType::ServerKeyExchange),
            13 => Some(HandshakeType::CertificateRequest),
            14 => Some(HandshakeType::ServerHelloDone),
            15 => Some(HandshakeType::CertificateVerify),
            16 => Some(HandshakeType::ClientKeyExchange),
            20 => Some(HandshakeType::Finished),
            24 => Some(HandshakeType::KeyUpdate),
            254 => Some(HandshakeType::MessageHash),
            _ => None,
        }
    }

    /// Convert to wire format (u8).
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

open_u16_enum! {
    /// Hello extension type.
    pub enum ExtensionType {
        /// server_name (RFC 6066)
        ServerName = 0,
        /// supported_groups (RFC 8422 / RFC 8446)
        SupportedGroups = 10,
        /// ec_point_formats (RFC 8422)
        EcPointFormats = 11,
        /// signature_algorithms
        SignatureAlgorithms = 13,
        /// pre_shared_key
        PreSharedKey = 41,
        /// early_data
        EarlyData = 42,
        /// supported_versions
        SupportedVersions = 43,
        /// cookie
        Cookie = 44,
        /// psk_key_exchange_modes
        PskKeyExchangeModes = 45,
        /// key_share
        KeyShare = 51,
        /// renegotiation_info (RFC 5746)
        RenegotiationInfo = 0xff01,
    }
}

open_u16_enum! {
    /// Named group for (EC)DHE.
    pub enum NamedGroup {
        /// secp256r1 (NIST P-256)
        Secp256r1 = 0x0017,
        /// secp384r1, recognised but not implemented
        Secp384r1 = 0x0018,
        /// x25519
        X25519 = 0x001d,
        /// ffdhe2048 (RFC 7919)
        Ffdhe2048 = 0x0100,
    }
}

impl NamedGroup {
    /// The provider algorithm implementing this group.
    pub const fn key_exchange_algorithm(self) -> Option<KeyExchangeAlgorithm> {
        match self {
            NamedGroup::X25519 => Some(KeyExchangeAlgorithm::X25519),
            NamedGroup::Secp256r1 => Some(KeyExchangeAlgorithm::Secp256r1),
            NamedGroup::Ffdhe2048 => Some(KeyExchangeAlgorithm::Ffdhe2048),
            _ => None,
        }
    }

    /// Elliptic-curve groups usable by TLS 1.2 ECDHE suites.
    pub const fn is_elliptic(self) -> bool {
        matches!(self, NamedGroup::X25519 | NamedGroup::Secp256r1)
    }
}

open_u16_enum! {
    /// Signature scheme (RFC 8446 Section 4.2.3).
    pub enum SignatureScheme {
        /// rsa_pkcs1_sha256
        RsaPkcs1Sha256 = 0x0401,
        /// rsa_pkcs1_sha384
        RsaPkcs1Sha384 = 0x0501,
        /// ecdsa_secp256r1_sha256
        EcdsaSecp256r1Sha256 = 0x0403,
        /// rsa_pss_rsae_sha256
        RsaPssRsaeSha256 = 0x0804,
        /// rsa_pss_rsae_sha384
        RsaPssRsaeSha384 = 0x0805,
        /// ed25519
        Ed25519 = 0x0807,
    }
}

impl SignatureScheme {
    /// The provider algorithm computing this scheme.
    pub const fn algorithm(self) -> Option<SignatureAlgorithm> {
        match self {
            SignatureScheme::RsaPkcs1Sha256 => Some(SignatureAlgorithm::RsaPkcs1Sha256),
            SignatureScheme::RsaPkcs1Sha384 => Some(SignatureAlgorithm::RsaPkcs1Sha384),
            SignatureScheme::EcdsaSecp256r1Sha256 => {
                Some(SignatureAlgorithm::EcdsaSecp256r1Sha256)
            },
            SignatureScheme::RsaPssRsaeSha256 => Some(SignatureAlgorithm::RsaPssRsaeSha256),
            SignatureScheme::RsaPssRsaeSha384 => Some(SignatureAlgorithm::RsaPssRsaeSha384),
            SignatureScheme::Ed25519 => Some(SignatureAlgorithm::Ed25519),
            SignatureScheme::Unknown(_) => None,
        }
    }

    /// Schemes a TLS 1.3 handshake signature may use.
    pub const fn allowed_in_tls13(self) -> bool {
        match self.algorithm() {
            Some(alg) => alg.allowed_in_tls13(),
            None => false,
        }
    }
}

/// PSK key exchange mode (RFC 8446 Section 4.2.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PskKeyExchangeMode {
    /// PSK-only key establishment
    PskKe,
    /// PSK with (EC)DHE key establishment
    PskDheKe,
    /// Mode not known to this implementation
    Unknown(u8),
}

impl PskKeyExchangeMode {
    /// Decode from the wire value.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => PskKeyExchangeMode::PskKe,
            1 => PskKeyExchangeMode::PskDheKe,
            other => PskKeyExchangeMode::Unknown(other),
        }
    }

    /// Wire value.
    pub const fn to_u8(self) -> u8 {
        match self {
            PskKeyExchangeMode::PskKe => 0,
            PskKeyExchangeMode::PskDheKe => 1,
            PskKeyExchangeMode::Unknown(value) => value,
        }
    }
}

/// Which end of the connection this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Initiates the handshake
    Client,
    /// Answers the handshake
    Server,
}

/// Random value of a HelloRetryRequest, SHA-256("HelloRetryRequest").
pub const HELLO_RETRY_REQUEST_RANDOM: [u8; 32] = [
    0xcf, 0x21, 0xad, 0x74, 0xe5, 0x9a, 0x61, 0x11, 0xbe, 0x1d, 0x8c, 0x02, 0x1e, 0x65, 0xb8, 0x91,
    0xc2, 0xa2, 0x11, 0x16, 0x7a, 0xbb, 0x8c, 0x5e, 0x07, 0x9e, 0x09, 0xe2, 0xc8, 0xa8, 0x33, 0x9c,
];

/// Last eight bytes of a 1.3-capable server's random when it negotiates TLS 1.2.
pub const DOWNGRADE_TLS12_SENTINEL: [u8; 8] = *b"DOWNGRD\x01";

/// Maximum plaintext fragment length (2^14).
pub const MAX_FRAGMENT_LEN: usize = 16384;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_round_trip() {
        assert_eq!(ProtocolVersion::from_u16(0x0303), ProtocolVersion::Tls12);
        assert_eq!(ProtocolVersion::Tls13.to_u16(), 0x0304);
        assert_eq!(ProtocolVersion::Tls13.name(), "TLS 1.3");
        assert_eq!(
            ProtocolVersion::from_u16(0x7f1c),
            ProtocolVersion::Unknown(0x7f1c)
        );
        assert_eq!(ProtocolVersion::Unknown(0x7f1c).to_u16(), 0x7f1c);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(ContentType::from_u8(22), Some(ContentType::Handshake));
        assert_eq!(ContentType::from_u8(0), None);
        assert_eq!(ContentType::from_u8(24), None);
    }

    #[test]
    fn test_handshake_type() {
        assert_eq!(HandshakeType::from_u8(2), Some(HandshakeType::ServerHello));
        assert_eq!(HandshakeType::from_u8(3), None);
        assert_eq!(HandshakeType::MessageHash.to_u8(), 254);
    }

    #[test]
    fn test_group_mapping() {
        assert_eq!(
            NamedGroup::X25519.key_exchange_algorithm(),
            Some(KeyExchangeAlgorithm::X25519)
        );
        assert_eq!(NamedGroup::Secp384r1.key_exchange_algorithm(), None);
        assert!(!NamedGroup::Ffdhe2048.is_elliptic());
        assert_eq!(NamedGroup::from_u16(0x001d), NamedGroup::X25519);
    }

    #[test]
    fn test_signature_scheme_restrictions() {
        assert!(SignatureScheme::RsaPssRsaeSha256.allowed_in_tls13());
        assert!(!SignatureScheme::RsaPkcs1Sha256.allowed_in_tls13());
        assert!(!SignatureScheme::Unknown(0x0203).allowed_in_tls13());
        assert_eq!(SignatureScheme::Ed25519.to_u16(), 0x0807);
    }

    #[test]
    fn test_psk_mode() {
        assert_eq!(PskKeyExchangeMode::from_u8(1), PskKeyExchangeMode::PskDheKe);
        assert_eq!(PskKeyExchangeMode::Unknown(9).to_u8(), 9);
    }
}
