//! Connection configuration.
//!
//! ```rust,ignore
//! let config = Config::builder(provider)
//!     .with_protocol_versions(&[ProtocolVersion::Tls13])
//!     .with_identity(Identity::from_pem_file("server.pem")?)
//!     .build()?;
//! ```

use std::path::Path;
use std::sync::Arc;

use weft_crypto::CryptoProvider;

use crate::cipher::{CipherSuite, CipherSuiteDescriptor, SUITES};
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::messages::MAX_TICKET_LIFETIME;
use crate::pem;
use crate::protocol::{
    NamedGroup, ProtocolVersion, PskKeyExchangeMode, SignatureScheme, MAX_FRAGMENT_LEN,
};
use crate::x509;

/// RFC 7919 ffdhe2048 prime.
const FFDHE2048_PRIME: [u8; 256] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xad, 0xf8, 0x54, 0x58, 0xa2, 0xbb, 0x4a, 0x9a,
    0xaf, 0xdc, 0x56, 0x20, 0x27, 0x3d, 0x3c, 0xf1, 0xd8, 0xb9, 0xc5, 0x83, 0xce, 0x2d, 0x36, 0x95,
    0xa9, 0xe1, 0x36, 0x41, 0x14, 0x64, 0x33, 0xfb, 0xcc, 0x93, 0x9d, 0xce, 0x24, 0x9b, 0x3e, 0xf9,
    0x7d, 0x2f, 0xe3, 0x63, 0x63, 0x0c, 0x75, 0xd8, 0xf6, 0x81, 0xb2, 0x02, 0xae, 0xc4, 0x61, 0x7a,
    0xd3, 0xdf, 0x1e, 0xd5, 0xd5, 0xfd, 0x65, 0x61, 0x24, 0x33, 0xf5, 0x1f, 0x5f, 0x06, 0x6e, 0xd0,
    0x85, 0x63, 0x65, 0x55, 0x3d, 0xed, 0x1a, 0xf3, 0xb5, 0x57, 0x13, 0x5e, 0x7f, 0x57, 0xc9, 0x35,
    0x98, 0x4f, 0x0c, 0x70, 0xe0, 0xe6, 0x8b, 0x77, 0xe2, 0xa6, 0x89, 0xda, 0xf3, 0xef, 0xe8, 0x72,
    0x1d, 0xf1, 0x58, 0xa1, 0x36, 0xad, 0xe7, 0x35, 0x30, 0xac, 0xca, 0x4f, 0x48, 0x3a, 0x79, 0x7a,
    0xbc, 0x0a, 0xb1, 0x82, 0xb3, 0x24, 0xfb, 0x61, 0xd1, 0x08, 0xa9, 0x4b, 0xb2, 0xc8, 0xe3, 0xfb,
    0xb9, 0x6a, 0xda, 0xb7, 0x60, 0xd7, 0xf4, 0x68, 0x1d, 0x4f, 0x42, 0xa3, 0xde, 0x39, 0x4d, 0xf4,
    0xae, 0x56, 0xed, 0xe7, 0x63, 0x72, 0xbb, 0x19, 0x0b, 0x07, 0xa7, 0xc8, 0xee, 0x0a, 0x6d, 0x70,
    0x9e, 0x02, 0xfc, 0xe1, 0xcd, 0xf7, 0xe2, 0xec, 0xc0, 0x34, 0x04, 0xcd, 0x28, 0x34, 0x2f, 0x61,
    0x91, 0x72, 0xfe, 0x9c, 0xe9, 0x85, 0x83, 0xff, 0x8e, 0x4f, 0x12, 0x32, 0xee, 0xf2, 0x81, 0x83,
    0xc3, 0xfe, 0x3b, 0x1b, 0x4c, 0x6f, 0xad, 0x73, 0x3b, 0xb5, 0xfc, 0xbc, 0x2e, 0xc2, 0x20, 0x05,
    0xc5, 0x8e, 0xf1, 0x83, 0x7d, 0x16, 0x83, 0xb2, 0xc6, 0xf3, 0x4a, 0x26, 0xc1, 0xb2, 0xef, 0xfa,
    0x88, 0x6b, 0x42, 0x38, 0x61, 0x28, 0x5c, 0x97, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// Smallest accepted maximum record size.
pub const MIN_RECORD_SIZE: usize = 64;

/// Finite-field Diffie-Hellman group for DHE suites.
#[derive(Clone, PartialEq, Eq)]
pub struct DhParameters {
    /// Prime modulus, big-endian
    pub p: Vec<u8>,
    /// Generator, big-endian
    pub g: Vec<u8>,
}

impl core::fmt::Debug for DhParameters {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DhParameters")
            .field("bits", &(self.p.len() * 8))
            .field("g", &self.g)
            .finish()
    }
}

impl Default for DhParameters {
    fn default() -> Self {
        Self::ffdhe2048()
    }
}

impl DhParameters {
    /// The RFC 7919 2048-bit group, generator 2.
    pub fn ffdhe2048() -> Self {
        Self {
            p: FFDHE2048_PRIME.to_vec(),
            g: vec![2],
        }
    }

    /// Parse the first `DH PARAMETERS` PEM block.
    pub fn from_pem(text: &str) -> Result<Self> {
        let block = pem::parse(text)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?
            .into_iter()
            .find(|b| b.label == "DH PARAMETERS")
            .ok_or_else(|| Error::InvalidConfig("no DH PARAMETERS block".into()))?;
        let (p, g) = x509::dh_parameters(&block.der)
            .map_err(|e| Error::InvalidConfig(format!("DH parameters: {}", e)))?;
        if p.len() < 128 {
            return Err(Error::InvalidConfig(format!(
                "{}-bit DH prime is too small",
                p.len() * 8
            )));
        }
        Ok(Self { p, g })
    }

    /// [`DhParameters::from_pem`] on a file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_pem(&text)
    }
}

/// 0-RTT policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EarlyData {
    /// Never send or accept early data
    #[default]
    NotSupported,
    /// Server: accept up to `max_size` bytes and advertise it in tickets.
    /// Client: send early data when a ticket allows it.
    Supported {
        /// Largest early data payload
        max_size: u32,
    },
}

impl EarlyData {
    /// Advertised limit, zero when unsupported.
    pub fn max_size(self) -> u32 {
        match self {
            EarlyData::NotSupported => 0,
            EarlyData::Supported { max_size } => max_size,
        }
    }
}

/// Settings shared by every connection made with them.
#[derive(Clone)]
pub struct Config {
    /// Crypto backend
    pub provider: Arc<dyn CryptoProvider>,

    /// Versions, most preferred first
    pub protocol_versions: Vec<ProtocolVersion>,

    /// Suites, most preferred first
    pub cipher_suites: Vec<CipherSuite>,

    /// (EC)DHE groups, most preferred first
    pub supported_groups: Vec<NamedGroup>,

    /// Signature schemes accepted from the peer
    pub signature_schemes: Vec<SignatureScheme>,

    /// Certificate and key presented to the peer
    pub identity: Option<Identity>,

    /// Client: the name sent in server_name. Server: names it answers for.
    pub server_names: Vec<String>,

    /// Session ID and ticket resumption
    pub enable_session_resumption: bool,

    /// Largest plaintext fragment we send
    pub max_record_size: usize,

    /// 0-RTT policy
    pub early_data: EarlyData,

    /// Group used by DHE suites
    pub dh_parameters: DhParameters,

    /// PSK modes offered (client) or accepted (server)
    pub psk_modes: Vec<PskKeyExchangeMode>,

    /// Lifetime of issued tickets, seconds
    pub ticket_lifetime: u32,

    /// TLS 1.2 secure renegotiation
    pub allow_renegotiation: bool,
}

impl core::fmt::Debug for Config {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Config")
            .field("protocol_versions", &self.protocol_versions)
            .field("cipher_suites", &self.cipher_suites)
            .field("supported_groups", &self.supported_groups)
            .field("identity", &self.identity)
            .field("server_names", &self.server_names)
            .field("enable_session_resumption", &self.enable_session_resumption)
            .field("max_record_size", &self.max_record_size)
            .field("early_data", &self.early_data)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Start a builder with defaults around `provider`.
    pub fn builder(provider: Arc<dyn CryptoProvider>) -> ConfigBuilder {
        ConfigBuilder {
            config: Config {
                provider,
                protocol_versions: vec![ProtocolVersion::Tls13, ProtocolVersion::Tls12],
                cipher_suites: SUITES.iter().map(|d| d.suite).collect(),
                supported_groups: vec![NamedGroup::X25519, NamedGroup::Secp256r1],
                signature_schemes: vec![
                    SignatureScheme::Ed25519,
                    SignatureScheme::EcdsaSecp256r1Sha256,
                    SignatureScheme::RsaPssRsaeSha256,
                    SignatureScheme::RsaPssRsaeSha384,
                    SignatureScheme::RsaPkcs1Sha256,
                    SignatureScheme::RsaPkcs1Sha384,
                ],
                identity: None,
                server_names: Vec::new(),
                enable_session_resumption: true,
                max_record_size: MAX_FRAGMENT_LEN,
                early_data: EarlyData::NotSupported,
                dh_parameters: DhParameters::ffdhe2048(),
                psk_modes: vec![PskKeyExchangeMode::PskDheKe],
                ticket_lifetime: 7200,
                allow_renegotiation: true,
            },
        }
    }

    /// Whether `version` is enabled.
    pub fn supports(&self, version: ProtocolVersion) -> bool {
        self.protocol_versions.contains(&version)
    }

    /// Enabled suites usable at `version`, in preference order.
    pub fn suites_for(
        &self,
        version: ProtocolVersion,
    ) -> impl Iterator<Item = &'static CipherSuiteDescriptor> + '_ {
        self.cipher_suites
            .iter()
            .filter_map(|s| s.descriptor())
            .filter(move |d| d.usable_with(version))
    }

    /// First configured server name.
    pub fn server_name(&self) -> Option<&str> {
        self.server_names.first().map(String::as_str)
    }
}

/// Builder for [`Config`].
#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set supported protocol versions.
    pub fn with_protocol_versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.config.protocol_versions = versions.to_vec();
        self
    }

    /// Set the suites, most preferred first.
    pub fn with_cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.config.cipher_suites = suites.to_vec();
        self
    }

    /// Set the key exchange groups, most preferred first.
    pub fn with_supported_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.config.supported_groups = groups.to_vec();
        self
    }

    /// Set the signature schemes accepted from the peer.
    pub fn with_signature_schemes(mut self, schemes: &[SignatureScheme]) -> Self {
        self.config.signature_schemes = schemes.to_vec();
        self
    }

    /// Set the certificate identity.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.config.identity = Some(identity);
        self
    }

    /// Add a server name.
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_names.push(name.into());
        self
    }

    /// Enable session resumption.
    pub fn with_session_resumption(mut self, enable: bool) -> Self {
        self.config.enable_session_resumption = enable;
        self
    }

    /// Set the maximum plaintext record size.
    pub fn with_max_record_size(mut self, size: usize) -> Self {
        self.config.max_record_size = size;
        self
    }

    /// Set the 0-RTT policy.
    pub fn with_early_data(mut self, early_data: EarlyData) -> Self {
        self.config.early_data = early_data;
        self
    }

    /// Set the DHE group.
    pub fn with_dh_parameters(mut self, params: DhParameters) -> Self {
        self.config.dh_parameters = params;
        self
    }

    /// Set the PSK key exchange modes.
    pub fn with_psk_modes(mut self, modes: &[PskKeyExchangeMode]) -> Self {
        self.config.psk_modes = modes.to_vec();
        self
    }

    /// Set the lifetime of issued tickets, in seconds.
    pub fn with_ticket_lifetime(mut self, seconds: u32) -> Self {
        self.config.ticket_lifetime = seconds;
        self
    }

    /// Allow TLS 1.2 renegotiation.
    pub fn with_renegotiation(mut self, allow: bool) -> Self {
        self.config.allow_renegotiation = allow;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Config> {
        let config = self.config;

        if config.protocol_versions.is_empty() {
            return Err(Error::InvalidConfig("No protocol versions specified".into()));
        }
        if let Some(v) = config
            .protocol_versions
            .iter()
            .find(|v| !matches!(v, ProtocolVersion::Tls12 | ProtocolVersion::Tls13))
        {
            return Err(Error::InvalidConfig(format!("{} is not supported", v.name())));
        }

        if let Some(s) = config.cipher_suites.iter().find(|s| s.descriptor().is_none()) {
            return Err(Error::InvalidConfig(format!(
                "cipher suite {:#06x} is not supported",
                s.to_u16()
            )));
        }
        for &version in &config.protocol_versions {
            if config.suites_for(version).next().is_none() {
                return Err(Error::InvalidConfig(format!(
                    "no cipher suite usable with {}",
                    version.name()
                )));
            }
        }

        if config.supported_groups.is_empty() {
            return Err(Error::InvalidConfig("No key exchange groups specified".into()));
        }
        if let Some(g) = config
            .supported_groups
            .iter()
            .find(|g| g.key_exchange_algorithm().is_none())
        {
            return Err(Error::InvalidConfig(format!("group {:?} is not supported", g)));
        }

        if !(MIN_RECORD_SIZE..=MAX_FRAGMENT_LEN).contains(&config.max_record_size) {
            return Err(Error::InvalidConfig(format!(
                "max record size {} outside {}..={}",
                config.max_record_size, MIN_RECORD_SIZE, MAX_FRAGMENT_LEN
            )));
        }

        if config.ticket_lifetime > MAX_TICKET_LIFETIME {
            return Err(Error::InvalidConfig("ticket lifetime exceeds seven days".into()));
        }

        if config.psk_modes.is_empty()
            || config
                .psk_modes
                .iter()
                .any(|m| matches!(m, PskKeyExchangeMode::Unknown(_)))
        {
            return Err(Error::InvalidConfig("invalid PSK key exchange modes".into()));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_crypto_rustcrypto::RustCryptoProvider;

    fn provider() -> Arc<dyn CryptoProvider> {
        Arc::new(RustCryptoProvider::new())
    }

    #[test]
    fn test_default_config() {
        let config = Config::builder(provider()).build().unwrap();
        assert_eq!(
            config.protocol_versions,
            vec![ProtocolVersion::Tls13, ProtocolVersion::Tls12]
        );
        assert_eq!(config.max_record_size, 16384);
        assert!(config.enable_session_resumption);
        assert_eq!(config.early_data, EarlyData::NotSupported);
        assert_eq!(config.psk_modes, vec![PskKeyExchangeMode::PskDheKe]);
        assert_eq!(config.ticket_lifetime, 7200);
        assert_eq!(
            config.suites_for(ProtocolVersion::Tls13).next().map(|d| d.suite),
            Some(CipherSuite::Tls13Aes128GcmSha256)
        );
        assert_eq!(config.dh_parameters.p.len(), 256);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder(provider())
            .with_protocol_versions(&[ProtocolVersion::Tls12])
            .with_cipher_suites(&[CipherSuite::EcdheRsaWithAes128GcmSha256])
            .with_max_record_size(1024)
            .with_session_resumption(false)
            .with_early_data(EarlyData::Supported { max_size: 4096 })
            .with_server_name("example.com")
            .build()
            .unwrap();

        assert_eq!(config.protocol_versions, vec![ProtocolVersion::Tls12]);
        assert_eq!(config.max_record_size, 1024);
        assert!(!config.enable_session_resumption);
        assert_eq!(config.early_data.max_size(), 4096);
        assert_eq!(config.server_name(), Some("example.com"));
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::builder(provider())
            .with_protocol_versions(&[])
            .build()
            .is_err());
        assert!(Config::builder(provider())
            .with_protocol_versions(&[ProtocolVersion::Tls11])
            .build()
            .is_err());
        assert!(Config::builder(provider())
            .with_max_record_size(20000)
            .build()
            .is_err());
        assert!(Config::builder(provider())
            .with_max_record_size(32)
            .build()
            .is_err());
        // TLS 1.3 enabled but only a TLS 1.2 suite
        assert!(Config::builder(provider())
            .with_cipher_suites(&[CipherSuite::RsaWithAes128CbcSha])
            .build()
            .is_err());
        assert!(Config::builder(provider())
            .with_cipher_suites(&[CipherSuite::EmptyRenegotiationInfoScsv])
            .build()
            .is_err());
        assert!(Config::builder(provider())
            .with_supported_groups(&[NamedGroup::Secp384r1])
            .build()
            .is_err());
    }

    #[test]
    fn test_ticket_lifetime_limit() {
        assert!(Config::builder(provider())
            .with_ticket_lifetime(MAX_TICKET_LIFETIME)
            .build()
            .is_ok());
        assert!(matches!(
            Config::builder(provider())
                .with_ticket_lifetime(MAX_TICKET_LIFETIME + 1)
                .build(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_dh_parameters_from_pem() {
        let params = DhParameters::from_pem(include_str!("../tests/data/dh2048.pem")).unwrap();
        assert_eq!(params, DhParameters::ffdhe2048());
        assert!(DhParameters::from_pem("nothing").is_err());
    }
}
