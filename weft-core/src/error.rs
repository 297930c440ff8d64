//! Error types for the weft protocol engine.

use core::fmt;

/// Result type for weft operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised while negotiating or using a connection.
///
/// Every variant that originates locally maps to the fatal alert that must
/// be sent to the peer before the connection is torn down, see
/// [`Error::alert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed record or handshake framing, truncated body, bad length
    Decode(String),

    /// A message that is never valid in the current role or version
    UnexpectedMessage(String),

    /// The state machine refused a transition
    Protocol(ProtocolFault),

    /// Negotiation failed (no shared suite, group or signature scheme,
    /// bad renegotiation binding)
    HandshakeFailure(String),

    /// No mutually supported protocol version
    ProtocolVersion(String),

    /// A field carried a value the peer was not allowed to pick
    IllegalParameter(String),

    /// Record MAC or AEAD tag did not verify
    BadRecordMac,

    /// Record exceeded the permitted length
    RecordOverflow(usize),

    /// Finished verify-data or PSK binder mismatch
    DecryptError(String),

    /// Peer certificate could not be used
    BadCertificate(String),

    /// Handshake signature did not verify
    SignatureVerificationFailed,

    /// A mandatory extension was absent
    MissingExtension(&'static str),

    /// Fatal alert received from the peer
    AlertReceived(AlertDescription),

    /// The peer closed the transport or sent close_notify
    ConnectionClosed,

    /// Transport failure
    Io(String),

    /// Crypto provider failure
    Crypto(String),

    /// Invalid configuration
    InvalidConfig(String),

    /// Local invariant violated (key schedule misuse, sequence overflow)
    Internal(String),
}

impl Error {
    /// The fatal alert to send for this error, if any.
    ///
    /// Errors reported by the peer or by the transport have no alert.
    pub fn alert(&self) -> Option<AlertDescription> {
        let description = match self {
            Error::Decode(_) => AlertDescription::DecodeError,
            Error::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
            Error::Protocol(_) => AlertDescription::HandshakeFailure,
            Error::HandshakeFailure(_) => AlertDescription::HandshakeFailure,
            Error::ProtocolVersion(_) => AlertDescription::ProtocolVersion,
            Error::IllegalParameter(_) => AlertDescription::IllegalParameter,
            Error::BadRecordMac => AlertDescription::BadRecordMac,
            Error::RecordOverflow(_) => AlertDescription::RecordOverflow,
            Error::DecryptError(_) => AlertDescription::DecryptError,
            Error::BadCertificate(_) => AlertDescription::BadCertificate,
            Error::SignatureVerificationFailed => AlertDescription::HandshakeFailure,
            Error::MissingExtension(_) => AlertDescription::MissingExtension,
            Error::Crypto(_) | Error::Internal(_) => AlertDescription::InternalError,
            Error::AlertReceived(_)
            | Error::ConnectionClosed
            | Error::Io(_)
            | Error::InvalidConfig(_) => return None,
        };
        Some(description)
    }

    pub(crate) fn decode(what: impl fmt::Display) -> Self {
        Error::Decode(what.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
            Error::UnexpectedMessage(msg) => write!(f, "Unexpected message: {}", msg),
            Error::Protocol(fault) => write!(f, "Protocol fault: {}", fault),
            Error::HandshakeFailure(msg) => write!(f, "Handshake failure: {}", msg),
            Error::ProtocolVersion(msg) => write!(f, "Protocol version: {}", msg),
            Error::IllegalParameter(msg) => write!(f, "Illegal parameter: {}", msg),
            Error::BadRecordMac => write!(f, "Bad record MAC"),
            Error::RecordOverflow(len) => write!(f, "Record overflow: {} bytes", len),
            Error::DecryptError(msg) => write!(f, "Decrypt error: {}", msg),
            Error::BadCertificate(msg) => write!(f, "Bad certificate: {}", msg),
            Error::SignatureVerificationFailed => write!(f, "Signature verification failed"),
            Error::MissingExtension(name) => write!(f, "Missing extension: {}", name),
            Error::AlertReceived(desc) => write!(f, "Alert received: {:?}", desc),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Crypto(msg) => write!(f, "Cryptographic error: {}", msg),
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<weft_crypto::Error> for Error {
    fn from(e: weft_crypto::Error) -> Self {
        match e {
            weft_crypto::Error::AuthenticationFailed => Error::BadRecordMac,
            weft_crypto::Error::SignatureVerificationFailed
            | weft_crypto::Error::InvalidSignature => Error::SignatureVerificationFailed,
            weft_crypto::Error::InvalidPublicKey => {
                Error::IllegalParameter("invalid peer public key".into())
            },
            other => Error::Crypto(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(e.to_string()),
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        let kind = match e {
            Error::ConnectionClosed => std::io::ErrorKind::UnexpectedEof,
            Error::InvalidConfig(_) => std::io::ErrorKind::InvalidInput,
            Error::Io(_) => std::io::ErrorKind::Other,
            _ => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, e)
    }
}

/// An illegal handshake state transition.
///
/// Returned by the state machine instead of trapping, so that only the
/// offending connection is aborted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolFault {
    /// State the machine was in
    pub from: String,

    /// State that was requested
    pub to: String,
}

impl fmt::Display for ProtocolFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal transition {} -> {}", self.from, self.to)
    }
}

impl From<ProtocolFault> for Error {
    fn from(fault: ProtocolFault) -> Self {
        Error::Protocol(fault)
    }
}

/// TLS alert descriptions (RFC 5246 Section 7.2, RFC 8446 Section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertDescription {
    /// Close notify
    CloseNotify = 0,

    /// Unexpected message
    UnexpectedMessage = 10,

    /// Bad record MAC
    BadRecordMac = 20,

    /// Record overflow
    RecordOverflow = 22,

    /// Handshake failure
    HandshakeFailure = 40,

    /// Bad certificate
    BadCertificate = 42,

    /// Unsupported certificate
    UnsupportedCertificate = 43,

    /// Certificate revoked
    CertificateRevoked = 44,

    /// Certificate expired
    CertificateExpired = 45,

    /// Certificate unknown
    CertificateUnknown = 46,

    /// Illegal parameter
    IllegalParameter = 47,

    /// Unknown CA
    UnknownCa = 48,

    /// Access denied
    AccessDenied = 49,

    /// Decode error
    DecodeError = 50,

    /// Decrypt error
    DecryptError = 51,

    /// Protocol version
    ProtocolVersion = 70,

    /// Insufficient security
    InsufficientSecurity = 71,

    /// Internal error
    InternalError = 80,

    /// Inappropriate fallback
    InappropriateFallback = 86,

    /// User canceled
    UserCanceled = 90,

    /// No renegotiation (TLS 1.2, warning level)
    NoRenegotiation = 100,

    /// Missing extension
    MissingExtension = 109,

    /// Unsupported extension
    UnsupportedExtension = 110,

    /// Unrecognized name
    UnrecognizedName = 112,

    /// Unknown PSK identity
    UnknownPskIdentity = 115,

    /// Certificate required
    CertificateRequired = 116,

    /// No application protocol
    NoApplicationProtocol = 120,
}

impl AlertDescription {
    /// Convert from wire format (u8).
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AlertDescription::CloseNotify),
            10 => Some(AlertDescription::UnexpectedMessage),
            20 => Some(AlertDescription::BadRecordMac),
            22 => Some(AlertDescription::RecordOverflow),
            40 => Some(AlertDescription::HandshakeFailure),
            42 => Some(AlertDescription::BadCertificate),
            43 => Some(AlertDescription::UnsupportedCertificate),
            44 => Some(AlertDescription::CertificateRevoked),
            45 => Some(AlertDescription::CertificateExpired),
            46 => Some(AlertDescription::CertificateUnknown),
            47 => Some(AlertDescription::IllegalParameter),
            48 => Some(AlertDescription::UnknownCa),
            49 => Some(AlertDescription::AccessDenied),
            50 => Some(AlertDescription::DecodeError),
            51 => Some(AlertDescription::DecryptError),
            70 => Some(AlertDescription::ProtocolVersion),
            71 => Some(AlertDescription::InsufficientSecurity),
            80 => Some(AlertDescription::InternalError),
            86 => Some(AlertDescription::InappropriateFallback),
            90 => Some(AlertDescription::UserCanceled),
            100 => Some(AlertDescription::NoRenegotiation),
            109 => Some(AlertDescription::MissingExtension),
            110 => Some(AlertDescription::UnsupportedExtension),
            112 => Some(AlertDescription::UnrecognizedName),
            115 => Some(AlertDescription::UnknownPskIdentity),
            116 => Some(AlertDescription::CertificateRequired),
            120 => Some(AlertDescription::NoApplicationProtocol),
            _ => None,
        }
    }

    /// Convert to wire format (u8).
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Alerts that never end a connection on their own.
    pub const fn is_fatal(self) -> bool {
        !matches!(
            self,
            AlertDescription::CloseNotify
                | AlertDescription::UserCanceled
                | AlertDescription::NoRenegotiation
        )
    }
}
