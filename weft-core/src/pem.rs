//! PEM (RFC 7468) block extraction.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Error, Result};

/// One `-----BEGIN label-----` ... `-----END label-----` block.
#[derive(Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// Label, e.g. `CERTIFICATE`
    pub label: String,
    /// Decoded DER contents
    pub der: Vec<u8>,
}

impl core::fmt::Debug for PemBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PemBlock")
            .field("label", &self.label)
            .field("len", &self.der.len())
            .finish()
    }
}

/// Decode every PEM block in `text`, in order. Text outside blocks is
/// ignored.
pub fn parse(text: &str) -> Result<Vec<PemBlock>> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines().map(str::trim) {
        if let Some(label) = line
            .strip_prefix("-----BEGIN ")
            .and_then(|l| l.strip_suffix("-----"))
        {
            if current.is_some() {
                return Err(Error::decode("nested PEM block"));
            }
            current = Some((label.to_string(), String::new()));
        } else if let Some(label) = line
            .strip_prefix("-----END ")
            .and_then(|l| l.strip_suffix("-----"))
        {
            let Some((open, body)) = current.take() else {
                return Err(Error::decode("PEM END without BEGIN"));
            };
            if open != label {
                return Err(Error::decode(format_args!(
                    "PEM block {} closed as {}",
                    open, label
                )));
            }
            let der = STANDARD
                .decode(body.as_bytes())
                .map_err(|e| Error::decode(format_args!("PEM base64: {}", e)))?;
            blocks.push(PemBlock { label: open, der });
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
        }
    }

    if current.is_some() {
        return Err(Error::decode("unterminated PEM block"));
    }
    Ok(blocks)
}

/// Encode `der` as a PEM block with 64-column lines.
pub fn encode(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for chunk in body.as_bytes().chunks(64) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_blocks() {
        let text = format!(
            "junk\n{}{}",
            encode("CERTIFICATE", &[1, 2, 3]),
            encode("PRIVATE KEY", &[0xff; 100])
        );
        let blocks = parse(&text).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].label, "CERTIFICATE");
        assert_eq!(blocks[0].der, vec![1, 2, 3]);
        assert_eq!(blocks[1].der, vec![0xff; 100]);
    }

    #[test]
    fn test_malformed_blocks() {
        assert!(parse("-----BEGIN A-----\nAAAA\n").is_err());
        assert!(parse("-----BEGIN A-----\nAAAA\n-----END B-----\n").is_err());
        assert!(parse("-----BEGIN A-----\n!!!!\n-----END A-----\n").is_err());
        assert!(parse("no blocks here").unwrap().is_empty());
    }
}
