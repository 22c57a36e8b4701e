//! Bearer credentials.
//!
//! A [`Credential`] can only be built by [`Credential::parse`], so holding
//! one means the string had the expected three-segment base64url shape.
//! The backend still decides whether it is *valid*; this type only rules
//! out values that could never be.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::CredentialError;

/// Segment decoder: URL-safe alphabet, padding optional, and lenient about
/// trailing bits (signatures are opaque bytes, not canonical encodings).
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const SEGMENTS: usize = 3;

/// An opaque bearer token issued for exactly one principal kind.
///
/// `Debug` never prints the token itself, so a credential can sit inside
/// any struct that ends up in a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validates `raw` and wraps it.
    ///
    /// # Errors
    /// Returns a [`CredentialError`] describing the first problem found.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        if raw.is_empty() {
            return Err(CredentialError::Empty);
        }

        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != SEGMENTS {
            return Err(CredentialError::SegmentCount(segments.len()));
        }

        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(CredentialError::EmptySegment(index));
            }
            SEGMENT_ENGINE.decode(segment).map_err(|e| {
                CredentialError::InvalidSegment {
                    index,
                    reason: e.to_string(),
                }
            })?;
        }

        Ok(Self(raw.to_string()))
    }

    /// The token text, for the `Authorization` header and for storage.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<{} chars>)", self.0.len())
    }
}

impl FromStr for Credential {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
