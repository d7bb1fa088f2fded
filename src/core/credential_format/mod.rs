use core::fmt;
use std::{borrow::Cow, collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::holder::wallet::KeyType;

const FORMAT_JWT: &str = "jwt";
const FORMAT_JWT_VC: &str = "jwt_vc";
const FORMAT_JWT_VP: &str = "jwt_vp";
const FORMAT_LDP: &str = "ldp";
const FORMAT_LDP_VC: &str = "ldp_vc";
const FORMAT_LDP_VP: &str = "ldp_vp";

const PROOF_ED25519_2018: &str = "Ed25519Signature2018";
const PROOF_ED25519_2020: &str = "Ed25519Signature2020";
const PROOF_BBS_2020: &str = "BbsBlsSignature2020";
const PROOF_BBS_PROOF_2020: &str = "BbsBlsSignatureProof2020";
const PROOF_ECDSA_P256_2019: &str = "EcdsaSecp256r1Signature2019";

/// JSON-LD context required in a presentation signed with a BBS+ suite.
pub const SECURITY_CONTEXT_BBS_URL: &str = "https://w3id.org/security/bbs/v1";

/// A Json object of claim formats.
pub type ClaimFormatMap = HashMap<ClaimFormatDesignation, ClaimFormatPayload>;

/// Claim format payload, e.g. `{"proof_type": ["Ed25519Signature2018"]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClaimFormatPayload {
    #[serde(rename = "alg")]
    Alg(Vec<String>),
    #[serde(rename = "proof_type")]
    ProofType(Vec<String>),
    #[serde(untagged)]
    Other(serde_json::Value),
}

impl ClaimFormatPayload {
    /// Returns the proof types listed by an `ldp*` payload.
    pub fn proof_types(&self) -> &[String] {
        match self {
            Self::ProofType(proof_types) => proof_types,
            _ => &[],
        }
    }
}

/// The claim format designation used by presentation definitions and descriptor maps.
///
/// Registry of claim format type: https://identity.foundation/claim-format-registry/#registry
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClaimFormatDesignation {
    Jwt,
    JwtVc,
    JwtVp,
    Ldp,
    /// Verifiable Credentials signed with Linked Data Proof formats. Every
    /// credential placed in a presentation by this crate is designated `ldp_vc`.
    LdpVc,
    LdpVp,
    /// Other claim format designations not covered by the above.
    Other(String),
}

impl ClaimFormatDesignation {
    pub fn from_name(name: Cow<str>) -> Self {
        match name.as_ref() {
            FORMAT_JWT => Self::Jwt,
            FORMAT_JWT_VC => Self::JwtVc,
            FORMAT_JWT_VP => Self::JwtVp,
            FORMAT_LDP => Self::Ldp,
            FORMAT_LDP_VC => Self::LdpVc,
            FORMAT_LDP_VP => Self::LdpVp,
            _ => Self::Other(name.into_owned()),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Jwt => FORMAT_JWT,
            Self::JwtVc => FORMAT_JWT_VC,
            Self::JwtVp => FORMAT_JWT_VP,
            Self::Ldp => FORMAT_LDP,
            Self::LdpVc => FORMAT_LDP_VC,
            Self::LdpVp => FORMAT_LDP_VP,
            Self::Other(other) => other,
        }
    }
}

impl From<&str> for ClaimFormatDesignation {
    fn from(s: &str) -> Self {
        Self::from_name(Cow::Borrowed(s))
    }
}

impl From<String> for ClaimFormatDesignation {
    fn from(value: String) -> Self {
        Self::from_name(Cow::Owned(value))
    }
}

impl fmt::Display for ClaimFormatDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl Serialize for ClaimFormatDesignation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.name().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClaimFormatDesignation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Into::into)
    }
}

/// Linked Data Proof suite identifiers known to the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProofType {
    #[default]
    Ed25519Signature2018,
    Ed25519Signature2020,
    BbsBlsSignature2020,
    /// Derived (selective disclosure) proof over a BBS+ signed credential.
    BbsBlsSignatureProof2020,
    EcdsaSecp256r1Signature2019,
    Other(String),
}

impl ProofType {
    fn name(&self) -> &str {
        match self {
            Self::Ed25519Signature2018 => PROOF_ED25519_2018,
            Self::Ed25519Signature2020 => PROOF_ED25519_2020,
            Self::BbsBlsSignature2020 => PROOF_BBS_2020,
            Self::BbsBlsSignatureProof2020 => PROOF_BBS_PROOF_2020,
            Self::EcdsaSecp256r1Signature2019 => PROOF_ECDSA_P256_2019,
            Self::Other(other) => other,
        }
    }

    /// The wallet key type able to produce this proof, if the suite signs at all.
    pub fn key_type(&self) -> Option<KeyType> {
        match self {
            Self::Ed25519Signature2018 | Self::Ed25519Signature2020 => Some(KeyType::Ed25519),
            Self::BbsBlsSignature2020 => Some(KeyType::Bls12381G2),
            Self::EcdsaSecp256r1Signature2019 => Some(KeyType::P256),
            Self::BbsBlsSignatureProof2020 | Self::Other(_) => None,
        }
    }

    /// Whether presentations signed with this suite need the BBS+ security context.
    pub fn requires_bbs_context(&self) -> bool {
        matches!(self, Self::BbsBlsSignature2020)
    }
}

impl FromStr for ProofType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            PROOF_ED25519_2018 => Self::Ed25519Signature2018,
            PROOF_ED25519_2020 => Self::Ed25519Signature2020,
            PROOF_BBS_2020 => Self::BbsBlsSignature2020,
            PROOF_BBS_PROOF_2020 => Self::BbsBlsSignatureProof2020,
            PROOF_ECDSA_P256_2019 => Self::EcdsaSecp256r1Signature2019,
            other => Self::Other(other.to_owned()),
        })
    }
}

impl fmt::Display for ProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl Serialize for ProofType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.name().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProofType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        // Infallible.
        Ok(name.parse().unwrap_or_default())
    }
}
