use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A hash algorithm that may appear in a lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha256,
    Sha384,
    Sha512,
    Blake2b,
}

impl HashAlgorithm {
    /// Returns `true` if pip accepts the algorithm in `--hash` options.
    pub fn is_exportable(self) -> bool {
        matches!(self, Self::Sha256 | Self::Sha384 | Self::Sha512)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Blake2b => "blake2b",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            "blake2b" => Ok(Self::Blake2b),
            _ => Err(HashParseError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A digest, encoded in lock files as `{algorithm}:{digest}`.
///
/// A digest without an algorithm prefix is a SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashDigest {
    pub algorithm: HashAlgorithm,
    pub digest: String,
}

impl FromStr for HashDigest {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, digest) = match s.split_once(':') {
            Some((algorithm, digest)) => (algorithm.parse::<HashAlgorithm>()?, digest),
            None => (HashAlgorithm::Sha256, s),
        };
        if digest.is_empty() {
            return Err(HashParseError::MissingDigest(s.to_string()));
        }
        Ok(Self {
            algorithm,
            digest: digest.to_string(),
        })
    }
}

impl Display for HashDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

impl<'de> serde::Deserialize<'de> for HashDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        string.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashParseError {
    #[error(
        "Unsupported hash algorithm `{0}`, expected one of: `md5`, `sha256`, `sha384`, `sha512`, `blake2b`"
    )]
    UnsupportedAlgorithm(String),
    #[error("Expected a digest in `{0}`")]
    MissingDigest(String),
}

#[cfg(test)]
mod tests {
    use super::{HashAlgorithm, HashDigest, HashParseError};

    #[test]
    fn parse() {
        let hash: HashDigest = "sha512:abcd".parse().unwrap();
        assert_eq!(hash.algorithm, HashAlgorithm::Sha512);
        assert_eq!(hash.to_string(), "sha512:abcd");

        let bare: HashDigest = "abcd".parse().unwrap();
        assert_eq!(bare.to_string(), "sha256:abcd");

        assert_eq!(
            "crc32:abcd".parse::<HashDigest>(),
            Err(HashParseError::UnsupportedAlgorithm("crc32".to_string()))
        );
        assert_eq!(
            "sha256:".parse::<HashDigest>(),
            Err(HashParseError::MissingDigest("sha256:".to_string()))
        );
    }

    #[test]
    fn exportable() {
        assert!(HashAlgorithm::Sha256.is_exportable());
        assert!(HashAlgorithm::Sha512.is_exportable());
        assert!(!HashAlgorithm::Md5.is_exportable());
        assert!(!HashAlgorithm::Blake2b.is_exportable());
    }
}
