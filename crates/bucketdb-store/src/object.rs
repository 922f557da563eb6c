use std::collections::BTreeMap;
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Precondition value meaning "the object must not already exist".
pub const ETAG_ANY: &str = "*";

/// Compare-and-swap precondition on a write or delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional.
    None,
    /// No live object may exist at the key (`If-None-Match: *`).
    MustNotExist,
    /// The live object must carry exactly this ETag (`If-Match`).
    IfMatch(String),
}

impl Precondition {
    /// Interpret an ETag recorded before a write.
    ///
    /// An empty ETag or `*` means no object existed, so the write must not
    /// clobber one that appeared since.
    pub fn from_etag(etag: &str) -> Self {
        match etag {
            "" | ETAG_ANY => Self::MustNotExist,
            other => Self::IfMatch(other.to_string()),
        }
    }

    /// Check the precondition against the ETag of the live object, if any.
    pub fn holds(&self, current: Option<&str>) -> bool {
        match (self, current) {
            (Self::None, _) => true,
            (Self::MustNotExist, current) => current.is_none(),
            (Self::IfMatch(expected), Some(actual)) => expected == actual,
            (Self::IfMatch(_), None) => false,
        }
    }

    /// Like [`holds`](Self::holds), reporting a failure as
    /// [`StoreError::PreconditionFailed`] on `key`.
    pub fn check(&self, key: &str, current: Option<&str>) -> StoreResult<()> {
        if self.holds(current) {
            return Ok(());
        }
        Err(StoreError::PreconditionFailed {
            key: key.to_string(),
            expected: self.to_string(),
            actual: current.map_or_else(|| "absent".to_string(), |etag| format!("etag {etag}")),
        })
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "any"),
            Self::MustNotExist => write!(f, "absent"),
            Self::IfMatch(etag) => write!(f, "etag {etag}"),
        }
    }
}

/// Everything needed for a conditional PUT.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutRequest {
    pub content_type: String,
    pub user_metadata: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub precondition: Precondition,
}

impl PutRequest {
    /// An unconditional PUT with no user metadata.
    pub fn new(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            user_metadata: BTreeMap::new(),
            body,
            precondition: Precondition::None,
        }
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }

    pub fn with_metadata(mut self, user_metadata: BTreeMap<String, String>) -> Self {
        self.user_metadata = user_metadata;
        self
    }
}

/// Identity of the version a successful PUT created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutOutcome {
    pub etag: String,
    pub version_id: String,
}

/// One version of an object as returned by GET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub etag: String,
    pub version_id: String,
    pub content_type: String,
    pub user_metadata: BTreeMap<String, String>,
}

impl StoredObject {
    /// The size of `body` in bytes.
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }
}

/// Compute the ETag the in-memory backend assigns to a body.
///
/// Equal bodies get equal ETags, as with S3's content MD5.
pub fn content_etag(body: &[u8]) -> String {
    hex::encode(&blake3::hash(body).as_bytes()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_star_mean_absent() {
        assert_eq!(Precondition::from_etag(""), Precondition::MustNotExist);
        assert_eq!(Precondition::from_etag("*"), Precondition::MustNotExist);
        assert_eq!(
            Precondition::from_etag("abc"),
            Precondition::IfMatch("abc".into())
        );
    }

    #[test]
    fn precondition_holds() {
        assert!(Precondition::None.holds(None));
        assert!(Precondition::None.holds(Some("x")));
        assert!(Precondition::MustNotExist.holds(None));
        assert!(!Precondition::MustNotExist.holds(Some("x")));
        assert!(Precondition::IfMatch("x".into()).holds(Some("x")));
        assert!(!Precondition::IfMatch("x".into()).holds(Some("y")));
        assert!(!Precondition::IfMatch("x".into()).holds(None));
    }

    #[test]
    fn check_reports_both_sides() {
        let err = Precondition::IfMatch("x".into())
            .check("k", Some("y"))
            .unwrap_err();
        assert!(err.is_precondition_failed());
        assert_eq!(
            err.to_string(),
            "precondition failed for k: expected etag x, found etag y"
        );
        assert!(Precondition::MustNotExist.check("k", None).is_ok());
    }

    #[test]
    fn content_etag_is_stable() {
        assert_eq!(content_etag(b"abc"), content_etag(b"abc"));
        assert_ne!(content_etag(b"abc"), content_etag(b"abd"));
        assert_eq!(content_etag(b"").len(), 32);
    }
}
