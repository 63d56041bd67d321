use core::fmt;
use core::num::NonZeroU64;
use core::str::FromStr;

use crate::error::LfError;

/// Stable identifier for an activity or exchange in the entity registry.
///
/// A key is the pair `(database, code)`. Keys are never reused after
/// deletion, so they double as the join key between calculation setups and
/// live entities.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityKey {
    database: String,
    code: String,
}

impl EntityKey {
    pub fn new(database: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            code: code.into(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({}:{})", self.database, self.code)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.database, self.code)
    }
}

/// Parses `database:code`; the code is everything after the last colon.
impl FromStr for EntityKey {
    type Err = LfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((db, code)) if !db.is_empty() && !code.is_empty() => Ok(Self::new(db, code)),
            _ => Err(LfError::MalformedKey {
                input: s.to_string(),
            }),
        }
    }
}

/// Reference to an impact assessment method: a tuple of strings such as
/// `("IPCC 2013", "climate change", "GWP 100a")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MethodRef(Vec<String>);

impl MethodRef {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

/// Handle returned when connecting to a signal; required to disconnect.
///
/// `NonZero` keeps `Option<SubscriptionId>` the same size as the id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(NonZeroU64);

impl SubscriptionId {
    /// Build from a 0-based sequence number.
    pub fn from_seq(seq: u64) -> Self {
        Self(NonZeroU64::MIN.saturating_add(seq))
    }

    pub fn seq(self) -> u64 {
        self.0.get() - 1
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.seq())
    }
}
