//! Configuration types for dirmirror
//!
//! Small validated newtypes shared between the settings layer and the engine.

/// Upper bound on concurrently dispatched filesystem operations within one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct Concurrency(usize);

impl Concurrency {
    /// Minimum concurrency
    pub const MIN: usize = 1;
    /// Maximum concurrency
    pub const MAX: usize = 1024;

    /// Create a new concurrency limit with validation
    pub fn new(limit: usize) -> Result<Self, String> {
        if limit < Self::MIN {
            Err(format!("Concurrency {} is below minimum {}", limit, Self::MIN))
        } else if limit > Self::MAX {
            Err(format!("Concurrency {} exceeds maximum {}", limit, Self::MAX))
        } else {
            Ok(Self(limit))
        }
    }

    /// Get the concurrency value
    pub fn get(self) -> usize {
        self.0
    }

    /// Filesystem calls mostly wait on the OS, so allow a few per core
    pub fn optimal() -> Self {
        Self((num_cpus::get() * 4).clamp(Self::MIN, Self::MAX))
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::optimal()
    }
}

impl TryFrom<usize> for Concurrency {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Concurrency> for usize {
    fn from(value: Concurrency) -> Self {
        value.0
    }
}
