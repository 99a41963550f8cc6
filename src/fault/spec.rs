//! Fault rule value objects.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::operation::InterceptableOperation;

/// Denominator for [`Probability`]: chances are expressed per 100 000 calls.
pub const PROBABILITY_SCALE: u32 = 100_000;

/// Validation failures for fault rules, raised before any network I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// Probability outside `[0, 100000]`.
    #[error("probability {0} is outside [0, {PROBABILITY_SCALE}] (parts per {PROBABILITY_SCALE})")]
    ProbabilityOutOfRange(i64),
    /// A per-operation rule with no operations.
    #[error("a fault rule must target at least one operation")]
    NoTargetOperations,
    /// Delay that does not fit the protocol's signed 32-bit field.
    #[error("delay of {0} microseconds exceeds the protocol maximum of {max}", max = i32::MAX)]
    DelayTooLarge(u64),
}

/// Chance that a matching call is perturbed, in parts per 100 000.
///
/// Never a percentage: `Probability::new(1000)` fires on roughly 1% of calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Probability(u32);

impl Probability {
    /// Fires on every matching call.
    pub const ALWAYS: Self = Self(PROBABILITY_SCALE);
    /// Never fires.
    pub const NEVER: Self = Self(0);

    /// Creates a probability from parts per 100 000.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::ProbabilityOutOfRange`] for values above 100 000.
    pub fn new(per_hundred_thousand: u32) -> Result<Self, SpecError> {
        Self::try_from(i64::from(per_hundred_thousand))
    }

    /// Parts per 100 000.
    #[must_use]
    pub const fn per_hundred_thousand(self) -> u32 {
        self.0
    }

    /// Wire representation (`i32` on the protocol).
    #[must_use]
    pub fn to_wire(self) -> i32 {
        // Bounded by PROBABILITY_SCALE, always fits.
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl TryFrom<i64> for Probability {
    type Error = SpecError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u32::try_from(value) {
            Ok(v) if v <= PROBABILITY_SCALE => Ok(Self(v)),
            _ => Err(SpecError::ProbabilityOutOfRange(value)),
        }
    }
}

impl From<Probability> for u32 {
    fn from(p: Probability) -> Self {
        p.0
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{PROBABILITY_SCALE}", self.0)
    }
}

/// The effect half of a fault rule, shared by per-operation and global rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultParams {
    /// OS error code returned when the fault fires. Ignored when `random` is set.
    #[serde(default)]
    pub error_number: i32,
    /// Let the service pick a random error code instead of `error_number`.
    #[serde(default)]
    pub random: bool,
    /// Chance that a matching call is perturbed.
    pub probability: Probability,
    /// Regular expression over file paths; empty matches every path.
    #[serde(default)]
    pub victim_pattern: String,
    /// Forcibly terminate the calling process of a matching call.
    #[serde(default)]
    pub kill_caller: bool,
    /// Latency injected into a matching call before it returns.
    #[serde(default)]
    pub delay_micros: u32,
}

impl FaultParams {
    /// Parameters that return `error_number` on every matching call.
    #[must_use]
    pub fn errno(error_number: i32) -> Self {
        Self {
            error_number,
            random: false,
            probability: Probability::ALWAYS,
            victim_pattern: String::new(),
            kill_caller: false,
            delay_micros: 0,
        }
    }

    /// Sets the probability.
    #[must_use]
    pub fn with_probability(mut self, probability: Probability) -> Self {
        self.probability = probability;
        self
    }

    /// Asks the service to choose the error code.
    #[must_use]
    pub fn with_random_errno(mut self) -> Self {
        self.random = true;
        self
    }

    /// Restricts the rule to paths matching `pattern`.
    #[must_use]
    pub fn with_victim_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.victim_pattern = pattern.into();
        self
    }

    /// Kills the caller when the fault fires.
    #[must_use]
    pub fn killing_caller(mut self) -> Self {
        self.kill_caller = true;
        self
    }

    /// Adds latency to matching calls.
    #[must_use]
    pub fn with_delay_micros(mut self, delay_micros: u32) -> Self {
        self.delay_micros = delay_micros;
        self
    }

    /// Checks the parameters against the protocol's limits.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::DelayTooLarge`] when the delay does not fit an `i32`.
    pub fn validate(&self) -> Result<(), SpecError> {
        self.delay_wire().map(|_| ())
    }

    /// Delay as sent on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::DelayTooLarge`] when the delay does not fit an `i32`.
    pub fn delay_wire(&self) -> Result<i32, SpecError> {
        i32::try_from(self.delay_micros)
            .map_err(|_| SpecError::DelayTooLarge(u64::from(self.delay_micros)))
    }
}

/// One fault-injection rule for a set of operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultSpec {
    /// Operations the rule applies to. Order is irrelevant.
    #[serde(rename = "operations")]
    pub target_operations: BTreeSet<InterceptableOperation>,
    /// What happens when the rule fires.
    #[serde(flatten)]
    pub params: FaultParams,
}

impl FaultSpec {
    /// Creates a rule for the given operations.
    pub fn new(
        operations: impl IntoIterator<Item = InterceptableOperation>,
        params: FaultParams,
    ) -> Self {
        Self { target_operations: operations.into_iter().collect(), params }
    }

    /// Checks the rule before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::NoTargetOperations`] for an empty target set, or any
    /// parameter error from [`FaultParams::validate`].
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.target_operations.is_empty() {
            return Err(SpecError::NoTargetOperations);
        }
        self.params.validate()
    }

    /// Wire names of the targeted operations, sorted.
    #[must_use]
    pub fn wire_names(&self) -> Vec<String> {
        self.target_operations.iter().map(|op| op.wire_name().to_string()).collect()
    }
}
