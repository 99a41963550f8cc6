//! Fault plans: ordered rule lists loaded from YAML and applied through a client.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::client::FaultInjectionClient;
use super::error::FaultError;
use super::operation::InterceptableOperation;
use super::spec::{FaultParams, FaultSpec, SpecError};
use crate::ports::FileSystem;

/// Failures while loading or applying a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The plan file could not be read.
    #[error("failed to read fault plan {path}: {message}")]
    Read {
        /// Plan file path.
        path: PathBuf,
        /// Underlying error text.
        message: String,
    },
    /// The plan is not valid YAML or has the wrong shape.
    #[error("failed to parse fault plan: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A rule parsed but does not pass validation.
    #[error("rule {index}: {source}")]
    InvalidRule {
        /// Zero-based rule index.
        index: usize,
        /// Validation failure.
        source: SpecError,
    },
    /// Clearing existing faults before the rules failed.
    #[error("failed to clear faults before applying the plan: {0}")]
    Clear(#[source] FaultError),
    /// The service rejected or failed a rule.
    #[error("rule {index} could not be applied: {source}")]
    Apply {
        /// Zero-based rule index.
        index: usize,
        /// Client failure.
        source: FaultError,
    },
}

/// One plan entry: a per-operation rule or a rule for every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub enum PlanRule {
    /// Rule for the listed operations.
    Operations(FaultSpec),
    /// Rule for every operation.
    All(FaultParams),
}

impl PlanRule {
    fn validate(&self) -> Result<(), SpecError> {
        match self {
            Self::Operations(spec) => spec.validate(),
            Self::All(params) => params.validate(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    operations: Vec<InterceptableOperation>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    all: bool,
    #[serde(flatten)]
    params: FaultParams,
}

impl TryFrom<RawRule> for PlanRule {
    type Error = String;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        match (raw.all, raw.operations.is_empty()) {
            (true, true) => Ok(Self::All(raw.params)),
            (false, false) => Ok(Self::Operations(FaultSpec::new(raw.operations, raw.params))),
            (true, false) => Err("a rule cannot set both `all` and `operations`".to_string()),
            (false, true) => Err("a rule needs a non-empty `operations` list or `all: true`".to_string()),
        }
    }
}

impl From<PlanRule> for RawRule {
    fn from(rule: PlanRule) -> Self {
        match rule {
            PlanRule::Operations(spec) => Self {
                operations: spec.target_operations.into_iter().collect(),
                all: false,
                params: spec.params,
            },
            PlanRule::All(params) => Self { operations: Vec::new(), all: true, params },
        }
    }
}

fn default_clear_first() -> bool {
    true
}

/// An ordered list of fault rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPlan {
    /// Clear every active fault before applying the rules.
    #[serde(default = "default_clear_first")]
    pub clear_first: bool,
    /// Rules, applied in order.
    #[serde(default)]
    pub rules: Vec<PlanRule>,
}

impl FaultPlan {
    /// Parses and validates a plan.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Parse`] for malformed YAML, unknown operation names
    /// or out-of-range probabilities, and [`PlanError::InvalidRule`] for rules
    /// that fail validation.
    pub fn from_yaml(yaml: &str) -> Result<Self, PlanError> {
        let plan: Self = serde_yaml::from_str(yaml)?;
        for (index, rule) in plan.rules.iter().enumerate() {
            rule.validate().map_err(|source| PlanError::InvalidRule { index, source })?;
        }
        Ok(plan)
    }

    /// Reads and validates a plan file.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Read`] when the file cannot be read, otherwise as
    /// [`from_yaml`](Self::from_yaml).
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self, PlanError> {
        let yaml = fs
            .read_to_string(path)
            .map_err(|e| PlanError::Read { path: path.to_path_buf(), message: e.to_string() })?;
        Self::from_yaml(&yaml)
    }

    /// Applies the plan, stopping at the first failing rule.
    ///
    /// Returns the number of rules applied.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Apply`] naming the failing rule. Rules before it
    /// stay in effect on the service.
    pub async fn apply(&self, client: &mut FaultInjectionClient) -> Result<usize, PlanError> {
        if self.clear_first {
            client.clear_all_faults().await.map_err(PlanError::Clear)?;
        }
        for (index, rule) in self.rules.iter().enumerate() {
            let applied = match rule {
                PlanRule::Operations(spec) => client.set_fault(spec).await,
                PlanRule::All(params) => client.set_all_faults(params).await,
            };
            applied.map_err(|source| PlanError::Apply { index, source })?;
        }
        info!(rules = self.rules.len(), "applied fault plan");
        Ok(self.rules.len())
    }
}
