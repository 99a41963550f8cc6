//! Fault-injection control: the operation vocabulary, rule values, the
//! protocol client, and YAML fault plans.

pub mod client;
pub mod error;
pub mod operation;
pub mod plan;
pub mod spec;

pub use client::{Compatibility, FaultInjectionClient};
pub use error::FaultError;
pub use operation::{InterceptableOperation, UnknownOperation};
pub use plan::{FaultPlan, PlanError, PlanRule};
pub use spec::{FaultParams, FaultSpec, Probability, SpecError, PROBABILITY_SCALE};
