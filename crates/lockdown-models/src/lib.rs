pub mod finding;
pub mod session;

pub use finding::{
    Account, BatchDetail, Cloud, Finding, FindingBatch, FindingIdentifier, FindingInfo, Metadata,
    Product, Resource, COMPUTE_INSTANCE,
};
pub use session::{
    AuditRecord, RemediationSession, SessionStage, StepName, StepOutcome, StepStatus,
};
