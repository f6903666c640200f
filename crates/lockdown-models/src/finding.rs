//! Typed findings-batch schema.
//!
//! The upstream feed delivers OCSF-shaped events. Parsing happens once at the
//! ingestion boundary; everything downstream works with these structs instead
//! of reaching into untyped JSON.

use serde::{Deserialize, Serialize};

/// Resource type that makes a finding actionable.
pub const COMPUTE_INSTANCE: &str = "compute-instance";

/// One findings-batch event as delivered by the upstream feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingBatch {
    pub detail: BatchDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDetail {
    #[serde(default)]
    pub findings: Vec<Finding>,
}

/// A single reported security event. Read-only to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub cloud: Cloud,
    #[serde(default)]
    pub resources: Vec<Resource>,
    pub finding_info: FindingInfo,
    pub metadata: Metadata,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cloud {
    #[serde(default)]
    pub region: Option<String>,
    pub account: Account,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingInfo {
    pub uid: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub product: Product,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub uid: String,
}

/// Identifier triple echoed back to the findings feed when a batch is
/// marked resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingIdentifier {
    pub cloud_account_uid: String,
    pub finding_info_uid: String,
    pub metadata_product_uid: String,
}

impl Finding {
    /// The implicated compute-instance id, if any resource is one.
    pub fn instance_id(&self) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.resource_type == COMPUTE_INSTANCE)
            .map(|r| r.uid.as_str())
    }

    pub fn region(&self) -> Option<&str> {
        self.cloud.region.as_deref()
    }

    pub fn identifier(&self) -> FindingIdentifier {
        FindingIdentifier {
            cloud_account_uid: self.cloud.account.uid.clone(),
            finding_info_uid: self.finding_info.uid.clone(),
            metadata_product_uid: self.metadata.product.uid.clone(),
        }
    }
}
