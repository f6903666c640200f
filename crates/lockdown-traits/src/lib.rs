//! Collaborator seams for the containment orchestrator.
//!
//! The orchestrator never talks to a cloud provider directly; everything it
//! needs from the outside world comes through these traits. Implementations
//! live in downstream crates (the embedded parameter store in
//! lockdown-storage, provider SDK adapters in deployment-specific crates) and
//! in the in-memory doubles of [`memory`].

pub mod cloud;
pub mod memory;
pub mod notify;
pub mod params;

pub use cloud::{CommandStatus, ComputeControl, IdentityControl, RemoteExecutor};
pub use notify::{FindingsFeed, Notifier};
pub use params::ParamStore;
