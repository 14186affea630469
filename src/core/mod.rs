pub mod curl;
pub mod engine;
pub mod policy;
pub mod presign;
pub mod signer;

pub use crate::domain::model::{Condition, PostPolicy, ProbeReport};
pub use crate::domain::ports::{ObjectStore, Scenario, TargetProvider, Transport};
pub use crate::utils::error::Result;
