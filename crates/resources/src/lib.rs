//! Managed resources of a log pipeline and the desired-state builder.
//!
//! | level | resources |
//! |---|---|
//! | identity | ServiceAccount, ClusterRole, ClusterRoleBinding |
//! | search engine | elasticsearch Deployment + Service (when self-managed) |
//! | aggregator | fluentd Service, ConfigMap, Deployment |
//! | collector | fluent-bit ConfigMap, DaemonSet |
//! | dashboard | kibana Deployment + Service (when enabled) |

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod aggregator;
pub mod builder;
pub mod collector;
pub mod dashboard;
pub mod desired;
pub mod meta;
pub mod pod;
pub mod rbac;
pub mod resource;
pub mod search;

pub use builder::DesiredStateBuilder;
pub use desired::{DesiredEntry, DesiredLevel, DesiredSet, Level};
pub use resource::{Drift, ManagedResource, ResourceId, ResourceKind};
