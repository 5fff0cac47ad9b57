//! Game workload CRD definitions
//!
//! Typed views of the `tkex.tencent.com` custom resources the synchronizer
//! mirrors alongside the built-in workload kinds. Only the fields the CMDB
//! keeps are modelled; the pod template is carried as raw JSON.

pub mod game_deployment;
pub mod game_statefulset;
pub mod strategy;

pub use game_deployment::*;
pub use game_statefulset::*;
pub use strategy::*;
