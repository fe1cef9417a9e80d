//! Service layer
//!
//! Contains the social graph logic, separated from storage.
//! Services orchestrate reads and writes against a `UserStore`.

mod audit;
mod social;

pub use audit::{AuditReport, GraphAudit};
pub use social::{Connections, Feed, Outcome, SocialService};
