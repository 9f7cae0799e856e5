//! Ordering graph validation
//!
//! Proves a complete peel order exists over the pending services before
//! any command runs. Works on a scratch copy of the prerequisite sets,
//! never the live model.

use crate::cluster::{ClusterModel, OrderDirection};
use crate::error::{FlotillaError, Result};
use std::collections::BTreeMap;

/// Validate that the pending graph is acyclic in the given direction
///
/// Repeatedly peels every service whose prerequisite set is empty and
/// erases its name from the remaining sets. If a pass peels nothing while
/// services remain, the leftover — true cycles and dangling references
/// alike — is reported as a [`FlotillaError::Graph`] listing every stuck
/// service with its unresolved prerequisites.
pub fn validate(model: &ClusterModel, direction: OrderDirection) -> Result<()> {
    let mut pending: BTreeMap<String, Vec<String>> = model
        .services
        .values()
        .map(|s| {
            (
                s.name.clone(),
                s.prereqs(direction).iter().cloned().collect(),
            )
        })
        .collect();

    loop {
        let ready: Vec<String> = pending
            .iter()
            .filter(|(_, prereqs)| prereqs.is_empty())
            .map(|(name, _)| name.clone())
            .collect();

        if ready.is_empty() {
            break;
        }

        for name in &ready {
            pending.remove(name);
        }
        for prereqs in pending.values_mut() {
            prereqs.retain(|p| !ready.contains(p));
        }
    }

    if pending.is_empty() {
        return Ok(());
    }

    let diagnostic = pending
        .iter()
        .map(|(name, prereqs)| format!("  {} (waiting on: {})", name, prereqs.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    Err(FlotillaError::Graph(diagnostic))
}
