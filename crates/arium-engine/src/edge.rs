use std::collections::BTreeSet;
use std::sync::Arc;

use arium_core::error::{AriumError, Result};
use arium_routing::{Router, StaticRouter};

/// The outgoing-transition record for one source node: a router paired
/// with its declared legal destinations.
pub struct Edge {
    pub source: String,
    pub targets: Vec<String>,
    pub router: Arc<dyn Router>,
}

impl Edge {
    /// Fixed single-target edge with the trivial router.
    pub fn direct(source: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            source: source.into(),
            targets: vec![target.clone()],
            router: Arc::new(StaticRouter::new(target)),
        }
    }

    /// Branching edge with an explicit router and destination set.
    pub fn routed(
        source: impl Into<String>,
        targets: Vec<String>,
        router: Arc<dyn Router>,
    ) -> Self {
        Self {
            source: source.into(),
            targets,
            router,
        }
    }

    /// Check the router's statically-known return domain against the
    /// declared destinations: equality normally, superset for routers
    /// that may route back to their own source.
    pub fn validate_domain(&self) -> Result<()> {
        let Some(domain) = self.router.domain() else {
            return Ok(());
        };
        let domain_set: BTreeSet<&str> = domain.iter().map(|s| s.as_str()).collect();
        let target_set: BTreeSet<&str> = self.targets.iter().map(|s| s.as_str()).collect();

        let consistent = if self.router.allows_self_reference() {
            target_set.is_subset(&domain_set)
        } else {
            domain_set == target_set
        };

        if consistent {
            Ok(())
        } else {
            Err(AriumError::RouterDomain {
                from_node: self.source.clone(),
                domain,
                destinations: self.targets.clone(),
            })
        }
    }
}
