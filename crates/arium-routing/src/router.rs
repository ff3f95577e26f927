use futures::future::BoxFuture;

use arium_core::error::Result;
use arium_memory::Memory;

use crate::context::ExecutionContext;

/// A routing decision: memory (+ execution context) to the name of the
/// next node.
///
/// Routers are pure readers of memory. Returning a name outside the edge's
/// declared destinations is a fatal traversal error, enforced by the
/// engine.
pub trait Router: Send + Sync {
    /// Choose the next node.
    fn route<'a>(
        &'a self,
        memory: &'a dyn Memory,
        ctx: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Result<String>>;

    /// The statically-known return domain, when the router has one.
    ///
    /// A `Some` domain must equal the edge's declared destinations, unless
    /// `allows_self_reference` — then it must be a superset containing
    /// them.
    fn domain(&self) -> Option<Vec<String>> {
        None
    }

    /// Whether this router may route back to its own source node.
    fn allows_self_reference(&self) -> bool {
        false
    }
}

/// Trivial default router: always one fixed destination.
pub struct StaticRouter {
    target: String,
}

impl StaticRouter {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Router for StaticRouter {
    fn route<'a>(
        &'a self,
        _memory: &'a dyn Memory,
        _ctx: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { Ok(self.target.clone()) })
    }

    fn domain(&self) -> Option<Vec<String>> {
        Some(vec![self.target.clone()])
    }
}

/// Closure-backed router, for routing logic that needs no model call.
pub struct FnRouter<F> {
    decide: F,
    domain: Option<Vec<String>>,
    self_reference: bool,
}

impl<F> FnRouter<F>
where
    F: Fn(&dyn Memory, Option<&ExecutionContext>) -> String + Send + Sync,
{
    pub fn new(decide: F) -> Self {
        Self {
            decide,
            domain: None,
            self_reference: false,
        }
    }

    /// Declare the return domain for build-time validation.
    pub fn with_domain(mut self, domain: Vec<String>) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_self_reference(mut self, allowed: bool) -> Self {
        self.self_reference = allowed;
        self
    }
}

impl<F> Router for FnRouter<F>
where
    F: Fn(&dyn Memory, Option<&ExecutionContext>) -> String + Send + Sync,
{
    fn route<'a>(
        &'a self,
        memory: &'a dyn Memory,
        ctx: Option<&'a ExecutionContext>,
    ) -> BoxFuture<'a, Result<String>> {
        let decision = (self.decide)(memory, ctx);
        Box::pin(async move { Ok(decision) })
    }

    fn domain(&self) -> Option<Vec<String>> {
        self.domain.clone()
    }

    fn allows_self_reference(&self) -> bool {
        self.self_reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arium_memory::WorkflowMemory;

    #[tokio::test]
    async fn test_static_router() {
        let router = StaticRouter::new("next");
        let memory = WorkflowMemory::new();
        let decision = router.route(&memory, None).await.unwrap();
        assert_eq!(decision, "next");
        assert_eq!(router.domain(), Some(vec!["next".to_string()]));
        assert!(!router.allows_self_reference());
    }

    #[tokio::test]
    async fn test_fn_router_reads_memory() {
        let router = FnRouter::new(|memory: &dyn Memory, _ctx| {
            if memory.is_empty() {
                "seed".to_string()
            } else {
                "work".to_string()
            }
        })
        .with_domain(vec!["seed".into(), "work".into()]);

        let mut memory = WorkflowMemory::new();
        assert_eq!(router.route(&memory, None).await.unwrap(), "seed");
        memory.add("a", serde_json::json!(1));
        assert_eq!(router.route(&memory, None).await.unwrap(), "work");
    }
}
