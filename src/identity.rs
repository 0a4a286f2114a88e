use once_cell::sync::Lazy;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::RotationPolicy;

/// User agent advertised when no pool is configured
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Browser identities used when rotation is requested without a configured pool
static BUILTIN_AGENTS: Lazy<Vec<String>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/124.0.0.0 Safari/537.36"
            .to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like \
         Gecko) Version/17.4 Safari/605.1.15"
            .to_string(),
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
    ]
});

/// Pool of user-agent identities with a per-request selection policy.
///
/// The rotation cursor is the only state; the pool itself is immutable after
/// construction and safe to share across workers.
#[derive(Debug)]
pub struct IdentityPool {
    agents: Vec<String>,
    policy: RotationPolicy,
    cursor: AtomicUsize,
}

impl IdentityPool {
    pub fn new(agents: Vec<String>, policy: RotationPolicy) -> Self {
        let agents = if agents.is_empty() {
            match policy {
                RotationPolicy::Fixed => vec![DEFAULT_USER_AGENT.to_string()],
                _ => BUILTIN_AGENTS.clone(),
            }
        } else {
            agents
        };

        Self {
            agents,
            policy,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pick the identity for the next request.
    pub fn select(&self) -> &str {
        match self.policy {
            RotationPolicy::Fixed => &self.agents[0],
            RotationPolicy::RoundRobin => {
                let index = self.cursor.fetch_add(1, Ordering::Relaxed);
                &self.agents[index % self.agents.len()]
            }
            RotationPolicy::Random => {
                let index = rand::rng().random_range(0..self.agents.len());
                &self.agents[index]
            }
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
