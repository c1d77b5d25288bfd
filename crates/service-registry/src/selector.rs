//! Strategies for picking one instance out of a service's live instances.

use crate::service::ServiceInfo;
use rand::Rng;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Picks one instance for a single resolution.
///
/// Implementations must return an element of `instances`, and `None` only when
/// the slice is empty.
pub trait InstanceSelector: Send + Sync {
    fn select<'a>(&self, service: &str, instances: &'a [ServiceInfo]) -> Option<&'a ServiceInfo>;
}

/// Rotates through instances, keeping one counter per service.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursors: Mutex<HashMap<String, usize>>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstanceSelector for RoundRobin {
    fn select<'a>(&self, service: &str, instances: &'a [ServiceInfo]) -> Option<&'a ServiceInfo> {
        if instances.is_empty() {
            return None;
        }

        let mut cursors = match self.cursors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let cursor = cursors.entry(service.to_string()).or_insert(0);
        let index = *cursor % instances.len();
        *cursor = cursor.wrapping_add(1);

        instances.get(index)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl InstanceSelector for RandomSelector {
    fn select<'a>(&self, _service: &str, instances: &'a [ServiceInfo]) -> Option<&'a ServiceInfo> {
        if instances.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..instances.len());
        instances.get(index)
    }
}

/// Always the earliest registered instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAvailable;

impl InstanceSelector for FirstAvailable {
    fn select<'a>(&self, _service: &str, instances: &'a [ServiceInfo]) -> Option<&'a ServiceInfo> {
        instances.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    #[default]
    RoundRobin,
    Random,
    First,
}

impl SelectionPolicy {
    pub fn build(self) -> Arc<dyn InstanceSelector> {
        match self {
            SelectionPolicy::RoundRobin => Arc::new(RoundRobin::new()),
            SelectionPolicy::Random => Arc::new(RandomSelector),
            SelectionPolicy::First => Arc::new(FirstAvailable),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => Ok(SelectionPolicy::RoundRobin),
            "random" => Ok(SelectionPolicy::Random),
            "first" => Ok(SelectionPolicy::First),
            other => Err(format!("unknown selection policy: {}", other)),
        }
    }
}
