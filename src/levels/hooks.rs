use crate::scoring::Results;
use crate::world::{OwnerId, Region};

/// Pre-calc veto: may abort a calculation before submission.
/// Returning `false` vetoes.
pub type PreCalcHook = Box<dyn Fn(&OwnerId, &Region) -> bool + Send + Sync>;

/// Post-calc override: may rewrite any of the final results fields before
/// they are persisted.
pub type PostCalcHook = Box<dyn Fn(&Region, &mut Results) + Send + Sync>;

/// Ordered interceptor lists with explicit short-circuit semantics:
/// the first veto wins, the last override wins.
#[derive(Default)]
pub struct Interceptors {
    pre: Vec<PreCalcHook>,
    post: Vec<PostCalcHook>,
}

impl Interceptors {
    pub fn add_pre_calc(&mut self, hook: PreCalcHook) {
        self.pre.push(hook);
    }

    pub fn add_post_calc(&mut self, hook: PostCalcHook) {
        self.post.push(hook);
    }

    /// Run the veto chain; stops at the first veto
    pub fn allow(&self, requester: &OwnerId, region: &Region) -> bool {
        for hook in &self.pre {
            if !hook(requester, region) {
                log::debug!("calculation for {} vetoed", region.id);
                return false;
            }
        }
        true
    }

    /// Run every override in registration order; later hooks see (and may
    /// replace) what earlier ones wrote
    pub fn apply_overrides(&self, region: &Region, results: &mut Results) {
        for hook in &self.post {
            hook(region, results);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Area, RegionId, WorldId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn region() -> Region {
        Region::new(
            RegionId(1),
            WorldId::new("overworld"),
            OwnerId(1),
            Area::new(0, 0, 15, 15),
        )
    }

    #[test]
    fn test_first_veto_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut interceptors = Interceptors::default();
        interceptors.add_pre_calc(Box::new(|_, _| false));
        let counter = Arc::clone(&calls);
        interceptors.add_pre_calc(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }));

        assert!(!interceptors.allow(&OwnerId(1), &region()));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "later hooks must not run");
    }

    #[test]
    fn test_last_override_wins() {
        let mut interceptors = Interceptors::default();
        interceptors.add_post_calc(Box::new(|_, results| results.override_level(10)));
        interceptors.add_post_calc(Box::new(|_, results| results.override_level(42)));

        let mut results = Results::new();
        interceptors.apply_overrides(&region(), &mut results);
        assert_eq!(results.level(), 42);
    }
}
