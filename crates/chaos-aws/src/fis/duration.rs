//! Estimated wall-clock duration of FIS experiment templates.
//!
//! A template's actions form a graph through their `startAfter` lists. The
//! total duration is the longest path through that graph, where each step
//! adds the action's own `duration` parameter.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::iso8601::parse_iso8601_duration;

/// Name of the action parameter holding the ISO-8601 duration.
pub const DURATION_PARAMETER: &str = "duration";

/// One action of an experiment template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: String,
    pub duration: Duration,
    /// Actions that must finish before this one starts. Empty means it
    /// starts with the experiment.
    pub start_after: Vec<String>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, duration: Duration, start_after: Vec<String>) -> Self {
        Self {
            name: name.into(),
            duration,
            start_after,
        }
    }

    /// Build an action from its declared duration parameter. A missing or
    /// unparseable parameter counts as zero.
    pub fn from_parameter(
        name: impl Into<String>,
        duration_param: Option<&str>,
        start_after: Vec<String>,
    ) -> Self {
        let name = name.into();
        let duration = match duration_param {
            Some(raw) => parse_iso8601_duration(raw).unwrap_or_else(|e| {
                tracing::debug!(action = %name, value = %raw, error = %e, "Unparseable action duration, using zero");
                Duration::ZERO
            }),
            None => Duration::ZERO,
        };
        Self::new(name, duration, start_after)
    }
}

/// The actions of one template, keyed by their unique name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateActions {
    actions: BTreeMap<String, ActionSpec>,
}

impl TemplateActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, action: ActionSpec) {
        self.actions.insert(action.name.clone(), action);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionSpec> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl FromIterator<ActionSpec> for TemplateActions {
    fn from_iter<I: IntoIterator<Item = ActionSpec>>(iter: I) -> Self {
        let mut actions = Self::new();
        for action in iter {
            actions.insert(action);
        }
        actions
    }
}

/// Longest path through the `start_after` graph.
///
/// Actions are resolved in repeated passes; an action resolves once all of
/// its predecessors have. A pass that resolves nothing ends the loop, and the
/// actions still pending (cycles, unknown predecessor names) count with their
/// own duration only.
pub fn compute_total_duration(actions: &TemplateActions) -> Duration {
    let mut totals: HashMap<&str, Duration> = HashMap::with_capacity(actions.len());
    let mut pending: Vec<&ActionSpec> = actions.iter().collect();

    while !pending.is_empty() {
        let before = pending.len();
        let mut blocked = Vec::new();

        for action in pending {
            match resolve(action, &totals) {
                Some(total) => {
                    totals.insert(action.name.as_str(), total);
                }
                None => blocked.push(action),
            }
        }

        if blocked.len() == before {
            tracing::debug!(
                actions = ?blocked.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
                "Unsatisfiable startAfter dependencies, counting own duration only"
            );
            for action in blocked {
                totals.insert(action.name.as_str(), action.duration);
            }
            break;
        }
        pending = blocked;
    }

    totals.values().copied().max().unwrap_or(Duration::ZERO)
}

/// Total for `action` if every predecessor already has one.
fn resolve(action: &ActionSpec, totals: &HashMap<&str, Duration>) -> Option<Duration> {
    let mut longest = Duration::ZERO;
    for predecessor in &action.start_after {
        longest = longest.max(*totals.get(predecessor.as_str())?);
    }
    Some(longest.saturating_add(action.duration))
}

/// Fetches the full action set of a template on cache miss.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch_template(&self, template_id: &str) -> anyhow::Result<TemplateActions>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationCacheEntry {
    pub created_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Computed durations per template id.
///
/// An entry is served while it is not older than the template's last update;
/// otherwise the template is fetched again and the entry overwritten. The
/// lock is only held for lookups and inserts, so concurrent misses on the
/// same template may fetch twice.
#[derive(Debug, Default)]
pub struct TemplateDurationCache {
    entries: Mutex<HashMap<String, DurationCacheEntry>>,
}

impl TemplateDurationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, template_id: &str) -> Option<DurationCacheEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(template_id)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn total_duration<S>(
        &self,
        template_id: &str,
        last_update_time: DateTime<Utc>,
        source: &S,
    ) -> anyhow::Result<Duration>
    where
        S: TemplateSource + ?Sized,
    {
        if let Some(entry) = self.entry(template_id) {
            if entry.created_at >= last_update_time {
                tracing::trace!(template = %template_id, "Template duration served from cache");
                return Ok(entry.duration);
            }
        }

        let actions = source.fetch_template(template_id).await?;
        let duration = compute_total_duration(&actions);
        tracing::debug!(
            template = %template_id,
            actions = actions.len(),
            duration = ?duration,
            "Computed template duration"
        );

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                template_id.to_string(),
                DurationCacheEntry {
                    created_at: Utc::now(),
                    duration,
                },
            );
        Ok(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mins(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    fn action(name: &str, minutes: u64, after: &[&str]) -> ActionSpec {
        ActionSpec::new(name, mins(minutes), after.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn empty_template_is_zero() {
        assert_eq!(compute_total_duration(&TemplateActions::new()), Duration::ZERO);
    }

    #[test]
    fn single_action_is_its_own_duration() {
        let actions: TemplateActions = [action("a", 4, &[])].into_iter().collect();
        assert_eq!(compute_total_duration(&actions), mins(4));
    }

    #[test]
    fn linear_chain_adds_up() {
        let actions: TemplateActions = [
            action("c", 3, &["b"]),
            action("a", 1, &[]),
            action("b", 2, &["a"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(compute_total_duration(&actions), mins(6));
    }

    #[test]
    fn diamond_takes_the_longest_branch() {
        let actions: TemplateActions = [
            action("a", 1, &[]),
            action("b", 2, &["a"]),
            action("c", 3, &["a"]),
            action("d", 3, &["b", "c"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(compute_total_duration(&actions), mins(7));
    }

    #[test]
    fn parallel_roots_take_the_maximum() {
        let actions: TemplateActions = [action("a", 5, &[]), action("b", 2, &[]), action("c", 2, &["b"])]
            .into_iter()
            .collect();
        assert_eq!(compute_total_duration(&actions), mins(5));
    }

    #[test]
    fn dangling_reference_terminates_with_own_duration() {
        let actions: TemplateActions = [action("a", 1, &[]), action("b", 4, &["does-not-exist"])]
            .into_iter()
            .collect();
        assert_eq!(compute_total_duration(&actions), mins(4));
    }

    #[test]
    fn cycle_terminates_and_resolvable_part_is_kept() {
        // a -> b -> a is a cycle; c hangs off it and is stuck as well.
        let actions: TemplateActions = [
            action("root", 10, &[]),
            action("a", 2, &["b"]),
            action("b", 3, &["a"]),
            action("c", 1, &["a"]),
            action("tail", 1, &["root"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(compute_total_duration(&actions), mins(11));
    }

    #[test]
    fn self_dependency_terminates() {
        let actions: TemplateActions = [action("a", 2, &["a"])].into_iter().collect();
        assert_eq!(compute_total_duration(&actions), mins(2));
    }

    #[test]
    fn malformed_duration_contributes_zero() {
        let actions: TemplateActions = [
            ActionSpec::from_parameter("a", Some("PT1M"), vec![]),
            ActionSpec::from_parameter("b", Some("not-a-duration"), vec!["a".into()]),
            ActionSpec::from_parameter("c", Some("PT2M"), vec!["b".into()]),
            ActionSpec::from_parameter("d", None, vec![]),
        ]
        .into_iter()
        .collect();
        assert_eq!(compute_total_duration(&actions), mins(3));
    }

    #[test]
    fn out_of_range_duration_contributes_zero() {
        for raw in ["P99999999999999999999999999999999999W", "PT99999999999999999999999999S"] {
            let action = ActionSpec::from_parameter("a", Some(raw), vec![]);
            assert_eq!(action.duration, Duration::ZERO, "{raw}");
        }
    }

    #[test]
    fn chain_past_the_maximum_saturates() {
        let actions: TemplateActions = [
            ActionSpec::from_parameter("a", Some("PT18446744073709551615S"), vec![]),
            ActionSpec::from_parameter("b", Some("PT1S"), vec!["a".into()]),
        ]
        .into_iter()
        .collect();
        assert_eq!(compute_total_duration(&actions), Duration::MAX);
    }

    struct CountingSource {
        actions: Mutex<TemplateActions>,
        fetches: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(actions: TemplateActions) -> Self {
            Self {
                actions: Mutex::new(actions),
                fetches: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TemplateSource for CountingSource {
        async fn fetch_template(&self, template_id: &str) -> anyhow::Result<TemplateActions> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("template {template_id} not found");
            }
            Ok(self.actions.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn unchanged_template_is_served_from_cache() {
        let source = CountingSource::new([action("a", 2, &[])].into_iter().collect());
        let cache = TemplateDurationCache::new();
        let updated = Utc::now() - chrono::Duration::hours(1);

        let first = cache.total_duration("EXT1", updated, &source).await.unwrap();
        let second = cache.total_duration("EXT1", updated, &source).await.unwrap();

        assert_eq!(first, mins(2));
        assert_eq!(second, first);
        assert_eq!(source.fetches(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn update_at_creation_instant_is_still_cached() {
        let source = CountingSource::new([action("a", 2, &[])].into_iter().collect());
        let cache = TemplateDurationCache::new();

        cache
            .total_duration("EXT1", Utc::now() - chrono::Duration::hours(1), &source)
            .await
            .unwrap();
        let created = cache.entry("EXT1").unwrap().created_at;

        let duration = cache.total_duration("EXT1", created, &source).await.unwrap();

        assert_eq!(duration, mins(2));
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn newer_update_time_refetches_once() {
        let source = CountingSource::new([action("a", 2, &[])].into_iter().collect());
        let cache = TemplateDurationCache::new();
        let updated = Utc::now() - chrono::Duration::hours(1);

        cache.total_duration("EXT1", updated, &source).await.unwrap();
        let created = cache.entry("EXT1").unwrap().created_at;

        *source.actions.lock().unwrap() = [action("a", 2, &[]), action("b", 5, &["a"])]
            .into_iter()
            .collect();
        let modified = created + chrono::Duration::milliseconds(1);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let recomputed = cache.total_duration("EXT1", modified, &source).await.unwrap();
        let again = cache.total_duration("EXT1", modified, &source).await.unwrap();

        assert_eq!(recomputed, mins(7));
        assert_eq!(again, mins(7));
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn templates_are_cached_independently() {
        let source = CountingSource::new([action("a", 1, &[])].into_iter().collect());
        let cache = TemplateDurationCache::new();
        let updated = Utc::now() - chrono::Duration::hours(1);

        cache.total_duration("EXT1", updated, &source).await.unwrap();
        cache.total_duration("EXT2", updated, &source).await.unwrap();
        cache.total_duration("EXT1", updated, &source).await.unwrap();

        assert_eq!(source.fetches(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn fetch_errors_propagate_and_are_not_cached() {
        let mut source = CountingSource::new(TemplateActions::new());
        source.fail = true;
        let cache = TemplateDurationCache::new();

        let err = cache
            .total_duration("EXT404", Utc::now(), &source)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("EXT404"));
        assert!(cache.is_empty());
    }
}
