use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::models::campaign::{Campaign, CampaignStatus};
use crate::services::campaign_api::{ApiError, CampaignApiClient};

/// The two campaign endpoints the tracker needs, behind a seam so the
/// reconciliation logic is testable without a running server.
#[async_trait]
pub trait CampaignFeed: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Campaign>, ApiError>;
    async fn start_send(&self, product_id: &str) -> Result<Campaign, ApiError>;
}

#[async_trait]
impl CampaignFeed for CampaignApiClient {
    async fn fetch_all(&self) -> Result<Vec<Campaign>, ApiError> {
        self.list_campaigns().await
    }

    async fn start_send(&self, product_id: &str) -> Result<Campaign, ApiError> {
        CampaignApiClient::start_send(self, product_id).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// The dedicated poll observed the campaign reach its terminal state.
    CampaignCompleted {
        product_id: String,
        campaign: Campaign,
    },
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("a send is already in flight for product {0}")]
    SendInFlight(String),
    #[error("campaign for product {0} has already completed")]
    AlreadyCompleted(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Tick of the per-product poll started by `trigger_send`.
    pub dedicated_poll_interval: Duration,
    /// Tick of the all-campaigns refresh running for the tracker's lifetime.
    pub background_poll_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            dedicated_poll_interval: Duration::from_secs(2),
            background_poll_interval: Duration::from_secs(3),
        }
    }
}

struct TrackerState {
    campaigns: HashMap<String, Campaign>,
    in_flight: HashSet<String>,
}

/// Client-side view of campaign status per product, reconciled from two
/// independently-timed sources: optimistic writes at trigger time, and
/// authoritative snapshots from the polls.
///
/// The merge discipline is the whole point:
/// - authoritative snapshots replace a product's entry wholesale, never
///   field-by-field;
/// - the background poll only touches products present in the response, so
///   it cannot erase an optimistic entry the server hasn't persisted yet.
///
/// Both polls converge on server truth; no ordering is guaranteed between
/// them, and the last response to land wins for a given product.
pub struct CampaignTracker {
    feed: Arc<dyn CampaignFeed>,
    state: Arc<Mutex<TrackerState>>,
    events: mpsc::UnboundedSender<TrackerEvent>,
    config: TrackerConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CampaignTracker {
    pub fn new(
        feed: Arc<dyn CampaignFeed>,
        config: TrackerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TrackerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let tracker = Self {
            feed,
            state: Arc::new(Mutex::new(TrackerState {
                campaigns: HashMap::new(),
                in_flight: HashSet::new(),
            })),
            events,
            config,
            tasks: Mutex::new(Vec::new()),
        };
        (tracker, receiver)
    }

    /// Last-known snapshot for one product.
    pub fn snapshot(&self, product_id: &str) -> Option<Campaign> {
        self.state.lock().campaigns.get(product_id).cloned()
    }

    /// Copy of the whole campaign mapping.
    pub fn campaigns(&self) -> HashMap<String, Campaign> {
        self.state.lock().campaigns.clone()
    }

    /// Whether a send is currently in flight for this product (drives the
    /// disabled state of the send control).
    pub fn is_sending(&self, product_id: &str) -> bool {
        self.state.lock().in_flight.contains(product_id)
    }

    /// Start the background all-campaigns poll. Runs until `stop()`.
    pub fn start(&self) {
        let feed = Arc::clone(&self.feed);
        let state = Arc::clone(&self.state);
        let tick = self.config.background_poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(tick);
            loop {
                ticker.tick().await;
                match feed.fetch_all().await {
                    Ok(campaigns) => merge_all(&state, campaigns),
                    // Transient failures are swallowed so a multi-minute
                    // broadcast doesn't flood the operator with toasts.
                    Err(e) => tracing::warn!("[background-poll] fetch failed: {}", e),
                }
            }
        });

        self.tasks.lock().push(handle);
    }

    /// Cancel every timer the tracker owns (view teardown).
    pub fn stop(&self) {
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
    }

    /// Trigger a broadcast for one product.
    ///
    /// Writes the optimistic `sending` snapshot before any network I/O, then
    /// issues the start-send call; on acknowledgment a dedicated short poll
    /// tracks just this product until it completes. A failed trigger clears
    /// the in-flight marker and reports the error without retrying (the
    /// optimistic entry stays; the next background tick corrects it).
    pub async fn trigger_send(&self, product_id: &str) -> Result<(), TriggerError> {
        {
            let mut state = self.state.lock();

            if state.in_flight.contains(product_id) {
                return Err(TriggerError::SendInFlight(product_id.to_string()));
            }
            if let Some(existing) = state.campaigns.get(product_id) {
                if existing.status.is_terminal() {
                    return Err(TriggerError::AlreadyCompleted(product_id.to_string()));
                }
            }

            state.in_flight.insert(product_id.to_string());

            let total_users = state
                .campaigns
                .get(product_id)
                .map(|c| c.total_users)
                .unwrap_or(0);
            let previous_id = state
                .campaigns
                .get(product_id)
                .map(|c| c.id.clone())
                .unwrap_or_default();

            state.campaigns.insert(
                product_id.to_string(),
                Campaign {
                    id: previous_id,
                    product_id: product_id.to_string(),
                    status: CampaignStatus::Sending,
                    sent_count: 0,
                    total_users,
                    created_at: Utc::now(),
                },
            );
        }

        if let Err(e) = self.feed.start_send(product_id).await {
            self.state.lock().in_flight.remove(product_id);
            return Err(e.into());
        }

        self.spawn_dedicated_poll(product_id.to_string());
        Ok(())
    }

    /// Short-interval poll scoped to one product, self-terminating once the
    /// authoritative snapshot reports `completed`. No timeout bound: a
    /// campaign that never completes server-side keeps this loop alive until
    /// `stop()`.
    fn spawn_dedicated_poll(&self, product_id: String) {
        let feed = Arc::clone(&self.feed);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let tick = self.config.dedicated_poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(tick);
            loop {
                ticker.tick().await;

                let campaigns = match feed.fetch_all().await {
                    Ok(campaigns) => campaigns,
                    // Best-effort liveness: keep trying at the next tick.
                    Err(e) => {
                        tracing::warn!("[dedicated-poll:{}] fetch failed: {}", product_id, e);
                        continue;
                    }
                };

                let Some(authoritative) = campaigns
                    .into_iter()
                    .find(|c| c.product_id == product_id)
                else {
                    continue;
                };

                let completed = authoritative.status.is_terminal();
                apply_authoritative(&state, authoritative.clone());

                if completed {
                    state.lock().in_flight.remove(&product_id);
                    let _ = events.send(TrackerEvent::CampaignCompleted {
                        product_id: product_id.clone(),
                        campaign: authoritative,
                    });
                    tracing::info!("[dedicated-poll:{}] campaign completed", product_id);
                    break;
                }
            }
        });

        self.tasks.lock().push(handle);
    }
}

/// Full replace of one product's snapshot with the authoritative one.
fn apply_authoritative(state: &Mutex<TrackerState>, campaign: Campaign) {
    let mut state = state.lock();
    warn_on_regression(state.campaigns.get(&campaign.product_id), &campaign);
    state
        .campaigns
        .insert(campaign.product_id.clone(), campaign);
}

/// Shallow union keyed by product id: incoming entries overwrite matching
/// keys, absent keys keep their prior value.
fn merge_all(state: &Mutex<TrackerState>, campaigns: Vec<Campaign>) {
    let mut state = state.lock();
    for campaign in campaigns {
        warn_on_regression(state.campaigns.get(&campaign.product_id), &campaign);
        state
            .campaigns
            .insert(campaign.product_id.clone(), campaign);
    }
}

/// The client renders counts as received and does not enforce monotonicity,
/// but a server bug handing back a lower count should at least be visible.
fn warn_on_regression(previous: Option<&Campaign>, incoming: &Campaign) {
    if let Some(previous) = previous {
        if previous.id == incoming.id && incoming.sent_count < previous.sent_count {
            tracing::warn!(
                "[tracker] sent_count regressed for product {}: {} -> {}",
                incoming.product_id,
                previous.sent_count,
                incoming.sent_count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex as SyncMutex;
    use tokio::sync::Notify;

    fn campaign(product_id: &str, status: CampaignStatus, sent: u32, total: u32) -> Campaign {
        Campaign {
            id: format!("c-{}", product_id),
            product_id: product_id.to_string(),
            status,
            sent_count: sent,
            total_users: total,
            created_at: Utc::now(),
        }
    }

    /// Feed that pops scripted fetch responses in order, repeating the last
    /// successful one when the script runs out, and counts fetches.
    struct ScriptedFeed {
        responses: SyncMutex<VecDeque<Result<Vec<Campaign>, ApiError>>>,
        last: SyncMutex<Vec<Campaign>>,
        fetches: AtomicUsize,
        start_send_result: SyncMutex<Option<ApiError>>,
        start_send_gate: Option<Arc<Notify>>,
    }

    impl ScriptedFeed {
        fn new(responses: Vec<Result<Vec<Campaign>, ApiError>>) -> Self {
            Self {
                responses: SyncMutex::new(responses.into()),
                last: SyncMutex::new(Vec::new()),
                fetches: AtomicUsize::new(0),
                start_send_result: SyncMutex::new(None),
                start_send_gate: None,
            }
        }

        fn failing_start_send(message: &str) -> Self {
            let feed = Self::new(vec![]);
            *feed.start_send_result.lock() = Some(ApiError::Server(message.to_string()));
            feed
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CampaignFeed for ScriptedFeed {
        async fn fetch_all(&self) -> Result<Vec<Campaign>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().pop_front() {
                Some(result) => {
                    if let Ok(ref campaigns) = result {
                        *self.last.lock() = campaigns.clone();
                    }
                    result
                }
                None => Ok(self.last.lock().clone()),
            }
        }

        async fn start_send(&self, product_id: &str) -> Result<Campaign, ApiError> {
            if let Some(gate) = &self.start_send_gate {
                gate.notified().await;
            }
            if let Some(err) = self.start_send_result.lock().take() {
                return Err(err);
            }
            Ok(campaign(product_id, CampaignStatus::Pending, 0, 0))
        }
    }

    fn tracker_with(
        feed: Arc<ScriptedFeed>,
    ) -> (CampaignTracker, mpsc::UnboundedReceiver<TrackerEvent>) {
        CampaignTracker::new(feed, TrackerConfig::default())
    }

    #[test]
    fn test_merge_keeps_entries_absent_from_response() {
        let state = Mutex::new(TrackerState {
            campaigns: HashMap::from([
                (
                    "A".to_string(),
                    campaign("A", CampaignStatus::Sending, 1, 5),
                ),
                (
                    "B".to_string(),
                    campaign("B", CampaignStatus::Completed, 5, 5),
                ),
            ]),
            in_flight: HashSet::new(),
        });

        merge_all(&state, vec![campaign("A", CampaignStatus::Pending, 0, 5)]);

        let state = state.lock();
        assert_eq!(
            state.campaigns.get("A").unwrap().status,
            CampaignStatus::Pending
        );
        // B was absent from the response and must be untouched
        assert_eq!(
            state.campaigns.get("B").unwrap().status,
            CampaignStatus::Completed
        );
    }

    #[test]
    fn test_authoritative_apply_replaces_wholesale() {
        let state = Mutex::new(TrackerState {
            campaigns: HashMap::from([(
                "A".to_string(),
                campaign("A", CampaignStatus::Sending, 0, 0),
            )]),
            in_flight: HashSet::new(),
        });

        apply_authoritative(&state, campaign("A", CampaignStatus::Sending, 3, 9));

        let snapshot = state.lock().campaigns.get("A").cloned().unwrap();
        // Every field comes from the incoming snapshot, including totals the
        // optimistic entry guessed at
        assert_eq!(snapshot.sent_count, 3);
        assert_eq!(snapshot.total_users, 9);
    }

    #[tokio::test]
    async fn test_trigger_writes_optimistic_snapshot_before_response() {
        let gate = Arc::new(Notify::new());
        let mut feed = ScriptedFeed::new(vec![]);
        feed.start_send_gate = Some(Arc::clone(&gate));

        let (tracker, _events) = tracker_with(Arc::new(feed));
        let tracker = Arc::new(tracker);

        let task = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.trigger_send("P1").await })
        };

        // Let the trigger run up to the gated start-send call
        tokio::task::yield_now().await;

        let snapshot = tracker.snapshot("P1").expect("optimistic entry missing");
        assert_eq!(snapshot.status, CampaignStatus::Sending);
        assert_eq!(snapshot.sent_count, 0);
        assert_eq!(snapshot.total_users, 0);
        assert!(tracker.is_sending("P1"));

        gate.notify_one();
        task.await.unwrap().unwrap();
        tracker.stop();
    }

    #[tokio::test]
    async fn test_trigger_preserves_known_total_users() {
        let (tracker, _events) = tracker_with(Arc::new(ScriptedFeed::new(vec![])));
        merge_all(
            &tracker.state,
            vec![campaign("P1", CampaignStatus::Pending, 0, 42)],
        );

        tracker.trigger_send("P1").await.unwrap();

        let snapshot = tracker.snapshot("P1").unwrap();
        assert_eq!(snapshot.status, CampaignStatus::Sending);
        assert_eq!(snapshot.total_users, 42);
        tracker.stop();
    }

    #[tokio::test]
    async fn test_failed_trigger_clears_in_flight_marker() {
        let (tracker, _events) =
            tracker_with(Arc::new(ScriptedFeed::failing_start_send("SMTP down")));

        let err = tracker.trigger_send("P1").await.unwrap_err();
        assert!(matches!(err, TriggerError::Api(ApiError::Server(_))));

        assert!(!tracker.is_sending("P1"));
        // The optimistic entry stays; the next background tick corrects it
        assert_eq!(
            tracker.snapshot("P1").unwrap().status,
            CampaignStatus::Sending
        );
    }

    #[tokio::test]
    async fn test_trigger_rejected_while_in_flight() {
        let (tracker, _events) = tracker_with(Arc::new(ScriptedFeed::new(vec![Ok(vec![
            campaign("P1", CampaignStatus::Sending, 1, 5),
        ])])));

        tracker.trigger_send("P1").await.unwrap();
        let err = tracker.trigger_send("P1").await.unwrap_err();
        assert!(matches!(err, TriggerError::SendInFlight(_)));
        tracker.stop();
    }

    #[tokio::test]
    async fn test_trigger_rejected_after_completion() {
        let (tracker, _events) = tracker_with(Arc::new(ScriptedFeed::new(vec![])));
        merge_all(
            &tracker.state,
            vec![campaign("P1", CampaignStatus::Completed, 5, 5)],
        );

        let err = tracker.trigger_send("P1").await.unwrap_err();
        assert!(matches!(err, TriggerError::AlreadyCompleted(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedicated_poll_stops_after_completion() {
        let feed = Arc::new(ScriptedFeed::new(vec![
            Ok(vec![campaign("P1", CampaignStatus::Sending, 1, 4)]),
            Ok(vec![campaign("P1", CampaignStatus::Sending, 2, 4)]),
            Ok(vec![campaign("P1", CampaignStatus::Sending, 3, 4)]),
            Ok(vec![campaign("P1", CampaignStatus::Completed, 4, 4)]),
        ]));

        let (tracker, mut events) = tracker_with(Arc::clone(&feed));
        tracker.trigger_send("P1").await.unwrap();

        // Walk the poll through all four scripted responses
        for _ in 0..6 {
            tokio::time::advance(Duration::from_secs(2)).await;
            tokio::task::yield_now().await;
        }

        let event = events.try_recv().expect("no completion event");
        let TrackerEvent::CampaignCompleted {
            product_id,
            campaign,
        } = event;
        assert_eq!(product_id, "P1");
        assert_eq!(campaign.status, CampaignStatus::Completed);

        assert!(!tracker.is_sending("P1"));
        assert_eq!(
            tracker.snapshot("P1").unwrap().sent_count,
            4,
            "final counts rendered as received"
        );

        // The loop must not issue further requests after observing completed
        let fetches_at_completion = feed.fetch_count();
        assert_eq!(fetches_at_completion, 4);
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(2)).await;
            tokio::task::yield_now().await;
        }
        assert_eq!(feed.fetch_count(), fetches_at_completion);

        tracker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedicated_poll_survives_fetch_failures() {
        let feed = Arc::new(ScriptedFeed::new(vec![
            Err(ApiError::InvalidJson),
            Err(ApiError::Server("503".to_string())),
            Ok(vec![campaign("P1", CampaignStatus::Completed, 2, 2)]),
        ]));

        let (tracker, mut events) = tracker_with(feed);
        tracker.trigger_send("P1").await.unwrap();

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(2)).await;
            tokio::task::yield_now().await;
        }

        // Failures were swallowed and the loop kept going to completion
        assert!(events.try_recv().is_ok());
        assert!(!tracker.is_sending("P1"));
        tracker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_poll_merges_and_never_self_cancels() {
        let feed = Arc::new(ScriptedFeed::new(vec![
            Ok(vec![campaign("A", CampaignStatus::Completed, 3, 3)]),
            Ok(vec![campaign("B", CampaignStatus::Pending, 0, 8)]),
        ]));

        let (tracker, _events) = tracker_with(feed);
        tracker.start();

        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(3)).await;
            tokio::task::yield_now().await;
        }

        let campaigns = tracker.campaigns();
        // Second response only named B; A's completed entry survived the merge
        assert_eq!(
            campaigns.get("A").unwrap().status,
            CampaignStatus::Completed
        );
        assert_eq!(campaigns.get("B").unwrap().status, CampaignStatus::Pending);
        tracker.stop();
    }

    #[test]
    fn test_sent_count_monotone_across_applied_snapshots() {
        let state = Mutex::new(TrackerState {
            campaigns: HashMap::new(),
            in_flight: HashSet::new(),
        });

        let snapshots = [
            campaign("P1", CampaignStatus::Pending, 0, 6),
            campaign("P1", CampaignStatus::Sending, 2, 6),
            campaign("P1", CampaignStatus::Sending, 4, 6),
            campaign("P1", CampaignStatus::Completed, 6, 6),
        ];

        let mut last = 0;
        for snapshot in snapshots {
            apply_authoritative(&state, snapshot);
            let current = state.lock().campaigns.get("P1").unwrap().sent_count;
            assert!(
                current >= last,
                "sent_count regressed: {} < {}",
                current,
                last
            );
            last = current;
        }
    }
}
