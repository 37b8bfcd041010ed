pub mod dashboard;
pub mod events;
pub mod obligations;
pub mod recurrence;
pub mod submission;
pub mod summary_cache;
pub mod verification;

pub use dashboard::{DashboardService, DashboardSummary};
pub use events::{EventBus, LedgerEvent, LedgerEventHandler};
pub use obligations::{CustomObligationInput, ObligationService};
pub use recurrence::{RecurrenceGenerator, RecurrenceHandler};
pub use submission::SubmissionService;
pub use summary_cache::{CacheInvalidationHandler, SummaryCache};
pub use verification::VerificationService;

use std::sync::Arc;
use std::time::Duration;

use crate::ports::{Clock, LedgerStore, TenantDirectory};
use crate::use_cases::OpenFirstCycle;

/// Composition root for the ledger: wires the store, directory, clock, cache
/// and event bus into the services that share them.
#[derive(Clone)]
pub struct Ledger {
    pub submissions: Arc<SubmissionService>,
    pub verifications: Arc<VerificationService>,
    pub obligations: Arc<ObligationService>,
    pub dashboard: Arc<DashboardService>,
    pub recurrence: Arc<RecurrenceGenerator>,
    pub onboarding: Arc<OpenFirstCycle>,
    pub events: EventBus,
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn TenantDirectory>,
        clock: Arc<dyn Clock>,
        summary_cache_ttl: Duration,
    ) -> Self {
        let cache = SummaryCache::new(summary_cache_ttl);
        let recurrence = Arc::new(RecurrenceGenerator::new(store.clone()));

        // Recurrence runs first so the invalidated cache is rebuilt with the new cycle.
        let events = EventBus::new()
            .with_handler(Arc::new(RecurrenceHandler::new(recurrence.clone())))
            .with_handler(Arc::new(CacheInvalidationHandler::new(cache.clone())));

        Self {
            submissions: Arc::new(SubmissionService::new(
                store.clone(),
                directory.clone(),
                clock.clone(),
                events.clone(),
            )),
            verifications: Arc::new(VerificationService::new(
                store.clone(),
                clock.clone(),
                events.clone(),
            )),
            obligations: Arc::new(ObligationService::new(
                store.clone(),
                directory.clone(),
                events.clone(),
            )),
            dashboard: Arc::new(DashboardService::new(store.clone(), cache, clock)),
            recurrence,
            onboarding: Arc::new(OpenFirstCycle::new(store.clone(), directory, events.clone())),
            events,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }
}
