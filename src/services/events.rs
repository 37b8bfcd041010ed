use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{Allocation, Obligation};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Facts emitted after a ledger write has committed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    TransactionSubmitted {
        tenant_id: Uuid,
        external_ref: String,
        obligation_id: Uuid,
    },
    PaymentVerified {
        tenant_id: Uuid,
        external_ref: String,
        amount: BigDecimal,
        verified_by: String,
        allocations: Vec<Allocation>,
    },
    ObligationCompleted {
        obligation: Obligation,
    },
    TransactionRejected {
        tenant_id: Uuid,
        external_ref: String,
    },
    ObligationCreated {
        obligation: Obligation,
    },
}

impl LedgerEvent {
    /// Whether cached aggregate views are stale once this event has happened.
    pub fn invalidates_aggregates(&self) -> bool {
        !matches!(self, LedgerEvent::TransactionSubmitted { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::TransactionSubmitted { .. } => "transaction_submitted",
            LedgerEvent::PaymentVerified { .. } => "payment_verified",
            LedgerEvent::ObligationCompleted { .. } => "obligation_completed",
            LedgerEvent::TransactionRejected { .. } => "transaction_rejected",
            LedgerEvent::ObligationCreated { .. } => "obligation_created",
        }
    }
}

#[async_trait]
pub trait LedgerEventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns follow-up events caused by this one; the bus publishes them next.
    async fn handle(&self, event: &LedgerEvent) -> anyhow::Result<Vec<LedgerEvent>>;
}

/// In-process post-commit dispatcher.
///
/// Handlers run in registration order. A failing handler is logged and the
/// remaining handlers still run; publishing never reports an error to the
/// caller, whose write has already committed. Follow-up events returned by
/// handlers go through the same handlers and broadcast after the event that
/// caused them.
#[derive(Clone)]
pub struct EventBus {
    handlers: Vec<Arc<dyn LedgerEventHandler>>,
    tx_broadcast: broadcast::Sender<LedgerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx_broadcast, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            handlers: Vec::new(),
            tx_broadcast,
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn LedgerEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx_broadcast.subscribe()
    }

    pub async fn publish(&self, event: LedgerEvent) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            for handler in &self.handlers {
                match handler.handle(&event).await {
                    Ok(follow_ups) => queue.extend(follow_ups),
                    Err(e) => tracing::warn!(
                        handler = handler.name(),
                        event = event.name(),
                        error = %e,
                        "Ledger event handler failed"
                    ),
                }
            }

            // No subscribers is not an error.
            let _ = self.tx_broadcast.send(event);
        }
    }

    pub async fn publish_all(&self, events: impl IntoIterator<Item = LedgerEvent>) {
        for event in events {
            self.publish(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing;

    #[async_trait]
    impl LedgerEventHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _event: &LedgerEvent) -> anyhow::Result<Vec<LedgerEvent>> {
            anyhow::bail!("boom")
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl LedgerEventHandler for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, _event: &LedgerEvent) -> anyhow::Result<Vec<LedgerEvent>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn rejected() -> LedgerEvent {
        LedgerEvent::TransactionRejected {
            tenant_id: Uuid::new_v4(),
            external_ref: "TXN1".into(),
        }
    }

    #[tokio::test]
    async fn failing_handler_does_not_stop_the_rest() {
        let counting = Arc::new(Counting::default());
        let bus = EventBus::new()
            .with_handler(Arc::new(Failing))
            .with_handler(counting.clone());
        let mut rx = bus.subscribe();

        bus.publish(rejected()).await;

        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.name(), "transaction_rejected");
    }

    #[test]
    fn submissions_do_not_invalidate_aggregates() {
        let submitted = LedgerEvent::TransactionSubmitted {
            tenant_id: Uuid::new_v4(),
            external_ref: "TXN1".into(),
            obligation_id: Uuid::new_v4(),
        };
        assert!(!submitted.invalidates_aggregates());
        assert!(rejected().invalidates_aggregates());
    }
}
