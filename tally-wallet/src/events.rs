//! Notifications about settled wallet activity.
//!
//! Subscribers get their own receiver; events published while nobody listens are dropped.

use tokio::sync::broadcast;
use url::Url;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// A paid deposit quote was minted into proofs.
    QuoteClaimed {
        mint_url: Url,
        quote_id: String,
        amount: u64,
    },
    PaymentSettled {
        mint_url: Url,
        amount: u64,
        fee: u64,
    },
    /// Proofs the mint reported as spent were removed from the store.
    ProofsCleaned {
        mint_url: Url,
        count: usize,
        amount: u64,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WalletEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: WalletEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, WalletEvent};
    use pretty_assertions::assert_eq;
    use url::Url;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() -> anyhow::Result<()> {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        let event = WalletEvent::PaymentSettled {
            mint_url: Url::parse("http://127.0.0.1:3338")?,
            amount: 100,
            fee: 2,
        };

        assert_eq!(2, bus.publish(event.clone()));
        assert_eq!(event, first.recv().await?);
        assert_eq!(event, second.recv().await?);
        Ok(())
    }

    #[test]
    fn test_publish_without_subscribers() -> anyhow::Result<()> {
        let bus = EventBus::new(4);
        let event = WalletEvent::ProofsCleaned {
            mint_url: Url::parse("http://127.0.0.1:3338")?,
            count: 1,
            amount: 8,
        };
        assert_eq!(0, bus.publish(event));
        Ok(())
    }
}
