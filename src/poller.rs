//! Periodic reads of the sale contract. Each poll either publishes a fresh
//! value or logs the failure and leaves the last published value in place.

use crate::{
    chain::{
        Clock,
        ContractReader,
        SystemClock,
    },
    phase::PhaseResolver,
    state::StateStore,
};
use alloy::primitives::Address;
use std::time::Duration;
use tokio::time::{
    self,
    Interval,
    MissedTickBehavior,
};
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSchedule {
    pub phase_interval: Duration,
    pub minted_interval: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::every(DEFAULT_POLL_INTERVAL)
    }
}

impl PollSchedule {
    pub fn every(interval: Duration) -> Self {
        Self {
            phase_interval: interval,
            minted_interval: interval,
        }
    }

    /// Two independent tickers, phase first then minted count. A slow poll
    /// delays the next tick instead of bursting to catch up.
    pub fn tickers(&self) -> (Interval, Interval) {
        let mut phase = time::interval(self.phase_interval);
        phase.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut minted = time::interval(self.minted_interval);
        minted.set_missed_tick_behavior(MissedTickBehavior::Delay);
        (phase, minted)
    }
}

pub struct Poller<C = SystemClock> {
    resolver: PhaseResolver<C>,
}

impl<C: Clock> Poller<C> {
    pub fn new(resolver: PhaseResolver<C>) -> Self {
        Self { resolver }
    }

    pub async fn poll_phase<R: ContractReader>(&self, read: &R, store: &StateStore) -> bool {
        match self.resolver.resolve_phase_reading(read).await {
            Ok(reading) => {
                store.update(|state| {
                    if state.phase != Some(reading.phase) {
                        info!(phase = %reading.phase, "mint phase changed");
                    }
                    state.phase = Some(reading.phase);
                    state.presale_ends_at = reading.presale_ends_at;
                });
                true
            }
            Err(err) => {
                warn!(error = %err, "phase poll failed; keeping last known phase");
                false
            }
        }
    }

    pub async fn poll_minted<R: ContractReader>(&self, read: &R, store: &StateStore) -> bool {
        match self.resolver.resolve_minted_count(read).await {
            Ok(count) => {
                store.update(|state| {
                    let previous = state.minted.unwrap_or(0);
                    if count < previous {
                        // never shrink the displayed count on a lagging node
                        warn!(count, previous, "minted count went backwards; ignoring");
                        return;
                    }
                    debug!(count, "minted count");
                    state.minted = Some(count);
                });
                true
            }
            Err(err) => {
                warn!(error = %err, "minted count poll failed; keeping last value");
                false
            }
        }
    }

    pub async fn refresh_ownership<R: ContractReader>(
        &self,
        read: &R,
        account: Address,
        store: &StateStore,
    ) -> bool {
        match self.resolver.resolve_ownership(read, account).await {
            Ok(is_owner) => {
                info!(%account, is_owner, "resolved contract ownership");
                store.update(|state| state.is_owner = is_owner);
                true
            }
            Err(err) => {
                warn!(error = %err, "owner lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        phase::MintPhase,
        test_helpers::FakeChain,
    };

    #[tokio::test]
    async fn poll_phase__read_fails__keeps_previous_phase() {
        // given
        let chain = FakeChain::sepolia();
        chain.start_presale_at(chain.now() + 3600);
        let poller = Poller::new(PhaseResolver::with_clock(chain.clock()));
        let store = StateStore::new();
        assert!(poller.poll_phase(&chain.reader(), &store).await);

        // when
        chain.fail_reads(true);
        let updated = poller.poll_phase(&chain.reader(), &store).await;

        // then
        assert!(!updated);
        assert_eq!(store.snapshot().phase, Some(MintPhase::PresaleActive));
    }

    #[tokio::test]
    async fn poll_minted__lower_count_reported__keeps_higher_count() {
        // given
        let chain = FakeChain::sepolia();
        let poller = Poller::new(PhaseResolver::with_clock(chain.clock()));
        let store = StateStore::new();
        chain.set_token_ids(5);
        poller.poll_minted(&chain.reader(), &store).await;

        // when
        chain.set_token_ids(4);
        poller.poll_minted(&chain.reader(), &store).await;

        // then
        assert_eq!(store.snapshot().minted, Some(5));
    }

    #[tokio::test]
    async fn poll_phase__not_started__skips_end_timestamp_read() {
        let chain = FakeChain::sepolia();
        let poller = Poller::new(PhaseResolver::with_clock(chain.clock()));
        let store = StateStore::new();

        poller.poll_phase(&chain.reader(), &store).await;

        assert_eq!(store.snapshot().phase, Some(MintPhase::NotStarted));
        assert_eq!(chain.stats().reads, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tickers__fire_immediately_then_on_interval() {
        // given
        let schedule = PollSchedule::every(Duration::from_secs(5));
        let (mut phase, mut minted) = schedule.tickers();

        // when
        let start = time::Instant::now();
        phase.tick().await;
        minted.tick().await;
        phase.tick().await;

        // then
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
