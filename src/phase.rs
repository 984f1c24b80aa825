use crate::{
    Result,
    chain::{
        Clock,
        ContractReader,
        SystemClock,
    },
};
use alloy::primitives::Address;
use std::fmt;
use tracing::debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MintPhase {
    NotStarted,
    PresaleActive,
    /// The presale window has closed and public minting is open.
    PresaleEnded,
}

impl MintPhase {
    pub fn derive(presale_started: bool, presale_ended: u64, now: u64) -> Self {
        match (presale_started, now < presale_ended) {
            (false, _) => MintPhase::NotStarted,
            (true, true) => MintPhase::PresaleActive,
            (true, false) => MintPhase::PresaleEnded,
        }
    }
}

impl fmt::Display for MintPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MintPhase::NotStarted => "not started",
            MintPhase::PresaleActive => "presale",
            MintPhase::PresaleEnded => "presale ended",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PhaseReading {
    pub phase: MintPhase,
    pub presale_ends_at: Option<u64>,
}

pub struct PhaseResolver<C = SystemClock> {
    clock: C,
}

impl PhaseResolver<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl Default for PhaseResolver<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> PhaseResolver<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    pub async fn resolve_phase<R: ContractReader>(&self, read: &R) -> Result<MintPhase> {
        self.resolve_phase_reading(read)
            .await
            .map(|reading| reading.phase)
    }

    /// Reads the contract and derives the phase as of this call. The end
    /// timestamp is only meaningful once the presale has started, so it is not
    /// read before that.
    pub async fn resolve_phase_reading<R: ContractReader>(
        &self,
        read: &R,
    ) -> Result<PhaseReading> {
        let started = read.presale_started().await?;
        if !started {
            return Ok(PhaseReading {
                phase: MintPhase::NotStarted,
                presale_ends_at: None,
            });
        }
        let ends_at = read.presale_ended().await?;
        let now = self.clock.now();
        let phase = MintPhase::derive(started, ends_at, now);
        debug!(%phase, ends_at, now, "resolved mint phase");
        Ok(PhaseReading {
            phase,
            presale_ends_at: Some(ends_at),
        })
    }

    pub async fn resolve_ownership<R: ContractReader>(
        &self,
        read: &R,
        account: Address,
    ) -> Result<bool> {
        let owner = read.owner().await?;
        Ok(owner == account)
    }

    pub async fn resolve_minted_count<R: ContractReader>(&self, read: &R) -> Result<u64> {
        read.token_ids().await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::FakeChain;
    use proptest::prelude::*;
    use std::str::FromStr;

    #[test]
    fn derive__presale_not_started__is_not_started_whatever_the_timestamp() {
        assert_eq!(MintPhase::derive(false, 0, 100), MintPhase::NotStarted);
        assert_eq!(MintPhase::derive(false, 500, 100), MintPhase::NotStarted);
    }

    #[test]
    fn derive__end_timestamp_reached__presale_has_ended() {
        // given
        let ends_at = 1_700_000_000;

        // when
        let at_end = MintPhase::derive(true, ends_at, ends_at);
        let one_before = MintPhase::derive(true, ends_at, ends_at - 1);

        // then
        assert_eq!(at_end, MintPhase::PresaleEnded);
        assert_eq!(one_before, MintPhase::PresaleActive);
    }

    proptest! {
        #[test]
        fn derive__any_input__lands_in_exactly_one_phase(
            started in any::<bool>(),
            ends_at in any::<u64>(),
            now in any::<u64>(),
        ) {
            let phase = MintPhase::derive(started, ends_at, now);
            let not_started = !started;
            let active = started && now < ends_at;
            let ended = started && now >= ends_at;

            prop_assert_eq!(
                [not_started, active, ended].iter().filter(|b| **b).count(),
                1
            );
            prop_assert_eq!(phase == MintPhase::NotStarted, not_started);
            prop_assert_eq!(phase == MintPhase::PresaleActive, active);
            prop_assert_eq!(phase == MintPhase::PresaleEnded, ended);
        }
    }

    #[tokio::test]
    async fn resolve_phase__presale_not_started__is_not_started() {
        let chain = FakeChain::sepolia();
        let resolver = PhaseResolver::with_clock(chain.clock());

        let phase = resolver.resolve_phase(&chain.reader()).await.unwrap();

        assert_eq!(phase, MintPhase::NotStarted);
    }

    #[tokio::test]
    async fn resolve_phase__follows_presale_window_on_chain() {
        // given
        let chain = FakeChain::sepolia();
        let resolver = PhaseResolver::with_clock(chain.clock());
        chain.start_presale_at(chain.now() + 3600);

        // when
        let during = resolver.resolve_phase(&chain.reader()).await.unwrap();
        chain.advance(3600);
        let after = resolver.resolve_phase(&chain.reader()).await.unwrap();

        // then
        assert_eq!(during, MintPhase::PresaleActive);
        assert_eq!(after, MintPhase::PresaleEnded);
    }

    #[tokio::test]
    async fn resolve_ownership__same_account__is_owner() {
        let chain = FakeChain::sepolia();
        let resolver = PhaseResolver::with_clock(chain.clock());

        let owner = resolver.resolve_ownership(&chain.reader(), chain.owner()).await;
        let visitor = resolver
            .resolve_ownership(&chain.reader(), Address::repeat_byte(0xbb))
            .await;

        assert_eq!(owner, Ok(true));
        assert_eq!(visitor, Ok(false));
    }

    #[test]
    fn parsed_addresses__mixed_case__are_equal() {
        let upper =
            Address::from_str("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED").unwrap();
        let lower =
            Address::from_str("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(upper, lower);
    }
}
