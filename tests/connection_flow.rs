#![allow(non_snake_case)]
use alloy::primitives::Address;
use cryptodevs_mint::{
    MintError,
    SEPOLIA_CHAIN_ID,
    action::{
        ActionKind,
        ExecutorConfig,
    },
    connection::WalletEvent,
    minter::Minter,
    phase::MintPhase,
    state::{
        Affordance,
        ConnectionStatus,
    },
    test_helpers::{
        FakeChain,
        FakeWallet,
    },
};

#[tokio::test]
async fn connect__wallet_on_mainnet__refuses_without_reading_or_writing() {
    // given
    let chain = FakeChain::with_chain_id(1);
    let mut minter = Minter::with_clock(
        FakeWallet::new(&chain, chain.owner()),
        ExecutorConfig::default(),
        chain.clock(),
    );

    // when
    let connected = minter.connect().await;
    let polled = minter.poll_phase().await;
    let minted = minter.poll_minted().await;
    let mint = minter.start_presale().await;

    // then
    let mismatch = MintError::NetworkMismatch {
        expected: SEPOLIA_CHAIN_ID,
        actual: 1,
    };
    assert_eq!(connected, Err(mismatch.clone()));
    assert!(!polled);
    assert!(!minted);
    assert!(mint.is_err());
    assert_eq!(chain.stats().reads, 0);
    assert_eq!(chain.stats().writes, 0);
    let state = minter.state();
    assert_eq!(state.connection, ConnectionStatus::Failed(mismatch));
    assert_eq!(state.affordance(), Affordance::Connect);
}

#[tokio::test]
async fn connect__owner__shows_owner_affordance_after_first_poll() {
    // given
    let chain = FakeChain::sepolia();
    let mut minter = Minter::with_clock(
        FakeWallet::new(&chain, chain.owner()),
        ExecutorConfig::default(),
        chain.clock(),
    );

    // when
    let info = minter.connect().await.unwrap();
    let before_poll = minter.state().affordance();
    minter.refresh().await;

    // then
    assert_eq!(info.account, chain.owner());
    assert!(!info.can_sign);
    assert_eq!(before_poll, Affordance::AwaitingPhase);
    let state = minter.state();
    assert!(state.is_owner);
    assert_eq!(state.phase, Some(MintPhase::NotStarted));
    assert_eq!(state.affordance(), Affordance::StartPresale);
}

#[tokio::test]
async fn connect__called_again__does_not_re_resolve_ownership() {
    let chain = FakeChain::sepolia();
    let mut minter = Minter::with_clock(
        FakeWallet::new(&chain, chain.owner()),
        ExecutorConfig::default(),
        chain.clock(),
    );

    minter.connect().await.unwrap();
    minter.connect().await.unwrap();

    assert_eq!(chain.stats().connects, 1);
    assert_eq!(chain.stats().reads, 1);
}

#[tokio::test]
async fn handle_wallet_event__account_switched__drops_owner_session() {
    // given
    let chain = FakeChain::sepolia();
    let mut minter = Minter::with_clock(
        FakeWallet::new(&chain, chain.owner()),
        ExecutorConfig::default(),
        chain.clock(),
    );
    minter.connect().await.unwrap();
    minter.refresh().await;
    assert!(minter.state().is_owner);

    // when
    minter.handle_wallet_event(WalletEvent::AccountsChanged(vec![Address::repeat_byte(0xcc)]));

    // then
    let state = minter.state();
    assert_eq!(state.connection, ConnectionStatus::Disconnected);
    assert!(!state.is_owner);
    assert_eq!(state.affordance(), Affordance::Connect);
    assert_eq!(
        minter.start_presale().await,
        Err(MintError::NotConnected(ActionKind::StartPresale))
    );
    assert_eq!(chain.stats().writes, 0);
}

#[tokio::test]
async fn public_mint__after_disconnect__rejected_until_reconnected() {
    // given
    let chain = FakeChain::sepolia();
    chain.start_presale_at(chain.now());
    let mut minter = Minter::with_clock(
        FakeWallet::new(&chain, Address::repeat_byte(0xbb)),
        ExecutorConfig::default(),
        chain.clock(),
    );
    minter.connect().await.unwrap();
    minter.refresh().await;
    assert_eq!(minter.state().affordance(), Affordance::PublicMint);

    // when
    minter.disconnect();
    let while_disconnected = minter.public_mint().await;

    // then
    assert_eq!(
        while_disconnected,
        Err(MintError::NotConnected(ActionKind::PublicMint))
    );
    assert_eq!(chain.stats().writes, 0);
    assert_eq!(chain.token_ids(), 0);
    assert!(minter.connection().session().is_none());

    // when
    minter.connect().await.unwrap();
    let after_reconnect = minter.public_mint().await;

    // then
    assert!(after_reconnect.is_ok());
    assert!(minter.state().is_connected());
    assert_eq!(minter.state().minted_display(), "1/20");
}

#[tokio::test]
async fn signer_for__after_disconnect__publishes_the_new_session() {
    // given
    let chain = FakeChain::sepolia();
    let mut minter = Minter::with_clock(
        FakeWallet::new(&chain, chain.owner()),
        ExecutorConfig::default(),
        chain.clock(),
    );
    minter.connect().await.unwrap();
    minter.disconnect();

    // when
    minter.signer_for(ActionKind::StartPresale).await.unwrap();

    // then
    let state = minter.state();
    assert!(minter.connection().session().is_some());
    assert!(state.is_connected());
    assert!(state.is_owner);
    assert_eq!(chain.stats().connects, 2);
}

#[tokio::test]
async fn watch_chain__wallet_moves_to_mainnet__drops_session_and_refuses_reconnect() {
    // given
    let chain = FakeChain::sepolia();
    let mut minter = Minter::with_clock(
        FakeWallet::new(&chain, chain.owner()),
        ExecutorConfig::default(),
        chain.clock(),
    );
    minter.connect().await.unwrap();
    assert!(!minter.watch_chain().await);

    // when
    chain.set_chain_id(1);
    let dropped = minter.watch_chain().await;
    let reconnect = minter.connect().await;

    // then
    assert!(dropped);
    assert!(matches!(reconnect, Err(MintError::NetworkMismatch { actual: 1, .. })));
    assert!(!minter.state().is_connected());
    assert!(!minter.state().is_owner);
}

#[tokio::test]
async fn disconnect__then_connect__starts_a_fresh_session() {
    // given
    let chain = FakeChain::sepolia();
    let mut minter = Minter::with_clock(
        FakeWallet::new(&chain, chain.owner()),
        ExecutorConfig::default(),
        chain.clock(),
    );
    minter.connect().await.unwrap();

    // when
    minter.disconnect();
    let info = minter.connect().await.unwrap();

    // then
    assert_eq!(info.chain_id, SEPOLIA_CHAIN_ID);
    assert_eq!(chain.stats().connects, 2);
    assert!(minter.state().is_connected());
}

#[tokio::test]
async fn poll_phase__node_down__keeps_last_phase_and_stays_connected() {
    // given
    let chain = FakeChain::sepolia();
    chain.start_presale_at(chain.now() + 60);
    let mut minter = Minter::with_clock(
        FakeWallet::new(&chain, Address::repeat_byte(0xbb)),
        ExecutorConfig::default(),
        chain.clock(),
    );
    minter.connect().await.unwrap();
    minter.refresh().await;

    // when
    chain.fail_reads(true);
    chain.advance(120);
    let updated = minter.poll_phase().await;

    // then
    assert!(!updated);
    let state = minter.state();
    assert_eq!(state.phase, Some(MintPhase::PresaleActive));
    assert!(state.is_connected());
}
