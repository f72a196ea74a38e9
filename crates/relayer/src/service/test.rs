use super::*;
use crate::{
    event::encode,
    ports::TxHandle,
};
use primitive_types::{
    H160,
    H256,
};
use std::sync::{
    Arc,
    Mutex,
};

const BRIDGE: H160 = H160::repeat_byte(0xbc);
const SIDE_CHAIN_ID: u64 = 9;

mockall::mock! {
    SideChain {}

    #[async_trait]
    impl SideChainClient for SideChain {
        async fn current_height(&self) -> anyhow::Result<u64>;
        async fn events_at(&self, height: u64) -> anyhow::Result<Vec<CrossChainEvent>>;
    }
}

mockall::mock! {
    Hub {}

    #[async_trait]
    impl HubClient for Hub {
        async fn already_finalized(
            &self,
            side_chain_id: u64,
            cross_chain_id: &[u8],
        ) -> anyhow::Result<bool>;

        async fn submit_vote(
            &self,
            side_chain_id: u64,
            payload: &[u8],
            height: u64,
        ) -> anyhow::Result<TxHandle>;
    }
}

#[derive(Default, Clone)]
struct FakeStore {
    inner: Arc<Mutex<FakeStoreInner>>,
}

#[derive(Default)]
struct FakeStoreInner {
    height: u64,
    sets: Vec<u64>,
}

impl FakeStore {
    fn with_height(height: u64) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().height = height;
        store
    }

    fn sets(&self) -> Vec<u64> {
        self.inner.lock().unwrap().sets.clone()
    }
}

impl CheckpointStore for FakeStore {
    fn relay_height(&self) -> u64 {
        self.inner.lock().unwrap().height
    }

    fn set_relay_height(&mut self, height: u64) -> Result<(), storage::Error> {
        let mut inner = self.inner.lock().unwrap();
        inner.height = height;
        inner.sets.push(height);
        Ok(())
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.side.side_chain_id = SIDE_CHAIN_ID;
    config.side.bridge_contract = BRIDGE;
    config.whitelist_methods = vec!["unlock".to_string()];
    config.poll_interval = std::time::Duration::from_millis(10);
    config.retry_interval = std::time::Duration::from_millis(5);
    config
}

fn deposit(contract: H160, method: &str, cross_chain_id: &[u8]) -> CrossChainEvent {
    let params = crate::event::TxParams {
        source_tx_hash: vec![0xaa; 32],
        cross_chain_id: cross_chain_id.to_vec(),
        from_contract: vec![0x11; 20],
        to_chain_id: 1,
        to_contract: vec![0x22; 20],
        method: method.to_string(),
        args: vec![],
    };
    CrossChainEvent {
        contract,
        tx_id: cross_chain_id.to_vec(),
        to_chain_id: 1,
        payload: encode::params(&params),
        tx_hash: H256::repeat_byte(0x77),
    }
}

fn test_relayer(
    side: MockSideChain,
    hub: MockHub,
    store: FakeStore,
    config: Config,
) -> Relayer<MockSideChain, MockHub, FakeStore> {
    Relayer::new(
        vec![side],
        hub,
        store,
        config,
        CancellationToken::new(),
        StdRng::seed_from_u64(7),
    )
    .unwrap()
}

/// Drives exactly one polling cycle, like a single timer tick.
async fn one_cycle(relayer: &mut Relayer<MockSideChain, MockHub, FakeStore>) -> anyhow::Result<()> {
    run::run(relayer).await
}

#[tokio::test]
async fn non_whitelisted_method_is_dropped() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(9));
    side.expect_events_at()
        .returning(|_| Ok(vec![deposit(BRIDGE, "mint", b"ccid-1")]));

    let mut hub = MockHub::default();
    hub.expect_already_finalized().never();
    hub.expect_submit_vote().never();

    let store = FakeStore::with_height(7);
    let mut relayer = test_relayer(side, hub, store.clone(), test_config());

    one_cycle(&mut relayer).await.unwrap();

    // The height is handled and the cursor advances past it anyway.
    assert_eq!(relayer.cursor, 8);
    assert_eq!(store.sets(), vec![8]);
}

#[tokio::test]
async fn already_finalized_deposit_is_not_resubmitted() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(9));
    side.expect_events_at()
        .returning(|_| Ok(vec![deposit(BRIDGE, "unlock", b"ccid-1")]));

    let mut hub = MockHub::default();
    hub.expect_already_finalized()
        .withf(|side_chain_id, ccid| *side_chain_id == SIDE_CHAIN_ID && ccid == b"ccid-1")
        .once()
        .returning(|_, _| Ok(true));
    hub.expect_submit_vote().never();

    let store = FakeStore::with_height(7);
    let mut relayer = test_relayer(side, hub, store.clone(), test_config());

    one_cycle(&mut relayer).await.unwrap();
    assert_eq!(store.sets(), vec![8]);
}

#[tokio::test]
async fn done_marker_query_failure_falls_back_to_submission() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(9));
    side.expect_events_at()
        .returning(|_| Ok(vec![deposit(BRIDGE, "unlock", b"ccid-1")]));

    let mut hub = MockHub::default();
    hub.expect_already_finalized()
        .once()
        .returning(|_, _| Err(anyhow::anyhow!("hub unreachable")));
    hub.expect_submit_vote()
        .once()
        .returning(|_, _, _| Ok(TxHandle::zero()));

    let mut relayer = test_relayer(side, hub, FakeStore::with_height(7), test_config());
    one_cycle(&mut relayer).await.unwrap();
}

#[tokio::test]
async fn foreign_contract_event_is_dropped() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(9));
    side.expect_events_at().returning(|_| {
        Ok(vec![deposit(
            H160::repeat_byte(0xee),
            "unlock",
            b"ccid-1",
        )])
    });

    let mut hub = MockHub::default();
    hub.expect_already_finalized().never();
    hub.expect_submit_vote().never();

    let store = FakeStore::with_height(7);
    let mut relayer = test_relayer(side, hub, store.clone(), test_config());

    one_cycle(&mut relayer).await.unwrap();
    assert_eq!(store.sets(), vec![8]);
}

#[tokio::test]
async fn undecodable_payload_is_dropped() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(9));
    side.expect_events_at().returning(|_| {
        let mut event = deposit(BRIDGE, "unlock", b"ccid-1");
        event.payload.truncate(4);
        Ok(vec![event])
    });

    let mut hub = MockHub::default();
    hub.expect_already_finalized().never();
    hub.expect_submit_vote().never();

    let store = FakeStore::with_height(7);
    let mut relayer = test_relayer(side, hub, store.clone(), test_config());

    one_cycle(&mut relayer).await.unwrap();
    assert_eq!(store.sets(), vec![8]);
}

#[tokio::test]
async fn submission_failure_is_fire_and_forget() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(9));
    side.expect_events_at()
        .returning(|_| Ok(vec![deposit(BRIDGE, "unlock", b"ccid-1")]));

    let mut hub = MockHub::default();
    hub.expect_already_finalized().returning(|_, _| Ok(false));
    hub.expect_submit_vote()
        .once()
        .returning(|_, _, _| Err(anyhow::anyhow!("broadcast failed")));

    let store = FakeStore::with_height(7);
    let mut relayer = test_relayer(side, hub, store.clone(), test_config());

    // The height advances and is persisted despite the failed vote.
    one_cycle(&mut relayer).await.unwrap();
    assert_eq!(relayer.cursor, 8);
    assert_eq!(store.sets(), vec![8]);
}

#[tokio::test(start_paused = true)]
async fn transient_fetch_failure_never_skips_a_height() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(9));
    side.expect_events_at()
        .times(2)
        .returning(|_| Err(anyhow::anyhow!("endpoint flake")));
    side.expect_events_at()
        .withf(|height| *height == 7)
        .once()
        .returning(|_| Ok(vec![]));

    let hub = MockHub::default();
    let store = FakeStore::with_height(7);
    let mut relayer = test_relayer(side, hub, store.clone(), test_config());

    one_cycle(&mut relayer).await.unwrap();

    // Height 7 was retried in place until it succeeded.
    assert_eq!(relayer.cursor, 8);
    assert_eq!(store.sets(), vec![8]);
}

#[tokio::test]
async fn events_are_submitted_in_emission_order() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(9));
    side.expect_events_at().returning(|_| {
        Ok(vec![
            deposit(BRIDGE, "unlock", b"ccid-1"),
            deposit(BRIDGE, "unlock", b"ccid-2"),
        ])
    });

    let submitted = Arc::new(Mutex::new(Vec::new()));
    let mut hub = MockHub::default();
    hub.expect_already_finalized().returning(|_, _| Ok(false));
    let log = Arc::clone(&submitted);
    hub.expect_submit_vote().times(2).returning(move |_, payload, _| {
        let ccid = crate::event::TxParams::decode(payload).unwrap().cross_chain_id;
        log.lock().unwrap().push(ccid);
        Ok(TxHandle::zero())
    });

    let mut relayer = test_relayer(side, hub, FakeStore::with_height(7), test_config());
    one_cycle(&mut relayer).await.unwrap();

    assert_eq!(
        *submitted.lock().unwrap(),
        vec![b"ccid-1".to_vec(), b"ccid-2".to_vec()]
    );
}

#[tokio::test]
async fn override_replaces_the_persisted_checkpoint() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(152));
    side.expect_events_at()
        .withf(|height| *height == 150)
        .once()
        .returning(|_| Ok(vec![]));

    let mut config = test_config();
    config.force_relay_height = 150;
    let store = FakeStore::with_height(100);
    let mut relayer = test_relayer(side, MockHub::default(), store.clone(), config);

    assert_eq!(relayer.cursor, 150);
    one_cycle(&mut relayer).await.unwrap();
    assert_eq!(store.sets(), vec![151]);
}

#[tokio::test]
async fn cancellation_stops_at_a_height_boundary() {
    let cancel = CancellationToken::new();

    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(10));
    side.expect_events_at()
        .withf(|height| *height == 5)
        .once()
        .returning(|_| Ok(vec![]));
    let trigger = cancel.clone();
    side.expect_events_at()
        .withf(|height| *height == 6)
        .once()
        .returning(move |_| {
            trigger.cancel();
            Err(anyhow::anyhow!("endpoint flake"))
        });

    let store = FakeStore::with_height(5);
    let mut relayer = Relayer::new(
        vec![side],
        MockHub::default(),
        store.clone(),
        test_config(),
        cancel,
        StdRng::seed_from_u64(7),
    )
    .unwrap();

    one_cycle(&mut relayer).await.unwrap_err();

    // Height 5 completed, height 6 did not; nothing was persisted
    // beyond the pre-existing checkpoint.
    assert_eq!(relayer.cursor, 6);
    assert_eq!(store.sets(), Vec::<u64>::new());
    assert_eq!(store.relay_height(), 5);
}

#[tokio::test(start_paused = true)]
async fn spawned_relayer_catches_up_and_persists() {
    let mut side = MockSideChain::default();
    side.expect_current_height().returning(|| Ok(10));
    side.expect_events_at()
        .returning(|height| Ok(if height == 7 { vec![deposit(BRIDGE, "unlock", b"ccid-7")] } else { vec![] }));

    let submitted = Arc::new(Mutex::new(Vec::new()));
    let mut hub = MockHub::default();
    hub.expect_already_finalized().returning(|_, _| Ok(false));
    let log = Arc::clone(&submitted);
    hub.expect_submit_vote().returning(move |_, _, height| {
        log.lock().unwrap().push(height);
        Ok(TxHandle::zero())
    });

    let store = FakeStore::with_height(5);
    let handle = RelayerHandle::start_with_rng(
        vec![side],
        hub,
        store.clone(),
        test_config(),
        StdRng::seed_from_u64(7),
    )
    .unwrap();

    handle.await_reached(9).await.unwrap();
    assert!(handle.is_running());
    handle.shutdown().await.unwrap();

    // Heights 5..=8 were processed and the checkpoint landed on 9.
    assert_eq!(*submitted.lock().unwrap(), vec![7]);
    assert_eq!(store.relay_height(), 9);
}
