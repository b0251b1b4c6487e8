use fluxrelay::simulator::SimNic;
use fluxrelay::{
    BurstReport, FwdStream, MbufFlags, RelayBuilder, RelayError, TxOffloads, TxPortConf,
    WaitStrategy, WorkerState,
};
use std::time::{Duration, Instant};

const RX: u16 = 0;
const TX: u16 = 1;

const PER_CYCLE: [WaitStrategy; 3] = [
    WaitStrategy::Spin,
    WaitStrategy::Condvar,
    WaitStrategy::Semaphore,
];

fn frame(seq: u8) -> Vec<u8> {
    let mut data = vec![0u8; 64];
    data[0..6].copy_from_slice(&[0xD0, 0, 0, 0, 0, seq]);
    data[6..12].copy_from_slice(&[0x5A, 0, 0, 0, 0, seq]);
    data[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
    data[14] = seq;
    data
}

fn nic_with(count: u8) -> SimNic {
    let nic = SimNic::new(2);
    nic.configure_port(TxPortConf {
        port_id: TX,
        offloads: TxOffloads::VLAN_INSERT,
        vlan_id: 42,
        vlan_id_outer: 0,
    });
    for seq in 0..count {
        nic.inject(RX, &frame(seq)).unwrap();
    }
    nic
}

fn assert_swapped(nic: &SimNic, count: usize) {
    let sent = nic.drain_tx(TX);
    assert_eq!(sent.len(), count);
    for (seq, pkt) in sent.iter().enumerate() {
        let seq = seq as u8;
        assert_eq!(&pkt.data()[0..6], &[0x5A, 0, 0, 0, 0, seq]);
        assert_eq!(&pkt.data()[6..12], &[0xD0, 0, 0, 0, 0, seq]);
        assert_eq!(pkt.data()[14], seq);
        assert_eq!(pkt.ol_flags, MbufFlags::TX_VLAN);
        assert_eq!(pkt.vlan_tci, 42);
        assert_eq!((pkt.l2_len, pkt.l3_len), (14, 20));
    }
}

fn fast_builder(strategy: WaitStrategy) -> RelayBuilder {
    RelayBuilder::new(strategy).tx_delay(Duration::ZERO)
}

#[test]
fn test_burst_of_32_swapped_every_strategy() {
    for strategy in PER_CYCLE {
        let nic = nic_with(32);
        let mut mode = RelayBuilder::new(strategy).build_mode(nic.clone()).unwrap();
        mode.on_start().unwrap();

        let stream = FwdStream::new(RX, TX);
        let report = mode.forward_one_iteration(&stream).unwrap();

        assert_eq!(report.received, 32, "{}", strategy.name());
        assert_eq!(report.transmitted + report.dropped, 32);
        assert_eq!(report.dropped, 0);
        assert_swapped(&nic, 32);

        mode.on_stop().unwrap();
        assert_eq!(mode.cycles(), 1);
        assert_eq!(stream.stats().snapshot().handoffs, 1);
    }
}

#[test]
fn test_run_loop_forwards_on_its_own() {
    let nic = nic_with(32);
    let mut mode = RelayBuilder::new(WaitStrategy::RunLoop)
        .build_mode(nic.clone())
        .unwrap();
    mode.on_start().unwrap();
    assert!(mode.io().is_some());

    let stream = FwdStream::new(RX, TX);
    assert_eq!(mode.forward_one_iteration(&stream).unwrap(), BurstReport::default());
    assert!(mode.io().is_none());

    let deadline = Instant::now() + Duration::from_secs(5);
    while stream.stats().snapshot().tx_packets < 32 {
        assert!(Instant::now() < deadline, "run-loop never forwarded the burst");
        std::thread::yield_now();
    }

    // Further iterations never launch a second worker.
    assert_eq!(mode.forward_one_iteration(&stream).unwrap(), BurstReport::default());

    mode.on_stop().unwrap();
    assert!(mode.io().is_some());
    assert_eq!(mode.cycles(), 0);
    assert_swapped(&nic, 32);

    let stats = stream.stats().snapshot();
    assert_eq!(stats.handoffs, 0);
    assert!(stats.is_balanced());
}

#[test]
fn test_empty_receive_skips_handoff() {
    for strategy in PER_CYCLE {
        let nic = nic_with(0);
        let mut mode = RelayBuilder::new(strategy).build_mode(nic.clone()).unwrap();
        let stream = FwdStream::new(RX, TX);

        for _ in 0..10 {
            assert_eq!(mode.forward_one_iteration(&stream).unwrap(), BurstReport::default());
        }

        assert_eq!(mode.cycles(), 0);
        let stats = stream.stats().snapshot();
        assert_eq!(stats.empty_polls, 10);
        assert_eq!(stats.handoffs, 0);
        assert_eq!(nic.tx_calls(TX), 0);
    }
}

#[test]
fn test_partial_send_recovered_by_one_retry() {
    for strategy in PER_CYCLE {
        let nic = nic_with(32);
        nic.script_tx(TX, &[20, 12]);
        let mut mode = fast_builder(strategy).build_mode(nic.clone()).unwrap();
        let stream = FwdStream::new(RX, TX);

        let report = mode.forward_one_iteration(&stream).unwrap();

        assert_eq!(report.transmitted, 32);
        assert_eq!(report.dropped, 0);
        assert_eq!(report.retries, 1);
        assert_eq!(nic.tx_calls(TX), 2);
        assert_swapped(&nic, 32);
    }
}

#[test]
fn test_exhausted_retries_drop_and_count() {
    let nic = nic_with(32);
    nic.script_tx(TX, &[10, 0, 0]);
    let mut mode = fast_builder(WaitStrategy::Spin)
        .tx_retries(2)
        .build_mode(nic.clone())
        .unwrap();
    let stream = FwdStream::new(RX, TX);

    let report = mode.forward_one_iteration(&stream).unwrap();

    assert_eq!((report.transmitted, report.dropped, report.retries), (10, 22, 2));
    let stats = stream.stats().snapshot();
    assert_eq!(stats.fwd_dropped, 22);
    assert_eq!(stats.tx_retries, 2);
    assert!(stats.is_balanced());
    assert_eq!(nic.drain_tx(TX).len(), 10);
}

#[test]
fn test_stream_without_retry_drops_at_once() {
    let nic = nic_with(32);
    nic.script_tx(TX, &[16]);
    let mut mode = fast_builder(WaitStrategy::Condvar).build_mode(nic.clone()).unwrap();
    let stream = FwdStream::new(RX, TX).with_retry(false);

    let report = mode.forward_one_iteration(&stream).unwrap();

    assert_eq!((report.transmitted, report.dropped, report.retries), (16, 16, 0));
    assert_eq!(nic.tx_calls(TX), 1);
}

#[test]
fn test_stop_with_no_cycle_in_flight() {
    for strategy in WaitStrategy::ALL {
        let mut mode = RelayBuilder::new(strategy).build_mode(nic_with(0)).unwrap();
        mode.on_start().unwrap();
        assert_eq!(mode.state(), WorkerState::Running);

        mode.on_stop().unwrap();
        assert_eq!(mode.state(), WorkerState::Joined, "{}", strategy.name());
        assert_eq!(mode.cycles(), 0);
    }
}

#[test]
fn test_bad_worker_core_aborts_mode() {
    let mut mode = RelayBuilder::new(WaitStrategy::Condvar)
        .worker_core(usize::MAX)
        .build_mode(nic_with(4))
        .unwrap();

    let err = mode.on_start().unwrap_err();
    assert!(matches!(err, RelayError::Affinity { core: usize::MAX, .. }));
    assert!(err.is_fatal());
    assert!(mode.is_aborted());

    let stream = FwdStream::new(RX, TX);
    assert!(matches!(mode.forward_one_iteration(&stream), Err(RelayError::Aborted)));
    assert!(matches!(mode.on_start(), Err(RelayError::Aborted)));
    mode.on_stop().unwrap();
}

#[test]
fn test_bad_worker_core_aborts_run_loop_on_launch() {
    let mut mode = RelayBuilder::new(WaitStrategy::RunLoop)
        .worker_core(usize::MAX)
        .build_mode(nic_with(4))
        .unwrap();
    mode.on_start().unwrap();

    let stream = FwdStream::new(RX, TX);
    assert!(matches!(
        mode.forward_one_iteration(&stream),
        Err(RelayError::Affinity { .. })
    ));
    assert!(matches!(mode.forward_one_iteration(&stream), Err(RelayError::Aborted)));
}

#[test]
fn test_dropping_running_mode_joins_worker() {
    for strategy in WaitStrategy::ALL {
        let nic = nic_with(8);
        let stream = FwdStream::new(RX, TX);
        {
            let mut mode = RelayBuilder::new(strategy).build_mode(nic.clone()).unwrap();
            mode.forward_one_iteration(&stream).unwrap();
        }
        if strategy.is_per_cycle() {
            assert_eq!(nic.drain_tx(TX).len(), 8);
        }
    }
}
