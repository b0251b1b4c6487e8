use fluxrelay::simulator::SimNic;
use fluxrelay::{FwdStream, RelayBuilder, WaitStrategy};
use proptest::prelude::*;
use std::time::Duration;

const RX: u16 = 0;
const TX: u16 = 1;

fn arb_strategy() -> impl Strategy<Value = WaitStrategy> {
    prop_oneof![
        Just(WaitStrategy::Spin),
        Just(WaitStrategy::Condvar),
        Just(WaitStrategy::Semaphore),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every received packet is either transmitted or counted as dropped,
    /// whatever the burst sizes and however stingy the TX side is.
    #[test]
    fn every_packet_sent_or_counted(
        strategy in arb_strategy(),
        bursts in prop::collection::vec(0usize..=64, 1..12),
        tx_limits in prop::collection::vec(0usize..=48, 0..24),
        retries in 0u32..4,
        retry_enabled in any::<bool>(),
    ) {
        let nic = SimNic::new(2);
        nic.script_tx(TX, &tx_limits);

        let mut mode = RelayBuilder::new(strategy)
            .burst_size(64)
            .tx_retries(retries)
            .tx_delay(Duration::ZERO)
            .build_mode(nic.clone())
            .unwrap();
        let stream = FwdStream::new(RX, TX).with_retry(retry_enabled);

        let mut delivered = 0;
        let mut dropped = 0;
        for &n in &bursts {
            for i in 0..n {
                nic.inject(RX, &[i as u8; 60]).unwrap();
            }

            let report = mode.forward_one_iteration(&stream).unwrap();
            prop_assert_eq!(report.received, n);
            prop_assert_eq!(report.transmitted + report.dropped, n);
            if !retry_enabled {
                prop_assert_eq!(report.retries, 0);
            }

            let sent = nic.drain_tx(TX).len();
            prop_assert_eq!(sent, report.transmitted);
            delivered += sent;
            dropped += report.dropped;
        }
        mode.on_stop().unwrap();

        let total: usize = bursts.iter().sum();
        prop_assert_eq!(delivered + dropped, total);

        let stats = stream.stats().snapshot();
        prop_assert!(stats.is_balanced());
        prop_assert_eq!(stats.rx_packets as usize, total);
        prop_assert_eq!(stats.handoffs as usize, bursts.iter().filter(|&&n| n > 0).count());
        prop_assert_eq!(mode.cycles(), stats.handoffs);
    }
}
