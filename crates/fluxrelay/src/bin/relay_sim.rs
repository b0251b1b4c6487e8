use fluxrelay::simulator::SimNic;
use fluxrelay::{FwdStream, RelayBuilder, TxOffloads, TxPortConf, WaitStrategy};
use std::env;
use std::process;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RX_PORT: u16 = 0;
const TX_PORT: u16 = 1;
const DEFAULT_PACKETS: u64 = 100_000;
const STALL_TIMEOUT: Duration = Duration::from_secs(5);

fn frame(seq: u64) -> Vec<u8> {
    let mut data = vec![0u8; 64];
    data[0..6].copy_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
    data[6..12].copy_from_slice(&[0x02, 0, 0, 0, 0, 0x02]);
    data[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
    data[14..22].copy_from_slice(&seq.to_be_bytes());
    data
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <spin|condvar|semaphore|runloop> [packets]", args[0]);
        process::exit(1);
    }

    let strategy: WaitStrategy = match args[1].parse() {
        Ok(strategy) => strategy,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };
    let packets: u64 = match args.get(2).map(|s| s.parse()) {
        None => DEFAULT_PACKETS,
        Some(Ok(n)) => n,
        Some(Err(err)) => {
            eprintln!("Invalid packet count: {}", err);
            process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let nic = SimNic::new(2);
    nic.configure_port(TxPortConf {
        port_id: TX_PORT,
        offloads: TxOffloads::VLAN_INSERT,
        vlan_id: 100,
        vlan_id_outer: 0,
    });

    let mut mode = match RelayBuilder::new(strategy).build_mode(nic.clone()) {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            process::exit(1);
        }
    };
    if let Err(err) = mode.on_start() {
        eprintln!("Failed to start forwarding mode: {}", err);
        process::exit(1);
    }

    let stream = FwdStream::new(RX_PORT, TX_PORT);
    let started = Instant::now();
    let mut injected = 0u64;
    let mut delivered = 0u64;
    let mut last_progress = Instant::now();

    loop {
        while injected < packets && nic.inject(RX_PORT, &frame(injected)).is_ok() {
            injected += 1;
        }

        if let Err(err) = mode.forward_one_iteration(&stream) {
            eprintln!("Forwarding failed: {}", err);
            break;
        }

        let drained = nic.drain_tx(TX_PORT).len() as u64;
        if drained > 0 {
            delivered += drained;
            last_progress = Instant::now();
        }

        let stats = stream.stats().snapshot();
        if stats.tx_packets + stats.fwd_dropped >= packets {
            break;
        }
        if last_progress.elapsed() > STALL_TIMEOUT {
            tracing::warn!(injected, delivered, "no traffic for {:?}, giving up", STALL_TIMEOUT);
            break;
        }
    }

    if let Err(err) = mode.on_stop() {
        eprintln!("Failed to stop forwarding mode: {}", err);
    }
    delivered += nic.drain_tx(TX_PORT).len() as u64;

    let elapsed = started.elapsed();
    let stats = stream.stats().snapshot();
    println!("strategy:      {}", strategy.name());
    println!("injected:      {}", injected);
    println!("delivered:     {}", delivered);
    println!("rx_packets:    {}", stats.rx_packets);
    println!("tx_packets:    {}", stats.tx_packets);
    println!("fwd_dropped:   {}", stats.fwd_dropped);
    println!("rx_bursts:     {}", stats.rx_bursts);
    println!("empty_polls:   {}", stats.empty_polls);
    println!("tx_retries:    {}", stats.tx_retries);
    println!("handoffs:      {}", stats.handoffs);
    if stats.rx_bursts > 0 {
        println!("avg burst ns:  {}", stats.busy_ns / stats.rx_bursts);
    }
    println!("max burst ns:  {}", stats.max_burst_ns);
    println!(
        "rate:          {:.2} Mpps",
        stats.tx_packets as f64 / elapsed.as_secs_f64().max(f64::EPSILON) / 1e6
    );
}
