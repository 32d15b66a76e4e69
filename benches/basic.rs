use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use virtual_serial_bridge::config::Config;
use virtual_serial_bridge::service::BridgeService;
use virtual_serial_bridge::state::BridgeState;
use virtual_serial_bridge::stdio::{process_command, Dispatch};
use virtual_serial_bridge::{PortSlotPool, QueueRegistry, Side};

pub fn bench_forward(c: &mut Criterion) {
    let payload = b"AT+CSQ=1,2,3 status report 0123456789abcdef";
    let readers = Arc::new(QueueRegistry::new(1 << 20));
    let pool = PortSlotPool::with_defaults(readers.clone());
    let device = pool.acquire(0, Side::Device).unwrap();
    let commander = pool.acquire(0, Side::Commander).unwrap();
    let queue = readers.reader(0, Side::Commander).unwrap();

    let mut group = c.benchmark_group("forward");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("multi_byte_with_echo_drain", |b| {
        b.iter(|| {
            pool.write(device, black_box(payload)).unwrap();
            // Reflect everything so the device history never fills.
            for byte in payload {
                pool.forward(commander, &[*byte]).unwrap();
            }
            black_box(queue.drain());
        })
    });
    group.bench_function("line_ending", |b| {
        b.iter(|| {
            pool.write(device, black_box(b"\r\n")).unwrap();
            black_box(queue.drain());
        })
    });
    group.finish();
}

pub fn bench_stdio_dispatch(c: &mut Criterion) {
    let service = BridgeService::new(BridgeState::shared(&Config::default()));
    let open = |side: &str| json!({ "command": "open", "params": { "slot": 0, "side": side } });
    process_command(&service, &open("device"));
    process_command(&service, &open("commander"));

    let sample = r#"{"command":"write","params":{"handle":1,"data":"ATZ\r\n"}}"#;
    let read = json!({ "command": "read", "params": { "handle": 2 } });
    c.bench_function("parse_and_dispatch_write", |b| {
        b.iter(|| {
            let v: serde_json::Value = serde_json::from_str(black_box(sample)).unwrap();
            match process_command(&service, &v) {
                Dispatch::Reply(out) => black_box(out),
                _ => unreachable!(),
            };
            process_command(&service, &read);
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_forward, bench_stdio_dispatch
}
criterion_main!(benches);
