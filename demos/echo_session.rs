//! Example walking through one slot of the bridge.
//!
//! A commander sends a command line to an emulated device, the device's
//! terminal echoes it back, and the bridge drops the echo. The device then
//! raises carrier detect while the commander waits for it.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use virtual_serial_bridge::bridge::{CancelToken, Forwarded, LineEvent, ModemLines};
use virtual_serial_bridge::{PortSlotPool, QueueRegistry, Side};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Echo Session Example ===\n");

    let readers = Arc::new(QueueRegistry::default());
    let pool = Arc::new(PortSlotPool::with_defaults(readers.clone()));

    let device = pool.acquire(0, Side::Device)?;
    let commander = pool.acquire(0, Side::Commander)?;
    println!(
        "1. Opened {} and {}",
        readers.node_name(0, Side::Device),
        readers.node_name(0, Side::Commander)
    );

    let device_rx = readers.reader(0, Side::Device).ok_or("device queue missing")?;
    let commander_rx = readers.reader(0, Side::Commander).ok_or("commander queue missing")?;

    println!("\n2. Commander sends a command:");
    pool.write(commander, b"status\n")?;
    println!("  device received {:?}", String::from_utf8_lossy(&device_rx.drain()));

    println!("\n3. Device terminal echoes byte by byte:");
    for byte in b"status" {
        let outcome = pool.forward(device, &[*byte])?;
        println!("  {:?} -> {:?}", *byte as char, outcome);
        debug_assert_eq!(outcome, Forwarded::EchoSuppressed);
    }
    pool.forward(device, b"\r\n")?;
    println!(
        "  commander received {:?}",
        String::from_utf8_lossy(&commander_rx.drain())
    );

    println!("\n4. Device answers:");
    pool.write(device, b"OK ready")?;
    println!("  commander received {:?}", String::from_utf8_lossy(&commander_rx.drain()));

    println!("\n5. Commander waits for carrier detect:");
    let cancel = CancelToken::new();
    let waiter = {
        let pool = Arc::clone(&pool);
        let cancel = cancel.clone();
        thread::spawn(move || pool.wait_for_change(commander, ModemLines::CAR, &cancel))
    };
    while pool.slot_status(0)?.commander.map_or(0, |ep| ep.waiters) == 0 {
        thread::sleep(Duration::from_millis(5));
    }
    pool.inject_line_event(commander, LineEvent::CarrierDetect(true))?;
    match waiter.join() {
        Ok(result) => println!("  wait finished: {:?}", result),
        Err(_) => println!("  waiter panicked"),
    }
    println!("  modem lines now {:?}", pool.get_modem_bits(commander)?.names());

    println!("\n6. Driver listing:");
    print!("{}", pool.listing());

    pool.release(device);
    pool.release(commander);
    println!("\n=== Example complete ===");
    Ok(())
}
