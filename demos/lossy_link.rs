//! Lossy link example
//!
//! A simulated field device pushes packets over a link that drops some of
//! them. The processor notices the gaps and backfills the missing packets
//! from the device's own store, so the sink still sees every reading.
//!
//! Run with: `cargo run --example lossy_link`

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tspv::{
    push_channel, DeviceGateway, MemoryDevice, MemoryLogger, Processor, ProcessorConfig, Reading,
    SequenceId, StatusBits, ValidPacket,
};

/// Device store shared between the simulated emitter and the processor
#[derive(Clone, Default)]
struct SharedDevice(Arc<Mutex<MemoryDevice>>);

impl SharedDevice {
    fn with<R>(&self, f: impl FnOnce(&mut MemoryDevice) -> R) -> R {
        let mut device = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut device)
    }
}

impl DeviceGateway for SharedDevice {
    fn request_old_packet(&mut self, id: SequenceId) -> Option<Vec<u8>> {
        self.with(|device| device.request_old_packet(id))
    }

    fn post_reading(&mut self, status: StatusBits, offset_seconds: u8, value: f32) {
        self.with(|device| device.post_reading(status, offset_seconds, value))
    }
}

fn packet(index: u32, start: DateTime<Utc>) -> ValidPacket {
    let base = start + TimeDelta::seconds(i64::from(index) * 20);
    let reading = |offset: u8, value: f32| Reading {
        status: [0x02, 0x20],
        offset_seconds: offset,
        timestamp: base + TimeDelta::seconds(i64::from(offset)),
        value,
    };
    ValidPacket {
        version: 1,
        sequence_id: SequenceId::new((index % 255 + 1) as u8),
        base_timestamp: base,
        readings: [
            reading(0, 20.0 + index as f32 * 0.01),
            reading(10, 20.005 + index as f32 * 0.01),
        ],
    }
}

fn main() {
    println!("=== TSPV Lossy Link Demo ===\n");

    let start = DateTime::from_timestamp(1_695_038_400, 0).unwrap_or_default();
    let mut rng = StdRng::seed_from_u64(7);
    let total = 600u32;
    let loss_rate = 0.15;

    // The device already holds packet #1 when the processor starts
    let device = SharedDevice::default();
    device.with(|d| d.store_packet(&packet(0, start)));

    let logger = Arc::new(MemoryLogger::default());
    let (tx, rx) = push_channel(16);
    let config = ProcessorConfig::with_tick_interval(Duration::from_millis(50));
    let handle = Processor::with_config(device.clone(), Arc::clone(&logger), rx, config)
        .spawn()
        .expect("failed to spawn processor");

    let mut dropped = 0;
    for index in 1..total {
        let p = packet(index, start);
        device.with(|d| d.store_packet(&p));
        if rng.gen::<f64>() < loss_rate {
            dropped += 1;
            continue;
        }
        if tx.push(p.to_bytes()).is_err() {
            break;
        }
    }
    drop(tx);

    let tracker = handle.join().expect("processor panicked");
    let stats = tracker.stats();

    println!("Packets emitted:      {}", total);
    println!("Dropped on the link:  {}", dropped);
    println!("Delivered:            {}", stats.packets_delivered);
    println!(
        "Backfilled:           {}/{}",
        stats.backfill_recovered, stats.backfill_requested
    );
    println!("Stale discarded:      {}", stats.stale_discarded);
    println!("Rejected:             {}", stats.rejected);
    println!("Readings at the sink: {}", device.with(|d| d.posted().len()));
    println!("Watermark:            {}", tracker.state().last_delivered);

    println!("\nFirst delivered readings:");
    device.with(|d| {
        for reading in d.posted().iter().take(6) {
            println!(
                "  status {:02X}{:02X} +{:>2}s  {:.3}",
                reading.status[0], reading.status[1], reading.offset_seconds, reading.value
            );
        }
    });

    println!("\nLogged events:");
    for event in logger.events() {
        println!("  {}", event);
    }
}
