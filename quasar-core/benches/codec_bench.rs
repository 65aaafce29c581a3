use quasar_core::{
    BaseEventBuilder, ClientMessage, Event, Filter, Keys, LocalEvent, RelayMessage, Signer, sign,
    write_events_delimited,
};
use std::time::Instant;

fn sample_events(keys: &Keys, count: usize) -> Vec<Event> {
    (0..count)
        .filter_map(|i| {
            let base = BaseEventBuilder::new()
                .author_key(keys.public_key())
                .created_at_secs(1_700_000_000 + i as i64)
                .kind(1)
                .add_tag(vec!["t", "nostr"])
                .add_tag(vec![
                    "p",
                    "f7234bd4c1394dda46d09f35bd384dd30cc552ad5541990f98844fb06676e9ca",
                ])
                .content(format!("Benchmark note #{}", i))
                .build();
            sign(base, keys).ok()
        })
        .collect()
}

fn report(label: &str, count: usize, start: Instant) {
    let duration = start.elapsed();
    let per_sec = count as f64 / duration.as_secs_f64();

    println!("  {}: {}", label, count);
    println!("  Time taken: {:.2}s", duration.as_secs_f64());
    println!("  Ops/sec: {:.0}", per_sec);
    println!(
        "  Avg time per op: {:.2}µs",
        duration.as_micros() as f64 / count as f64
    );
}

fn benchmark_sign() {
    println!("\n=== Benchmark: Sign Events ===");

    let keys = Keys::generate();
    let count = 10_000;
    let start = Instant::now();
    let events = sample_events(&keys, count);

    report("Events signed", events.len(), start);
}

fn benchmark_verify() {
    println!("\n=== Benchmark: Verify Events ===");

    let keys = Keys::generate();
    let events = sample_events(&keys, 10_000);
    let start = Instant::now();
    let valid = events.iter().filter(|e| e.verify().is_ok()).count();

    report("Events verified", valid, start);
}

fn benchmark_decode_event_frames() {
    println!("\n=== Benchmark: Decode EVENT Frames ===");

    let keys = Keys::generate();
    let frames: Vec<String> = sample_events(&keys, 50_000)
        .iter()
        .map(|event| {
            let encoded = ClientMessage::Event(event.clone()).encode();
            let object = &encoded["[\"EVENT\",".len()..encoded.len() - 1];
            format!("[\"EVENT\",\"bench\",{}]", object)
        })
        .collect();

    let start = Instant::now();
    let decoded = frames
        .iter()
        .filter(|frame| RelayMessage::decode(frame.as_bytes()).is_ok())
        .count();

    report("Frames decoded", decoded, start);
}

fn benchmark_encode_requests() {
    println!("\n=== Benchmark: Encode REQ Frames ===");

    let count = 200_000;
    let filters = vec![
        Filter::new().kinds(vec![0, 1, 7]).limit(500),
        Filter::new()
            .authors(["79dff8f82963424e0bb02708a22e44b4980893e3a4be0fa3cb60a43b946764e3"])
            .tag(&["t", "nostr"]),
    ];

    let start = Instant::now();
    let mut bytes = 0usize;
    for i in 0..count {
        bytes += ClientMessage::Request {
            subscription_id: format!("sub-{}", i),
            filters: filters.clone(),
        }
        .encode()
        .len();
    }

    report("Frames encoded", count, start);
    println!("  Bytes produced: {}", bytes);
}

fn benchmark_archive_write() {
    println!("\n=== Benchmark: Write Delimited Records ===");

    let keys = Keys::generate();
    let records: Vec<LocalEvent> = sample_events(&keys, 50_000)
        .iter()
        .map(LocalEvent::from)
        .collect();

    let start = Instant::now();
    let mut buffer = Vec::new();
    if let Err(e) = write_events_delimited(&mut buffer, &records) {
        println!("  Write failed: {}", e);
        return;
    }

    report("Records written", records.len(), start);
    println!(
        "  Avg record size: {:.1} bytes",
        buffer.len() as f64 / records.len() as f64
    );
}

fn main() {
    println!("╔════════════════════════════════════════════════╗");
    println!("║       Quasar Codec Performance Tests          ║");
    println!("╚════════════════════════════════════════════════╝");

    benchmark_sign();
    benchmark_verify();
    benchmark_decode_event_frames();
    benchmark_encode_requests();
    benchmark_archive_write();

    println!("\n✅ Codec benchmarks complete!");
}
