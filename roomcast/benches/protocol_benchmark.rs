use criterion::{black_box, criterion_group, criterion_main, Criterion};
use roomcast::peers::{Peer, PeerTable};
use roomcast::protocol::Payload;
use roomcast::routing;
use roomcast::wire::{encode_frame, WireReader};
use uuid::Uuid;

fn bench_payload_encode(c: &mut Criterion) {
    let update = vec![0u8; 64]; // Typical small sync update

    c.bench_function("payload_encode_64B", |b| {
        b.iter(|| {
            let payload = Payload::Sync(black_box(update.clone()));
            black_box(payload.encode().unwrap());
        })
    });
}

fn bench_payload_decode(c: &mut Criterion) {
    let encoded = Payload::Sync(vec![0u8; 64]).encode().unwrap();

    c.bench_function("payload_decode_64B", |b| {
        b.iter(|| {
            black_box(Payload::decode(black_box(&encoded)).unwrap());
        })
    });
}

fn bench_frame_encode(c: &mut Criterion) {
    let payload = Payload::Sync(vec![0u8; 1024]);

    c.bench_function("frame_encode_1KB", |b| {
        b.iter(|| {
            black_box(encode_frame(black_box(&payload)).unwrap());
        })
    });
}

fn bench_wire_reader_reassembly(c: &mut Criterion) {
    let frame = encode_frame(&Payload::Sync(vec![0u8; 4096])).unwrap();
    let mid = frame.len() / 2;

    c.bench_function("wire_reader_split_frame_4KB", |b| {
        b.iter(|| {
            let mut reader = WireReader::new();
            black_box(reader.push(black_box(&frame[..mid])).unwrap());
            black_box(reader.push(black_box(&frame[mid..])).unwrap());
        })
    });
}

fn bench_unicast_route(c: &mut Criterion) {
    let mut peers = PeerTable::new();
    let mut ids = Vec::new();
    for i in 0..100 {
        let id = Uuid::new_v4();
        peers.add(Peer::relay(id, "peer", i % 10 == 0));
        ids.push(id);
    }
    let target = ids[99]; // Worst case for the linear scan

    c.bench_function("unicast_route_100_peers", |b| {
        b.iter(|| {
            black_box(routing::unicast(false, black_box(&peers), black_box(target)));
        })
    });
}

fn bench_roster_snapshot(c: &mut Criterion) {
    let mut peers = PeerTable::new();
    for _ in 0..100 {
        peers.add(Peer::relay(Uuid::new_v4(), "peer", false));
    }

    c.bench_function("roster_snapshot_100_peers", |b| {
        b.iter(|| {
            black_box(peers.roster());
        })
    });
}

criterion_group!(
    benches,
    bench_payload_encode,
    bench_payload_decode,
    bench_frame_encode,
    bench_wire_reader_reassembly,
    bench_unicast_route,
    bench_roster_snapshot
);
criterion_main!(benches);
