use std::hint::black_box;

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gridcast::{Channel, ListenerParams, MatchType, MessageRouter, Priority};

/// -----------------------------
/// Utils
/// -----------------------------

fn router_with_listeners(count: usize) -> (MessageRouter, Channel) {
    let router = MessageRouter::new();
    let channel = Channel::new("Net.Packet.Inbound").unwrap();
    let root = Channel::new("Net").unwrap();
    for i in 0..count {
        let params = ListenerParams::new()
            .with_match_type(MatchType::Partial)
            .with_priority(Priority((i % 5) as i32 * 25));
        router.register_listener::<Bytes, _>(&root, params, |delivery| {
            black_box(delivery.payload::<Bytes>().map(Bytes::len));
        });
    }
    (router, channel)
}

/// -----------------------------
/// Broadcast
/// -----------------------------

fn bench_broadcast_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_fan_out");
    for count in [0usize, 1, 10, 100, 1000] {
        let (router, channel) = router_with_listeners(count);
        group.throughput(Throughput::Elements(count.max(1) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let mut payload = Bytes::from_static(b"payload");
                black_box(router.broadcast(&channel, &mut payload));
            })
        });
    }
    group.finish();
}

fn bench_broadcast_miss(c: &mut Criterion) {
    let (router, _) = router_with_listeners(100);
    let other = Channel::new("Chat.Say").unwrap();
    c.bench_function("broadcast_100_listeners_no_match", |b| {
        b.iter(|| {
            let mut payload = Bytes::from_static(b"payload");
            black_box(router.broadcast(&other, &mut payload));
        })
    });
}

/// -----------------------------
/// Registration churn
/// -----------------------------

fn bench_register_unregister(c: &mut Criterion) {
    let (router, channel) = router_with_listeners(100);
    c.bench_function("register_unregister_with_100_listeners", |b| {
        b.iter(|| {
            let mut handle = router.register_listener::<Bytes, _>(
                &channel,
                ListenerParams::new().with_priority(Priority::DEFAULT),
                |_| {},
            );
            router.unregister(black_box(&mut handle));
        })
    });
}

fn bench_channel_parse(c: &mut Criterion) {
    c.bench_function("channel_parse_interned", |b| {
        b.iter(|| black_box(Channel::new(black_box("Net.Packet.Inbound")).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_broadcast_fan_out,
    bench_broadcast_miss,
    bench_register_unregister,
    bench_channel_parse
);
criterion_main!(benches);
