use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use statebus_events::{EventBus, Handlers, Subscriber};

#[derive(Debug, Clone, Copy)]
struct Tick(i64);

/// Receiver that only accumulates, so the benchmark measures dispatch overhead.
#[derive(Default)]
struct Accumulator {
    total: AtomicI64,
}

impl Subscriber for Accumulator {
    fn describe(handlers: &mut Handlers<Self>) {
        handlers.subscribe(|a: &Accumulator, tick: &Tick, _bus: &EventBus| {
            a.total.fetch_add(tick.0, Ordering::Relaxed);
            Ok(())
        });
    }
}

struct Clock;

impl Subscriber for Clock {
    fn describe(handlers: &mut Handlers<Self>) {
        handlers.produce(|_: &Clock| Ok(Some(Tick(1))));
    }
}

fn bench_post_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_fan_out");

    for receivers in [1_usize, 8, 64] {
        let bus = EventBus::new();
        for _ in 0..receivers {
            bus.register(Arc::new(Accumulator::default())).unwrap();
        }

        group.throughput(Throughput::Elements(receivers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(receivers), &receivers, |b, _| {
            b.iter(|| bus.post(black_box(Tick(1))).unwrap());
        });
    }

    group.finish();
}

fn bench_register_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_churn");

    group.bench_function("receiver_with_producer", |b| {
        let bus = EventBus::new();
        bus.register(Arc::new(Clock)).unwrap();
        let receiver = Arc::new(Accumulator::default());

        b.iter(|| {
            bus.register(receiver.clone()).unwrap();
            bus.unregister(&receiver).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_post_fan_out, bench_register_churn);
criterion_main!(benches);
