use criterion::{criterion_group, criterion_main, Criterion};
use priter_map::{ActivationLogic, InputPkvBuffer};

#[derive(Clone)]
struct FanOutLogic;

impl ActivationLogic for FanOutLogic {
    type Key = u32;
    type IState = f64;
    type Delta = f64;
    type Static = Vec<u32>;

    fn parse_static(&self, line: &str) -> Option<(u32, Vec<u32>)> {
        let mut fields = line.split('\t');
        let key: u32 = fields.next()?.parse().ok()?;
        let outlinks: Vec<u32> = fields.filter_map(|f| f.parse().ok()).collect();
        Some((key, outlinks))
    }

    fn activate(&self, _key: &u32, value: &f64, static_data: &Vec<u32>, emit: &mut dyn FnMut(u32, f64)) {
        for &outlink in static_data {
            emit(outlink, *value / static_data.len().max(1) as f64);
        }
    }

    fn zero_delta(&self) -> f64 {
        0.0
    }
}

fn drain_buffer_of_size(c: &mut Criterion) {
    c.bench_function("InputPkvBuffer drain 10k records", |b| {
        b.iter(|| {
            let buf: InputPkvBuffer<u32, f64> = InputPkvBuffer::new();
            let batch: Vec<(u32, f64)> = (0..10_000u32).map(|k| (k, k as f64)).collect();
            buf.read(0, batch);
            let mut total = 0.0;
            while let Some((_, v)) = buf.next() {
                total += v;
            }
            assert!(total > 0.0);
        })
    });
}

criterion_group!(benches, drain_buffer_of_size);
criterion_main!(benches);
