use candle_core::{Device, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use wick_nn::{Linear, LinearConfig, Relu, Stack, Unit};

fn bench_stack(c: &mut Criterion) {
    let device = Device::Cpu;
    let batch = 32usize;
    let widths = &[(256usize, 256usize), (512, 1024), (1024, 1024)];

    let mut group = c.benchmark_group("stack/mlp");
    for &(hidden, inner) in widths {
        let stack = Stack::new(vec![
            Unit::from(Linear::new(LinearConfig::new(hidden, inner), &device).expect("linear")),
            Unit::from(Relu::default()),
            Unit::from(Linear::new(LinearConfig::new(inner, hidden), &device).expect("linear")),
        ]);
        let input = Tensor::randn(0f32, 1.0, (batch, hidden), &device).expect("input");
        let elements = (batch * hidden * inner * 2) as u64;
        group.throughput(Throughput::Elements(elements));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", hidden, inner)),
            &(stack, input),
            |b, (stack, input)| {
                b.iter(|| {
                    let out = stack.forward_t(black_box(input), false).expect("forward");
                    black_box(out);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_stack);
criterion_main!(benches);
