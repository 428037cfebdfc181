use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ns_binned::{AxisCollection, BinAxis, BinnedDensity, Convolution, DataRepresentation};
use ns_prob::GaussianKernel;
use std::hint::black_box;

fn make_convolution(n_energy: usize, n_radius: usize) -> Convolution {
    let axes = AxisCollection::from_axes([
        BinAxis::uniform("energy", 0.0, 10.0, n_energy).unwrap(),
        BinAxis::uniform("radius", 0.0, 1.0, n_radius).unwrap(),
    ])
    .unwrap();
    let mut conv = Convolution::new();
    conv.set_axes(&axes);
    conv.set_data_rep(DataRepresentation::new(["energy"]).unwrap());
    conv.set_function(&GaussianKernel::centred(1, 0.2).unwrap());
    conv
}

fn bench_construct(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution_construct");

    for n in [20usize, 50, 100] {
        let mut conv = make_convolution(n, 10);
        // First build pays for the compatibility cache; measure rebuilds only.
        conv.construct().unwrap();
        group.bench_with_input(BenchmarkId::new("rebuild", n), &n, |b, _| {
            b.iter(|| {
                conv.construct().unwrap();
                black_box(conv.pdf_mapping().nnz())
            })
        });
    }

    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("convolution_apply");

    for n in [20usize, 50, 100] {
        let mut conv = make_convolution(n, 10);
        conv.construct().unwrap();
        let contents = (0..n * 10).map(|i| (i % 7) as f64).collect::<Vec<_>>();
        let density =
            BinnedDensity::with_contents(conv.pdf_mapping().axes().clone(), contents).unwrap();
        group.bench_with_input(BenchmarkId::new("apply", n), &n, |b, _| {
            b.iter(|| black_box(conv.apply(black_box(&density)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_construct, bench_apply);
criterion_main!(benches);
