use criterion::{black_box, criterion_group, criterion_main, Criterion};

use malsim_core::transmission::emergence::{Emergence, FixedEmergence};
use malsim_core::transmission::mosq::MosqTransmission;

fn bench_daily_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("mosq_transmission");
    for &strata in &[1usize, 4] {
        group.bench_function(format!("update_{}s", strata), |b| {
            let mut trans = MosqTransmission::new(3, 11, strata, 1e-9);
            let mut emergence = Emergence::Fixed(FixedEmergence::from_rate(vec![100.0; 365]));
            let p_dif = vec![0.01; strata];
            let mut d = 0;
            b.iter(|| {
                d += 1;
                black_box(trans.update(d, 0.6, 0.2, &p_dif, 0.2, false, &mut emergence));
            });
        });
    }
    group.finish();
}

fn bench_year(c: &mut Criterion) {
    c.bench_function("mosq_transmission/year", |b| {
        b.iter(|| {
            let mut trans = MosqTransmission::new(3, 11, 1, 1e-9);
            let mut emergence = Emergence::Fixed(FixedEmergence::from_rate(vec![100.0; 365]));
            for d in 0..365 {
                trans.update(d, 0.6, 0.2, &[0.01], 0.2, false, &mut emergence);
            }
            black_box(trans.last_n_v0())
        });
    });
}

criterion_group!(benches, bench_daily_update, bench_year);
criterion_main!(benches);
