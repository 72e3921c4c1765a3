use criterion::{black_box, Criterion};
use fusedmaths::fusedlibm::{parse, parse_in, Locale};

use bench_util::configure_criterion;

const INPUTS: &[&str] = &[
    "0",
    "1.5",
    "-3.141592653589793",
    "6.02214076e23",
    "2.2250738585072014e-308",
    "123456789.123456789",
    "9999999999999999999999999999.5e-10",
];

const GROUPED: &[&str] = &[
    "1,234",
    "123,456,789.25",
    "1,234.5e2",
    "999,999,999,999.125",
];

fn bench_strtod(c: &mut Criterion) {
    let mut group = c.benchmark_group("strtod/plain");
    group.bench_function("fusedlibm", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for s in INPUTS {
                acc += parse(black_box(s)).0;
            }
            black_box(acc)
        })
    });
    group.bench_function("core", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for s in INPUTS {
                acc += black_box(s).parse::<f64>().unwrap_or(0.0);
            }
            black_box(acc)
        })
    });
    group.finish();

    let locale = Locale::EN_US;
    let mut group = c.benchmark_group("strtod/grouped");
    group.bench_function("fusedlibm", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for s in GROUPED {
                acc += parse_in(black_box(s), &locale).0;
            }
            black_box(acc)
        })
    });
    group.finish();
}

fn main() {
    let mut c = configure_criterion();
    bench_strtod(&mut c);
    c.final_summary();
}
