use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fusion_weather::{GridResponseParser, SentinelBand};

const NX: usize = 149;
const NY: usize = 253;

fn dense_dump(with_header: bool) -> String {
    let mut body = String::from("# gridded observation dump\n");
    if with_header {
        body.push_str(&format!("{} {}\n", NX, NY));
    }
    for row in 0..NY {
        let line: Vec<String> = (0..NX)
            .map(|col| match (row + col) % 17 {
                0 => "-999.0".to_string(),
                v => format!("{:.1}", v as f64 * 0.7 - 3.0),
            })
            .collect();
        body.push_str(&line.join(","));
        body.push('\n');
    }
    body
}

fn bench_parse(c: &mut Criterion) {
    let parser = GridResponseParser::new(NX * NY, SentinelBand::default());
    let plain = dense_dump(false);
    let with_header = dense_dump(true);
    c.bench_function("parse_dense_grid", |b| b.iter(|| parser.parse(black_box(&plain))));
    c.bench_function("parse_grid_with_dimension_header", |b| {
        b.iter(|| parser.parse(black_box(&with_header)))
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
