use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use rand::{distributions::Alphanumeric, rngs::StdRng, Rng, SeedableRng};

use execbridge::connector::RowCursor;
use execbridge::relay::relay_rows;
use execbridge::sink::{JsonLinesSink, ResultSink, TableSink};
use execbridge::validate::validate;
use execbridge::{BridgeResult, Column, ExecutionRequest, Row, Value};

struct VecCursor {
    columns: Vec<Column>,
    rows: std::vec::IntoIter<Row>,
}

impl RowCursor for VecCursor {
    fn columns(&self) -> &[Column] { &self.columns }
    fn next_row(&mut self) -> BridgeResult<Option<Row>> { Ok(self.rows.next()) }
}

#[derive(Default)]
struct CountingSink {
    rows: u64,
    cells: u64,
}

impl ResultSink for CountingSink {
    fn start(&mut self, _columns: &[Column]) -> BridgeResult<()> { Ok(()) }

    fn row(&mut self, row: &[Value]) -> BridgeResult<()> {
        self.rows += 1;
        self.cells += row.len() as u64;
        Ok(())
    }
}

fn word(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

fn gen_rows(n: usize, seed: u64) -> (Vec<Column>, Vec<Row>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let columns = vec![
        Column::new("id", "int8"),
        Column::new("name", "text"),
        Column::new("score", "float8"),
        Column::new("active", "bool"),
    ];
    let rows = (0..n)
        .map(|i| {
            let name_len = rng.gen_range(4..24);
            vec![
                Value::Int(i as i64),
                Value::Text(word(&mut rng, name_len)),
                Value::Float(rng.gen::<f64>() * 1000.0),
                if rng.gen_bool(0.1) { Value::Null } else { Value::Bool(rng.gen()) },
            ]
        })
        .collect();
    (columns, rows)
}

fn gen_requests(n: usize, seed: u64) -> Vec<ExecutionRequest> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let server_len = rng.gen_range(1..40);
            let mut server = word(&mut rng, server_len);
            // Roughly one in eight requests carries an injection attempt.
            if rng.gen_ratio(1, 8) { server.push_str(";Trusted_Connection=no"); }
            ExecutionRequest::new(word(&mut rng, 12), server, word(&mut rng, 10), "EXEC dbo.report @id = 1")
        })
        .collect()
}

fn bench_validate(c: &mut Criterion) {
    let requests = gen_requests(10_000, 0xC0FF_EE00);
    let mut group = c.benchmark_group("validate");
    group.throughput(Throughput::Elements(requests.len() as u64));
    group.bench_function("requests", |b| {
        b.iter(|| {
            let accepted = requests.iter().filter(|r| validate(r).is_ok()).count();
            criterion::black_box(accepted);
        });
    });
    group.finish();
}

fn bench_relay(c: &mut Criterion) {
    let ns = [1_000usize, 100_000usize];
    let mut group = c.benchmark_group("relay");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(20);

    for &n in &ns {
        let (columns, rows) = gen_rows(n, 0xDEAD_BEEF);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("counting", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let mut cursor = VecCursor { columns: columns.clone(), rows: rows.clone().into_iter() };
                let mut sink = CountingSink::default();
                let sent = relay_rows(&mut cursor, &mut sink).unwrap_or(0);
                criterion::black_box((sent, sink.rows, sink.cells));
            });
        });

        group.bench_with_input(BenchmarkId::new("json_lines", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let mut cursor = VecCursor { columns: columns.clone(), rows: rows.clone().into_iter() };
                let mut sink = JsonLinesSink::new(std::io::sink());
                criterion::black_box(relay_rows(&mut cursor, &mut sink).unwrap_or(0));
            });
        });

        group.bench_with_input(BenchmarkId::new("table", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let mut cursor = VecCursor { columns: columns.clone(), rows: rows.clone().into_iter() };
                let mut sink = TableSink::with_max_width(std::io::sink(), 120);
                criterion::black_box(relay_rows(&mut cursor, &mut sink).unwrap_or(0));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_validate, bench_relay);
criterion_main!(benches);
