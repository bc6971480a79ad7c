use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgschema::{Creatable, Record, Selectable, Table, TypeRegistry};

/// A table with `n` integer columns `col0..`, the first one the primary key.
fn wide_table(registry: &TypeRegistry, n: usize) -> Table {
    let mut builder = Table::builder(registry, "bench");
    for i in 0..n {
        let column = if i == 0 {
            pgschema::Column::new().primary_key()
        } else {
            pgschema::Column::new()
        };
        builder = builder.column::<i64>(&format!("col{i}"), column);
    }
    match builder.build() {
        Ok(table) => table,
        Err(e) => panic!("failed to build bench table: {e}"),
    }
}

/// Filters `col0 = 0 AND col1__gt = 1 ...` alternating `or_` every third key.
fn filters(n: usize) -> Record {
    let mut record = Record::new();
    for i in 0..n {
        let key = match i {
            0 => "col0".to_string(),
            i if i % 3 == 0 => format!("or_col{i}__ge"),
            i => format!("col{i}__gt"),
        };
        record.insert(key, i as i64);
    }
    record
}

fn bench_where_clause(c: &mut Criterion) {
    let registry = TypeRegistry::with_defaults();
    let mut group = c.benchmark_group("query_builder/where_clause");

    for n in [1, 5, 10, 50] {
        let table = wide_table(&registry, n);
        let filters = filters(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &filters, |b, filters| {
            b.iter(|| black_box(table.build_where_clause(filters, 1)));
        });
    }

    group.finish();
}

fn bench_query_create(c: &mut Criterion) {
    let registry = TypeRegistry::with_defaults();
    let mut group = c.benchmark_group("query_builder/query_create");

    for n in [5, 20, 100] {
        let table = wide_table(&registry, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &table, |b, table| {
            b.iter(|| black_box(table.query_create(true)));
        });
    }

    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let registry = TypeRegistry::with_defaults();
    let left = wide_table(&registry, 10);
    let right = wide_table(&registry, 10);

    c.bench_function("query_builder/inner_join", |b| {
        b.iter(|| black_box(left.inner_join(&right, ("col0", "col0"))));
    });
}

criterion_group!(benches, bench_where_clause, bench_query_create, bench_join);
criterion_main!(benches);
