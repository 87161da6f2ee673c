use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fincalc::{Cell, CellReference, FormulaEngine, ParseCache};
use rust_decimal::Decimal;
use std::sync::Arc;

/// A1 feeds A2 feeds A3 ... each cell also summing a short window above it
fn chain(len: u32) -> Vec<Cell> {
    let mut cells = vec![Cell::value(CellReference::new(0, 0), Decimal::ONE)];
    for row in 1..len {
        let above = row;
        let window = row.saturating_sub(4).max(1);
        let formula = format!("=A{above}+SUM(A{window}:A{above})*0.01");
        cells.push(Cell::formula(CellReference::new(row, 0), formula));
    }
    cells
}

fn bench_recalculate(c: &mut Criterion) {
    let mut group = c.benchmark_group("RecalculateDependents");

    for len in [100u32, 1_000, 5_000] {
        let cells = chain(len);

        group.bench_with_input(BenchmarkId::new("Uncached", len), &cells, |b, cells| {
            let engine = FormulaEngine::new();
            b.iter(|| {
                engine
                    .recalculate_dependents("A1", black_box(Decimal::TEN), cells)
                    .unwrap()
            })
        });

        // Warm cache: every formula is parsed once before timing starts
        group.bench_with_input(BenchmarkId::new("Cached", len), &cells, |b, cells| {
            let engine = FormulaEngine::new().with_cache(Arc::new(ParseCache::new()));
            engine.recalculate_dependents("A1", Decimal::ONE, cells).unwrap();
            b.iter(|| {
                engine
                    .recalculate_dependents("A1", black_box(Decimal::TEN), cells)
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_recalculate);
criterion_main!(benches);
