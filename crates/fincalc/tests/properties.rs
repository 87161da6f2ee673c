// Property-based tests for evaluation, range expansion and recalculation.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::HashMap;
use std::sync::Arc;

use fincalc::prelude::*;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_decimal() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..1_000_000, 0u32..4).prop_map(|(n, scale)| Decimal::new(n, scale))
}

/// Formula bodies over A1:B2, without the leading '='
fn arb_expr() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        r"[0-9]{1,3}(\.[0-9]{1,2})?",
        prop::sample::select(vec!["A1", "A2", "B1", "B2", "b2"]).prop_map(String::from),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (inner.clone(), prop::sample::select(vec!["+", "-", "*", "/", "^", ">", "<>"]), inner.clone())
                .prop_map(|(l, op, r)| format!("({l}{op}{r})")),
            inner.clone().prop_map(|e| format!("-{e}")),
            inner.clone().prop_map(|e| format!("{e}%")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("SUM({a},{b},A1:B2)")),
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(c, t, e)| format!("IF({c},{t},{e})")),
            (inner.clone(), 0i32..4).prop_map(|(e, n)| format!("ROUND({e},{n})")),
            inner.prop_map(|e| format!("MAX(ABS({e}),A1:A2)")),
        ]
    })
}

fn arb_values() -> impl Strategy<Value = HashMap<String, Decimal>> {
    (arb_decimal(), arb_decimal(), arb_decimal(), arb_decimal()).prop_map(|(a1, a2, b1, b2)| {
        HashMap::from([
            ("A1".to_string(), a1),
            ("A2".to_string(), a2),
            ("B1".to_string(), b1),
            ("B2".to_string(), b2),
        ])
    })
}

fn arb_corner() -> impl Strategy<Value = CellReference> {
    (0u32..200, 0u16..30).prop_map(|(row, col)| CellReference::new(row, col))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    /// Same formula and values give the same result, cached or not
    #[test]
    fn prop_evaluate_is_deterministic(body in arb_expr(), values in arb_values()) {
        let formula = format!("={body}");
        let plain = FormulaEngine::new();
        let cached = FormulaEngine::new().with_cache(Arc::new(ParseCache::new()));

        let first = plain.evaluate(&formula, &values);
        prop_assert_eq!(&first, &plain.evaluate(&formula, &values));
        prop_assert_eq!(&first, &cached.evaluate(&formula, &values));
        prop_assert_eq!(&first, &cached.evaluate(&formula, &values));
    }

    /// Generated formulas are always well-formed
    #[test]
    fn prop_generated_formulas_validate(body in arb_expr()) {
        let engine = FormulaEngine::new();
        let validation = engine.validate_formula(&format!("={body}"));
        prop_assert!(validation.is_valid, "{:?}", validation.message);
    }

    /// Expansion ignores corner order and walks rows top to bottom
    #[test]
    fn prop_expand_range_is_normalized(a in arb_corner(), b in arb_corner()) {
        let engine = FormulaEngine::new();
        let forward = engine.expand_range(&format!("{a}:{b}")).unwrap();
        let backward = engine.expand_range(&format!("{b}:{a}")).unwrap();
        prop_assert_eq!(&forward, &backward);

        let rows = (a.row.abs_diff(b.row) + 1) as usize;
        let cols = (a.col.abs_diff(b.col) + 1) as usize;
        prop_assert_eq!(forward.len(), rows * cols);
        prop_assert!(forward.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert_eq!(forward[0], CellReference::new(a.row.min(b.row), a.col.min(b.col)));
    }

    /// Recalculating twice with the same value gives the same delta map
    #[test]
    fn prop_recalculate_is_idempotent(start in arb_decimal(), new_value in arb_decimal(), len in 1usize..20) {
        let mut cells = vec![Cell::value(CellReference::new(0, 0), start)];
        for row in 1..=len as u32 {
            let formula = format!("=A{row}*2+SUM(A1:A{row})");
            cells.push(Cell::formula(CellReference::new(row, 0), formula));
        }

        let engine = FormulaEngine::new();
        let first = engine.recalculate_dependents("A1", new_value, &cells);
        let second = engine.recalculate_dependents("A1", new_value, &cells);
        prop_assert_eq!(&first, &second);

        let order = engine.cells_to_recalculate("A1", &cells).unwrap();
        prop_assert_eq!(order.len(), len);
        prop_assert!(order.windows(2).all(|pair| pair[0].reference < pair[1].reference));
    }
}
