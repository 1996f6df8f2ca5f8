use proptest::prelude::*;
use testlog_analyzer::data::model::{CellValue, DataRecord};
use testlog_analyzer::region::{contains, Point};
use testlog_analyzer::{AnalysisConfig, RecordEvaluator, RegionPolygon, RegionSet, SpecRegistry, WindowType};

fn header() -> Vec<String> {
    ["W_L", "W_dY", "W_u'", "W_v'", "Result"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

proptest! {
    /// Points outside the bounding box are never inside.
    #[test]
    fn outside_bbox_is_outside(u in -10.0f64..10.0, v in -10.0f64..10.0) {
        let poly = RegionPolygon::default_white();
        let (lo_u, lo_v, hi_u, hi_v) = poly.bounding_box().unwrap();
        if u < lo_u || u > hi_u || v < lo_v || v > hi_v {
            prop_assert!(!poly.contains(Point::new(u, v)));
        }
    }

    /// Containment is a pure function of its inputs.
    #[test]
    fn containment_is_stable(u in -0.5f64..1.5, v in -0.5f64..1.5) {
        let square = [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)];
        let first = contains(Point::new(u, v), &square);
        prop_assert_eq!(contains(Point::new(u, v), &square), first);
        if u > 0.0 && u < 1.0 && v > 0.0 && v < 1.0 {
            prop_assert!(first);
        }
    }

    /// Evaluating a record twice yields identical results.
    #[test]
    fn evaluation_is_deterministic(
        l in 0.0f64..600.0,
        dy in -5.0f64..5.0,
        u in 0.15f64..0.25,
        v in 0.40f64..0.50,
        failed in any::<bool>(),
    ) {
        let cols = header();
        let mut specs = SpecRegistry::new();
        specs.set(WindowType::White, "L", 300.0, f64::INFINITY).unwrap();
        specs.set(WindowType::White, "dY", -2.0, 2.0).unwrap();
        let regions = RegionSet::new();
        let config = AnalysisConfig::default();
        let evaluator = RecordEvaluator::new(&cols, &specs, &regions, &config);
        let record = DataRecord::new(0, vec![
            CellValue::Float(l),
            CellValue::Float(dy),
            CellValue::Float(u),
            CellValue::Float(v),
            CellValue::String(if failed { "FAIL" } else { "PASS" }.to_string()),
        ]);
        let a = evaluator.evaluate(&record).unwrap();
        let b = evaluator.evaluate(&record).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.pass, a.failed_descriptions.is_empty());
        if failed {
            prop_assert!(!a.pass);
        }
    }
}
