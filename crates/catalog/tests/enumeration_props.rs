use clipmix_catalog::{combination_count, enumerate, Catalog, CategorySlot, Clip};
use proptest::prelude::*;

fn slot(prefix: &str, n: usize) -> CategorySlot {
    CategorySlot::new(
        (0..n)
            .map(|i| Clip::new(format!("/clips/{prefix}{i}.mp4"), format!("{prefix}{i}")))
            .collect(),
    )
}

fn catalog(l: usize, m: usize, b: usize) -> Catalog {
    Catalog {
        lead: slot("l", l),
        middle: slot("m", m),
        body: slot("b", b),
        background: None,
    }
}

proptest! {
    #[test]
    fn combination_count_is_product_of_non_empty_slots(l in 0usize..5, m in 0usize..5, b in 0usize..5) {
        let cat = catalog(l, m, b);
        let combos = enumerate(&cat);
        let expected = if l + m + b == 0 { 0 } else { l.max(1) * m.max(1) * b.max(1) };
        prop_assert_eq!(combos.len(), expected);
        prop_assert_eq!(combination_count(&cat), expected);
    }

    #[test]
    fn labels_follow_lead_middle_body_nesting(l in 1usize..4, m in 0usize..4, b in 1usize..4) {
        let cat = catalog(l, m, b);
        let combos = enumerate(&cat);
        let mut idx = 0;
        for li in 0..l {
            for mi in 0..m.max(1) {
                for bi in 0..b {
                    let middle = if m == 0 { "lead-skip".to_string() } else { format!("m{mi}") };
                    let expected = format!("l{li}_{middle}_b{bi}");
                    prop_assert_eq!(combos[idx].label(), expected.as_str());
                    idx += 1;
                }
            }
        }
    }

    #[test]
    fn every_combination_has_at_least_one_clip(l in 0usize..4, m in 0usize..4, b in 0usize..4) {
        let cat = catalog(l, m, b);
        for combo in enumerate(&cat) {
            prop_assert!(!combo.clips().is_empty());
            prop_assert!(combo.clips().len() <= 3);
        }
    }
}
