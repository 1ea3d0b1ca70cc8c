//! Property tests for layout, grouping and key stability.

use proptest::prelude::*;
use std::collections::BTreeMap;

use stylepalette_core::{
    build_table, compare, extract_colors, extract_structure, layout, slot_to_coords, CanonicalKey, Color,
    LayoutLimits, NodeKind, RuleNode, StyleDocument,
};

fn style(lines: &[(i64, u32, i64)]) -> StyleDocument {
    let mut element = RuleNode::new(NodeKind::Element).with_scale(13);
    for &(priority, color, width) in lines {
        element = element.with_item(
            "lines",
            RuleNode::new(NodeKind::Line)
                .with_priority(priority)
                .with_field("color", color)
                .with_field("width", width),
        );
    }
    let root = RuleNode::new(NodeKind::Container)
        .with_item("cont", RuleNode::new(NodeKind::Class).named("road").with_item("element", element));
    StyleDocument::new("drules_proto.json", root)
}

fn distinct_priorities(len: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(-1000i64..1000, len).prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn layout_is_smallest_power_of_two(slots in 0usize..200_000) {
        let limits = LayoutLimits { min_half: 1, max_side: 4096 };
        let side = layout(slots, limits).unwrap();
        let half = side / 2;
        prop_assert!(half.is_power_of_two());
        prop_assert!(half * half >= slots);
        if half > 1 {
            prop_assert!((half / 2) * (half / 2) < slots);
        }
        if slots > 0 {
            let (x, y) = slot_to_coords(slots - 1, side);
            prop_assert!((x as usize) < side && (y as usize) < side);
        }
    }

    #[test]
    fn same_slot_iff_same_signature(
        docs in prop::collection::vec(prop::collection::btree_map(0u8..12, 0u32..3, 0..12), 1..4)
    ) {
        let extractions: Vec<BTreeMap<CanonicalKey, Color>> = docs
            .iter()
            .map(|d| d.iter().map(|(k, c)| (CanonicalKey::from_raw(&format!("k{}", k)), Color(*c))).collect())
            .collect();
        let table = build_table(&extractions);

        let keys: Vec<CanonicalKey> = (0u8..12)
            .map(|k| CanonicalKey::from_raw(&format!("k{}", k)))
            .filter(|k| extractions.iter().any(|e| e.contains_key(k)))
            .collect();
        prop_assert_eq!(table.key_count(), keys.len());

        let signature = |k: &CanonicalKey| -> Vec<Option<Color>> {
            extractions.iter().map(|e| e.get(k).copied()).collect()
        };
        for a in &keys {
            let slot = table.slot_of(a).unwrap();
            prop_assert_eq!(table.signature(slot), Some(&signature(a)));
            for b in &keys {
                prop_assert_eq!(table.slot_of(a) == table.slot_of(b), signature(a) == signature(b));
            }
        }
    }

    #[test]
    fn keys_survive_reordering_and_renumbering(
        priorities in (1usize..6).prop_flat_map(distinct_priorities),
        shift in -500i64..500,
        scale in 1i64..4,
    ) {
        let lines: Vec<(i64, u32, i64)> = priorities
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i as u32, i as i64))
            .collect();
        let mut moved: Vec<(i64, u32, i64)> = lines.iter().map(|&(p, c, w)| (p * scale + shift, c, w)).collect();
        moved.reverse();

        let a = extract_colors(&style(&lines), 0).unwrap();
        let b = extract_colors(&style(&moved), 0).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn tied_priorities_keep_key_set_under_permutation(
        (priorities, order) in prop::collection::vec(0i64..3, 1..8).prop_flat_map(|p| {
            let n = p.len();
            (Just(p), Just((0..n).collect::<Vec<usize>>()).prop_shuffle())
        }),
    ) {
        let lines: Vec<(i64, u32, i64)> = priorities.iter().enumerate().map(|(i, &p)| (p, i as u32, 1)).collect();
        let permuted: Vec<(i64, u32, i64)> = order.iter().map(|&i| lines[i]).collect();

        let a = extract_colors(&style(&lines), 0).unwrap();
        let b = extract_colors(&style(&permuted), 0).unwrap();
        let keys_a: Vec<&CanonicalKey> = a.keys().collect();
        let keys_b: Vec<&CanonicalKey> = b.keys().collect();
        prop_assert_eq!(&keys_a, &keys_b);
        prop_assert_eq!(keys_a.len(), lines.len());

        let mut ranks: Vec<usize> = keys_a
            .iter()
            .map(|k| {
                let (_, tail) = k.as_str().split_once("lines~").unwrap();
                tail.split('/').next().unwrap().parse().unwrap()
            })
            .collect();
        ranks.sort_unstable();
        prop_assert_eq!(ranks, (0..lines.len()).collect::<Vec<_>>());
    }

    #[test]
    fn comparison_is_symmetric(
        left in prop::collection::vec(0i64..3, 1..5),
        right in prop::collection::vec(0i64..3, 1..5),
    ) {
        let doc = |widths: &[i64]| {
            let lines: Vec<(i64, u32, i64)> = widths.iter().enumerate().map(|(i, &w)| (i as i64, 7, w)).collect();
            extract_structure(&style(&lines), 0).unwrap()
        };
        let (a, b) = (doc(&left), doc(&right));
        prop_assert_eq!(compare(&a, &b), compare(&b, &a));
        prop_assert!(compare(&a, &a).is_empty());
        prop_assert_eq!(compare(&a, &b).is_empty(), left == right);
    }
}
