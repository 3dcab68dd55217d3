//! Tests for group pairing: equal and unequal cardinality matching,
//! the symmetry of `pair_to`, and rejection of unrelated groups.

use mirador_core::grouping::{recog_repetition_nontext, recog_repetition_text};
use mirador_core::pairing::pair_groups;
use mirador_core::pipeline::IdAllocator;
use mirador_core::table::{ElementClass, ElementId, ElementTable};
use mirador_core::utils::Rect;
use mirador_core::LayoutParams;

/// An icon column and a text column, three rows each.
fn two_column_screen() -> (ElementTable, Vec<ElementId>, Vec<ElementId>) {
    let mut table = ElementTable::new(400, 300);
    let icons: Vec<ElementId> = (0..3)
        .map(|k| {
            let r = 20.0 + 60.0 * k as f64;
            table.push(ElementClass::Compo, Rect::new(20.0, r, 50.0, r + 30.0))
        })
        .collect();
    let texts: Vec<ElementId> = (0..3)
        .map(|k| {
            let r = 25.0 + 60.0 * k as f64;
            table.push_text(Rect::new(70.0, r, 200.0, r + 20.0), "entry")
        })
        .collect();
    (table, icons, texts)
}

fn group_and_pair(table: &mut ElementTable) -> Vec<(ElementId, ElementId)> {
    let params = LayoutParams::default();
    let mut alloc = IdAllocator::default();
    recog_repetition_nontext(table, &params, &mut alloc);
    recog_repetition_text(table, &params, &mut alloc);
    pair_groups(table, &params, &mut alloc).unwrap()
}

#[test]
fn test_parallel_columns_pair_row_by_row() {
    let (mut table, icons, texts) = two_column_screen();
    let edges = group_and_pair(&mut table);

    // One pair id across both columns.
    let pairs = table.pairs();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].1.len(), 6);

    // Each icon matched the text on its own row.
    assert_eq!(edges.len(), 3);
    for k in 0..3 {
        assert!(
            edges.contains(&(icons[k], texts[k])) || edges.contains(&(texts[k], icons[k])),
            "row {k} not matched"
        );
    }
}

#[test]
fn test_pair_to_is_symmetric() {
    let (mut table, _, _) = two_column_screen();
    group_and_pair(&mut table);

    for e in table.iter() {
        if let Some(partner) = e.pair_to {
            assert_eq!(
                table.get(partner).pair_to,
                Some(e.id),
                "element {} points at {} but not back",
                e.id,
                partner
            );
        }
    }
}

#[test]
fn test_pairing_is_idempotent() {
    // Running the engine again over an already-paired table must
    // reproduce the same pair partition (fresh ids, same member sets)
    // and the same match edges.
    let (mut table, _, _) = two_column_screen();
    let params = LayoutParams::default();
    let mut alloc = IdAllocator::default();
    recog_repetition_nontext(&mut table, &params, &mut alloc);
    recog_repetition_text(&mut table, &params, &mut alloc);

    fn partition(table: &ElementTable) -> Vec<Vec<ElementId>> {
        let mut sets: Vec<Vec<ElementId>> = table
            .pairs()
            .into_iter()
            .map(|(_, mut members)| {
                members.sort();
                members
            })
            .collect();
        sets.sort();
        sets
    }
    fn normalize(mut edges: Vec<(ElementId, ElementId)>) -> Vec<(ElementId, ElementId)> {
        for e in &mut edges {
            if e.0 > e.1 {
                *e = (e.1, e.0);
            }
        }
        edges.sort();
        edges
    }

    let first_edges = pair_groups(&mut table, &params, &mut alloc).unwrap();
    let first = partition(&table);
    assert!(!first.is_empty());

    let second_edges = pair_groups(&mut table, &params, &mut alloc).unwrap();
    assert_eq!(partition(&table), first);
    assert_eq!(normalize(second_edges), normalize(first_edges));
}

#[test]
fn test_unequal_cardinality_matches_nearest_band() {
    // Icon column of three, text column of two: the texts sit on the
    // second and third rows and must match those icons, not the first.
    let mut table = ElementTable::new(400, 300);
    let icons: Vec<ElementId> = (0..3)
        .map(|k| {
            let r = 20.0 + 60.0 * k as f64;
            table.push(ElementClass::Compo, Rect::new(20.0, r, 50.0, r + 30.0))
        })
        .collect();
    let t1 = table.push_text(Rect::new(70.0, 85.0, 200.0, 105.0), "second");
    let t2 = table.push_text(Rect::new(70.0, 145.0, 200.0, 165.0), "third");
    let edges = group_and_pair(&mut table);

    assert_eq!(edges.len(), 2);
    assert!(edges.contains(&(icons[1], t1)) || edges.contains(&(t1, icons[1])));
    assert!(edges.contains(&(icons[2], t2)) || edges.contains(&(t2, icons[2])));
    assert_eq!(table.get(icons[0]).pair_to, None);
}

#[test]
fn test_cardinality_gap_beyond_ratio_rejects() {
    // Seven icons against two texts: past the 3x ratio, never paired.
    let mut table = ElementTable::new(400, 600);
    for k in 0..7 {
        let r = 20.0 + 60.0 * k as f64;
        table.push(ElementClass::Compo, Rect::new(20.0, r, 50.0, r + 30.0));
    }
    table.push_text(Rect::new(70.0, 25.0, 200.0, 45.0), "one");
    table.push_text(Rect::new(70.0, 85.0, 200.0, 105.0), "two");
    let edges = group_and_pair(&mut table);

    assert!(edges.is_empty());
    assert!(table.pairs().is_empty());
}

#[test]
fn test_inconsistent_angles_reject_the_pair() {
    // A second column with evenly spaced rows of its own, but whose
    // spacing diverges from the icons': every connecting line has a
    // different slope, so no consistent fraction exists.
    let mut table = ElementTable::new(500, 400);
    for k in 0..3 {
        let r = 20.0 + 80.0 * k as f64;
        table.push(ElementClass::Compo, Rect::new(20.0, r, 50.0, r + 30.0));
    }
    for k in 0..3 {
        let r = 20.0 + 120.0 * k as f64;
        table.push_text(Rect::new(70.0, r, 200.0, r + 20.0), "entry");
    }
    let edges = group_and_pair(&mut table);

    assert!(table.pairs().is_empty(), "unexpected pairing: {edges:?}");
}

#[test]
fn test_repeated_containers_pair_by_connection_graph() {
    let mut table = ElementTable::new(300, 300);
    let card1 = table.push(ElementClass::Block, Rect::new(10.0, 10.0, 110.0, 90.0));
    let i1 = table.push(ElementClass::Compo, Rect::new(20.0, 20.0, 40.0, 40.0));
    let t1 = table.push_text(Rect::new(20.0, 50.0, 100.0, 70.0), "one");
    table.set_container(card1, &[i1, t1]);

    let card2 = table.push(ElementClass::Block, Rect::new(10.0, 100.0, 110.0, 180.0));
    let i2 = table.push(ElementClass::Compo, Rect::new(20.0, 110.0, 40.0, 130.0));
    let t2 = table.push_text(Rect::new(20.0, 140.0, 100.0, 160.0), "two");
    table.set_container(card2, &[i2, t2]);

    let edges = group_and_pair(&mut table);

    assert_eq!(edges, vec![(card1, card2)]);
    let pairs = table.pairs();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].1, vec![card1, card2]);
    // Children ride along inside their container, unpaired.
    assert_eq!(table.get(i1).group_pair, None);
    assert_eq!(table.get(t1).group_pair, None);
}
