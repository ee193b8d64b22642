use energymeter::error::MeterError;
use energymeter::planner::{ChunkPlanner, ReadChunk};
use energymeter::register_map::{DeviceDescriptor, RegisterField, ValueKind};
use proptest::prelude::*;

const KINDS: [ValueKind; 9] = [
    ValueKind::UInt16,
    ValueKind::Int16,
    ValueKind::UInt32,
    ValueKind::Int32,
    ValueKind::Float32,
    ValueKind::UInt64,
    ValueKind::Int64,
    ValueKind::Float64,
    ValueKind::String,
];

fn device(fields: Vec<RegisterField>) -> DeviceDescriptor {
    DeviceDescriptor::new("meter", fields).unwrap()
}

/// Irregular layout with gaps, mixed widths and non-sorted declaration
fn scattered() -> DeviceDescriptor {
    device(vec![
        RegisterField::new("energy", 400, ValueKind::Float64),
        RegisterField::new("v1", 0, ValueKind::Float32),
        RegisterField::new("v2", 2, ValueKind::Float32),
        RegisterField::new("pf", 7, ValueKind::Int16),
        RegisterField::new("hours", 95, ValueKind::UInt32),
        RegisterField::new("freq", 97, ValueKind::UInt16),
        RegisterField::new("counter", 150, ValueKind::UInt64),
        RegisterField::new("temp", 154, ValueKind::Int16),
        RegisterField::string("model", 300, 4),
        RegisterField::new("export", 404, ValueKind::Float64),
    ])
}

fn assert_plan_invariants(d: &DeviceDescriptor, max: u16) {
    let plan = ChunkPlanner::new(max).plan(d).unwrap();
    for chunk in plan.chunks() {
        assert!(chunk.count >= 1);
        assert!(chunk.count <= max, "chunk {:?} exceeds {}", chunk, max);
    }
    for (i, field) in d.fields().iter().enumerate() {
        let slot = plan.slot(i).unwrap();
        let chunk = plan.chunks()[slot.chunk];
        // the field lies entirely inside its chunk
        assert_eq!(
            u32::from(chunk.start) + u32::from(slot.offset),
            u32::from(field.address)
        );
        assert!(field.end_address() <= chunk.end(), "field {} split", field.name);
    }
    // chunks ascend and never overlap
    for pair in plan.chunks().windows(2) {
        assert!(pair[0].end() <= u32::from(pair[1].start));
    }
}

#[test]
fn two_adjacent_words_make_one_chunk() {
    let d = device(vec![
        RegisterField::new("a", 0, ValueKind::UInt16),
        RegisterField::new("b", 1, ValueKind::UInt16),
    ]);
    let plan = ChunkPlanner::new(100).plan(&d).unwrap();
    assert_eq!(plan.chunks(), &[ReadChunk { start: 0, count: 2 }]);
}

#[test]
fn oversized_field_is_chunk_too_large() {
    let d = device(vec![
        RegisterField::new("voltage", 0, ValueKind::Float32),
        RegisterField::string("label", 10, 150),
    ]);
    let err = ChunkPlanner::new(100).plan(&d).unwrap_err();
    match err {
        MeterError::ChunkTooLarge { field, words, max } => {
            assert_eq!(field, "label");
            assert_eq!(words, 150);
            assert_eq!(max, 100);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn numeric_field_wider_than_bound_is_chunk_too_large() {
    let d = device(vec![RegisterField::new("energy", 0, ValueKind::Float64)]);
    let err = ChunkPlanner::new(3).plan(&d).unwrap_err();
    assert!(matches!(
        err,
        MeterError::ChunkTooLarge {
            words: 4,
            max: 3,
            ..
        }
    ));
}

#[test]
fn invariants_hold_across_bounds() {
    let d = scattered();
    for max in [4u16, 5, 7, 10, 16, 50, 100, 125] {
        assert_plan_invariants(&d, max);
    }
}

#[test]
fn planning_is_deterministic() {
    let d = scattered();
    let planner = ChunkPlanner::new(20);
    let first = planner.plan(&d).unwrap();
    for _ in 0..10 {
        assert_eq!(planner.plan(&d).unwrap(), first);
    }
    let rebuilt = scattered();
    assert_eq!(planner.plan(&rebuilt).unwrap(), first);
}

#[test]
fn larger_bound_never_needs_more_requests() {
    let d = scattered();
    let mut previous = usize::MAX;
    for max in [4u16, 8, 16, 32, 64, 125] {
        let n = ChunkPlanner::new(max).plan(&d).unwrap().chunks().len();
        assert!(n <= previous);
        previous = n;
    }
}

#[test]
fn bridged_gaps_stay_within_bound() {
    let d = scattered();
    let plan = ChunkPlanner::new(100).plan(&d).unwrap();
    assert_eq!(
        plan.chunks(),
        &[
            ReadChunk { start: 0, count: 98 },
            ReadChunk { start: 150, count: 5 },
            ReadChunk { start: 300, count: 4 },
            ReadChunk { start: 400, count: 8 },
        ]
    );
}

/// Non-overlapping fields with random gaps, kinds and text widths
fn layout() -> impl Strategy<Value = Vec<RegisterField>> {
    prop::collection::vec((0u16..40, 0..KINDS.len(), 1u16..20), 1..30).prop_map(|specs| {
        let mut next = 0u16;
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (gap, kind, width))| {
                let name = format!("f{i}");
                let field = match KINDS[kind] {
                    ValueKind::String => RegisterField::string(name, next + gap, width),
                    kind => RegisterField::new(name, next + gap, kind),
                };
                next = field.end_address() as u16;
                field
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn random_layouts_keep_plan_invariants(
        mut fields in layout(),
        extra in 0u16..100,
        reverse in any::<bool>()
    ) {
        if reverse {
            fields.reverse();
        }
        let d = device(fields);
        let max = d.max_word_count() + extra;
        let plan = ChunkPlanner::new(max).plan(&d).unwrap();

        prop_assert_eq!(plan.slots().len(), d.len());
        for chunk in plan.chunks() {
            prop_assert!(chunk.count >= 1 && chunk.count <= max);
        }
        for (i, field) in d.fields().iter().enumerate() {
            let slot = plan.slot(i).unwrap();
            let chunk = plan.chunks()[slot.chunk];
            prop_assert_eq!(
                u32::from(chunk.start) + u32::from(slot.offset),
                u32::from(field.address)
            );
            prop_assert!(field.end_address() <= chunk.end());
        }
        for pair in plan.chunks().windows(2) {
            prop_assert!(pair[0].end() <= u32::from(pair[1].start));
        }
        // every chunk starts at a field
        for chunk in plan.chunks() {
            prop_assert!(d.fields().iter().any(|f| f.address == chunk.start));
        }
        prop_assert_eq!(ChunkPlanner::new(max).plan(&d).unwrap(), plan);
    }

    #[test]
    fn bound_below_widest_field_is_rejected(fields in layout()) {
        let d = device(fields);
        let widest = d.max_word_count();
        prop_assume!(widest > 1);
        let err = ChunkPlanner::new(widest - 1).plan(&d).unwrap_err();
        let is_chunk_too_large = matches!(err, MeterError::ChunkTooLarge { .. });
        prop_assert!(is_chunk_too_large);
    }
}
