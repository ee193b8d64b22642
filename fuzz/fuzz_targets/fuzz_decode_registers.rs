#![no_main]
use energymeter::acquisition::decode_record;
use energymeter::decoder::{Endianness, Order, decode_words, words_from_bytes};
use energymeter::devices::example_meter;
use energymeter::planner::ChunkPlanner;
use energymeter::register_map::ValueKind;
use libfuzzer_sys::fuzz_target;

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

fuzz_target!(|data: &[u8]| {
    let Ok(words) = words_from_bytes(&data[..data.len() & !1], Order::Big) else {
        return;
    };

    // Every kind under both word orders and arbitrary lengths
    for kind in KINDS {
        for order in [Order::Big, Order::Little] {
            let _ = decode_words(&words, kind, order);
            if let Some(head) = words.get(..usize::from(kind.fixed_word_count().unwrap_or(1))) {
                assert!(decode_words(head, kind, order).is_ok());
            }
        }
    }

    // Whole-record decoding must reject, never panic, on mismatched responses
    let Ok(descriptor) = example_meter() else {
        return;
    };
    let Ok(plan) = ChunkPlanner::new(100).plan(&descriptor) else {
        return;
    };
    let third = words.len() / 3;
    let responses = vec![
        words[..third].to_vec(),
        words[third..2 * third].to_vec(),
        words[2 * third..].to_vec(),
    ];
    let _ = decode_record(
        &descriptor,
        &plan,
        &Endianness::default(),
        &responses,
        chrono::Utc::now(),
    );
});
