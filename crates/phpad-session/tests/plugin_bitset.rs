use phpad_session::{PluginSet, PresetLevel, PLUGIN_CATALOG};

#[test]
fn bitset_round_trips_small_sets() {
    for level in PresetLevel::ALL {
        let set = PluginSet::preset(level);
        let encoded = set.encode_bitset();
        let decoded = PluginSet::decode_bitset(&encoded).expect("decode bitset");
        assert_eq!(decoded, set, "level {} round trip", level.number());
    }
}

#[test]
fn bitset_round_trips_past_machine_word_widths() {
    // 33 members crosses the 32-bit boundary
    let over_32 = PluginSet::from_names(PLUGIN_CATALOG.iter().take(33).copied());
    assert_eq!(over_32.len(), 33);
    let decoded = PluginSet::decode_bitset(&over_32.encode_bitset()).expect("decode 33-bit set");
    assert_eq!(decoded, over_32);

    // 54 members crosses the 53-bit safe-integer boundary
    let over_53 = PluginSet::from_names(PLUGIN_CATALOG.iter().take(54).copied());
    assert_eq!(over_53.len(), 54);
    let encoded = over_53.encode_bitset();
    assert!(
        encoded.parse::<u64>().map_or(true, |v| v > (1 << 53)),
        "encoding must exceed 53-bit range"
    );
    let decoded = PluginSet::decode_bitset(&encoded).expect("decode 54-bit set");
    assert_eq!(decoded, over_53);
}

#[test]
fn full_catalog_round_trips() {
    let all = PluginSet::preset(PresetLevel::Level5);
    assert_eq!(all.len(), PLUGIN_CATALOG.len());
    let decoded = PluginSet::decode_bitset(&all.encode_bitset()).expect("decode full set");
    assert_eq!(decoded, all);
}

#[test]
fn empty_set_round_trips_through_bitset_layer() {
    let empty = PluginSet::empty();
    assert_eq!(empty.encode_bitset(), "0");
    let decoded = PluginSet::decode_bitset("0").expect("decode zero");
    assert!(decoded.is_empty());
}

#[test]
fn bits_beyond_catalog_are_ignored() {
    // a link from a future, larger catalog: bit 200 set plus bit 0
    let mut huge = num_bigint::BigUint::from(1u8);
    huge.set_bit(200, true);
    let decoded = PluginSet::decode_bitset(&huge.to_str_radix(10)).expect("decode future bitset");
    assert_eq!(decoded.len(), 1);
    assert!(decoded.contains(PLUGIN_CATALOG[0]));
}

#[test]
fn malformed_bitset_is_rejected() {
    assert!(PluginSet::decode_bitset("not-a-number").is_err());
    assert!(PluginSet::decode_bitset("-4").is_err());
}

#[test]
fn preset_matching_is_exact() {
    let level2 = PluginSet::preset(PresetLevel::Level2);
    assert_eq!(level2.matching_preset(), Some(PresetLevel::Level2));

    let mut custom = level2.clone();
    custom.toggle("NoAssertPlugin");
    assert_eq!(custom.matching_preset(), None);

    // toggling it back off restores the exact match
    custom.toggle("NoAssertPlugin");
    assert_eq!(custom.matching_preset(), Some(PresetLevel::Level2));

    assert_eq!(
        PluginSet::empty().matching_preset(),
        Some(PresetLevel::Level1)
    );
}
