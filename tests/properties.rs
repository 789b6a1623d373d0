use lanepack::{
    BitWidth, Kernel, LaneWidth, Layout, PlaneCount, Planes, Scalar, Vectorized, bit_pack,
    bit_unpack, collapse_planes, expand_planes,
};
use proptest::prelude::*;

fn kernels() -> Vec<Vectorized> {
    let mut all = vec![Vectorized::detect()];
    all.extend(LaneWidth::ALL.into_iter().map(Vectorized::portable));
    all
}

/// A bit width together with whole words' worth of in-domain values.
fn arbitrary_block() -> impl Strategy<Value = (BitWidth, Vec<u32>)> {
    (1usize..=32, 0usize..48).prop_flat_map(|(bits, words)| {
        let bit_width = BitWidth::new(bits).unwrap();
        let len = words * bit_width.values_per_word();
        (
            Just(bit_width),
            prop::collection::vec(0..=bit_width.mask(), len),
        )
    })
}

fn arbitrary_layout() -> impl Strategy<Value = Layout> {
    prop_oneof![Just(Layout::Horizontal), Just(Layout::Vertical)]
}

fn arbitrary_plane_count() -> impl Strategy<Value = PlaneCount> {
    prop_oneof![Just(PlaneCount::Halves), Just(PlaneCount::Bytes)]
}

proptest::proptest! {
    #[test]
    fn test_pack_round_trip((bit_width, values) in arbitrary_block(), layout in arbitrary_layout()) {
        let per_word = bit_width.values_per_word();
        for kernel in kernels() {
            let mut packed = vec![0; values.len() / per_word];
            kernel.pack(bit_width, layout, &values, &mut packed);
            let mut unpacked = vec![0; values.len()];
            kernel.unpack(bit_width, layout, &packed, &mut unpacked);
            prop_assert_eq!(&unpacked, &values, "{}", kernel.name());
        }
    }

    #[test]
    fn test_pack_matches_scalar((bit_width, values) in arbitrary_block(), layout in arbitrary_layout()) {
        let words = values.len() / bit_width.values_per_word();
        let mut expected = vec![0; words];
        Scalar.pack(bit_width, layout, &values, &mut expected);
        for kernel in kernels() {
            let mut actual = vec![0; words];
            kernel.pack(bit_width, layout, &values, &mut actual);
            prop_assert_eq!(&actual, &expected, "{}", kernel.name());
        }
    }

    #[test]
    fn test_unpack_matches_scalar(
        bits in 1usize..=32,
        words in prop::collection::vec(any::<u32>(), 0..64),
        layout in arbitrary_layout(),
    ) {
        let bit_width = BitWidth::new(bits).unwrap();
        let len = words.len() * bit_width.values_per_word();
        let mut expected = vec![0; len];
        Scalar.unpack(bit_width, layout, &words, &mut expected);
        for kernel in kernels() {
            let mut actual = vec![0; len];
            kernel.unpack(bit_width, layout, &words, &mut actual);
            prop_assert_eq!(&actual, &expected, "{}", kernel.name());
        }
    }

    #[test]
    fn test_planes_match_scalar(
        count in arbitrary_plane_count(),
        (n, seed) in (0usize..80, any::<u32>()),
    ) {
        let input: Vec<u32> = (0..(n * count.get()) as u32)
            .map(|i| (i ^ seed).wrapping_mul(0x9E37_79B9))
            .collect();

        let mut expected = input.clone();
        Scalar.collapse(Planes::new(&mut expected, count).unwrap());
        for kernel in kernels() {
            let mut actual = input.clone();
            kernel.collapse(Planes::new(&mut actual, count).unwrap());
            prop_assert_eq!(&actual, &expected, "collapse {}", kernel.name());
        }

        let mut expected = input.clone();
        Scalar.expand(Planes::new(&mut expected, count).unwrap());
        for kernel in kernels() {
            let mut actual = input.clone();
            kernel.expand(Planes::new(&mut actual, count).unwrap());
            prop_assert_eq!(&actual, &expected, "expand {}", kernel.name());
        }
    }

    #[test]
    fn test_words_survive_expand_collapse(
        count in arbitrary_plane_count(),
        words in prop::collection::vec(any::<u32>(), 0..200),
    ) {
        let planes = expand_planes(&words, count);
        prop_assert_eq!(collapse_planes(&planes, count).unwrap(), words);
    }

    #[test]
    fn test_planes_survive_collapse_expand(
        count in arbitrary_plane_count(),
        seed in prop::collection::vec(any::<u32>(), 0..200),
    ) {
        let planes: Vec<u32> = seed
            .iter()
            .take(seed.len() - seed.len() % count.get())
            .map(|&v| v & count.mask())
            .collect();
        let words = collapse_planes(&planes, count).unwrap();
        prop_assert_eq!(expand_planes(&words, count), planes);
    }

    #[test]
    fn test_bit_pack_any_length(bits in 1usize..=32, seed in prop::collection::vec(any::<u32>(), 0..300)) {
        let mask = BitWidth::new(bits).unwrap().mask();
        let values: Vec<u32> = seed.iter().map(|v| v & mask).collect();
        let packed = bit_pack(&values, bits);
        prop_assert_eq!(bit_unpack(&packed, bits, values.len()), values);
    }
}

#[test]
fn test_identity_at_full_width() {
    let bit_width = BitWidth::MAX;
    let values: Vec<u32> = (0..64u32).map(|i| i.wrapping_mul(0xDEAD_BEEF)).collect();
    for kernel in kernels() {
        for layout in Layout::ALL {
            let mut packed = vec![0; values.len()];
            kernel.pack(bit_width, layout, &values, &mut packed);
            assert_eq!(packed, values, "{}", kernel.name());
        }
    }
}

#[test]
fn test_byte_plane_collapse_scenario() {
    let planes: Vec<u32> = (0..256).collect();
    let words = collapse_planes(&planes, PlaneCount::Bytes).unwrap();
    assert_eq!(words[0], 4227264);
    for (i, &word) in words.iter().enumerate() {
        let i = i as u32;
        assert_eq!(word, (i << 24) | ((i + 64) << 16) | ((i + 128) << 8) | (i + 192));
    }
}
