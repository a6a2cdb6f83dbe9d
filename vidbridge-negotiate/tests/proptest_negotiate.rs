//! Property-based tests for format negotiation.
//!
//! Uses proptest to verify that negotiation is deterministic and
//! order-stable over arbitrary capability catalogs.

use proptest::prelude::*;
use vidbridge_core::format::{FormatDescriptor, PixelLayout, VideoEncoding};
use vidbridge_negotiate::{negotiate, CapabilityCatalog, CapabilityEntry, CodecRole};

fn arb_encoding() -> impl Strategy<Value = VideoEncoding> {
    prop_oneof![
        Just(VideoEncoding::H264),
        Just(VideoEncoding::Vp8),
        Just(VideoEncoding::Vp9),
    ]
}

fn arb_layout() -> impl Strategy<Value = PixelLayout> {
    prop_oneof![
        Just(PixelLayout::I420),
        Just(PixelLayout::Nv12),
        Just(PixelLayout::Nv21),
        Just(PixelLayout::Rgba),
    ]
}

fn arb_role() -> impl Strategy<Value = CodecRole> {
    prop_oneof![Just(CodecRole::Encoder), Just(CodecRole::Decoder)]
}

fn arb_entry() -> impl Strategy<Value = CapabilityEntry> {
    (arb_encoding(), arb_role(), prop::collection::vec(arb_layout(), 0..4)).prop_map(
        |(encoding, role, layouts)| CapabilityEntry {
            encoding,
            role,
            layouts,
        },
    )
}

fn arb_catalog() -> impl Strategy<Value = CapabilityCatalog> {
    prop::collection::vec(arb_entry(), 0..12).prop_map(CapabilityCatalog::from_entries)
}

fn arb_input() -> impl Strategy<Value = FormatDescriptor> {
    prop_oneof![
        arb_encoding().prop_map(FormatDescriptor::new),
        arb_layout().prop_map(FormatDescriptor::raw),
    ]
}

proptest! {
    /// Repeated negotiation over the same inputs returns the same ordered
    /// result.
    #[test]
    fn negotiation_is_deterministic(input in arb_input(), catalog in arb_catalog()) {
        let first = negotiate(&input, &catalog);
        let second = negotiate(&input, &catalog);
        prop_assert_eq!(first, second);
    }

    /// Results contain no duplicate formats.
    #[test]
    fn negotiation_deduplicates(input in arb_input(), catalog in arb_catalog()) {
        let outputs = negotiate(&input, &catalog);
        for (i, a) in outputs.iter().enumerate() {
            for b in &outputs[i + 1..] {
                prop_assert_ne!(a, b);
            }
        }
    }

    /// Appending entries never reorders or removes earlier matches: the
    /// first registered codec keeps winning ties.
    #[test]
    fn discovery_order_is_stable_under_extension(
        input in arb_input(),
        catalog in arb_catalog(),
        extra in arb_entry(),
    ) {
        let base = negotiate(&input, &catalog);

        let mut extended = catalog.clone();
        extended.push(extra);
        let grown = negotiate(&input, &extended);

        prop_assert!(grown.len() >= base.len());
        prop_assert_eq!(&grown[..base.len()], &base[..]);
    }

    /// Every output of an encoder match is compressed; every output of a
    /// decoder match is raw with a layout.
    #[test]
    fn outputs_respect_roles(input in arb_input(), catalog in arb_catalog()) {
        for out in negotiate(&input, &catalog) {
            if out.encoding == VideoEncoding::RawYuv {
                prop_assert!(out.layout.is_some());
            } else {
                prop_assert!(out.encoding.is_compressed());
            }
        }
    }
}
