//! End-to-end scenarios exercising the public API across the
//! create/write/finish/load boundary a real acquisition and a later
//! analysis process would actually cross.

mod integration {
    mod axis_conflict;
    mod boundary;
    mod coordinate_serialization;
    mod display_settings;
    mod pyramid_consistency;
    mod rollover;
    mod roundtrip;
    mod stitched_read;
    mod tiled_overlap;
}
