//! The canonical coordinate JSON form is exact and independent of
//! construction order — this is the lookup key the index and the
//! write-pending table both depend on being stable.

use ndtiff::Coordinate;

#[test]
fn mixed_axis_types_serialize_to_sorted_key_json() {
    let coord = Coordinate::from_pairs([
        ("z", 12.into()),
        ("time", 0.into()),
        ("channel", "GFP".into()),
        ("position", "Site_3".into()),
    ]);
    assert_eq!(
        coord.serialize(),
        r#"{"channel":"GFP","position":"Site_3","time":0,"z":12}"#
    );
}

#[test]
fn tile_coordinate_adds_row_and_column_in_sorted_position() {
    let coord = Coordinate::from_pairs([("time", 0.into())])
        .with_axis("row", -2)
        .with_axis("column", 5);
    assert_eq!(coord.serialize(), r#"{"column":5,"row":-2,"time":0}"#);
}

#[test]
fn deserializing_a_reordered_string_yields_the_same_canonical_form() {
    let reordered = br#"{"row":1,"time":0,"column":-1}"#;
    let coord = Coordinate::deserialize(reordered).unwrap();
    assert_eq!(coord.serialize(), r#"{"column":-1,"row":1,"time":0}"#);
}

#[test]
fn negative_integers_round_trip_through_the_canonical_form() {
    let coord = Coordinate::from_pairs([("row", (-17).into()), ("column", (-4).into())]);
    let serialized = coord.serialize();
    assert_eq!(serialized, r#"{"column":-4,"row":-17}"#);
    let back = Coordinate::deserialize(serialized.as_bytes()).unwrap();
    assert_eq!(back, coord);
}
