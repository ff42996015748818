use super::gps::derive_coordinate;
use super::reader::RawExif;
use super::tags::{display_name, gps_tag_name, tag_name, TAG_GPS_INFO};
use super::value::TagValue;
use crate::geocode::Geocoder;
use crate::report::Item;

/// Turn raw EXIF tags into report items.
///
/// Top-level tags become fields named from the static table. The GPSInfo
/// tag becomes a group of GPS fields followed by the parsed coordinates and,
/// when a geocoder is given, the resolved address. Geocoding failures are
/// reported inline and never abort the section.
pub async fn normalize(raw: &RawExif, geocoder: Option<&dyn Geocoder>) -> Vec<Item> {
    let mut items = Vec::with_capacity(raw.entries.len() + 1);
    let mut gps_emitted = false;

    for (tag, value) in &raw.entries {
        match (&raw.gps, *tag == TAG_GPS_INFO) {
            (Some(gps), true) if !gps_emitted => {
                items.push(gps_group(gps, geocoder).await);
                gps_emitted = true;
            }
            _ => items.push(Item::field(display_name(*tag, tag_name), value.to_string())),
        }
    }

    // Some containers expose the GPS entries without the IFD0 pointer tag
    if let (Some(gps), false) = (&raw.gps, gps_emitted) {
        items.push(gps_group(gps, geocoder).await);
    }

    items
}

async fn gps_group(gps: &[(u16, TagValue)], geocoder: Option<&dyn Geocoder>) -> Item {
    let mut items: Vec<Item> = gps
        .iter()
        .map(|(tag, value)| Item::field(display_name(*tag, gps_tag_name), value.to_string()))
        .collect();

    if let Some(coord) = derive_coordinate(gps) {
        items.push(Item::field("Parsed Latitude", format!("{:.6}", coord.latitude)));
        items.push(Item::field("Parsed Longitude", format!("{:.6}", coord.longitude)));

        match geocoder {
            None => items.push(Item::note("Reverse geocoding disabled")),
            Some(geocoder) => match geocoder.reverse(coord).await {
                Ok(Some(address)) => {
                    items.push(Item::field("Address", address.display_name));
                    items.push(Item::field(
                        "State",
                        address.state.unwrap_or_else(|| "Unknown".to_string()),
                    ));
                    items.push(Item::link(
                        "Google Maps Link",
                        "View on Google Maps",
                        coord.maps_url(),
                    ));
                }
                Ok(None) => items.push(Item::note("No address found for these coordinates")),
                Err(e) => {
                    log::warn!("{} lookup failed: {e}", geocoder.name());
                    items.push(Item::note(e.to_string()));
                }
            },
        }
    }

    Item::group(display_name(TAG_GPS_INFO, tag_name), items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MetaError, Result};
    use crate::exif::Coordinate;
    use crate::geocode::Address;

    struct FixedGeocoder;

    #[async_trait::async_trait]
    impl Geocoder for FixedGeocoder {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn reverse(&self, _coord: Coordinate) -> Result<Option<Address>> {
            Ok(Some(Address {
                display_name: "Pittsburgh, Pennsylvania, United States".into(),
                state: None,
                raw: serde_json::Value::Null,
            }))
        }
    }

    struct OfflineGeocoder;

    #[async_trait::async_trait]
    impl Geocoder for OfflineGeocoder {
        fn name(&self) -> &str {
            "offline"
        }
        async fn reverse(&self, _coord: Coordinate) -> Result<Option<Address>> {
            Err(MetaError::Geocoding("Connection refused".into()))
        }
    }

    fn dms(d: i64, m: i64, s: i64) -> TagValue {
        TagValue::List(vec![
            TagValue::Rational(d, 1),
            TagValue::Rational(m, 1),
            TagValue::Rational(s, 1),
        ])
    }

    fn sample() -> RawExif {
        RawExif {
            entries: vec![
                (0x010F, TagValue::Text("Canon".into())),
                (TAG_GPS_INFO, TagValue::Integer(2300)),
                (0xBEEF, TagValue::Integer(7)),
            ],
            gps: Some(vec![
                (1, TagValue::Text("N".into())),
                (2, dms(40, 26, 46)),
                (3, TagValue::Text("W".into())),
                (4, dms(79, 56, 55)),
                (0x0042, TagValue::Integer(1)),
            ]),
        }
    }

    fn gps_items(items: &[Item]) -> &[Item] {
        items
            .iter()
            .find_map(|i| match i {
                Item::Group { name, items } if name == "GPSInfo" => Some(items.as_slice()),
                _ => None,
            })
            .expect("GPSInfo group")
    }

    #[tokio::test]
    async fn names_and_raw_fallback() {
        let items = normalize(&sample(), None).await;
        assert_eq!(items[0], Item::field("Make", "Canon"));
        assert!(matches!(&items[1], Item::Group { name, .. } if name == "GPSInfo"));
        assert_eq!(items[2], Item::field("0xBEEF", "7"));

        let gps = gps_items(&items);
        assert_eq!(gps[0], Item::field("GPSLatitudeRef", "N"));
        assert_eq!(gps[1], Item::field("GPSLatitude", "(40/1, 26/1, 46/1)"));
        assert_eq!(gps[4], Item::field("0x0042", "1"));
        assert_eq!(gps[5], Item::field("Parsed Latitude", "40.446111"));
        assert_eq!(gps[6], Item::field("Parsed Longitude", "-79.948611"));
        assert_eq!(gps[7], Item::note("Reverse geocoding disabled"));
    }

    #[tokio::test]
    async fn resolved_address_adds_state_and_link() {
        let items = normalize(&sample(), Some(&FixedGeocoder)).await;
        let gps = gps_items(&items);
        assert!(gps.contains(&Item::field("Address", "Pittsburgh, Pennsylvania, United States")));
        assert!(gps.contains(&Item::field("State", "Unknown")));
        assert!(gps.iter().any(|i| matches!(
            i,
            Item::Link { url, .. } if url.contains("query=40.4461") && url.contains(",-79.9486")
        )));
    }

    #[tokio::test]
    async fn geocoding_failure_becomes_note() {
        let items = normalize(&sample(), Some(&OfflineGeocoder)).await;
        let gps = gps_items(&items);
        assert_eq!(
            gps.last(),
            Some(&Item::note("Reverse geocoding failed: Connection refused"))
        );
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn gps_without_pointer_is_appended() {
        let mut raw = sample();
        raw.entries.retain(|(t, _)| *t != TAG_GPS_INFO);
        let items = normalize(&raw, None).await;
        assert!(matches!(items.last(), Some(Item::Group { name, .. }) if name == "GPSInfo"));
    }

    #[tokio::test]
    async fn pointer_without_block_is_plain_field() {
        let mut raw = sample();
        raw.gps = None;
        let items = normalize(&raw, Some(&OfflineGeocoder)).await;
        assert_eq!(items[1], Item::field("GPSInfo", "2300"));
    }

    #[tokio::test]
    async fn incomplete_gps_skips_coordinates() {
        let mut raw = sample();
        if let Some(gps) = raw.gps.as_mut() {
            gps.retain(|(t, _)| *t != 3);
        }
        let items = normalize(&raw, Some(&FixedGeocoder)).await;
        let gps = gps_items(&items);
        assert!(!gps.iter().any(|i| matches!(i, Item::Field { name, .. } if name == "Parsed Latitude")));
        assert!(!gps.iter().any(|i| matches!(i, Item::Field { name, .. } if name == "Address")));
    }
}
