// Simulated beacon reading submitted with every check-in

use rand::Rng;
use serde::Serialize;

/// Fixed beacon UUID shared by all of the service's seat beacons.
pub const BEACON_UUID: &str = "fda50693-a4e2-4fb1-afcf-c6eb07647825";

/// One proximity observation as the mobile client reports it.
///
/// Field order matters: the wire payload serializes in declaration order
/// and must look like the real client's JSON.
#[derive(Debug, Clone, Serialize)]
pub struct BeaconReading {
    pub minor: i32,
    pub rssi: i32,
    pub major: i32,
    pub proximity: i32,
    pub accuracy: f64,
    pub uuid: String,
}

impl BeaconReading {
    /// A plausible close-range reading for the given beacon identity:
    /// signal between -60 and -80 dBm, accuracy between 1 and 5 meters,
    /// proximity class "near".
    pub fn simulated(major: i32, minor: i32) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            minor,
            rssi: -rng.gen_range(60..=80),
            major,
            proximity: 2,
            accuracy: rng.gen_range(1.0..5.0),
            uuid: BEACON_UUID.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_reading_stays_in_range() {
        for _ in 0..100 {
            let reading = BeaconReading::simulated(10113, 25340);
            assert_eq!(reading.major, 10113);
            assert_eq!(reading.minor, 25340);
            assert!((-80..=-60).contains(&reading.rssi));
            assert!((1.0..5.0).contains(&reading.accuracy));
            assert_eq!(reading.proximity, 2);
            assert_eq!(reading.uuid, BEACON_UUID);
        }
    }

    #[test]
    fn test_serialization_preserves_wire_field_order() {
        let reading = BeaconReading::simulated(1, 2);
        let json = serde_json::to_string(&reading).expect("serialize");

        let minor = json.find("\"minor\"").expect("minor present");
        let rssi = json.find("\"rssi\"").expect("rssi present");
        let major = json.find("\"major\"").expect("major present");
        let proximity = json.find("\"proximity\"").expect("proximity present");
        let accuracy = json.find("\"accuracy\"").expect("accuracy present");
        let uuid = json.find("\"uuid\"").expect("uuid present");

        assert!(minor < rssi && rssi < major && major < proximity);
        assert!(proximity < accuracy && accuracy < uuid);
    }
}
