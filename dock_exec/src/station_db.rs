//! # Station Database
//!
//! The known docking stations are stored as a JSON list of [`DockingStation`]s. The database is
//! loaded once at startup and shared, read only, between the station finder and the controller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fs, path::Path, sync::Arc};

use comms_if::eqpt::fiducial::DockingStation;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StationDbError {
    #[error("Could not read the station database file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Could not parse the station database: {0}")]
    DeserializeError(serde_json::Error),

    #[error("Station {0} appears more than once in the database")]
    DuplicateStation(i32),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load the station database from the given path.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Arc<[DockingStation]>, StationDbError> {
    let db_str = fs::read_to_string(path).map_err(StationDbError::FileLoadError)?;

    parse(&db_str)
}

/// Parse a station database from a JSON string.
pub fn parse(db_str: &str) -> Result<Arc<[DockingStation]>, StationDbError> {
    let stations: Vec<DockingStation> =
        serde_json::from_str(db_str).map_err(StationDbError::DeserializeError)?;

    for (i, station) in stations.iter().enumerate() {
        if stations[..i].iter().any(|s| s.station_id == station.station_id) {
            return Err(StationDbError::DuplicateStation(station.station_id));
        }
    }

    Ok(stations.into())
}

/// Find a station by its ID.
pub fn find_station(stations: &[DockingStation], station_id: i32) -> Option<&DockingStation> {
    stations.iter().find(|s| s.station_id == station_id)
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::fiducial::StationType;

    const DB: &str = r#"[
        {
            "station_id": 3,
            "station_type": "Charger",
            "fiducials": [
                {
                    "configuration": {
                        "family": "tag36h11",
                        "border_width": 1,
                        "side_length_m": 0.16
                    },
                    "transformation": {
                        "source_frame": { "device": { "name": "AprilTag36h11", "serial_number": 7 } },
                        "target_frame": { "device": { "name": "station", "serial_number": 3 } },
                        "translation": [0.0, 0.2, 0.0],
                        "rotation": [0.0, 0.0, 0.0]
                    }
                }
            ]
        }
    ]"#;

    #[test]
    fn test_parse_db() {
        let stations = parse(DB).unwrap();

        assert_eq!(stations.len(), 1);
        let station = find_station(&stations, 3).unwrap();
        assert_eq!(station.station_type, StationType::Charger);
        assert_eq!(station.fiducials[0].transformation.translation.y, 0.2);
        assert!(find_station(&stations, 4).is_none());
    }

    #[test]
    fn test_duplicate_station_rejected() {
        let db = format!("[{0}, {0}]", &DB.trim()[1..DB.trim().len() - 1]);

        assert!(matches!(
            parse(&db),
            Err(StationDbError::DuplicateStation(3))
        ));
    }
}
