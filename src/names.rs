//! Car and track display names
//!
//! Packets only carry numeric ordinals. Names come from two reference tables,
//! each a two-column CSV file with a header row:
//!
//! ```text
//! Ordinal,CarName
//! 3402,"Mazda MX-5 Miata, 1994"
//! ```
//!
//! Blank rows, rows with fewer than two columns and rows whose ordinal is not
//! an integer are skipped. An ordinal missing from a table resolves to a
//! placeholder (`UnknownCar_<n>` / `UnknownTrack_<n>`), never an error.

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::sink::parse_records;
use crate::{Result, TelemetryError};

/// Read-only ordinal to name mapping, shared by all sessions.
pub trait NameLookup: Send + Sync {
    fn car_name(&self, ordinal: i32) -> Option<&str>;
    fn track_name(&self, ordinal: i32) -> Option<&str>;
}

/// Car name for `ordinal`, or its placeholder.
pub fn resolve_car_name(names: &dyn NameLookup, ordinal: i32) -> String {
    match names.car_name(ordinal) {
        Some(name) => name.to_string(),
        None => format!("UnknownCar_{ordinal}"),
    }
}

/// Track name for `ordinal`, or its placeholder.
pub fn resolve_track_name(names: &dyn NameLookup, ordinal: i32) -> String {
    match names.track_name(ordinal) {
        Some(name) => name.to_string(),
        None => format!("UnknownTrack_{ordinal}"),
    }
}

/// In-memory reference tables.
#[derive(Debug, Clone, Default)]
pub struct ReferenceNames {
    cars: HashMap<i32, String>,
    tracks: HashMap<i32, String>,
}

impl ReferenceNames {
    pub fn new(cars: HashMap<i32, String>, tracks: HashMap<i32, String>) -> Self {
        Self { cars, tracks }
    }

    /// Load both tables. A table whose path is `None` or missing on disk
    /// stays empty.
    pub fn load(car_csv: Option<&Path>, track_csv: Option<&Path>) -> Result<Self> {
        let cars = match car_csv {
            Some(path) => load_table(path)?,
            None => HashMap::new(),
        };
        let tracks = match track_csv {
            Some(path) => load_table(path)?,
            None => HashMap::new(),
        };

        info!(cars = cars.len(), tracks = tracks.len(), "Reference names loaded");
        Ok(Self { cars, tracks })
    }

    pub fn insert_car(&mut self, ordinal: i32, name: impl Into<String>) {
        self.cars.insert(ordinal, name.into());
    }

    pub fn insert_track(&mut self, ordinal: i32, name: impl Into<String>) {
        self.tracks.insert(ordinal, name.into());
    }

    pub fn car_count(&self) -> usize {
        self.cars.len()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

impl NameLookup for ReferenceNames {
    fn car_name(&self, ordinal: i32) -> Option<&str> {
        self.cars.get(&ordinal).map(String::as_str)
    }

    fn track_name(&self, ordinal: i32) -> Option<&str> {
        self.tracks.get(&ordinal).map(String::as_str)
    }
}

/// Load one `Ordinal,Name` table.
pub fn load_table(path: &Path) -> Result<HashMap<i32, String>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Reference table not found, names will use placeholders");
            return Ok(HashMap::new());
        }
        Err(e) => return Err(TelemetryError::file_error(path.to_path_buf(), e)),
    };

    let table = parse_table(&text);
    debug!(path = %path.display(), entries = table.len(), "Parsed reference table");
    Ok(table)
}

/// Parse `Ordinal,Name` rows, skipping the header.
pub fn parse_table(text: &str) -> HashMap<i32, String> {
    let mut table = HashMap::new();

    for fields in parse_records(text).into_iter().skip(1) {
        let [ordinal, name, ..] = fields.as_slice() else {
            continue;
        };

        let Ok(ordinal) = ordinal.trim().parse::<i32>() else {
            continue;
        };

        table.insert(ordinal, name.trim().trim_matches('"').to_string());
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARS: &str = "\
Ordinal,CarName
3402,\"Mazda MX-5 Miata, 1994\"

not-a-number,Ghost
77
 205 , Porsche 911 GT3 RS
";

    #[test]
    fn parses_rows_and_skips_junk() {
        let table = parse_table(CARS);
        assert_eq!(table.len(), 2);
        assert_eq!(table[&3402], "Mazda MX-5 Miata, 1994");
        assert_eq!(table[&205], "Porsche 911 GT3 RS");
    }

    #[test]
    fn header_row_is_never_data() {
        let table = parse_table("1,First\n2,Second\n");
        assert_eq!(table.len(), 1);
        assert_eq!(table[&2], "Second");
    }

    #[test]
    fn placeholders_for_unknown_ordinals() {
        let mut names = ReferenceNames::default();
        names.insert_car(12, "Ford GT");
        names.insert_track(860, "Laguna Seca");

        assert_eq!(resolve_car_name(&names, 12), "Ford GT");
        assert_eq!(resolve_car_name(&names, 99), "UnknownCar_99");
        assert_eq!(resolve_track_name(&names, 860), "Laguna Seca");
        assert_eq!(resolve_track_name(&names, -3), "UnknownTrack_-3");
    }

    #[test]
    fn missing_file_is_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let names = ReferenceNames::load(Some(dir.path().join("nope.csv").as_path()), None).unwrap();
        assert_eq!(names.car_count(), 0);
        assert_eq!(names.track_count(), 0);
    }

    #[test]
    fn loads_tables_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cars = dir.path().join("CarOrdinal.csv");
        let tracks = dir.path().join("TrackOrdinal.csv");
        std::fs::write(&cars, CARS).unwrap();
        std::fs::write(&tracks, "Ordinal,TrackName\n860,Laguna Seca\n").unwrap();

        let names = ReferenceNames::load(Some(cars.as_path()), Some(tracks.as_path())).unwrap();
        assert_eq!(names.car_count(), 2);
        assert_eq!(names.track_name(860), Some("Laguna Seca"));
    }
}
