//! Session row files and summary export
//!
//! One accepted record becomes one comma-separated row. The header row is
//! [`csv_header`], written together with the first row; a session that never
//! accepts a record leaves no row file behind. Each row reaches the file in a
//! single write as soon as it is accepted, and a row that fails part way is
//! cut off again, so the file only ever holds complete rows.
//!
//! Numeric values are written with their shortest round-trip representation.
//! Only the two name columns can contain delimiters, so they are the only
//! values that are ever quoted.

use chrono::{DateTime, TimeZone};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::stats::Summary;
use crate::types::{Column, TelemetryRecord, columns, field_spec};
use crate::{CAR_NAME_COLUMN, Result, TRACK_NAME_COLUMN, TelemetryError};

/// Header row of a session file.
pub fn csv_header() -> String {
    columns().map(|column| column.name()).collect::<Vec<_>>().join(",")
}

/// Storage that can be cut back to a previous length.
trait RowStore: Write {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl RowStore for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        // Opened in append mode, so the next write lands at the new end.
        self.set_len(len)
    }
}

/// Line-oriented writer that never leaves a partial line behind.
#[derive(Debug)]
struct RowFile<S> {
    store: S,
    /// Length of the file up to the end of the last complete line
    committed: u64,
    /// A rollback failed; cut back before the next write
    dirty: bool,
}

impl<S: RowStore> RowFile<S> {
    fn new(store: S) -> Self {
        Self { store, committed: 0, dirty: false }
    }

    fn append_line(&mut self, line: &str) -> io::Result<()> {
        if self.dirty {
            self.store.truncate_to(self.committed)?;
            self.dirty = false;
        }

        let mut bytes = String::with_capacity(line.len() + 1);
        bytes.push_str(line);
        bytes.push('\n');

        match self.store.write_all(bytes.as_bytes()).and_then(|()| self.store.flush()) {
            Ok(()) => {
                self.committed += bytes.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.store.truncate_to(self.committed) {
                    error!(error = %rollback, committed = self.committed, "Failed to remove partial row");
                    self.dirty = true;
                }
                Err(e)
            }
        }
    }
}

/// Appends accepted records to a session file.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    file: Option<RowFile<File>>,
    rows_written: u64,
}

impl CsvSink {
    /// Prepare a sink for `path`. Nothing touches the filesystem until the
    /// first [`append`](Self::append).
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: None, rows_written: 0 }
    }

    /// Write one row.
    ///
    /// A failed write leaves no trace of the row in the file and the sink
    /// usable; the next call retries opening the file if it was never
    /// created.
    pub fn append(&mut self, record: &TelemetryRecord) -> Result<()> {
        let file = match self.file.take() {
            Some(file) => file,
            None => open_with_header(&self.path)?,
        };
        let file = self.file.insert(file);

        file.append_line(&format_row(record))
            .map_err(|e| TelemetryError::file_error(self.path.clone(), e))?;

        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file has been created.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

fn open_with_header(path: &Path) -> Result<RowFile<File>> {
    let io_error = |e| TelemetryError::file_error(path.to_path_buf(), e);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path).map_err(io_error)?;
    file.set_len(0).map_err(io_error)?;

    let mut file = RowFile::new(file);
    file.append_line(&csv_header()).map_err(io_error)?;

    info!(path = %path.display(), "Created session file");
    Ok(file)
}

/// Format `record` in [`csv_header`] column order.
pub fn format_row(record: &TelemetryRecord) -> String {
    columns()
        .map(|column| match column {
            Column::Numeric(spec) => spec.get(record).to_string(),
            Column::CarName => quote_field(&record.car_name),
            Column::TrackName => quote_field(&record.track_name),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split comma-separated text into records of fields.
///
/// Quoted fields may contain commas, doubled quotes and line breaks. Blank
/// lines produce no record.
pub(crate) fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => finish_record(&mut records, &mut record, &mut field),
            _ => field.push(c),
        }
    }
    finish_record(&mut records, &mut record, &mut field);

    records
}

fn finish_record(records: &mut Vec<Vec<String>>, record: &mut Vec<String>, field: &mut String) {
    record.push(std::mem::take(field));
    let line = std::mem::take(record);
    if !(line.len() == 1 && line[0].is_empty()) {
        records.push(line);
    }
}

/// Read a session file back into records.
///
/// Columns are matched by header name, so files with a subset of the columns
/// load with the missing values left at zero.
pub fn read_rows(path: &Path) -> Result<Vec<TelemetryRecord>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
    let context = path.display().to_string();

    let mut records = parse_records(&text).into_iter();
    let Some(header) = records.next() else {
        return Ok(Vec::new());
    };

    let layout = header
        .iter()
        .map(|name| match name.as_str() {
            CAR_NAME_COLUMN => Ok(Column::CarName),
            TRACK_NAME_COLUMN => Ok(Column::TrackName),
            other => field_spec(other)
                .map(Column::Numeric)
                .ok_or_else(|| TelemetryError::parse(&context, format!("unknown column '{other}'"))),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for (index, fields) in records.enumerate() {
        // Row numbers are 1-based and count the header.
        let line = index + 2;
        if fields.len() != layout.len() {
            return Err(TelemetryError::parse(
                &context,
                format!("row {line} has {} values, header has {}", fields.len(), layout.len()),
            ));
        }

        let mut record = TelemetryRecord::default();
        for (column, value) in layout.iter().zip(fields) {
            match column {
                Column::Numeric(spec) => (spec.assign)(&mut record, &value).map_err(|e| {
                    TelemetryError::parse(&context, format!("row {line}, {}: {e}", spec.name))
                })?,
                Column::CarName => record.car_name = value,
                Column::TrackName => record.track_name = value,
            }
        }
        rows.push(record);
    }

    debug!(path = %path.display(), rows = rows.len(), "Read session file");
    Ok(rows)
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.csv`
pub fn session_file_name<Tz>(prefix: &str, timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{prefix}_{}.csv", timestamp.format("%Y%m%d_%H%M%S"))
}

/// Pick a session file path in `dir` that no earlier session has used.
///
/// Two sessions started within the same second would share a name, so a
/// numeric suffix is appended until neither the row file nor its summary
/// exists.
pub fn unique_session_path<Tz>(dir: &Path, prefix: &str, timestamp: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let base = dir.join(session_file_name(prefix, timestamp));
    let taken = |path: &Path| path.exists() || summary_path(path).exists();
    if !taken(&base) {
        return base;
    }

    let stem = format!("{prefix}_{}", timestamp.format("%Y%m%d_%H%M%S"));
    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}.csv")))
        .find(|path| !taken(path))
        .unwrap_or(base)
}

/// Summary file accompanying a session file.
pub fn summary_path(csv_path: &Path) -> PathBuf {
    csv_path.with_extension("json")
}

/// Write `summary` as pretty-printed JSON.
pub fn export_summary(path: &Path, summary: &Summary) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| TelemetryError::file_error(parent.to_path_buf(), e))?;
    }

    let json = serde_json::to_string_pretty(summary).map_err(|source| {
        TelemetryError::Serialization { context: "session summary".to_string(), source }
    })?;
    std::fs::write(path, json).map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;

    info!(path = %path.display(), fields = summary.len(), "Exported session summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatisticsAggregator;
    use crate::packet::{PACKET_LEN, decode};
    use crate::test_utils::PacketBuilder;
    use crate::types::{FieldValue, numeric_fields};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    /// In-memory store that refuses bytes past `capacity`.
    #[derive(Debug, Default)]
    struct LimitedStore {
        data: Vec<u8>,
        capacity: usize,
        failing_truncates: usize,
    }

    impl Write for LimitedStore {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.data.len());
            if room == 0 {
                return Err(io::Error::other("no space left"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl RowStore for LimitedStore {
        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            if self.failing_truncates > 0 {
                self.failing_truncates -= 1;
                return Err(io::Error::other("truncate refused"));
            }
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    fn text(file: &RowFile<LimitedStore>) -> &str {
        std::str::from_utf8(&file.store.data).unwrap()
    }

    fn same_value(a: FieldValue, b: FieldValue) -> bool {
        a == b || (a.as_f64().is_nan() && b.as_f64().is_nan())
    }

    fn record(car: &str, track: &str) -> TelemetryRecord {
        let mut record = PacketBuilder::driving().speed(42.5).lap(2).gear(4).record();
        record.car_name = car.to_string();
        record.track_name = track.to_string();
        record
    }

    #[test]
    fn header_lists_every_column_once() {
        let header = csv_header();
        let names: Vec<_> = header.split(',').collect();
        assert_eq!(names.len(), 97);
        assert_eq!(names[0], "IsRaceOn");
        assert_eq!(names[90], "CarName");
        assert_eq!(names[96], "SpeedKph");
    }

    #[test]
    fn sink_is_lazy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laps").join("session.csv");
        let sink = CsvSink::create(&path);
        assert!(!sink.is_open());
        assert!(!path.exists());
        drop(sink);
        assert!(!path.exists());
    }

    #[test]
    fn rows_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laps").join("session.csv");
        let mut sink = CsvSink::create(&path);

        let written = vec![
            record("Mazda MX-5 Miata, 1994", "Laguna Seca"),
            record("The \"Warthog\"", "UnknownTrack_7"),
            record("Plain", "Multi\nline"),
        ];
        for record in &written {
            sink.append(record).unwrap();
        }
        assert_eq!(sink.rows_written(), 3);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(&csv_header()));
        assert!(text.contains("\"Mazda MX-5 Miata, 1994\""));
        assert!(text.contains("\"The \"\"Warthog\"\"\""));

        assert_eq!(read_rows(&path).unwrap(), written);
    }

    #[test]
    fn partial_row_is_cut_off_after_a_failed_write() {
        let mut file = RowFile::new(LimitedStore { capacity: 20, ..Default::default() });
        file.append_line("Speed,Gear").unwrap();
        file.append_line("12.5,3").unwrap();

        // Only two of the eight bytes fit.
        assert!(file.append_line("30.25,4").is_err());
        assert_eq!(text(&file), "Speed,Gear\n12.5,3\n");
        assert_eq!(file.committed, 18);

        file.store.capacity = 64;
        file.append_line("7.5,2").unwrap();
        assert_eq!(text(&file), "Speed,Gear\n12.5,3\n7.5,2\n");
    }

    #[test]
    fn failed_rollback_is_retried_before_the_next_row() {
        let mut file = RowFile::new(LimitedStore { capacity: 14, ..Default::default() });
        file.append_line("Speed,Gear").unwrap();

        file.store.failing_truncates = 1;
        assert!(file.append_line("12.5,3").is_err());
        assert!(file.dirty);
        assert_eq!(text(&file), "Speed,Gear\n12.");

        file.store.capacity = 64;
        file.append_line("7.5,2").unwrap();
        assert!(!file.dirty);
        assert_eq!(text(&file), "Speed,Gear\n7.5,2\n");
    }

    #[test]
    fn reopening_a_path_starts_a_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        std::fs::write(&path, "stale contents\n").unwrap();

        let mut sink = CsvSink::create(&path);
        sink.append(&record("a", "b")).unwrap();
        sink.append(&record("c", "d")).unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].car_name, "c");
    }

    #[test]
    fn failed_open_is_reported_and_retried() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut sink = CsvSink::create(blocker.join("session.csv"));
        assert!(matches!(sink.append(&record("a", "b")), Err(TelemetryError::File { .. })));
        assert_eq!(sink.rows_written(), 0);

        std::fs::remove_file(&blocker).unwrap();
        sink.append(&record("a", "b")).unwrap();
        assert_eq!(sink.rows_written(), 1);
    }

    #[test]
    fn read_rows_rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");

        std::fs::write(&path, "Speed,Altitude\n1,2\n").unwrap();
        assert!(matches!(read_rows(&path), Err(TelemetryError::Parse { .. })));

        std::fs::write(&path, "Speed,Gear\n1\n").unwrap();
        assert!(matches!(read_rows(&path), Err(TelemetryError::Parse { .. })));

        std::fs::write(&path, "Speed,Gear\n12.5,300\n").unwrap();
        assert!(matches!(read_rows(&path), Err(TelemetryError::Parse { .. })));

        std::fs::write(&path, "Speed,Gear\n12.5,3\n").unwrap();
        let rows = read_rows(&path).unwrap();
        assert_eq!(rows[0].packet.speed, 12.5);
        assert_eq!(rows[0].packet.gear, 3);
    }

    #[test]
    fn parser_handles_quotes_and_blank_lines() {
        let records = parse_records("a,b\r\n\n\"x, y\",\"say \"\"hi\"\"\"\n\"two\nlines\",z\n");
        assert_eq!(
            records,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["x, y".to_string(), "say \"hi\"".to_string()],
                vec!["two\nlines".to_string(), "z".to_string()],
            ]
        );
    }

    #[test]
    fn session_names_follow_the_timestamp() {
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
            .and_utc();
        assert_eq!(
            session_file_name("forza_telemetry", &timestamp),
            "forza_telemetry_20240309_140507.csv"
        );

        let dir = tempfile::tempdir().unwrap();
        let first = unique_session_path(dir.path(), "forza_telemetry", &timestamp);
        assert_eq!(first, dir.path().join("forza_telemetry_20240309_140507.csv"));
        std::fs::write(summary_path(&first), "{}").unwrap();

        let second = unique_session_path(dir.path(), "forza_telemetry", &timestamp);
        assert_eq!(second, dir.path().join("forza_telemetry_20240309_140507_1.csv"));
        assert_eq!(summary_path(&second), dir.path().join("forza_telemetry_20240309_140507_1.json"));

    }

    #[test]
    fn summary_export_writes_ordered_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("session.json");

        let mut aggregator = StatisticsAggregator::new();
        aggregator.update(&record("a", "b"));
        export_summary(&path, &aggregator.snapshot()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["Speed"]["count"], 1);
        assert_eq!(value["Speed"]["mean"], 42.5);
        assert!(text.find("\"IsRaceOn\"").unwrap() < text.find("\"SpeedKph\"").unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn arbitrary_records_survive_a_round_trip(
            packets in prop::collection::vec(prop::collection::vec(any::<u8>(), PACKET_LEN), 1..4),
            car in any::<String>(),
            track in any::<String>(),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("session.csv");
            let mut sink = CsvSink::create(&path);

            let mut written = Vec::new();
            for bytes in &packets {
                let mut record = decode(bytes).unwrap();
                record.car_name = car.clone();
                record.track_name = track.clone();
                sink.append(&record).unwrap();
                written.push(record);
            }

            let read = read_rows(&path).unwrap();
            prop_assert_eq!(read.len(), written.len());
            for (before, after) in written.iter().zip(&read) {
                prop_assert_eq!(&before.car_name, &after.car_name);
                prop_assert_eq!(&before.track_name, &after.track_name);
                for spec in numeric_fields() {
                    prop_assert!(
                        same_value(spec.get(before), spec.get(after)),
                        "{} changed: {} -> {}", spec.name, spec.get(before), spec.get(after)
                    );
                }
            }
        }
    }
}
