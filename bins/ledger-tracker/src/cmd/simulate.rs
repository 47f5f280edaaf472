use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::cmd::table::CsvWriter;
use crate::config::SimulateArgs;
use crate::error::TrackerError;

const BASE_LAT: f64 = 14.5995;
const BASE_LONG: f64 = 120.9842;
const GPS_SPREAD: f64 = 0.02;
const WINDOW_MINUTES: usize = 24 * 60;

// ═══════════════════════════════════════════════════════════════
//  Random source
// ═══════════════════════════════════════════════════════════════

/// xorshift64; deterministic for a given non-zero seed.
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1
        } else {
            seed
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64)
    }

    pub fn next_intn(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    /// Inclusive range.
    pub fn between(&mut self, lo: usize, hi: usize) -> usize {
        lo + self.next_intn(hi - lo + 1)
    }

    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

fn round_to(x: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (x * scale).round() / scale
}

// ═══════════════════════════════════════════════════════════════
//  Logistics records
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shipment {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub package_id: String,
    pub gps_lat: f64,
    pub gps_long: f64,
    pub rfid_code: String,
    pub temperature_c: f64,
}

fn serialize_timestamp<S: serde::Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format(pipeline::normalize::TIMESTAMP_FORMAT))
}

/// A cold-chain package seen somewhere around Manila during the 24 hours
/// before `now`.
pub fn shipment(rng: &mut Rng, now: DateTime<Utc>) -> Shipment {
    let minutes_ago = rng.next_intn(WINDOW_MINUTES) as i64;
    Shipment {
        timestamp: now - Duration::minutes(minutes_ago),
        package_id: format!("PKG{}", rng.between(1000, 9999)),
        gps_lat: round_to(BASE_LAT + rng.uniform(-GPS_SPREAD, GPS_SPREAD), 6),
        gps_long: round_to(BASE_LONG + rng.uniform(-GPS_SPREAD, GPS_SPREAD), 6),
        rfid_code: format!("RFID-{}", rng.between(100_000, 999_999)),
        temperature_c: round_to(rng.uniform(2.0, 8.0), 1),
    }
}

pub fn shipments(rng: &mut Rng, now: DateTime<Utc>, n: usize) -> Vec<Shipment> {
    (0..n).map(|_| shipment(rng, now)).collect()
}

fn shipments_csv(shipments: &[Shipment]) -> String {
    let mut w = CsvWriter::new(&[
        "timestamp",
        "package_id",
        "gps_lat",
        "gps_long",
        "rfid_code",
        "temperature_c",
    ]);
    for s in shipments {
        w.record(&[
            s.timestamp.format(pipeline::normalize::TIMESTAMP_FORMAT).to_string(),
            s.package_id.clone(),
            s.gps_lat.to_string(),
            s.gps_long.to_string(),
            s.rfid_code.clone(),
            format!("{:.1}", s.temperature_c),
        ]);
    }
    w.finish()
}

/// Three ingest-ready readings per package: temperature, position, tag.
fn source_rows_csv(shipments: &[Shipment]) -> String {
    let mut w = CsvWriter::new(&["device_id", "data_type", "data_value"]);
    for s in shipments {
        let id = s.package_id.as_str();
        let temperature = format!("{:.1}°C", s.temperature_c);
        let position = format!("{},{}", s.gps_lat, s.gps_long);
        w.record(&[id, "Temperature", temperature.as_str()]);
        w.record(&[id, "GPS", position.as_str()]);
        w.record(&[id, "RFID", s.rfid_code.as_str()]);
    }
    w.finish()
}

fn write(path: &Path, body: String) -> Result<(), TrackerError> {
    std::fs::write(path, body).map_err(|e| TrackerError::io(path.display().to_string(), e))
}

pub fn run(args: SimulateArgs) -> Result<(), TrackerError> {
    let mut rng = Rng::new(args.seed);
    let data = shipments(&mut rng, Utc::now(), args.records);

    let dir = Path::new(&args.output_dir);
    std::fs::create_dir_all(dir).map_err(|e| TrackerError::io(args.output_dir.as_str(), e))?;
    write(&dir.join("logistics_data.csv"), shipments_csv(&data))?;
    write(&dir.join("logistics_data.json"), serde_json::to_string(&data)?)?;
    tracing::info!(records = data.len(), dir = %dir.display(), seed = args.seed, "logistics data generated");

    if let Some(rows) = &args.rows {
        write(Path::new(rows), source_rows_csv(&data))?;
        tracing::info!(path = %rows, rows = data.len() * 3, "source rows written");
    }

    println!("{} logistics records written to {}", data.len(), dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::table::parse_rows;
    use crate::config::ColumnNames;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_718_000_000, 0).unwrap()
    }

    #[test]
    fn same_seed_same_data() {
        let a = shipments(&mut Rng::new(42), fixed_now(), 20);
        let b = shipments(&mut Rng::new(42), fixed_now(), 20);
        assert_eq!(a, b);
    }

    #[test]
    fn fields_stay_in_range() {
        let now = fixed_now();
        for s in shipments(&mut Rng::new(7), now, 500) {
            assert!(s.timestamp <= now && now - s.timestamp < Duration::hours(24));
            let pkg: u32 = s.package_id["PKG".len()..].parse().unwrap();
            assert!((1000..=9999).contains(&pkg));
            let rfid: u32 = s.rfid_code["RFID-".len()..].parse().unwrap();
            assert!((100_000..=999_999).contains(&rfid));
            assert!((s.gps_lat - BASE_LAT).abs() <= GPS_SPREAD + 1e-6);
            assert!((s.gps_long - BASE_LONG).abs() <= GPS_SPREAD + 1e-6);
            assert!((2.0..=8.0).contains(&s.temperature_c));
            assert_eq!(round_to(s.temperature_c, 1), s.temperature_c);
        }
    }

    #[test]
    fn source_rows_are_ingestable() {
        let data = shipments(&mut Rng::new(3), fixed_now(), 4);
        let rows = parse_rows("rows.csv", &source_rows_csv(&data), &ColumnNames::default()).unwrap();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].source_id, data[0].package_id);
        assert_eq!(rows[0].category, "Temperature");
        assert!(rows[0].value.ends_with("°C"));
        assert_eq!(rows[1].category, "GPS");
        assert!(rows[1].value.contains(','));
        assert_eq!(rows[2].value, data[0].rfid_code);
        assert_eq!(pipeline::extract_magnitude(&rows[0].value), data[0].temperature_c);
    }

    #[test]
    fn json_uses_calendar_timestamps() {
        let data = vec![Shipment {
            timestamp: fixed_now(),
            package_id: "PKG1234".into(),
            gps_lat: 14.6,
            gps_long: 120.98,
            rfid_code: "RFID-482193".into(),
            temperature_c: 4.5,
        }];
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json[0]["timestamp"], "2024-06-10 06:13:20");
        assert_eq!(json[0]["temperature_c"], 4.5);
    }
}
