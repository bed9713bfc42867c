use crate::types::{
    ClimateIndexRecord, DatasetSnapshot, Observation, ObservationTable, Origin, PluviaError,
    PluviaResult, Station, StationTable,
};
use csv::{ReaderBuilder, StringRecord};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Field delimiter used by the source dataset's CSV files.
pub const DELIMITER: u8 = b';';

// Station metadata columns, as named in the source dataset.
pub const STATION_NAME_COL: &str = "nom_est";
pub const LATITUDE_COL: &str = "latitud_wgs84";
pub const LONGITUDE_COL: &str = "longitud_wgs84";
pub const ALTITUDE_COL: &str = "alt_est";
pub const MUNICIPALITY_COL: &str = "municipio";
pub const REGION_COL: &str = "depto_region";
pub const PERCENTAGE_COL: &str = "porc_datos";
pub const CELL_COL: &str = "celda_xy";

// Long-format observation columns.
pub const YEAR_COL: &str = "año";
pub const MONTH_COL: &str = "mes";
pub const PRECIPITATION_COL: &str = "precipitation";
pub const ORIGIN_COL: &str = "origin";

// Optional macroclimate-index columns riding in the observation file.
pub const ONI_COL: &str = "anomalia_oni";
pub const SOI_COL: &str = "soi";
pub const IOD_COL: &str = "iod";

/// Ingestion adapter for the semicolon-separated dataset files.
///
/// The loader builds a whole [`DatasetSnapshot`] or fails with a typed
/// error; it never hands back a partially loaded bundle, so a failed
/// reload leaves the caller's previous snapshot intact.
pub struct DatasetLoader;

impl DatasetLoader {
    /// Load station metadata and long-format observations into a fresh
    /// snapshot.
    pub fn load_snapshot<P: AsRef<Path>>(
        stations_csv: P,
        observations_csv: P,
    ) -> PluviaResult<DatasetSnapshot> {
        log::info!(
            "Loading dataset: stations from {}, observations from {}",
            stations_csv.as_ref().display(),
            observations_csv.as_ref().display()
        );
        let stations = Self::read_stations(stations_csv)?;
        let (observations, climate_indices) = Self::read_observations(observations_csv)?;
        log::info!(
            "Loaded {} stations, {} observations, {} climate-index rows",
            stations.len(),
            observations.len(),
            climate_indices.len()
        );
        Ok(DatasetSnapshot {
            stations,
            observations,
            climate_indices,
        })
    }

    /// Parse the station metadata CSV.
    pub fn read_stations<P: AsRef<Path>>(path: P) -> PluviaResult<StationTable> {
        let text = read_lossy(path.as_ref())?;
        Self::read_stations_from(text.as_bytes())
    }

    /// Parse station metadata from any reader.
    pub fn read_stations_from<R: std::io::Read>(reader: R) -> PluviaResult<StationTable> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let name_idx = required_column(&headers, STATION_NAME_COL)?;
        let lat_idx = required_column(&headers, LATITUDE_COL)?;
        let lon_idx = required_column(&headers, LONGITUDE_COL)?;
        let alt_idx = required_column(&headers, ALTITUDE_COL)?;
        let mun_idx = required_column(&headers, MUNICIPALITY_COL)?;
        let region_idx = required_column(&headers, REGION_COL)?;
        let pct_idx = required_column(&headers, PERCENTAGE_COL)?;
        let cell_idx = optional_column(&headers, CELL_COL);

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let name = field(&record, name_idx).trim().to_string();
            if name.is_empty() {
                log::warn!("Skipping station row {} with empty name", line + 2);
                continue;
            }
            let latitude = match parse_flexible(field(&record, lat_idx)) {
                Some(v) => v,
                None => {
                    log::warn!("Skipping station '{}': unparseable latitude", name);
                    continue;
                }
            };
            let longitude = match parse_flexible(field(&record, lon_idx)) {
                Some(v) => v,
                None => {
                    log::warn!("Skipping station '{}': unparseable longitude", name);
                    continue;
                }
            };
            rows.push(Station {
                name,
                latitude,
                longitude,
                altitude: parse_flexible(field(&record, alt_idx)),
                municipality: field(&record, mun_idx).trim().to_string(),
                region: field(&record, region_idx).trim().to_string(),
                cell_id: cell_idx.and_then(|idx| {
                    let cell = field(&record, idx).trim();
                    (!cell.is_empty()).then(|| cell.to_string())
                }),
                percent_complete: coerce_percent(field(&record, pct_idx)),
                elevation_dem: None,
            });
        }
        StationTable::from_rows(rows)
    }

    /// Parse the long-format observation CSV.
    pub fn read_observations<P: AsRef<Path>>(
        path: P,
    ) -> PluviaResult<(ObservationTable, Vec<ClimateIndexRecord>)> {
        let text = read_lossy(path.as_ref())?;
        Self::read_observations_from(text.as_bytes())
    }

    /// Parse long-format observations (plus any macroclimate-index
    /// columns) from any reader.
    pub fn read_observations_from<R: std::io::Read>(
        reader: R,
    ) -> PluviaResult<(ObservationTable, Vec<ClimateIndexRecord>)> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(DELIMITER)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let name_idx = required_column(&headers, STATION_NAME_COL)?;
        let year_idx = required_column(&headers, YEAR_COL)?;
        let month_idx = required_column(&headers, MONTH_COL)?;
        let value_idx = required_column(&headers, PRECIPITATION_COL)?;
        let origin_idx = optional_column(&headers, ORIGIN_COL);
        let oni_idx = optional_column(&headers, ONI_COL);
        let soi_idx = optional_column(&headers, SOI_COL);
        let iod_idx = optional_column(&headers, IOD_COL);

        let mut rows = Vec::new();
        let mut indices: BTreeMap<(i32, u32), ClimateIndexRecord> = BTreeMap::new();
        let mut skipped = 0usize;
        for record in csv_reader.records() {
            let record = record?;
            let station = field(&record, name_idx).trim().to_string();
            let year = field(&record, year_idx).trim().parse::<i32>();
            let month = field(&record, month_idx).trim().parse::<u32>();
            let (year, month) = match (year, month) {
                (Ok(y), Ok(m)) if !station.is_empty() && y > 0 && (1..=12).contains(&m) => (y, m),
                _ => {
                    skipped += 1;
                    continue;
                }
            };

            let origin = match origin_idx.map(|idx| field(&record, idx).trim().to_ascii_lowercase())
            {
                Some(tag) if tag == "interpolated" => Origin::Interpolated,
                _ => Origin::Original,
            };
            rows.push(Observation {
                station,
                year,
                month,
                value: parse_flexible(field(&record, value_idx)),
                origin,
            });

            if oni_idx.is_some() || soi_idx.is_some() || iod_idx.is_some() {
                indices.entry((year, month)).or_insert_with(|| ClimateIndexRecord {
                    year,
                    month,
                    oni: oni_idx.and_then(|idx| parse_flexible(field(&record, idx))),
                    soi: soi_idx.and_then(|idx| parse_flexible(field(&record, idx))),
                    iod: iod_idx.and_then(|idx| parse_flexible(field(&record, idx))),
                });
            }
        }
        if skipped > 0 {
            log::warn!("Skipped {} observation rows with unusable keys", skipped);
        }

        let table = ObservationTable::from_rows(rows)?;
        Ok((table, indices.into_values().collect()))
    }
}

/// Read a file tolerating non-UTF-8 bytes (the source data mixes
/// Latin-1 exports in); undecodable bytes become replacement chars.
fn read_lossy(path: &Path) -> PluviaResult<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn required_column(headers: &StringRecord, name: &str) -> PluviaResult<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| PluviaError::MissingColumn(name.to_string()))
}

fn optional_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("")
}

/// Parse a numeric cell that may use a decimal comma; empty or
/// malformed cells become `None`.
pub fn parse_flexible(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Coerce the percentage-of-data field into [0,100]; malformed input
/// normalizes to 0.
pub fn coerce_percent(raw: &str) -> f64 {
    parse_flexible(raw).map_or(0.0, |v| v.clamp(0.0, 100.0))
}
