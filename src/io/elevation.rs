use crate::types::{PluviaError, PluviaResult, Station, StationTable};
use ndarray::Array2;
use std::path::Path;

/// A DEM loaded from an ESRI ASCII grid (`.asc`) file.
///
/// Row 0 of `values` is the northernmost row, as the format stores it.
/// Elevation enrichment is optional by contract: samplers return
/// `None` outside the grid or on nodata cells, and callers keep going.
#[derive(Debug, Clone)]
pub struct DemGrid {
    ncols: usize,
    nrows: usize,
    xllcorner: f64,
    yllcorner: f64,
    cellsize: f64,
    nodata: f64,
    values: Array2<f64>,
}

impl DemGrid {
    /// Parse an ESRI ASCII grid file.
    pub fn from_ascii_file<P: AsRef<Path>>(path: P) -> PluviaResult<Self> {
        log::info!("Reading DEM from: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_ascii(&text)
    }

    /// Parse ESRI ASCII grid content: a small header
    /// (`ncols`, `nrows`, `xllcorner`, `yllcorner`, `cellsize`,
    /// optional `nodata_value`) followed by row-major cell values from
    /// the north edge down.
    pub fn from_ascii(text: &str) -> PluviaResult<Self> {
        let mut ncols = None;
        let mut nrows = None;
        let mut xllcorner = None;
        let mut yllcorner = None;
        let mut cellsize = None;
        let mut nodata = -9999.0;
        let mut lines = text.lines().peekable();

        while let Some(line) = lines.peek() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                break;
            };
            let keyword = key.to_ascii_lowercase();
            let parse = |v: &str| {
                v.parse::<f64>().map_err(|_| {
                    PluviaError::InvalidFormat(format!("bad DEM header value '{}' for {}", v, key))
                })
            };
            match keyword.as_str() {
                "ncols" => ncols = Some(parse(value)? as usize),
                "nrows" => nrows = Some(parse(value)? as usize),
                "xllcorner" => xllcorner = Some(parse(value)?),
                "yllcorner" => yllcorner = Some(parse(value)?),
                "cellsize" => cellsize = Some(parse(value)?),
                "nodata_value" => nodata = parse(value)?,
                _ => break, // first data row
            }
            lines.next();
        }

        let (Some(ncols), Some(nrows), Some(xllcorner), Some(yllcorner), Some(cellsize)) =
            (ncols, nrows, xllcorner, yllcorner, cellsize)
        else {
            return Err(PluviaError::InvalidFormat(
                "incomplete ESRI ASCII grid header".to_string(),
            ));
        };
        if cellsize <= 0.0 || ncols == 0 || nrows == 0 {
            return Err(PluviaError::InvalidFormat(
                "degenerate ESRI ASCII grid dimensions".to_string(),
            ));
        }

        let mut cells = Vec::with_capacity(ncols * nrows);
        for line in lines {
            for token in line.split_whitespace() {
                let v = token.parse::<f64>().map_err(|_| {
                    PluviaError::InvalidFormat(format!("bad DEM cell value '{}'", token))
                })?;
                cells.push(v);
            }
        }
        if cells.len() != ncols * nrows {
            return Err(PluviaError::InvalidFormat(format!(
                "DEM has {} cells, expected {}x{}",
                cells.len(),
                nrows,
                ncols
            )));
        }
        let values = Array2::from_shape_vec((nrows, ncols), cells)
            .map_err(|e| PluviaError::Processing(format!("failed to shape DEM data: {}", e)))?;

        log::debug!(
            "DEM grid {}x{} at cellsize {}, origin ({}, {})",
            nrows,
            ncols,
            cellsize,
            xllcorner,
            yllcorner
        );
        Ok(Self {
            ncols,
            nrows,
            xllcorner,
            yllcorner,
            cellsize,
            nodata,
            values,
        })
    }

    /// Nearest-cell elevation at (longitude, latitude); `None` outside
    /// the grid or on a nodata cell.
    pub fn sample(&self, longitude: f64, latitude: f64) -> Option<f64> {
        let col = ((longitude - self.xllcorner) / self.cellsize).floor();
        let row_from_south = ((latitude - self.yllcorner) / self.cellsize).floor();
        if col < 0.0 || row_from_south < 0.0 {
            return None;
        }
        let (col, row_from_south) = (col as usize, row_from_south as usize);
        if col >= self.ncols || row_from_south >= self.nrows {
            return None;
        }
        let row = self.nrows - 1 - row_from_south;
        let value = self.values[[row, col]];
        (value != self.nodata).then_some(value)
    }
}

/// Fill `elevation_dem` for every station the grid covers, returning a
/// new table. Stations outside the grid keep `None` and are logged,
/// never failed.
pub fn enrich_stations(stations: &StationTable, dem: &DemGrid) -> StationTable {
    let mut enriched = Vec::with_capacity(stations.len());
    let mut misses = 0usize;
    for station in stations.rows() {
        let elevation = dem.sample(station.longitude, station.latitude);
        if elevation.is_none() {
            misses += 1;
            log::warn!(
                "Station '{}' at ({}, {}) is outside the DEM or on nodata",
                station.name,
                station.longitude,
                station.latitude
            );
        }
        enriched.push(Station {
            elevation_dem: elevation,
            ..station.clone()
        });
    }
    log::info!(
        "DEM enrichment: {}/{} stations sampled",
        stations.len() - misses,
        stations.len()
    );
    // Enrichment never changes names, so the table invariants hold.
    StationTable::from_sorted_rows(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: &str = "\
ncols 3
nrows 2
xllcorner -76.0
yllcorner 5.0
cellsize 1.0
NODATA_value -9999
100 200 300
400 -9999 600
";

    #[test]
    fn test_parse_and_sample() {
        let dem = DemGrid::from_ascii(GRID).unwrap();
        // Bottom row is the southern one.
        assert_eq!(dem.sample(-75.5, 5.5), Some(400.0));
        assert_eq!(dem.sample(-75.5, 6.5), Some(100.0));
        assert_eq!(dem.sample(-73.5, 6.5), Some(300.0));
    }

    #[test]
    fn test_nodata_and_out_of_bounds() {
        let dem = DemGrid::from_ascii(GRID).unwrap();
        assert_eq!(dem.sample(-74.5, 5.5), None); // nodata cell
        assert_eq!(dem.sample(-80.0, 5.5), None); // west of grid
        assert_eq!(dem.sample(-75.5, 8.0), None); // north of grid
    }

    #[test]
    fn test_header_errors() {
        assert!(DemGrid::from_ascii("ncols 2\nnrows 1\n1 2 3").is_err());
        assert!(DemGrid::from_ascii("garbage").is_err());
    }

    #[test]
    fn test_enrich_keeps_unsampled_stations() {
        let dem = DemGrid::from_ascii(GRID).unwrap();
        let stations = StationTable::from_rows(vec![
            Station {
                name: "in".to_string(),
                latitude: 6.5,
                longitude: -75.5,
                altitude: Some(90.0),
                municipality: "M".to_string(),
                region: "R".to_string(),
                cell_id: None,
                percent_complete: 50.0,
                elevation_dem: None,
            },
            Station {
                name: "out".to_string(),
                latitude: 20.0,
                longitude: -75.5,
                altitude: None,
                municipality: "M".to_string(),
                region: "R".to_string(),
                cell_id: None,
                percent_complete: 50.0,
                elevation_dem: None,
            },
        ])
        .unwrap();
        let enriched = enrich_stations(&stations, &dem);
        assert_eq!(enriched.get("in").unwrap().elevation_dem, Some(100.0));
        assert_eq!(enriched.get("out").unwrap().elevation_dem, None);
    }
}
