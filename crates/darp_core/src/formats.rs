//! Parsers for the five file formats a scenario loads from: `.rnet`, `.edges`, `.gtree`
//! (opaque, not parsed here), `.instance`, and `Options` (TOML).
//!
//! Grounded in `original_source/src/base/file.cpp`'s `ReadNodes`/`ReadEdges`/
//! `ReadProblemInstance` free functions: positional, whitespace-delimited readers, not
//! `serde`-derived, since none of these formats are keyed records. `Options` is the one
//! format that does derive `serde::Deserialize` (see `options.rs`), loaded here from a
//! TOML config file the way a real deployment would hand the engine its run parameters.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{FormatError, FormatResult};
use crate::ids::{Meters, Tick};
use crate::options::Options;
use crate::trip::Point;

/// One row of a `.rnet` file: `edge_id, from, to, from_lng, from_lat, to_lng, to_lat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RnetRow {
    pub edge_id: u32,
    pub from: u32,
    pub to: u32,
    pub from_point: Point,
    pub to_point: Point,
}

/// Read a `.rnet` file: one edge per line, no header.
pub fn read_rnet(path: impl AsRef<Path>) -> FormatResult<Vec<RnetRow>> {
    let text = read_to_string("rnet", path.as_ref())?;
    let mut rows = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 7 {
            return Err(malformed("rnet", i, "expected 7 whitespace-delimited fields"));
        }
        let parse_u32 = |s: &str| parse::<u32>("rnet", i, s);
        let parse_f64 = |s: &str| parse::<f64>("rnet", i, s);
        rows.push(RnetRow {
            edge_id: parse_u32(fields[0])?,
            from: parse_u32(fields[1])?,
            to: parse_u32(fields[2])?,
            from_point: Point {
                lng: parse_f64(fields[3])?,
                lat: parse_f64(fields[4])?,
            },
            to_point: Point {
                lng: parse_f64(fields[5])?,
                lat: parse_f64(fields[6])?,
            },
        });
    }
    Ok(rows)
}

/// One row of an `.edges` file: `from, to, weight`, undirected, integer meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRow {
    pub from: u32,
    pub to: u32,
    pub weight: Meters,
}

/// Read an `.edges` file: a header line (skipped), then `from to weight` per line.
pub fn read_edges(path: impl AsRef<Path>) -> FormatResult<Vec<EdgeRow>> {
    let text = read_to_string("edges", path.as_ref())?;
    let mut lines = text.lines();
    lines.next(); // header
    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(malformed("edges", i + 1, "expected `from to weight`"));
        }
        rows.push(EdgeRow {
            from: parse::<u32>("edges", i + 1, fields[0])?,
            to: parse::<u32>("edges", i + 1, fields[1])?,
            weight: parse::<Meters>("edges", i + 1, fields[2])?,
        });
    }
    Ok(rows)
}

/// One row of an `.instance` file: `id, origin, destination, load, early, late`.
/// Negative `load` marks a vehicle (capacity `|load|`); positive marks a customer.
/// Taxi-mode vehicles use `destination = -1`, `late = -1` as sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceRow {
    pub id: u32,
    pub origin: u32,
    /// `None` for the taxi-mode `-1` sentinel.
    pub destination: Option<u32>,
    pub load: i32,
    pub early: Tick,
    /// `None` for the taxi-mode `-1` sentinel.
    pub late: Option<Tick>,
}

/// A parsed problem instance: header metadata plus trips grouped by release time,
/// restoring the original's `ProblemInstance::trips: Map<SimTime, TripGroup>` grouping
/// so the engine can broadcast an entire batch of same-`early` releases at once.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemInstance {
    pub name: String,
    pub road_network_name: String,
    pub vehicle_count: usize,
    pub customer_count: usize,
    pub trips: BTreeMap<Tick, Vec<InstanceRow>>,
}

/// Read a `.instance` file: header `name road_network_name VEHICLES m CUSTOMERS n`,
/// a blank line, a column-header row, then one trip per line.
pub fn read_instance(path: impl AsRef<Path>) -> FormatResult<ProblemInstance> {
    let text = read_to_string("instance", path.as_ref())?;
    let mut lines = text.lines();

    let header = lines
        .next()
        .ok_or_else(|| malformed("instance", 0, "missing header line"))?;
    let fields: Vec<&str> = header.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(malformed(
            "instance",
            0,
            "expected `name road_network_name VEHICLES <m> CUSTOMERS <n>`",
        ));
    }
    let name = fields[0].to_string();
    let road_network_name = fields[1].to_string();
    let vehicle_count = parse::<usize>("instance", 0, fields[2])?;
    let customer_count = parse::<usize>("instance", 0, fields[4])?;

    lines.next(); // blank line
    lines.next(); // column-header row

    let mut trips: BTreeMap<Tick, Vec<InstanceRow>> = BTreeMap::new();
    let mut count = 0usize;
    for (i, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(malformed(
                "instance",
                i + 2,
                "expected `id origin destination load early late`",
            ));
        }
        let destination: i64 = parse("instance", i + 2, fields[2])?;
        let late: i64 = parse("instance", i + 2, fields[5])?;
        let row = InstanceRow {
            id: parse("instance", i + 2, fields[0])?,
            origin: parse("instance", i + 2, fields[1])?,
            destination: if destination < 0 { None } else { Some(destination as u32) },
            load: parse("instance", i + 2, fields[3])?,
            early: parse("instance", i + 2, fields[4])?,
            late: if late < 0 { None } else { Some(late as Tick) },
        };
        trips.entry(row.early).or_default().push(row);
        count += 1;
    }

    if count != vehicle_count + customer_count {
        return Err(FormatError::Malformed {
            format: "instance",
            row: 0,
            reason: format!(
                "header declares {} vehicles + {} customers but {} trip rows were read",
                vehicle_count, customer_count, count
            ),
        });
    }

    Ok(ProblemInstance {
        name,
        road_network_name,
        vehicle_count,
        customer_count,
        trips,
    })
}

/// Load [`Options`] from a TOML config file.
pub fn read_options(path: impl AsRef<Path>) -> FormatResult<Options> {
    let text = read_to_string("options", path.as_ref())?;
    toml::from_str(&text).map_err(|e| FormatError::Malformed {
        format: "options",
        row: 0,
        reason: e.to_string(),
    })
}

fn read_to_string(format: &'static str, path: &Path) -> FormatResult<String> {
    fs::read_to_string(path).map_err(|source| FormatError::Io { format, source })
}

fn malformed(format: &'static str, row: usize, reason: &str) -> FormatError {
    FormatError::Malformed {
        format,
        row,
        reason: reason.to_string(),
    }
}

fn parse<T: std::str::FromStr>(format: &'static str, row: usize, field: &str) -> FormatResult<T> {
    field.parse().map_err(|_| {
        malformed(format, row, &format!("could not parse `{field}`"))
    })
}
