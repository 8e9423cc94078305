//! Run configuration.
//!
//! One `Options` record per run, covering both the file paths a scenario loads from and
//! the tunables that shape stepper/harness behavior. Grouped as a single `serde`-
//! deserializable struct, threaded through `Engine`/`Harness` as a plain owned value —
//! no global resource table to stash it in.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::ids::Meters;

fn default_time_multiplier() -> u32 {
    1
}

fn default_vehicle_speed() -> Meters {
    10
}

fn default_matching_period() -> u64 {
    30
}

fn default_gps_timing() -> u64 {
    1
}

/// Run options: input/output paths plus the knobs that shape a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    pub path_to_roadnet: PathBuf,
    pub path_to_edges: PathBuf,
    #[serde(default)]
    pub path_to_gtree: Option<PathBuf>,
    pub path_to_problem: PathBuf,
    #[serde(default)]
    pub path_to_solution: Option<PathBuf>,
    #[serde(default)]
    pub path_to_dataout: Option<PathBuf>,

    /// Ticks of simulation time per real second.
    #[serde(default = "default_time_multiplier")]
    pub time_multiplier: u32,
    /// Meters a vehicle covers per tick.
    #[serde(default = "default_vehicle_speed")]
    pub vehicle_speed: Meters,
    /// Ticks after release before an unmatched, unassigned customer is canceled.
    #[serde(default = "default_matching_period")]
    pub matching_period: u64,
    /// Reject commits whose new route cost grows beyond `STRICT_MODE_COST_MULTIPLIER`
    /// times the pre-commit cost.
    #[serde(default)]
    pub strict_mode: bool,
    /// All trips release at tick 0, ignoring their `early` field.
    #[serde(default)]
    pub static_mode: bool,
    /// Ticks between telemetry (`V` log line) writes for a given vehicle.
    #[serde(default = "default_gps_timing")]
    pub gps_timing: u64,
}

impl Options {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.path_to_roadnet.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("path_to_roadnet"));
        }
        if self.path_to_edges.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("path_to_edges"));
        }
        if self.path_to_problem.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("path_to_problem"));
        }
        if self.vehicle_speed <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "vehicle_speed",
                reason: "must be positive".into(),
            });
        }
        if self.time_multiplier == 0 {
            return Err(ConfigError::InvalidValue {
                field: "time_multiplier",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Options {
        Options {
            path_to_roadnet: "net.rnet".into(),
            path_to_edges: "net.edges".into(),
            path_to_gtree: None,
            path_to_problem: "prob.instance".into(),
            path_to_solution: None,
            path_to_dataout: None,
            time_multiplier: 1,
            vehicle_speed: 10,
            matching_period: 30,
            strict_mode: false,
            static_mode: false,
            gps_timing: 1,
        }
    }

    #[test]
    fn rejects_zero_speed() {
        let mut opts = base();
        opts.vehicle_speed = 0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn accepts_defaults() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_empty_roadnet_path() {
        let mut opts = base();
        opts.path_to_roadnet = "".into();
        assert!(matches!(opts.validate(), Err(ConfigError::MissingField("path_to_roadnet"))));
    }
}
