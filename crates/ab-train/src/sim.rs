//! Fixed-step runner and gauge recording.

use serde::Serialize;
use tracing::warn;

use crate::error::{TrainError, TrainResult};
use crate::train::{Train, Unit};

/// Options for [`run_train`].
#[derive(Clone, Debug, PartialEq)]
pub struct SimOptions {
    /// Fixed time step (seconds)
    pub dt: f64,
    /// Final simulation time (seconds)
    pub t_end: f64,
    /// Maximum number of steps (safety limit)
    pub max_steps: usize,
    /// Record every N-th step (decimation)
    pub record_every: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            dt: 0.01,
            t_end: 60.0,
            max_steps: 1_000_000,
            record_every: 10,
        }
    }
}

impl SimOptions {
    fn validate(&self) -> TrainResult<()> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(TrainError::InvalidArg {
                what: "dt must be positive",
            });
        }
        if !(self.t_end >= 0.0 && self.t_end.is_finite()) {
            return Err(TrainError::InvalidArg {
                what: "t_end must be non-negative",
            });
        }
        if self.max_steps == 0 {
            return Err(TrainError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        if self.record_every == 0 {
            return Err(TrainError::InvalidArg {
                what: "record_every must be positive",
            });
        }
        Ok(())
    }
}

/// What a HUD shows for one unit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitGauges {
    pub valve: String,
    pub state: String,
    pub pipe_psig: f64,
    pub aux_psig: f64,
    pub cyl_psig: f64,
    pub brake_force: f64,
    pub cut_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_res_psig: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equalizing_res_psig: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_flow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_on: Option<bool>,
}

impl UnitGauges {
    pub fn read(unit: &Unit) -> Self {
        let brake = unit.brake();
        let loco = unit.as_locomotive();
        Self {
            valve: brake.valve_name().to_string(),
            state: brake.state_name(0).unwrap_or_default().to_string(),
            pipe_psig: brake.pipe_psig(),
            aux_psig: brake.aux_psig(),
            cyl_psig: brake.cyl_psig(),
            brake_force: brake.brake_force_multiplier(),
            cut_out: brake.is_cut_out(),
            main_res_psig: loco.map(|l| l.main_res_psig()),
            equalizing_res_psig: loco.map(|l| l.equalizing_res_psig()),
            air_flow: loco.map(|l| l.air_flow()),
            pump_on: loco.map(|l| l.pump_on()),
        }
    }
}

/// Recorded time series. `frames[i]` holds one entry per unit, in train order, at `t[i]`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SimRecord {
    pub t: Vec<f64>,
    pub frames: Vec<Vec<UnitGauges>>,
}

impl SimRecord {
    fn push(&mut self, t: f64, train: &Train) {
        self.t.push(t);
        self.frames.push(
            train
                .ids()
                .iter()
                .filter_map(|&id| train.get(id))
                .map(UnitGauges::read)
                .collect(),
        );
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Last recorded frame.
    pub fn last(&self) -> Option<(f64, &[UnitGauges])> {
        Some((*self.t.last()?, self.frames.last()?.as_slice()))
    }
}

/// Step `train` from t = 0 to `opts.t_end`.
///
/// `controller` runs before every step with the current time; it is where handle
/// positions, retainers and couplings get changed.
pub fn run_train<F>(train: &mut Train, opts: &SimOptions, mut controller: F) -> TrainResult<SimRecord>
where
    F: FnMut(f64, &mut Train),
{
    opts.validate()?;
    let stable = train.stable_dt();
    if opts.dt > stable {
        warn!(dt = opts.dt, stable, "time step exceeds conduit stability limit");
    }

    let mut record = SimRecord::default();
    record.push(0.0, train);

    let mut t = 0.0;
    let mut step = 0;
    while t < opts.t_end && step < opts.max_steps {
        controller(t, train);
        train.step(opts.dt);
        step += 1;
        t = step as f64 * opts.dt;

        if step % opts.record_every == 0 {
            record.push(t, train);
        }
    }

    // Always record final state
    if step % opts.record_every != 0 {
        record.push(t, train);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_options_defaults() {
        let opts = SimOptions::default();
        assert_eq!(opts.dt, 0.01);
        assert_eq!(opts.t_end, 60.0);
        assert_eq!(opts.record_every, 10);
    }

    #[test]
    fn rejects_bad_options() {
        let mut train = Train::new();
        for opts in [
            SimOptions { dt: 0.0, ..SimOptions::default() },
            SimOptions { t_end: -1.0, ..SimOptions::default() },
            SimOptions { max_steps: 0, ..SimOptions::default() },
            SimOptions { record_every: 0, ..SimOptions::default() },
        ] {
            assert!(matches!(
                run_train(&mut train, &opts, |_, _| {}),
                Err(TrainError::InvalidArg { .. })
            ));
        }
    }

    #[test]
    fn records_decimated_frames() {
        let mut train = Train::new();
        train.add_car("K").unwrap();
        train.charge(70.0);
        let opts = SimOptions {
            dt: 0.01,
            t_end: 1.0,
            record_every: 25,
            ..SimOptions::default()
        };
        let mut calls = 0;
        let record = run_train(&mut train, &opts, |_, _| calls += 1).unwrap();
        assert_eq!(calls, 100);
        // t = 0 plus every 25th of 100 steps.
        assert_eq!(record.len(), 5);
        let (t, frame) = record.last().unwrap();
        assert!((t - 1.0).abs() < 1e-12);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].valve, "K");
        assert!(frame[0].main_res_psig.is_none());
    }

    #[test]
    fn final_frame_always_recorded() {
        let mut train = Train::new();
        train.add_car("K").unwrap();
        let opts = SimOptions {
            dt: 0.01,
            t_end: 0.105,
            record_every: 4,
            ..SimOptions::default()
        };
        let record = run_train(&mut train, &opts, |_, _| {}).unwrap();
        // 11 steps: frames at 0, 4, 8 and the final 11.
        assert_eq!(record.len(), 4);
        assert!((record.t[3] - 0.11).abs() < 1e-12);
    }

    #[test]
    fn gauges_serialize_locomotive_fields() {
        let mut train = Train::new();
        let id = train
            .add_locomotive("H6", crate::LocomotiveParams::default())
            .unwrap();
        let gauges = UnitGauges::read(train.get(id).unwrap());
        let json = serde_json::to_value(&gauges).unwrap();
        assert_eq!(json["valve"], "H6");
        assert!(json["main_res_psig"].as_f64().unwrap() > 100.0);
        assert_eq!(json["pump_on"], false);

        let car = UnitGauges {
            main_res_psig: None,
            equalizing_res_psig: None,
            air_flow: None,
            pump_on: None,
            ..gauges
        };
        let json = serde_json::to_value(&car).unwrap();
        assert!(json.get("main_res_psig").is_none());
    }
}
