//! Scenario files: a consist, a handle schedule and run options.

use std::collections::BTreeMap;
use std::path::Path;

use ab_train::{
    End, LocomotiveParams, SettingValue, SimOptions, Train, TrainError, Unit, UnitId,
};
use ab_valves::ValveError;
use serde::Deserialize;
use tracing::{info, warn};

pub type CliResult<T> = Result<T, CliError>;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Train(#[from] TrainError),

    #[error(transparent)]
    Valve(#[from] ValveError),

    #[error("Invalid scenario: {what}")]
    Invalid { what: String },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub run: RunSpec,
    /// Every unit is charged to this gauge pressure before the run. Omit to start
    /// with an empty train.
    #[serde(default)]
    pub charge_psig: Option<f64>,
    /// Head end first.
    pub units: Vec<UnitSpec>,
    #[serde(default)]
    pub schedule: Vec<Event>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSpec {
    pub dt: f64,
    pub t_end: f64,
    pub record_every: usize,
}

impl Default for RunSpec {
    fn default() -> Self {
        let opts = SimOptions::default();
        Self {
            dt: opts.dt,
            t_end: opts.t_end,
            record_every: opts.record_every,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum UnitSpec {
    Car {
        valve: String,
        #[serde(default = "one")]
        count: usize,
        #[serde(default)]
        settings: BTreeMap<String, SettingValue>,
    },
    Locomotive {
        valve: String,
        #[serde(default)]
        params: LocomotiveParams,
        #[serde(default)]
        settings: BTreeMap<String, SettingValue>,
    },
}

fn one() -> usize {
    1
}

/// Something the engineer does at time `t`. Handle events act on the lead
/// locomotive.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Event {
    pub t: f64,
    #[serde(default)]
    pub auto: Option<f64>,
    #[serde(default)]
    pub ind: Option<f64>,
    #[serde(default)]
    pub bail_off: bool,
    /// Open the rear angle cock of the last unit.
    #[serde(default)]
    pub open_rear: bool,
}

impl Scenario {
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> CliResult<Self> {
        let scenario: Scenario = serde_yaml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> CliResult<()> {
        if self.units.is_empty() {
            return Err(invalid("scenario has no units"));
        }
        if self
            .units
            .iter()
            .any(|u| matches!(u, UnitSpec::Car { count: 0, .. }))
        {
            return Err(invalid("car count must be at least 1"));
        }
        let needs_loco = self
            .schedule
            .iter()
            .any(|e| e.auto.is_some() || e.ind.is_some() || e.bail_off);
        let has_loco = self
            .units
            .iter()
            .any(|u| matches!(u, UnitSpec::Locomotive { .. }));
        if needs_loco && !has_loco {
            return Err(invalid("handle events need a locomotive"));
        }
        if let Some(e) = self.schedule.iter().find(|e| !e.t.is_finite() || e.t < 0.0) {
            return Err(invalid(format!("invalid event time {}", e.t)));
        }
        Ok(())
    }

    pub fn sim_options(&self) -> SimOptions {
        SimOptions {
            dt: self.run.dt,
            t_end: self.run.t_end,
            record_every: self.run.record_every,
            ..SimOptions::default()
        }
    }

    /// Assemble the consist, apply settings and charge it.
    pub fn build(&self) -> CliResult<Consist> {
        let mut train = Train::new();
        let mut lead = None;
        for spec in &self.units {
            match spec {
                UnitSpec::Car {
                    valve,
                    count,
                    settings,
                } => {
                    for _ in 0..*count {
                        let id = train.add_car(valve)?;
                        couple_to_tail(&mut train, id)?;
                        apply_settings(&mut train, id, settings)?;
                    }
                }
                UnitSpec::Locomotive {
                    valve,
                    params,
                    settings,
                } => {
                    let id = train.add_locomotive(valve, params.clone())?;
                    couple_to_tail(&mut train, id)?;
                    apply_settings(&mut train, id, settings)?;
                    lead.get_or_insert(id);
                }
            }
        }
        if let Some(psig) = self.charge_psig {
            train.charge(psig);
        }
        info!(
            scenario = self.name.as_deref().unwrap_or("unnamed"),
            units = train.len(),
            "consist assembled"
        );

        let mut schedule = self.schedule.clone();
        schedule.sort_by(|a, b| a.t.total_cmp(&b.t));
        Ok(Consist {
            train,
            lead,
            schedule,
            next_event: 0,
        })
    }
}

fn invalid(what: impl Into<String>) -> CliError {
    CliError::Invalid { what: what.into() }
}

fn couple_to_tail(train: &mut Train, id: UnitId) -> CliResult<()> {
    let ids = train.ids();
    if ids.len() >= 2 {
        let tail = ids[ids.len() - 2];
        train.couple(tail, id)?;
    }
    Ok(())
}

fn apply_settings(
    train: &mut Train,
    id: UnitId,
    settings: &BTreeMap<String, SettingValue>,
) -> CliResult<()> {
    let unit = train.get_mut(id).ok_or(TrainError::UnknownUnit)?;
    for (key, value) in settings {
        unit.apply_setting(key, value)?;
    }
    Ok(())
}

/// A built train plus the events still to fire.
pub struct Consist {
    pub train: Train,
    lead: Option<UnitId>,
    schedule: Vec<Event>,
    next_event: usize,
}

impl Consist {
    /// Fire every event due at `t`.
    pub fn control(&mut self, t: f64, train: &mut Train) {
        while let Some(event) = self.schedule.get(self.next_event) {
            if event.t > t {
                break;
            }
            self.next_event += 1;
            fire(event, self.lead, train);
        }
    }

    /// Split into the train and a controller closure for the runner.
    pub fn into_parts(mut self) -> (Train, impl FnMut(f64, &mut Train)) {
        let train = std::mem::take(&mut self.train);
        (train, move |t, train: &mut Train| self.control(t, train))
    }
}

fn fire(event: &Event, lead: Option<UnitId>, train: &mut Train) {
    let loco = match lead {
        Some(id) => train.get_mut(id).and_then(Unit::as_locomotive_mut),
        None => None,
    };
    if let Some(loco) = loco {
        if let Some(auto) = event.auto {
            loco.set_auto_control(auto);
        }
        if let Some(ind) = event.ind {
            loco.set_ind_control(ind);
        }
        if event.bail_off {
            loco.bail_off();
        }
    }
    if event.open_rear {
        if let Some(&tail) = train.ids().last() {
            if let Err(err) = train.set_coupling_open(tail, End::Next, true) {
                warn!(%err, "could not open the rear angle cock");
            }
        }
    }
    info!(t = event.t, "event fired");
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: test
run: { dt: 0.01, t_end: 5.0, record_every: 50 }
charge_psig: 90
units:
  - kind: locomotive
    valve: H6
    params: { feed_psig: 90 }
  - kind: car
    valve: AB
    count: 3
    settings: { retainer: HP, numcylinders: 2 }
schedule:
  - { t: 2.0, ind: 1.0 }
  - { t: 1.0, auto: 0.5 }
"#;

    #[test]
    fn parses_and_builds() {
        let scenario = Scenario::from_yaml(SAMPLE).unwrap();
        assert_eq!(scenario.units.len(), 2);
        let consist = scenario.build().unwrap();
        let train = &consist.train;
        assert_eq!(train.len(), 4);
        let ids = train.ids();
        assert_eq!(train.consist(ids[0]).unwrap(), ids);
        let last = train.brake(ids[3]).unwrap();
        assert_eq!(last.retainer_name(), Some("HP"));
        assert_eq!(last.rigging().num_cylinders, 2);
        assert!((last.pipe_psig() - 90.0).abs() < 1e-9);
        // Sorted by time.
        assert_eq!(consist.schedule[0].t, 1.0);
    }

    #[test]
    fn events_fire_in_order() {
        let mut consist = Scenario::from_yaml(SAMPLE).unwrap().build().unwrap();
        let mut train = std::mem::take(&mut consist.train);
        let lead = consist.lead.unwrap();

        consist.control(0.5, &mut train);
        let loco = train.locomotive_mut(lead).unwrap();
        assert_eq!(loco.auto_control(), 0.0);

        consist.control(1.5, &mut train);
        let loco = train.locomotive_mut(lead).unwrap();
        assert_eq!(loco.auto_control(), 0.5);
        assert_eq!(loco.ind_control(), 0.0);

        consist.control(2.0, &mut train);
        assert_eq!(train.locomotive_mut(lead).unwrap().ind_control(), 1.0);
    }

    #[test]
    fn rejects_bad_scenarios() {
        assert!(matches!(
            Scenario::from_yaml("units: []"),
            Err(CliError::Invalid { .. })
        ));
        let no_loco = "units: [{ kind: car, valve: K }]\nschedule: [{ t: 1.0, auto: 1.0 }]";
        assert!(matches!(
            Scenario::from_yaml(no_loco),
            Err(CliError::Invalid { .. })
        ));
        assert!(matches!(
            Scenario::from_yaml("units: [{ kind: wagon, valve: K }]"),
            Err(CliError::Yaml(_))
        ));
    }

    #[test]
    fn bad_setting_is_reported() {
        let yaml = "units: [{ kind: car, valve: K, settings: { numcylinders: 40 } }]";
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert!(matches!(
            scenario.build(),
            Err(CliError::Train(TrainError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn open_rear_vents_the_tail() {
        let mut consist = Scenario::from_yaml(SAMPLE).unwrap().build().unwrap();
        let mut train = std::mem::take(&mut consist.train);
        let tail = *train.ids().last().unwrap();
        assert!(!train.brake(tail).unwrap().coupling(End::Next).open);

        let event = Event {
            t: 0.0,
            auto: None,
            ind: None,
            bail_off: false,
            open_rear: true,
        };
        fire(&event, consist.lead, &mut train);
        assert!(train.brake(tail).unwrap().coupling(End::Next).open);

        // Nothing to open on an empty train.
        fire(&event, None, &mut Train::new());
    }
}
