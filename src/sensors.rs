use crate::reading::ReadingRange;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationScenario {
    #[default]
    Resting,
    Normal,
    Exercise,
}

#[derive(Debug, Error)]
#[error("unknown scenario '{0}', expected resting, normal or exercise")]
pub struct UnknownScenario(pub String);

impl FromStr for SimulationScenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "resting" => Ok(Self::Resting),
            "normal" => Ok(Self::Normal),
            "exercise" => Ok(Self::Exercise),
            _ => Err(UnknownScenario(s.to_string())),
        }
    }
}

impl fmt::Display for SimulationScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resting => "resting",
            Self::Normal => "normal",
            Self::Exercise => "exercise",
        };
        f.write_str(name)
    }
}

/// Reading ranges a scenario produces on connect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScenarioProfile {
    pub heart_rate: ReadingRange,
    pub gsr: ReadingRange,
}

// Indexed by `SimulationScenario as usize`. Resting and Normal share the
// heart-rate band; Resting carries the elevated GSR of hyperhidrosis.
const PROFILES: [ScenarioProfile; 3] = [
    // Resting
    ScenarioProfile {
        heart_rate: ReadingRange::new(60.0, 85.0, 0),
        gsr: ReadingRange::new(7.0, 9.5, 2),
    },
    // Normal
    ScenarioProfile {
        heart_rate: ReadingRange::new(60.0, 85.0, 0),
        gsr: ReadingRange::new(0.5, 2.0, 2),
    },
    // Exercise
    ScenarioProfile {
        heart_rate: ReadingRange::new(110.0, 140.0, 0),
        gsr: ReadingRange::new(6.0, 8.5, 2),
    },
];

impl SimulationScenario {
    pub fn profile(self) -> &'static ScenarioProfile {
        &PROFILES[self as usize]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub heart_rate: f64,
    pub gsr: f64,
}

impl SensorReading {
    pub fn generate<R: Rng + ?Sized>(scenario: SimulationScenario, rng: &mut R) -> Self {
        let profile = scenario.profile();
        Self {
            heart_rate: profile.heart_rate.sample(rng),
            gsr: profile.gsr.sample(rng),
        }
    }
}

/// Handle for one scheduled Connecting -> Connected transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectTicket {
    pub generation: u64,
    pub scenario: SimulationScenario,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Disconnected,
    /// Entered (or re-entered) Connecting; the caller schedules `ticket`.
    Connecting(ConnectTicket),
}

/// Heart-rate and GSR sensors, driven in lockstep.
///
/// Both sensors share one status field, so they can never disagree. A
/// reading exists exactly while that status is `Connected`.
#[derive(Debug, Default)]
pub struct SensorEngine {
    status: SensorStatus,
    scenario: SimulationScenario,
    reading: Option<SensorReading>,
    connected_at: Option<DateTime<Utc>>,
    generation: u64,
}

impl SensorEngine {
    pub fn new(scenario: SimulationScenario) -> Self {
        Self {
            scenario,
            ..Self::default()
        }
    }

    pub fn hr_status(&self) -> SensorStatus {
        self.status
    }

    pub fn gsr_status(&self) -> SensorStatus {
        self.status
    }

    pub fn scenario(&self) -> SimulationScenario {
        self.scenario
    }

    pub fn reading(&self) -> Option<SensorReading> {
        self.reading
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.connected_at
    }

    pub fn select_scenario(&mut self, scenario: SimulationScenario) {
        self.scenario = scenario;
    }

    /// Connected sensors unplug immediately. Anything else (re)starts a
    /// connection cycle; any earlier ticket becomes stale.
    pub fn toggle_connect(&mut self) -> Toggle {
        if self.status == SensorStatus::Connected {
            self.status = SensorStatus::Disconnected;
            self.reading = None;
            self.connected_at = None;
            return Toggle::Disconnected;
        }

        self.generation += 1;
        self.status = SensorStatus::Connecting;
        Toggle::Connecting(ConnectTicket {
            generation: self.generation,
            scenario: self.scenario,
        })
    }

    /// Applies a scheduled transition. Returns `None` when the ticket is stale.
    pub fn complete_connect<R: Rng + ?Sized>(
        &mut self,
        ticket: ConnectTicket,
        rng: &mut R,
    ) -> Option<SensorReading> {
        if self.status != SensorStatus::Connecting || ticket.generation != self.generation {
            return None;
        }

        let reading = SensorReading::generate(ticket.scenario, rng);
        self.status = SensorStatus::Connected;
        self.reading = Some(reading);
        self.connected_at = Some(Utc::now());
        Some(reading)
    }
}
