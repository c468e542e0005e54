use serde::{Deserialize, Serialize};

use super::detector::{Detector, SignalKind};
use super::event::DetectorData;

/// Straight cabling, used by the H007 online monitor and the O19 run
#[cfg(target_family = "windows")]
fn straight_cabling() -> &'static str {
    include_str!("data\\straight_cabling.csv")
}

#[cfg(target_family = "unix")]
fn straight_cabling() -> &'static str {
    include_str!("data/straight_cabling.csv")
}

/// Cabling of the 28Si run, where part of ADC 2 was not wired straight through
#[cfg(target_family = "windows")]
fn si28_cabling() -> &'static str {
    include_str!("data\\si28_cabling.csv")
}

#[cfg(target_family = "unix")]
fn si28_cabling() -> &'static str {
    include_str!("data/si28_cabling.csv")
}

/// The positional layout of a triggered event body.
///
/// Every event starts with `aux_words` auxiliary ADC words and `time_words` time-reference
/// words before the five ADC blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLayout {
    pub aux_words: usize,
    pub time_words: usize,
    /// Which time-reference word (if any) is the array time signal
    pub array_time_word: Option<usize>,
}

/// Where the beam and recoil monitors sit among the auxiliary and time-reference words.
///
/// All fields are word indices, zero based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorLayout {
    /// E and dE of the beam monitor telescope
    pub e0: usize,
    pub de0: usize,
    /// The six luminosity monitors
    pub elum: [usize; 6],
    /// (dE, E) of the four recoil telescopes; E is the CsI
    pub recoil: [(usize, usize); 4],
    /// Time words of dE0 - RF and ELUM - RF
    pub de0_rf: usize,
    pub elum_rf: usize,
    /// Time word of array - RF, for variants which gate the array on the recoils
    pub array_tac: Option<usize>,
}

const MONITORS: MonitorLayout = MonitorLayout {
    e0: 0,
    de0: 1,
    elum: [2, 3, 4, 5, 6, 7],
    recoil: [(8, 9), (10, 11), (12, 13), (14, 15)],
    de0_rf: 0,
    elum_rf: 1,
    array_tac: None,
};

const O19_MONITORS: MonitorLayout = MonitorLayout {
    array_tac: Some(3),
    ..MONITORS
};

/// A fixed correction for a single miswired detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelOverride {
    /// The XF signal is lost; rebuild it from E after rescaling XN
    RebuildFarFromEnergy { detector: usize, xn_scale: f32 },
}

impl ChannelOverride {
    pub fn detector(&self) -> usize {
        match self {
            Self::RebuildFarFromEnergy { detector, .. } => *detector,
        }
    }

    /// Apply the correction to the unpacked data of one event
    pub fn apply(&self, data: &mut DetectorData) {
        match self {
            Self::RebuildFarFromEnergy { detector, xn_scale } => {
                let det = match Detector::new(*detector) {
                    Some(d) => d,
                    None => return,
                };
                let e = data.get(det, SignalKind::Energy);
                let xn = xn_scale * data.get(det, SignalKind::XNear);
                data.set(det, SignalKind::XNear, xn);
                data.set(det, SignalKind::XFar, e - xn);
            }
        }
    }
}

const SI28_OVERRIDES: [ChannelOverride; 1] = [ChannelOverride::RebuildFarFromEnergy {
    detector: 12,
    xn_scale: 1.368,
}];

/// The experiments this sort code has been configured for.
///
/// The decode logic is shared; a variant only selects data (layout, cabling, defaults).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExperimentVariant {
    /// Online monitor of the H007 run: raw, monitor, and calibrated spectra without kinematics
    H007,
    /// The O19 run with the recoil and luminosity monitors
    O19,
    /// The 28Si run, with a single TAC time reference
    #[default]
    Si28,
}

impl ExperimentVariant {
    pub fn layout(&self) -> EventLayout {
        match self {
            Self::H007 | Self::O19 => EventLayout {
                aux_words: 16,
                time_words: 6,
                array_time_word: None,
            },
            Self::Si28 => EventLayout {
                aux_words: 0,
                time_words: 1,
                array_time_word: Some(0),
            },
        }
    }

    /// Monitor words, for the variants which record them
    pub fn monitors(&self) -> Option<MonitorLayout> {
        match self {
            Self::H007 => Some(MONITORS),
            Self::O19 => Some(O19_MONITORS),
            Self::Si28 => None,
        }
    }

    /// The bundled cabling table in CSV form
    pub fn default_cabling(&self) -> &'static str {
        match self {
            Self::H007 | Self::O19 => straight_cabling(),
            Self::Si28 => si28_cabling(),
        }
    }

    pub fn overrides(&self) -> &'static [ChannelOverride] {
        match self {
            Self::H007 | Self::O19 => &[],
            Self::Si28 => &SI28_OVERRIDES,
        }
    }

    /// Software threshold applied to E, XF, and XN
    pub fn default_low_threshold(&self) -> f32 {
        match self {
            Self::H007 | Self::O19 => 0.0,
            Self::Si28 => 75.0,
        }
    }

    /// Software threshold on the array time, if the variant has one
    pub fn default_min_time(&self) -> Option<f32> {
        match self {
            Self::H007 | Self::O19 => None,
            Self::Si28 => Some(28.0),
        }
    }
}
