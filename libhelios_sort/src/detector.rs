use super::constants::{DETECTORS_PER_SIDE, NUMBER_OF_DETECTORS};
use super::error::SignalKindError;
use std::fmt::Display;
use std::str::FromStr;

/// The three signals read out from each position-sensitive detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Energy,
    XFar,
    XNear,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::Energy, SignalKind::XFar, SignalKind::XNear];

    /// Column of this signal in the per-event detector array
    pub fn index(&self) -> usize {
        match self {
            Self::Energy => 0,
            Self::XFar => 1,
            Self::XNear => 2,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Energy => "e",
            Self::XFar => "xf",
            Self::XNear => "xn",
        }
    }
}

impl FromStr for SignalKind {
    type Err = SignalKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "e" => Ok(Self::Energy),
            "xf" => Ok(Self::XFar),
            "xn" => Ok(Self::XNear),
            _ => Err(SignalKindError::InvalidKeyword(s.to_string())),
        }
    }
}

impl Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Index of a physical detector in the array, always in 0..NUMBER_OF_DETECTORS
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Detector(usize);

impl Detector {
    /// Returns None if the index is not a detector of the array
    pub fn new(index: usize) -> Option<Self> {
        if index < NUMBER_OF_DETECTORS {
            Some(Self(index))
        } else {
            None
        }
    }

    pub fn index(&self) -> usize {
        self.0
    }

    /// Detectors are numbered from 1 in calibration files and histogram names
    pub fn number(&self) -> usize {
        self.0 + 1
    }

    /// Position of the detector along its side, counted from the target (1..=6)
    pub fn side_position(&self) -> usize {
        DETECTORS_PER_SIDE - (self.0 % DETECTORS_PER_SIDE)
    }

    pub fn all() -> impl Iterator<Item = Detector> {
        (0..NUMBER_OF_DETECTORS).map(Detector)
    }
}

impl Display for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A detector together with one of its signals; the target of a readout channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetectorSignal {
    pub detector: Detector,
    pub signal: SignalKind,
}

impl DetectorSignal {
    pub fn new(detector: Detector, signal: SignalKind) -> Self {
        Self { detector, signal }
    }
}
