use fxhash::FxHashMap;
use std::fmt::Display;

use super::detector::Detector;

/// The kinds of spectra the sorter produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistogramCategory {
    /// Raw (value, channel) of one ADC
    Adc,
    /// Raw (value, word) of the auxiliary words
    Aux,
    /// Raw (value, word) of the time-reference words
    Tdc,
    /// (XN, XF) of one detector, or of all detectors
    XfXn,
    /// E vs detector number
    Energy,
    /// XF vs detector number
    XFar,
    /// XN vs detector number
    XNear,
    /// T vs detector number
    Time,
    /// (x, E) of one detector
    EnergyX,
    /// (XF + XN, E) of one detector
    EnergySum,
    /// (Z, E) of the whole array
    EnergyZ,
    /// (Z, E) of hits inside the E-Z gate
    EnergyZGated,
    /// Excitation energy
    QValue,
    /// Center-of-mass energy
    Ecm,
    /// Center-of-mass angle
    ThetaCm,
    /// (Z, T) of the whole array
    TimeZ,
    /// (E0, dE0) of the beam monitor
    BeamMonitor,
    /// (E0, dE0 - RF)
    BeamMonitorRf,
    /// Energy of one luminosity monitor
    Elum,
    /// (energy, ELUM - RF) of one luminosity monitor
    ElumRf,
    /// (dE, E) of one recoil telescope
    Recoil,
    /// (E, TAC) of the array, or of hits in coincidence with one recoil CsI
    TacEnergy,
    /// TacEnergy for hits inside the E-Z gate
    TacEnergyGated,
    /// (Z, E) of gated hits with a good TAC and a good recoil CsI, any or one
    EnergyZCoincidence,
}

impl HistogramCategory {
    fn base_name(&self) -> &'static str {
        match self {
            Self::Adc => "hADC",
            Self::Aux => "hAUX",
            Self::Tdc => "hTDC",
            Self::XfXn => "hXFXN",
            Self::Energy => "hE",
            Self::XFar => "hXF",
            Self::XNear => "hXN",
            Self::Time => "hT",
            Self::EnergyX => "hEX",
            Self::EnergySum => "hESum",
            Self::EnergyZ => "hEZ",
            Self::EnergyZGated => "hEZg",
            Self::QValue => "hQ",
            Self::Ecm => "hEcm",
            Self::ThetaCm => "hThetaCM",
            Self::TimeZ => "hTZ",
            Self::BeamMonitor => "hEDE0",
            Self::BeamMonitorRf => "hDE0_RF",
            Self::Elum => "hELUM",
            Self::ElumRf => "hELUM_RF",
            Self::Recoil => "hRDT",
            Self::TacEnergy | Self::TacEnergyGated => "hETAC",
            Self::EnergyZCoincidence => "hEZg",
        }
    }
}

/// Typed identifier of a histogram.
///
/// `index` is the zero-based ADC, detector, or monitor index for per-ADC, per-detector, and
/// per-monitor spectra, and None for spectra of the whole array. Names number from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistogramKey {
    pub category: HistogramCategory,
    pub index: Option<usize>,
}

impl HistogramKey {
    pub fn array(category: HistogramCategory) -> Self {
        Self {
            category,
            index: None,
        }
    }

    pub fn detector(category: HistogramCategory, detector: Detector) -> Self {
        Self {
            category,
            index: Some(detector.index()),
        }
    }

    pub fn adc(adc: usize) -> Self {
        Self {
            category: HistogramCategory::Adc,
            index: Some(adc),
        }
    }

    pub fn indexed(category: HistogramCategory, index: usize) -> Self {
        Self {
            category,
            index: Some(index),
        }
    }

    pub fn name(&self) -> String {
        use HistogramCategory::*;
        match (self.category, self.index) {
            (TacEnergy, None) => String::from("hETAC_ALL"),
            (TacEnergyGated, None) => String::from("hETACg_ALL"),
            (TacEnergyGated, Some(idx)) => format!("hETAC{}g", idx + 1),
            (EnergyZCoincidence, None) => String::from("hEZgg"),
            (category, Some(idx)) => format!("{}{}", category.base_name(), idx + 1),
            (category, None) => category.base_name().to_string(),
        }
    }
}

impl Display for HistogramKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where the sorter sends its results. Implemented by the host's histogramming layer.
pub trait HistogramSink {
    fn fill1(&mut self, key: HistogramKey, x: f64);
    fn fill2(&mut self, key: HistogramKey, x: f64, y: f64);
}

/// A sink which remembers every fill, keyed by histogram.
///
/// Useful for checking a sort without a plotting library.
#[derive(Debug, Clone, Default)]
pub struct FillRecorder {
    fills: FxHashMap<HistogramKey, Vec<(f64, Option<f64>)>>,
}

impl FillRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fills(&self, key: &HistogramKey) -> &[(f64, Option<f64>)] {
        match self.fills.get(key) {
            Some(f) => f,
            None => &[],
        }
    }

    pub fn count(&self, key: &HistogramKey) -> usize {
        self.fills(key).len()
    }

    pub fn total(&self) -> usize {
        self.fills.values().map(|f| f.len()).sum()
    }

    pub fn clear(&mut self) {
        self.fills.clear();
    }
}

impl HistogramSink for FillRecorder {
    fn fill1(&mut self, key: HistogramKey, x: f64) {
        self.fills.entry(key).or_default().push((x, None));
    }

    fn fill2(&mut self, key: HistogramKey, x: f64, y: f64) {
        self.fills.entry(key).or_default().push((x, Some(y)));
    }
}
