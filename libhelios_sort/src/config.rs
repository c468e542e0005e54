use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::calibration::CalibrationLevels;
use super::constants::{ACTIVE_LENGTH_MM, DETECTORS_PER_SIDE, DETECTOR_CENTERS_MM, NUMBER_OF_DETECTORS};
use super::error::ConfigError;
use super::kinematics::Reaction;
use super::pipeline::CalibratedHit;
use super::variant::ExperimentVariant;

/// Software thresholds which gate the whole per-detector calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// E, XF, and XN must all be above this
    pub low: f32,
    /// The array time must be above this, when the variant records one
    pub min_time: Option<f32>,
}

impl Thresholds {
    pub fn for_variant(variant: ExperimentVariant) -> Self {
        Self {
            low: variant.default_low_threshold(),
            min_time: variant.default_min_time(),
        }
    }
}

/// Placement of the detector array relative to the target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrayGeometry {
    /// Distance between the target and the leading edge of the active area in mm
    pub separation_mm: f32,
    pub active_length_mm: f32,
    /// Detector-center positions in mm, nearest the target first
    pub centers_mm: [f32; DETECTORS_PER_SIDE],
}

impl Default for ArrayGeometry {
    fn default() -> Self {
        Self {
            separation_mm: 500.0,
            active_length_mm: ACTIVE_LENGTH_MM,
            centers_mm: DETECTOR_CENTERS_MM,
        }
    }
}

impl ArrayGeometry {
    /// Position of the Ta slits on the beam axis
    pub fn slit_position(&self) -> f32 {
        -self.separation_mm - self.active_length_mm / 2.0
    }
}

/// Names of the graphical cuts consulted while sorting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateNames {
    /// Cut on (Z, E)
    pub ez: Option<String>,
    /// Cut on (T, E)
    pub time: Option<String>,
}

impl Default for GateNames {
    fn default() -> Self {
        Self {
            ez: Some(String::from("cEZ")),
            time: Some(String::from("cTime2D")),
        }
    }
}

/// An open window `center +/- half_width`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub center: f32,
    pub half_width: f32,
}

impl Window {
    pub fn contains(&self, value: f32) -> bool {
        value > self.center - self.half_width && value < self.center + self.half_width
    }
}

/// Consistency of E with the two position signals, all in channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EsumWindow {
    /// |E - (XF + XN)| must be below this
    pub sum_half_width: f32,
    /// E must exceed |XF - XN| by more than this
    pub diff_margin: f32,
}

impl EsumWindow {
    pub fn accepts(&self, hit: &CalibratedHit) -> bool {
        hit.esum_residual().abs() < self.sum_half_width && hit.ediff_margin() > self.diff_margin
    }
}

/// Windows which gate the per-detector fills. A window which is None is open.
///
/// The energy window is on E in channels and gates XF vs XN. The position window is on x and,
/// together with the E sum window, gates E vs x and E vs Z. The E sum window only applies
/// once XF + XN has been matched to E (position level 2 and up).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FillWindows {
    pub energy: Option<Window>,
    pub position: Option<Window>,
    pub esum: Option<EsumWindow>,
}

/// Windows on the recoil telescopes and the array TAC
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoincidenceWindows {
    /// Inclusive TAC range of a good array-recoil coincidence
    pub tac_min: f32,
    pub tac_max: f32,
    /// Inclusive range of a good recoil CsI energy
    pub csi_min: f32,
    pub csi_max: f32,
    /// TAC vs E is only filled above this
    pub tac_floor: f32,
}

impl Default for CoincidenceWindows {
    fn default() -> Self {
        Self {
            tac_min: 140.0,
            tac_max: 2500.0,
            csi_min: 100.0,
            csi_max: 4000.0,
            tac_floor: 50.0,
        }
    }
}

impl CoincidenceWindows {
    pub fn good_tac(&self, tac: f32) -> bool {
        tac >= self.tac_min && tac <= self.tac_max
    }

    pub fn good_csi(&self, energy: f32) -> bool {
        energy >= self.csi_min && energy <= self.csi_max
    }
}

/// Structure representing the sort configuration. Contains pathing, calibration levels,
/// and the physics of the run.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortConfig {
    pub variant: ExperimentVariant,
    pub calibration_path: Option<PathBuf>,
    pub channel_map_path: Option<PathBuf>,
    pub gate_path: Option<PathBuf>,
    pub levels: CalibrationLevels,
    pub thresholds: Thresholds,
    pub excluded_detectors: Vec<usize>,
    pub geometry: ArrayGeometry,
    pub reaction: Reaction,
    pub kinematics: bool,
    pub gates: GateNames,
    #[serde(default)]
    pub windows: FillWindows,
    #[serde(default)]
    pub coincidence: CoincidenceWindows,
}

impl Default for SortConfig {
    /// Generate a new SortConfig for the default variant, sorting raw data
    fn default() -> Self {
        Self::for_variant(ExperimentVariant::default())
    }
}

impl SortConfig {
    /// Generate a raw-data SortConfig with the defaults of a variant.
    ///
    /// The H007 online monitor does not reconstruct kinematics.
    pub fn for_variant(variant: ExperimentVariant) -> Self {
        Self {
            variant,
            calibration_path: None,
            channel_map_path: None,
            gate_path: None,
            levels: CalibrationLevels::default(),
            thresholds: Thresholds::for_variant(variant),
            excluded_detectors: vec![],
            geometry: ArrayGeometry::default(),
            reaction: Reaction::default(),
            kinematics: !matches!(variant, ExperimentVariant::H007),
            gates: GateNames::default(),
            windows: FillWindows::default(),
            coincidence: CoincidenceWindows::default(),
        }
    }

    /// Read the configuration in a YAML file
    /// Returns a SortConfig if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        let mut file = std::fs::File::create(config_path)?;
        file.write_all(yaml_str.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self
            .excluded_detectors
            .iter()
            .find(|det| **det >= NUMBER_OF_DETECTORS)
        {
            Some(det) => Err(ConfigError::BadDetector(*det)),
            None => Ok(()),
        }
    }
}
