use std::path::Path;

use super::calibration::CalibrationTable;
use super::channel_map::ChannelRemapper;
use super::config::{FillWindows, SortConfig};
use super::error::SetupError;
use super::gate::GateSet;
use super::pipeline::CalibrationPipeline;
use super::unpacker::EventUnpacker;
use super::variant::{ChannelOverride, EventLayout};

/// SortSetup is everything a sort needs which does not change during a run.
///
/// It is built once at the start of a run and is never modified afterwards. Sorters share it
/// through an `Arc`.
#[derive(Debug, Clone)]
pub struct SortSetup {
    config: SortConfig,
    remapper: ChannelRemapper,
    pipeline: CalibrationPipeline,
    gates: GateSet,
}

impl SortSetup {
    /// Load the cabling, calibration, and gates named by the config
    pub fn load(config: &SortConfig) -> Result<Self, SetupError> {
        config.validate()?;
        spdlog::info!("Setting up a sort for the {:?} variant", config.variant);

        let remapper = ChannelRemapper::new(config.channel_map_path.as_deref(), config.variant)?;
        spdlog::info!("Cabling maps {} ADC channels onto the array", remapper.n_mapped());

        let table = CalibrationTable::new(config.calibration_path.as_deref(), &config.levels)?;

        let gates = match config.gate_path.as_deref() {
            Some(path) => load_gates(path)?,
            None => GateSet::default(),
        };

        let reaction = if config.kinematics {
            Some(config.reaction)
        } else {
            None
        };
        let pipeline = CalibrationPipeline::new(
            table,
            &config.levels,
            config.thresholds,
            config.geometry,
            reaction,
            &config.excluded_detectors,
        );

        spdlog::info!(
            "Thresholds: low {}, minimum time {:?}",
            config.thresholds.low,
            config.thresholds.min_time
        );
        if !config.excluded_detectors.is_empty() {
            spdlog::info!("Excluded detectors: {:?}", config.excluded_detectors);
        }
        for correction in config.variant.overrides() {
            spdlog::info!(
                "Channel override active on detector {}: {:?}",
                correction.detector() + 1,
                correction
            );
        }
        if config.windows != FillWindows::default() {
            spdlog::info!("Fill windows: {:?}", config.windows);
        }
        if config.variant.monitors().is_some() {
            spdlog::info!("Monitor spectra on, coincidence windows {:?}", config.coincidence);
        }

        Ok(Self {
            config: config.clone(),
            remapper,
            pipeline,
            gates,
        })
    }

    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    pub fn remapper(&self) -> &ChannelRemapper {
        &self.remapper
    }

    pub fn pipeline(&self) -> &CalibrationPipeline {
        &self.pipeline
    }

    pub fn gates(&self) -> &GateSet {
        &self.gates
    }

    pub fn layout(&self) -> EventLayout {
        self.config.variant.layout()
    }

    pub fn overrides(&self) -> &'static [ChannelOverride] {
        self.config.variant.overrides()
    }

    pub fn unpacker(&self) -> EventUnpacker<'_> {
        EventUnpacker::new(&self.remapper, self.layout())
    }
}

fn load_gates(path: &Path) -> Result<GateSet, SetupError> {
    spdlog::info!("Reading gates from {}...", path.to_string_lossy());
    let gates = GateSet::read_gate_file(path)?;
    spdlog::info!("Loaded {} gates", gates.len());
    Ok(gates)
}
