// The ADC channels are cabled to the array by hand, so the mapping
// [adc, channel] -> [detector, signal]
// is data, not logic. Each experiment has its own table; the straight cabling and the
// 28Si cabling are bundled and any other table can be given as a CSV file.
//
// Unused channels are simply absent from the file, and become None in the lookup.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::constants::{CHANNELS_PER_ADC, NUMBER_OF_ADCS, NUMBER_OF_DETECTORS, NUMBER_OF_SIGNALS};
use super::detector::{Detector, DetectorSignal, SignalKind};
use super::error::ChannelMapError;
use super::variant::ExperimentVariant;

const ENTRIES_PER_LINE: usize = 4; //adc, channel, detector, signal

/// ChannelRemapper maps a readout address (ADC, raw channel) to a detector signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRemapper {
    table: [[Option<DetectorSignal>; CHANNELS_PER_ADC]; NUMBER_OF_ADCS],
}

impl Default for ChannelRemapper {
    fn default() -> Self {
        Self {
            table: [[None; CHANNELS_PER_ADC]; NUMBER_OF_ADCS],
        }
    }
}

impl ChannelRemapper {
    /// Create a new ChannelRemapper
    /// If the path is None, we load the default bundled for the variant
    pub fn new(path: Option<&Path>, variant: ExperimentVariant) -> Result<Self, ChannelMapError> {
        let mut contents = String::new();
        if let Some(p) = path {
            let mut file = File::open(p)?;
            file.read_to_string(&mut contents)?;
        } else {
            contents = String::from(variant.default_cabling());
        }
        Self::parse(&contents)
    }

    /// Parse the CSV form of a cabling table
    pub fn parse(contents: &str) -> Result<Self, ChannelMapError> {
        let mut map = ChannelRemapper::default();
        let mut assigned = [[false; NUMBER_OF_SIGNALS]; NUMBER_OF_DETECTORS];

        let mut lines = contents.lines();
        lines.next(); // Skip the header
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.split_terminator(",").map(|e| e.trim()).collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(ChannelMapError::BadFileFormat);
            }

            let adc: usize = entries[0].parse()?;
            let channel: usize = entries[1].parse()?;
            let det_index: usize = entries[2].parse()?;
            let signal: SignalKind = entries[3].parse()?;

            if adc >= NUMBER_OF_ADCS || channel >= CHANNELS_PER_ADC {
                return Err(ChannelMapError::BadHardware(adc, channel));
            }
            let detector = Detector::new(det_index).ok_or(ChannelMapError::BadDetector(det_index))?;

            // A cell may only be fed by one channel, otherwise it could be written twice
            let cell = &mut assigned[det_index][signal.index()];
            if *cell || map.table[adc][channel].is_some() {
                return Err(ChannelMapError::DuplicateAssignment(
                    det_index,
                    signal.to_string(),
                ));
            }
            *cell = true;
            map.table[adc][channel] = Some(DetectorSignal::new(detector, signal));
        }

        Ok(map)
    }

    /// Get the detector signal for a given readout address.
    ///
    /// Returns None for unused channels and for addresses outside the readout, which
    /// can be produced by a corrupt hit-pattern word.
    pub fn resolve(&self, adc: usize, channel: usize) -> Option<DetectorSignal> {
        self.table.get(adc)?.get(channel).copied().flatten()
    }

    /// Number of readout channels which feed the array
    pub fn n_mapped(&self) -> usize {
        self.table
            .iter()
            .flat_map(|row| row.iter())
            .filter(|entry| entry.is_some())
            .count()
    }
}
