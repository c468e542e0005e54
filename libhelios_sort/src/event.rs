use super::constants::{NUMBER_OF_DETECTORS, NUMBER_OF_SIGNALS};
use super::detector::{Detector, DetectorSignal, SignalKind};

/// A single readout word after field extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRecord {
    pub adc: usize,
    pub channel: u8,
    pub value: u16,
}

/// The dense per-detector array of one event.
///
/// Every cell starts at zero, so a detector with no hit reads the same as one which
/// measured zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorData {
    values: [[f32; NUMBER_OF_SIGNALS]; NUMBER_OF_DETECTORS],
}

impl Default for DetectorData {
    fn default() -> Self {
        Self {
            values: [[0.0; NUMBER_OF_SIGNALS]; NUMBER_OF_DETECTORS],
        }
    }
}

impl DetectorData {
    /// Zero every cell
    pub fn clear(&mut self) {
        for row in self.values.iter_mut() {
            *row = [0.0; NUMBER_OF_SIGNALS];
        }
    }

    pub fn get(&self, detector: Detector, signal: SignalKind) -> f32 {
        self.values[detector.index()][signal.index()]
    }

    pub fn set(&mut self, detector: Detector, signal: SignalKind, value: f32) {
        self.values[detector.index()][signal.index()] = value;
    }

    pub fn write(&mut self, target: DetectorSignal, value: f32) {
        self.set(target.detector, target.signal, value)
    }

    /// The (e, xf, xn) triplet of a detector
    pub fn signals(&self, detector: Detector) -> (f32, f32, f32) {
        let row = &self.values[detector.index()];
        (row[0], row[1], row[2])
    }

    /// Number of non-zero cells
    pub fn occupancy(&self) -> usize {
        self.values
            .iter()
            .flat_map(|row| row.iter())
            .filter(|v| **v != 0.0)
            .count()
    }
}

/// Readout of the channels which are not part of the detector array
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuxReadout {
    /// Monitor, recoil, and luminosity ADC channels
    pub aux: Vec<u16>,
    /// Time-reference channels (TDC or TAC)
    pub time: Vec<u16>,
}

/// Everything the unpacker extracts from one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnpackedEvent {
    pub data: DetectorData,
    pub aux: AuxReadout,
    pub hits: Vec<HitRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear() {
        let mut data = DetectorData::default();
        let det = Detector::new(7).unwrap();
        data.set(det, SignalKind::XNear, 12.0);
        assert_eq!(data.occupancy(), 1);
        assert_eq!(data.signals(det), (0.0, 0.0, 12.0));
        data.clear();
        assert_eq!(data, DetectorData::default());
    }
}
