// Readout geometry
pub const NUMBER_OF_ADCS: usize = 5;
pub const CHANNELS_PER_ADC: usize = 16;
pub const NUMBER_OF_DETECTORS: usize = 24;
pub const NUMBER_OF_SIGNALS: usize = 3;
/// The array is built from four sides of six detectors each
pub const DETECTORS_PER_SIDE: usize = 6;

// Data word layout
pub const DATA_MASK: u32 = 0x0000_0fff;
pub const CHANNEL_MASK: u32 = 0x0000_f000;
pub const CHANNEL_SHIFT: u32 = 12;
pub const HIT_PATTERN_BITS: usize = 16;
pub const END_OF_EVENT: u32 = 0x0000_dead;

// Calibration file layout
pub const NUMBER_OF_CAL_COLUMNS: usize = 21;

// Physical constants
/// Joules per MeV
pub const MEV: f64 = 1.602E-13;
/// Length of the active area of a detector in mm
pub const ACTIVE_LENGTH_MM: f32 = 50.5;
/// Detector-center positions in mm, taken from the array schematic
pub const DETECTOR_CENTERS_MM: [f32; DETECTORS_PER_SIDE] =
    [66.76, 124.12, 182.48, 241.11, 299.87, 358.68];
