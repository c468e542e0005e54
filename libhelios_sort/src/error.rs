use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitfieldError {
    #[error("Raw event ran out of data at word {0}")]
    OutOfData(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnpackError {
    #[error("Event is truncated -- ADC {adc} declared {declared} hits but only {remaining} words remain")]
    TruncatedEvent {
        adc: usize,
        declared: usize,
        remaining: usize,
    },
    #[error("Event unpacking failed: {0}")]
    OutOfData(#[from] BitfieldError),
}

#[derive(Debug, Error)]
pub enum SignalKindError {
    #[error("Found invalid signal keyword: {0}")]
    InvalidKeyword(String),
}

#[derive(Debug, Error)]
pub enum ChannelMapError {
    #[error("ChannelRemapper failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("ChannelRemapper failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("ChannelRemapper failed to parse a signal keyword: {0}")]
    BadSignalKeyword(#[from] SignalKindError),
    #[error("ChannelRemapper was given a file with the incorrect format; most likely the number of columns is incorrect")]
    BadFileFormat,
    #[error("ChannelRemapper found an entry outside of the readout -- ADC: {0} Channel: {1}; expected ADC < {adcs} and channel < {chans}", adcs=NUMBER_OF_ADCS, chans=CHANNELS_PER_ADC)]
    BadHardware(usize, usize),
    #[error("ChannelRemapper found an invalid detector {0}; expected a detector < {max}", max=NUMBER_OF_DETECTORS)]
    BadDetector(usize),
    #[error("ChannelRemapper found detector {0} signal {1} assigned more than once")]
    DuplicateAssignment(usize, String),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Could not open calibration because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Calibration failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration failed to parse a number: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("Calibration file corrupt on line {line} -- expected detector {expected}, found {found}")]
    Corrupt {
        line: usize,
        expected: usize,
        found: String,
    },
    #[error("Calibration file has {0} detector rows; expected {exp}", exp=NUMBER_OF_DETECTORS)]
    MissingRows(usize),
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Could not open gates because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Gates failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Gates failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Gate {0} has fewer than three vertices")]
    Degenerate(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config excludes detector {0} which does not exist")]
    BadDetector(usize),
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Setup failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Setup failed due to ChannelRemapper error: {0}")]
    MapError(#[from] ChannelMapError),
    #[error("Setup failed due to Calibration error: {0}")]
    CalibrationError(#[from] CalibrationError),
    #[error("Setup failed due to Gate error: {0}")]
    GateError(#[from] GateError),
}
