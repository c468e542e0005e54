use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::constants::{NUMBER_OF_CAL_COLUMNS, NUMBER_OF_DETECTORS};
use super::detector::Detector;
use super::error::CalibrationError;

/// Load the bundled template for windows
#[cfg(target_family = "windows")]
fn load_template() -> &'static str {
    include_str!("data\\template_calibration.cal")
}

/// Load the bundled template for macos and linux
#[cfg(target_family = "unix")]
fn load_template() -> &'static str {
    include_str!("data/template_calibration.cal")
}

// Column layout of a calibration row (after the detector number)
pub const E_SLOPE: usize = 0;
pub const E_OFFSET: usize = 1;
pub const XFXN_RATIO: usize = 2;
pub const TZ_P1: usize = 3;
pub const TZ_P2: usize = 4;
pub const TZ_P3: usize = 5;
pub const TZ_P4: usize = 6;
pub const TIME_SLOPE: usize = 7;
pub const TIME_PEAK: usize = 8;
pub const WALK_EMAX: usize = 9;
pub const WALK_P1: usize = 10;
pub const WALK_P2: usize = 11;
pub const WALK_LINEAR: usize = 12;
pub const X_EXPANSION: usize = 13;
pub const Z_OFFSET: usize = 14;
pub const ESUM_SLOPE: usize = 15;
pub const ESUM_OFFSET: usize = 16;
pub const Q_SLOPE: usize = 17;
pub const Q_OFFSET: usize = 18;
pub const EX_P1: usize = 19;
pub const EX_P2: usize = 20;

/// Time dispersion used when a time calibration asks for it but the file leaves it unset
pub const DEFAULT_TIME_SLOPE: f32 = -18.01;

/// Which calibration stages are active for each physical quantity.
///
/// 0 always means raw data. Levels are fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationLevels {
    pub energy: u8,
    pub position: u8,
    pub time: u8,
    pub q_value: u8,
}

impl CalibrationLevels {
    pub fn is_raw(&self) -> bool {
        self.energy == 0 && self.position == 0 && self.time == 0 && self.q_value == 0
    }

    fn level_of(&self, quantity: Quantity) -> u8 {
        match quantity {
            Quantity::Energy => self.energy,
            Quantity::Position => self.position,
            Quantity::Time => self.time,
            Quantity::QValue => self.q_value,
        }
    }

    /// Human readable description of each level, for the log
    pub fn describe(&self) -> [String; 4] {
        let energy = match self.energy {
            0 => "No energy calibration",
            1 => "Correct energy position-dependence",
            _ => "Calibrate energy in MeV",
        };
        let position = match self.position {
            0 => "No position calibration",
            1 => "Gain match XF and XN",
            2 => "Gain match (XF+XN) to E",
            3 => "Adjust overall Z offset",
            _ => "Adjust X to correct slope",
        };
        let time = match self.time {
            0 => "No time calibration",
            1 => "Piecewise walk correction",
            2 => "Linear walk correction",
            3 => "Flatten T vs Z",
            _ => "Calibrate time in ns",
        };
        let q_value = match self.q_value {
            0 => "No Q-value calibration",
            _ => "Calibrate Q-value in MeV",
        };
        [
            format!("Energy:   [{}] {energy}", self.energy),
            format!("Position: [{}] {position}", self.position),
            format!("Time:     [{}] {time}", self.time),
            format!("Q-Value:  [{}] {q_value}", self.q_value),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    Energy,
    Position,
    Time,
    QValue,
}

/// How one column is resolved against the calibration levels
struct ColumnRule {
    column: usize,
    quantity: Quantity,
    min_level: u8,
    /// Value used while the column's stage is off
    neutral: f32,
    /// Value used when the stage is on but the file leaves the column unset
    unset: f32,
    /// The column is a divisor and must not be zero
    divisor: bool,
}

const fn rule(column: usize, quantity: Quantity, min_level: u8, neutral: f32) -> ColumnRule {
    ColumnRule {
        column,
        quantity,
        min_level,
        neutral,
        unset: neutral,
        divisor: false,
    }
}

const fn divisor(mut r: ColumnRule) -> ColumnRule {
    r.divisor = true;
    r
}

const COLUMN_RULES: [ColumnRule; NUMBER_OF_CAL_COLUMNS] = [
    divisor(rule(E_SLOPE, Quantity::Energy, 2, 1.0)),
    rule(E_OFFSET, Quantity::Energy, 2, 0.0),
    divisor(rule(XFXN_RATIO, Quantity::Position, 1, -1.0)),
    rule(TZ_P1, Quantity::Time, 3, 0.0),
    rule(TZ_P2, Quantity::Time, 3, 0.0),
    rule(TZ_P3, Quantity::Time, 3, 0.0),
    rule(TZ_P4, Quantity::Time, 3, 0.0),
    divisor(ColumnRule {
        column: TIME_SLOPE,
        quantity: Quantity::Time,
        min_level: 4,
        neutral: 1.0,
        unset: DEFAULT_TIME_SLOPE,
        divisor: false,
    }),
    rule(TIME_PEAK, Quantity::Time, 4, 0.0),
    rule(WALK_EMAX, Quantity::Time, 1, 0.0),
    rule(WALK_P1, Quantity::Time, 1, 0.0),
    rule(WALK_P2, Quantity::Time, 1, 0.0),
    rule(WALK_LINEAR, Quantity::Time, 2, 0.0),
    rule(X_EXPANSION, Quantity::Position, 4, 1.0),
    rule(Z_OFFSET, Quantity::Position, 3, 0.0),
    rule(ESUM_SLOPE, Quantity::Position, 2, 1.0),
    rule(ESUM_OFFSET, Quantity::Position, 2, 0.0),
    divisor(rule(Q_SLOPE, Quantity::QValue, 1, 1.0)),
    rule(Q_OFFSET, Quantity::QValue, 1, 0.0),
    rule(EX_P1, Quantity::Energy, 1, 0.0),
    rule(EX_P2, Quantity::Energy, 1, 0.0),
];

/// CalibrationTable holds one row of coefficients per detector.
///
/// The file format is whitespace delimited text, one row per detector. The first column
/// is the detector number (starting from 1), which must match the row. The coefficients
/// follow in the column order given by the constants of this module. A coefficient whose
/// value equals its own column index is treated as unset; missing trailing columns are
/// unset too.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    coefficients: Array2<f32>,
}

impl Default for CalibrationTable {
    /// A table where every coefficient is unset
    fn default() -> Self {
        let mut coefficients = Array2::<f32>::zeros([NUMBER_OF_DETECTORS, NUMBER_OF_CAL_COLUMNS]);
        for mut row in coefficients.rows_mut() {
            for (col, value) in row.iter_mut().enumerate() {
                *value = col as f32;
            }
        }
        Self { coefficients }
    }
}

impl CalibrationTable {
    /// Load a calibration file and resolve it against the levels.
    ///
    /// If the path is None the bundled template is used, which leaves every coefficient unset.
    pub fn new(path: Option<&Path>, levels: &CalibrationLevels) -> Result<Self, CalibrationError> {
        let contents = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(CalibrationError::BadFilePath(p.to_path_buf()));
                }
                spdlog::info!("Reading calibration file {}...", p.to_string_lossy());
                std::fs::read_to_string(p)?
            }
            None => {
                spdlog::info!("No calibration file given, using the bundled template");
                String::from(load_template())
            }
        };
        for line in levels.describe() {
            spdlog::info!("{line}");
        }
        let table = Self::parse(&contents)?.resolve(levels);
        spdlog::info!("Calibration file successfully read.");
        Ok(table)
    }

    /// Parse the text of a calibration file without resolving it
    pub fn parse(contents: &str) -> Result<Self, CalibrationError> {
        let mut table = Self::default();
        let mut row: usize = 0;
        for (line_number, line) in contents.lines().enumerate() {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            };
            let mut entries = line.split_whitespace();
            let det_entry = match entries.next() {
                Some(e) => e,
                None => continue, // Blank line
            };
            if row == NUMBER_OF_DETECTORS {
                spdlog::warn!(
                    "Calibration file has more than {} rows, ignoring line {}",
                    NUMBER_OF_DETECTORS,
                    line_number + 1
                );
                break;
            }

            let expected = row + 1;
            match det_entry.parse::<f32>() {
                Ok(det) if det == expected as f32 => (),
                _ => {
                    return Err(CalibrationError::Corrupt {
                        line: line_number + 1,
                        expected,
                        found: det_entry.to_string(),
                    })
                }
            }

            for (col, entry) in entries.enumerate() {
                if col >= NUMBER_OF_CAL_COLUMNS {
                    spdlog::warn!(
                        "Detector {} has more than {} calibration columns, ignoring the rest",
                        expected,
                        NUMBER_OF_CAL_COLUMNS
                    );
                    break;
                }
                table.coefficients[[row, col]] = entry.parse()?;
            }
            row += 1;
        }

        if row < NUMBER_OF_DETECTORS {
            return Err(CalibrationError::MissingRows(row));
        }
        Ok(table)
    }

    /// Replace unset coefficients and those of disabled stages with their neutral values
    pub fn resolve(mut self, levels: &CalibrationLevels) -> Self {
        for mut row in self.coefficients.rows_mut() {
            for rule in COLUMN_RULES.iter() {
                let value = &mut row[rule.column];
                if levels.level_of(rule.quantity) < rule.min_level {
                    *value = rule.neutral;
                } else if *value == rule.column as f32 {
                    *value = rule.unset;
                }
            }
        }

        for (det, mut row) in self.coefficients.rows_mut().into_iter().enumerate() {
            for rule in COLUMN_RULES.iter().filter(|r| r.divisor) {
                if row[rule.column] == 0.0 {
                    spdlog::warn!(
                        "Detector {} has a zero coefficient in column {}, which is a divisor; using {}",
                        det + 1,
                        rule.column,
                        rule.unset
                    );
                    row[rule.column] = rule.unset;
                }
            }
        }
        self
    }

    pub fn coefficient(&self, detector: Detector, column: usize) -> f32 {
        self.coefficients[[detector.index(), column]]
    }

    pub fn energy_slope(&self, detector: Detector) -> f32 {
        self.coefficient(detector, E_SLOPE)
    }

    pub fn energy_offset(&self, detector: Detector) -> f32 {
        self.coefficient(detector, E_OFFSET)
    }

    pub fn gain_ratio(&self, detector: Detector) -> f32 {
        self.coefficient(detector, XFXN_RATIO)
    }

    /// Slope and intercept of (XF+XN) against E
    pub fn esum(&self, detector: Detector) -> (f32, f32) {
        (
            self.coefficient(detector, ESUM_SLOPE),
            self.coefficient(detector, ESUM_OFFSET),
        )
    }

    /// p1 and p2 of the quadratic energy-vs-x correction
    pub fn energy_x_correction(&self, detector: Detector) -> (f32, f32) {
        (
            self.coefficient(detector, EX_P1),
            self.coefficient(detector, EX_P2),
        )
    }

    pub fn x_expansion(&self, detector: Detector) -> f32 {
        self.coefficient(detector, X_EXPANSION)
    }

    /// Relative detector positions are fixed, so only the first row's offset is used
    pub fn z_offset(&self) -> f32 {
        self.coefficients[[0, Z_OFFSET]]
    }

    /// Energy maximum, p1, p2 of the piecewise walk correction
    pub fn walk(&self, detector: Detector) -> (f32, f32, f32) {
        (
            self.coefficient(detector, WALK_EMAX),
            self.coefficient(detector, WALK_P1),
            self.coefficient(detector, WALK_P2),
        )
    }

    pub fn linear_walk(&self, detector: Detector) -> f32 {
        self.coefficient(detector, WALK_LINEAR)
    }

    /// p1..p4 of the time vs Z polynomial
    pub fn time_z(&self, detector: Detector) -> [f32; 4] {
        [
            self.coefficient(detector, TZ_P1),
            self.coefficient(detector, TZ_P2),
            self.coefficient(detector, TZ_P3),
            self.coefficient(detector, TZ_P4),
        ]
    }

    /// Slope and peak of the time calibration
    pub fn time_scale(&self, detector: Detector) -> (f32, f32) {
        (
            self.coefficient(detector, TIME_SLOPE),
            self.coefficient(detector, TIME_PEAK),
        )
    }

    pub fn q_value(&self, detector: Detector) -> (f32, f32) {
        (
            self.coefficient(detector, Q_SLOPE),
            self.coefficient(detector, Q_OFFSET),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_levels(level: u8) -> CalibrationLevels {
        CalibrationLevels {
            energy: level,
            position: level,
            time: level,
            q_value: level,
        }
    }

    /// A file where every detector has the same (set) coefficients
    fn uniform_file(values: &[f32]) -> String {
        let mut contents = String::from("# generated\n");
        for det in 1..=NUMBER_OF_DETECTORS {
            contents.push_str(&format!("{det}"));
            for v in values {
                contents.push_str(&format!(" {v}"));
            }
            contents.push('\n');
        }
        contents
    }

    #[test]
    fn test_template_resolves_to_neutral() {
        let table = match CalibrationTable::new(None, &all_levels(4)) {
            Ok(t) => t,
            Err(_) => panic!(),
        };
        let det = Detector::new(3).unwrap();
        assert_eq!(table.energy_slope(det), 1.0);
        assert_eq!(table.energy_offset(det), 0.0);
        assert_eq!(table.gain_ratio(det), -1.0);
        assert_eq!(table.esum(det), (1.0, 0.0));
        assert_eq!(table.x_expansion(det), 1.0);
        assert_eq!(table.z_offset(), 0.0);
        assert_eq!(table.time_scale(det), (DEFAULT_TIME_SLOPE, 0.0));
        assert_eq!(table.q_value(det), (1.0, 0.0));
    }

    #[test]
    fn test_disabled_stages_are_neutral() {
        let values: Vec<f32> = (0..NUMBER_OF_CAL_COLUMNS).map(|c| 100.0 + c as f32).collect();
        let raw = match CalibrationTable::parse(&uniform_file(&values)) {
            Ok(t) => t,
            Err(_) => panic!(),
        };
        let det = Detector::new(0).unwrap();
        let level_one = raw.clone().resolve(&all_levels(1));
        assert_eq!(level_one.gain_ratio(det), 102.0);
        assert_eq!(level_one.energy_slope(det), 1.0);
        assert_eq!(level_one.energy_x_correction(det), (119.0, 120.0));
        assert_eq!(level_one.esum(det), (1.0, 0.0));
        assert_eq!(level_one.z_offset(), 0.0);
        assert_eq!(level_one.walk(det), (109.0, 110.0, 111.0));
        assert_eq!(level_one.linear_walk(det), 0.0);
        assert_eq!(level_one.q_value(det), (117.0, 118.0));

        let level_zero = raw.resolve(&all_levels(0));
        assert_eq!(level_zero.gain_ratio(det), -1.0);
        assert_eq!(level_zero.energy_x_correction(det), (0.0, 0.0));
        assert_eq!(level_zero.q_value(det), (1.0, 0.0));
    }

    #[test]
    fn test_short_rows_are_unset() {
        let raw = match CalibrationTable::parse(&uniform_file(&[2.5, 10.0, -1.3])) {
            Ok(t) => t,
            Err(_) => panic!(),
        };
        let table = raw.resolve(&all_levels(2));
        let det = Detector::new(23).unwrap();
        assert_eq!(table.energy_slope(det), 2.5);
        assert_eq!(table.energy_offset(det), 10.0);
        assert_eq!(table.gain_ratio(det), -1.3);
        assert_eq!(table.esum(det), (1.0, 0.0));
    }

    #[test]
    fn test_zero_divisor_is_replaced() {
        let raw = match CalibrationTable::parse(&uniform_file(&[5.0, 1.0, 0.0])) {
            Ok(t) => t,
            Err(_) => panic!(),
        };
        let table = raw.resolve(&all_levels(2));
        let det = Detector::new(0).unwrap();
        assert_eq!(table.gain_ratio(det), -1.0);
        // 1.0 in the offset column is the unset marker
        assert_eq!(table.energy_offset(det), 0.0);
    }

    #[test]
    fn test_corrupt_row() {
        let mut lines: Vec<String> = (1..=NUMBER_OF_DETECTORS)
            .map(|det| format!("{det} 1.0 0.0"))
            .collect();
        lines[4] = String::from("6 1.0 0.0");
        let contents = lines.join("\n");
        match CalibrationTable::parse(&contents) {
            Err(CalibrationError::Corrupt {
                line,
                expected,
                found,
            }) => {
                assert_eq!(line, 5);
                assert_eq!(expected, 5);
                assert_eq!(found, "6");
            }
            _ => panic!(),
        }
    }

    #[test]
    fn test_missing_rows() {
        let contents: String = (1..=10).map(|det| format!("{det} 1.0\n")).collect();
        assert!(matches!(
            CalibrationTable::parse(&contents),
            Err(CalibrationError::MissingRows(10))
        ));
    }

    #[test]
    fn test_bad_number() {
        let mut contents = uniform_file(&[1.0]);
        contents = contents.replacen("1 1", "1 abc", 1);
        assert!(matches!(
            CalibrationTable::parse(&contents),
            Err(CalibrationError::ParsingError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("/this/does/not/exist.cal");
        assert!(matches!(
            CalibrationTable::new(Some(path), &CalibrationLevels::default()),
            Err(CalibrationError::BadFilePath(_))
        ));
    }
}
