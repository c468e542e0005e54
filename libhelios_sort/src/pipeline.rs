use bit_set::BitSet;

use super::calibration::{CalibrationLevels, CalibrationTable};
use super::config::{ArrayGeometry, Thresholds};
use super::detector::Detector;
use super::event::DetectorData;
use super::kinematics::{Kinematics, Reaction};

/// Which stages of the calibration chain run for this sort.
///
/// Derived once from the calibration levels; the stages themselves never look at levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StagePlan {
    pub gain_match: bool,
    pub energy_match: bool,
    pub z_offset: bool,
    pub x_expansion: bool,
    pub energy_x_correction: bool,
    pub energy_linearization: bool,
    pub walk: bool,
    pub linear_walk: bool,
    pub time_z: bool,
    pub time_ns: bool,
    pub q_value: bool,
}

impl StagePlan {
    pub fn from_levels(levels: &CalibrationLevels) -> Self {
        Self {
            gain_match: levels.position >= 1,
            energy_match: levels.position >= 2,
            z_offset: levels.position >= 3,
            x_expansion: levels.position >= 4,
            energy_x_correction: levels.energy >= 1,
            energy_linearization: levels.energy >= 2,
            walk: levels.time >= 1,
            linear_walk: levels.time >= 2,
            time_z: levels.time >= 3,
            time_ns: levels.time >= 4,
            q_value: levels.q_value >= 1,
        }
    }
}

/// Bring XF and XN onto a common gain.
///
/// Ratios below -1 scale XN up; anything else scales XF by the negated reciprocal.
pub fn gain_match(xf: f32, xn: f32, ratio: f32) -> (f32, f32) {
    if ratio < -1.0 {
        (xf, -ratio * xn)
    } else {
        ((-1.0 / ratio) * xf, xn)
    }
}

/// Rescale XF and XN so that their sum tracks E. The intercept is split evenly.
pub fn match_to_energy(xf: f32, xn: f32, slope: f32, intercept: f32) -> (f32, f32) {
    (xf * slope + intercept / 2.0, xn * slope + intercept / 2.0)
}

/// Fractional position along the detector, XN at 0 and XF at 1.
///
/// None if XF + XN is zero.
pub fn position(xf: f32, xn: f32) -> Option<f32> {
    let sum = xf + xn;
    if sum == 0.0 {
        return None;
    }
    let x = 0.5 * (1.0 + (xf - xn) / sum);
    if x.is_finite() {
        Some(x)
    } else {
        None
    }
}

/// Stretch the position about the detector center
pub fn expand_position(x: f32, factor: f32) -> f32 {
    0.5 + (x - 0.5) * factor
}

/// Remove the quadratic position dependence of the energy
pub fn correct_energy_position(e: f32, x: f32, p1: f32, p2: f32) -> f32 {
    if p2 == 0.0 {
        return e;
    }
    let shifted = x + p1 / (2.0 * p2);
    e - p2 * shifted * shifted
}

/// Convert an energy in channels to MeV
pub fn linearize_energy(e: f32, slope: f32, offset: f32) -> f32 {
    (e - offset) / slope
}

/// Convert an energy in MeV back to channels
pub fn delinearize_energy(e: f32, slope: f32, offset: f32) -> f32 {
    e * slope + offset
}

/// Position of a hit on the beam axis in mm
pub fn beam_axis_position(geometry: &ArrayGeometry, detector: Detector, x: f32) -> f32 {
    let center = geometry.centers_mm[detector.side_position() - 1];
    -center - geometry.active_length_mm / 2.0
        + geometry.slit_position()
        + geometry.active_length_mm * x
}

/// A detector which made it through the whole chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedHit {
    pub detector: Detector,
    pub e: f32,
    /// Energy in channels after the position correction, before conversion to MeV
    pub e_channel: f32,
    pub xf: f32,
    pub xn: f32,
    pub x: f32,
    pub z: f32,
    pub time: Option<f32>,
    pub kinematics: Option<Kinematics>,
}

impl CalibratedHit {
    /// Energy not accounted for by the position signals, in channels
    pub fn esum_residual(&self) -> f32 {
        self.e_channel - (self.xf + self.xn)
    }

    /// How far the energy clears the XF, XN difference, in channels
    pub fn ediff_margin(&self) -> f32 {
        self.e_channel - (self.xf - self.xn).abs()
    }
}

/// What happened to one detector in one event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorOutcome {
    Calibrated(CalibratedHit),
    BelowThreshold,
    Excluded,
    /// XF + XN was zero so no position could be formed
    DivisionGuard,
}

/// CalibrationPipeline turns the raw (e, xf, xn) of each detector into calibrated quantities.
///
/// Everything it holds is read-only for the whole run.
#[derive(Debug, Clone)]
pub struct CalibrationPipeline {
    table: CalibrationTable,
    plan: StagePlan,
    thresholds: Thresholds,
    geometry: ArrayGeometry,
    reaction: Option<Reaction>,
    excluded: BitSet,
}

impl CalibrationPipeline {
    pub fn new(
        table: CalibrationTable,
        levels: &CalibrationLevels,
        thresholds: Thresholds,
        geometry: ArrayGeometry,
        reaction: Option<Reaction>,
        excluded: &[usize],
    ) -> Self {
        let mut excluded_set = BitSet::new();
        for det in excluded {
            excluded_set.insert(*det);
        }
        Self {
            table,
            plan: StagePlan::from_levels(levels),
            thresholds,
            geometry,
            reaction,
            excluded: excluded_set,
        }
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    pub fn table(&self) -> &CalibrationTable {
        &self.table
    }

    fn passes_threshold(&self, e: f32, xf: f32, xn: f32, time: Option<f32>) -> bool {
        let low = self.thresholds.low;
        if !(e > low && xf > low && xn > low) {
            return false;
        }
        match (time, self.thresholds.min_time) {
            (Some(t), Some(min_time)) => t > min_time,
            _ => true,
        }
    }

    /// Run one detector through the chain. `time` is the raw array time of the event,
    /// if the variant records one.
    pub fn process_detector(
        &self,
        detector: Detector,
        data: &DetectorData,
        time: Option<f32>,
    ) -> DetectorOutcome {
        if self.excluded.contains(detector.index()) {
            return DetectorOutcome::Excluded;
        }
        let (mut e, mut xf, mut xn) = data.signals(detector);
        if !self.passes_threshold(e, xf, xn, time) {
            return DetectorOutcome::BelowThreshold;
        }
        let table = &self.table;

        if self.plan.gain_match {
            (xf, xn) = gain_match(xf, xn, table.gain_ratio(detector));
        }
        if self.plan.energy_match {
            let (slope, intercept) = table.esum(detector);
            (xf, xn) = match_to_energy(xf, xn, slope, intercept);
        }

        let mut x = match position(xf, xn) {
            Some(x) => x,
            None => return DetectorOutcome::DivisionGuard,
        };
        if self.plan.x_expansion {
            x = expand_position(x, table.x_expansion(detector));
        }

        if self.plan.energy_x_correction {
            let (p1, p2) = table.energy_x_correction(detector);
            e = correct_energy_position(e, x, p1, p2);
        }
        let e_channel = e;
        if self.plan.energy_linearization && e > 0.0 {
            e = linearize_energy(e, table.energy_slope(detector), table.energy_offset(detector));
        }

        let mut z = beam_axis_position(&self.geometry, detector, x);
        if self.plan.z_offset {
            z -= table.z_offset();
        }

        let time = time.map(|t| self.calibrate_time(detector, t, e_channel, z));

        let kinematics = self.reaction.map(|reaction| {
            let mut result = reaction.reconstruct(e, z);
            if self.plan.q_value {
                let (slope, offset) = table.q_value(detector);
                result.excitation = (result.excitation - offset) / slope;
            }
            result
        });

        DetectorOutcome::Calibrated(CalibratedHit {
            detector,
            e,
            e_channel,
            xf,
            xn,
            x,
            z,
            time,
            kinematics,
        })
    }

    /// Walk correction, T vs Z flattening, and conversion to ns
    fn calibrate_time(&self, detector: Detector, raw: f32, e_channel: f32, z: f32) -> f32 {
        let table = &self.table;
        let mut t = raw;
        if self.plan.walk {
            let (emax, p1, p2) = table.walk(detector);
            if e_channel < emax {
                let d = emax - e_channel;
                t -= p1 * d + p2 * d * d;
            }
        }
        if self.plan.linear_walk {
            t -= table.linear_walk(detector) * e_channel;
        }
        if self.plan.time_z {
            let p = table.time_z(detector);
            t -= p[0] * z + p[1] * z.powi(2) + p[2] * z.powi(3) + p[3] * z.powi(4);
        }
        if self.plan.time_ns {
            let (slope, peak) = table.time_scale(detector);
            t = (t - peak) / slope;
        }
        t
    }

    /// Run every detector of an event through the chain
    pub fn process_event(&self, data: &DetectorData, time: Option<f32>) -> Vec<DetectorOutcome> {
        Detector::all()
            .map(|det| self.process_detector(det, data, time))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUMBER_OF_CAL_COLUMNS;
    use crate::detector::SignalKind;

    fn template(levels: &CalibrationLevels) -> CalibrationTable {
        match CalibrationTable::new(None, levels) {
            Ok(t) => t,
            Err(_) => panic!(),
        }
    }

    fn pipeline(levels: CalibrationLevels, table: CalibrationTable) -> CalibrationPipeline {
        CalibrationPipeline::new(
            table,
            &levels,
            Thresholds {
                low: 0.0,
                min_time: None,
            },
            ArrayGeometry::default(),
            None,
            &[],
        )
    }

    fn event_with(det: usize, e: f32, xf: f32, xn: f32) -> DetectorData {
        let mut data = DetectorData::default();
        let det = Detector::new(det).unwrap();
        data.set(det, SignalKind::Energy, e);
        data.set(det, SignalKind::XFar, xf);
        data.set(det, SignalKind::XNear, xn);
        data
    }

    fn table_with(values: &[(usize, f32)]) -> CalibrationTable {
        let mut row: Vec<f32> = (0..NUMBER_OF_CAL_COLUMNS).map(|c| c as f32).collect();
        for (col, value) in values {
            row[*col] = *value;
        }
        let contents: String = (1..=24)
            .map(|det| {
                let cols: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                format!("{det} {}\n", cols.join(" "))
            })
            .collect();
        match CalibrationTable::parse(&contents) {
            Ok(t) => t,
            Err(_) => panic!(),
        }
    }

    #[test]
    fn test_position() {
        assert_eq!(position(3.0, 1.0), Some(0.75));
        assert_eq!(position(7.0, 7.0), Some(0.5));
        assert_eq!(position(0.0, 0.0), None);
        assert_eq!(position(5.0, -5.0), None);
    }

    #[test]
    fn test_gain_match_convention() {
        assert_eq!(gain_match(10.0, 10.0, -2.0), (10.0, 20.0));
        assert_eq!(gain_match(10.0, 10.0, -0.5), (20.0, 10.0));
        assert_eq!(gain_match(10.0, 10.0, -1.0), (10.0, 10.0));
        // Positive ratios flip the sign of XF
        assert_eq!(gain_match(10.0, 10.0, 2.0), (-5.0, 10.0));
    }

    #[test]
    fn test_linearization_roundtrip() {
        for (e, slope, offset) in [(1500.0, 256.3, -12.5), (42.0, 0.87, 3.0), (-3.0, 1.0, 0.0)] {
            let mev = linearize_energy(e, slope, offset);
            let back = delinearize_energy(mev, slope, offset);
            assert!((back - e).abs() < 1.0e-3 * e.abs().max(1.0));
        }
    }

    #[test]
    fn test_energy_position_correction() {
        // Vertex of the correction at x = 0.25
        let corrected = correct_energy_position(1000.0, 0.25, -20.0, 40.0);
        assert_eq!(corrected, 1000.0);
        let corrected = correct_energy_position(1000.0, 0.75, -20.0, 40.0);
        assert!((corrected - 990.0).abs() < 1.0e-3);
        assert_eq!(correct_energy_position(1000.0, 0.75, 5.0, 0.0), 1000.0);
    }

    #[test]
    fn test_level_zero_is_identity() {
        let levels = CalibrationLevels::default();
        // Even a table full of real numbers is ignored at level 0
        let table = table_with(&[(0, 3.0), (1, 7.0), (2, -1.7), (15, 0.9), (20, 2.0)]).resolve(&levels);
        let pipe = pipeline(levels, table);
        let data = event_with(4, 1200.0, 300.0, 500.0);
        match pipe.process_detector(Detector::new(4).unwrap(), &data, None) {
            DetectorOutcome::Calibrated(hit) => {
                assert_eq!(hit.e, 1200.0);
                assert_eq!(hit.xf, 300.0);
                assert_eq!(hit.xn, 500.0);
                assert_eq!(hit.x, 0.5 * (1.0 + (300.0 - 500.0) / 800.0));
                assert_eq!(hit.kinematics, None);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn test_full_chain() {
        let levels = CalibrationLevels {
            energy: 2,
            position: 2,
            time: 0,
            q_value: 0,
        };
        let table = table_with(&[
            (0, 100.0),  // E slope
            (1, 50.0),   // E offset
            (2, -2.0),   // XFXN ratio
            (15, 2.0),   // ESum slope
            (16, 10.0),  // ESum intercept
        ])
        .resolve(&levels);
        let pipe = pipeline(levels, table);
        let data = event_with(0, 1050.0, 200.0, 100.0);
        match pipe.process_detector(Detector::new(0).unwrap(), &data, None) {
            DetectorOutcome::Calibrated(hit) => {
                // xn doubled by the gain match, then both rescaled
                assert_eq!(hit.xf, 405.0);
                assert_eq!(hit.xn, 405.0);
                assert_eq!(hit.x, 0.5);
                assert!((hit.e - 10.0).abs() < 1.0e-5);
                // The windows work in channels, not MeV
                assert_eq!(hit.e_channel, 1050.0);
                assert_eq!(hit.esum_residual(), 240.0);
                assert_eq!(hit.ediff_margin(), 1050.0);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn test_threshold_gates_everything() {
        let levels = CalibrationLevels::default();
        let pipe = CalibrationPipeline::new(
            template(&levels),
            &levels,
            Thresholds {
                low: 75.0,
                min_time: Some(28.0),
            },
            ArrayGeometry::default(),
            Some(Reaction::default()),
            &[7],
        );
        let data = event_with(2, 1000.0, 74.0, 500.0);
        let det = Detector::new(2).unwrap();
        assert_eq!(
            pipe.process_detector(det, &data, Some(100.0)),
            DetectorOutcome::BelowThreshold
        );
        let data = event_with(2, 1000.0, 400.0, 500.0);
        assert_eq!(
            pipe.process_detector(det, &data, Some(20.0)),
            DetectorOutcome::BelowThreshold
        );
        assert!(matches!(
            pipe.process_detector(det, &data, Some(100.0)),
            DetectorOutcome::Calibrated(_)
        ));
        let data = event_with(7, 1000.0, 400.0, 500.0);
        assert_eq!(
            pipe.process_detector(Detector::new(7).unwrap(), &data, Some(100.0)),
            DetectorOutcome::Excluded
        );
    }

    #[test]
    fn test_division_guard() {
        let levels = CalibrationLevels {
            energy: 0,
            position: 2,
            time: 0,
            q_value: 0,
        };
        // A slope of zero on (XF+XN) collapses both position signals
        let table = table_with(&[(15, 0.0), (16, 0.0)]).resolve(&levels);
        let pipe = pipeline(levels, table);
        let data = event_with(9, 800.0, 300.0, 200.0);
        assert_eq!(
            pipe.process_detector(Detector::new(9).unwrap(), &data, None),
            DetectorOutcome::DivisionGuard
        );
    }

    #[test]
    fn test_beam_axis_position() {
        let geometry = ArrayGeometry::default();
        // Detector 0 is the furthest from the target on its side
        let z = beam_axis_position(&geometry, Detector::new(0).unwrap(), 0.0);
        assert!((z - (-358.68 - 25.25 - 525.25)).abs() < 1.0e-3);
        let z_far = beam_axis_position(&geometry, Detector::new(5).unwrap(), 1.0);
        assert!((z_far - (-66.76 - 25.25 - 525.25 + 50.5)).abs() < 1.0e-3);
    }

    #[test]
    fn test_z_offset_and_time() {
        let levels = CalibrationLevels {
            energy: 0,
            position: 3,
            time: 4,
            q_value: 0,
        };
        let table = table_with(&[
            (14, 10.0), // Z offset
            (7, 2.0),   // time slope
            (8, 100.0), // time peak
            (9, 500.0), // walk emax
            (10, 0.1),  // walk p1
        ])
        .resolve(&levels);
        let pipe = pipeline(levels, table);
        let data = event_with(0, 400.0, 200.0, 200.0);
        let det = Detector::new(0).unwrap();
        match pipe.process_detector(det, &data, Some(300.0)) {
            DetectorOutcome::Calibrated(hit) => {
                let expected_z = beam_axis_position(&ArrayGeometry::default(), det, 0.5) - 10.0;
                assert!((hit.z - expected_z).abs() < 1.0e-3);
                // walk removes 0.1 * (500 - 400) = 10, then (290 - 100) / 2
                match hit.time {
                    Some(t) => assert!((t - 95.0).abs() < 1.0e-3),
                    None => panic!(),
                }
            }
            _ => panic!(),
        }
    }

    fn calibrated(outcome: DetectorOutcome) -> CalibratedHit {
        match outcome {
            DetectorOutcome::Calibrated(hit) => hit,
            _ => panic!(),
        }
    }

    #[test]
    fn test_q_value_calibration() {
        let raw_levels = CalibrationLevels::default();
        let levels = CalibrationLevels {
            q_value: 1,
            ..CalibrationLevels::default()
        };
        let values: [(usize, f32); 2] = [(17, 2.0), (18, 0.5)]; // Q slope, Q offset
        let make = |levels: CalibrationLevels| {
            CalibrationPipeline::new(
                table_with(&values).resolve(&levels),
                &levels,
                Thresholds {
                    low: 0.0,
                    min_time: None,
                },
                ArrayGeometry::default(),
                Some(Reaction::default()),
                &[],
            )
        };
        let data = event_with(3, 6.0, 300.0, 100.0);
        let det = Detector::new(3).unwrap();
        let raw = calibrated(make(raw_levels).process_detector(det, &data, None));
        let hit = calibrated(make(levels).process_detector(det, &data, None));

        let raw_ex = match raw.kinematics {
            Some(k) => k.excitation,
            None => panic!(),
        };
        assert_eq!(raw_ex, Reaction::default().reconstruct(raw.e, raw.z).excitation);
        match hit.kinematics {
            Some(k) => assert!((k.excitation - (raw_ex - 0.5) / 2.0).abs() < 1.0e-4),
            None => panic!(),
        }
        // Only the excitation is touched
        assert_eq!(hit.e, raw.e);
        assert_eq!(hit.z, raw.z);
    }

    #[test]
    fn test_position_expansion() {
        let levels = CalibrationLevels {
            position: 4,
            ..CalibrationLevels::default()
        };
        let table = table_with(&[(13, 2.0)]).resolve(&levels);
        let pipe = pipeline(levels, table);
        let data = event_with(6, 900.0, 300.0, 100.0);
        let det = Detector::new(6).unwrap();
        let hit = calibrated(pipe.process_detector(det, &data, None));
        // 0.75 is pushed out to 0.5 + 0.25 * 2
        assert_eq!(hit.x, 1.0);
        let expected_z = beam_axis_position(&ArrayGeometry::default(), det, 1.0);
        assert!((hit.z - expected_z).abs() < 1.0e-3);
    }

    #[test]
    fn test_energy_position_correction_in_chain() {
        let levels = CalibrationLevels {
            energy: 1,
            ..CalibrationLevels::default()
        };
        let table = table_with(&[(19, -20.0), (20, 40.0)]).resolve(&levels);
        let pipe = pipeline(levels, table);
        let data = event_with(11, 1000.0, 300.0, 100.0);
        let hit = calibrated(pipe.process_detector(Detector::new(11).unwrap(), &data, None));
        // x = 0.75, 40 * (0.75 - 0.25)^2 = 10 and no conversion to MeV
        assert!((hit.e - 990.0).abs() < 1.0e-3);
        assert_eq!(hit.e, hit.e_channel);
        assert!((hit.esum_residual() - 590.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_linear_walk() {
        let levels = CalibrationLevels {
            time: 2,
            ..CalibrationLevels::default()
        };
        // The piecewise walk is on too, but with emax unset it never applies
        let table = table_with(&[(12, 0.05)]).resolve(&levels);
        let pipe = pipeline(levels, table);
        let data = event_with(2, 1000.0, 400.0, 500.0);
        let hit = calibrated(pipe.process_detector(Detector::new(2).unwrap(), &data, Some(300.0)));
        match hit.time {
            Some(t) => assert!((t - 250.0).abs() < 1.0e-3),
            None => panic!(),
        }
    }

    #[test]
    fn test_time_z_flattening() {
        let levels = CalibrationLevels {
            time: 3,
            ..CalibrationLevels::default()
        };
        let table = table_with(&[(3, 0.1), (4, 0.001)]).resolve(&levels);
        let pipe = pipeline(levels, table);
        let data = event_with(14, 1000.0, 400.0, 400.0);
        let det = Detector::new(14).unwrap();
        let hit = calibrated(pipe.process_detector(det, &data, Some(300.0)));
        let z = beam_axis_position(&ArrayGeometry::default(), det, 0.5);
        assert_eq!(hit.z, z);
        let expected = 300.0 - (0.1 * z + 0.001 * z * z);
        match hit.time {
            Some(t) => assert!((t - expected).abs() < 1.0e-4 * expected.abs().max(1.0)),
            None => panic!(),
        }
        // Without a time word there is nothing to flatten
        let hit = calibrated(pipe.process_detector(det, &data, None));
        assert_eq!(hit.time, None);
    }

    #[test]
    fn test_stage_plan() {
        let plan = StagePlan::from_levels(&CalibrationLevels {
            energy: 1,
            position: 3,
            time: 2,
            q_value: 1,
        });
        assert!(plan.gain_match && plan.energy_match && plan.z_offset && !plan.x_expansion);
        assert!(plan.energy_x_correction && !plan.energy_linearization);
        assert!(plan.walk && plan.linear_walk && !plan.time_z && !plan.time_ns);
        assert!(plan.q_value);
        assert_eq!(StagePlan::from_levels(&CalibrationLevels::default()), StagePlan::default());
    }
}
