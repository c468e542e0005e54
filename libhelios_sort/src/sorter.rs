use std::sync::Arc;

use super::bitfield::RawEvent;
use super::config::{CoincidenceWindows, FillWindows};
use super::constants::NUMBER_OF_DETECTORS;
use super::error::UnpackError;
use super::event::{AuxReadout, DetectorData, HitRecord};
use super::gate::RegionEvaluator;
use super::pipeline::{CalibratedHit, DetectorOutcome};
use super::setup::SortSetup;
use super::sink::{HistogramCategory, HistogramKey, HistogramSink};
use super::variant::MonitorLayout;

/// What became of one event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSummary {
    pub hits: Vec<CalibratedHit>,
    pub below_threshold: usize,
    pub excluded: usize,
    pub division_guarded: usize,
    /// At least one hit fell inside the E-Z gate
    pub good_ez: bool,
    /// At least one hit fell inside the time gate
    pub good_time: bool,
    /// The array TAC was inside its window, for variants with recoil telescopes
    pub good_tac: bool,
    /// Which recoil CsI energies were inside their window
    pub good_csi: [bool; 4],
}

impl EventSummary {
    pub fn accepted(&self) -> usize {
        self.hits.len()
    }
}

/// Sorter drives a single event from raw words to histogram fills.
///
/// Unpack, apply the channel overrides, calibrate each detector, check the gates, fill.
/// The run context is shared, so any number of Sorters can work from the same SortSetup.
#[derive(Debug)]
pub struct Sorter {
    setup: Arc<SortSetup>,
    accepted_counts: [u64; NUMBER_OF_DETECTORS],
    events_sorted: u64,
}

impl Sorter {
    pub fn new(setup: Arc<SortSetup>) -> Self {
        Self {
            setup,
            accepted_counts: [0; NUMBER_OF_DETECTORS],
            events_sorted: 0,
        }
    }

    pub fn setup(&self) -> &SortSetup {
        &self.setup
    }

    /// Sort an event using the gates loaded with the setup
    pub fn sort_event(
        &mut self,
        event: &RawEvent,
        sink: &mut dyn HistogramSink,
    ) -> Result<EventSummary, UnpackError> {
        let setup = Arc::clone(&self.setup);
        self.sort_event_with(event, sink, setup.gates())
    }

    /// Sort an event, asking `gates` about the graphical cuts.
    ///
    /// A malformed event is logged and returned as an error; nothing is filled and the
    /// Sorter is left as it was.
    pub fn sort_event_with(
        &mut self,
        event: &RawEvent,
        sink: &mut dyn HistogramSink,
        gates: &dyn RegionEvaluator,
    ) -> Result<EventSummary, UnpackError> {
        let setup = Arc::clone(&self.setup);
        let mut data = DetectorData::default();
        let (aux, hits) = match setup.unpacker().unpack_into(event, &mut data) {
            Ok(result) => result,
            Err(e) => {
                spdlog::warn!(
                    "Skipping malformed event after {} sorted: {e}",
                    self.events_sorted
                );
                return Err(e);
            }
        };
        fill_raw(sink, &aux, &hits);

        let config = setup.config();
        let monitors = config.variant.monitors();
        if let Some(layout) = &monitors {
            fill_monitors(sink, layout, &aux);
        }
        let coincidence = monitors
            .as_ref()
            .and_then(|layout| Coincidence::from_readout(layout, &aux, &config.coincidence));

        for correction in setup.overrides() {
            correction.apply(&mut data);
        }

        let time = setup
            .layout()
            .array_time_word
            .and_then(|word| aux.time.get(word))
            .map(|value| *value as f32);

        let gate_names = &config.gates;
        let hit_gates = HitGates {
            windows: config.windows,
            esum_applies: setup.pipeline().plan().energy_match,
        };
        let mut summary = EventSummary::default();
        if let Some(c) = &coincidence {
            summary.good_tac = c.good_tac;
            summary.good_csi = c.good_csi;
        }
        for outcome in setup.pipeline().process_event(&data, time) {
            let hit = match outcome {
                DetectorOutcome::Calibrated(hit) => hit,
                DetectorOutcome::BelowThreshold => {
                    summary.below_threshold += 1;
                    continue;
                }
                DetectorOutcome::Excluded => {
                    summary.excluded += 1;
                    continue;
                }
                DetectorOutcome::DivisionGuard => {
                    summary.division_guarded += 1;
                    continue;
                }
            };

            let good_ez = match &gate_names.ez {
                Some(name) => gates.inside_region(name, hit.z, hit.e),
                None => false,
            };
            let good_time = match (&gate_names.time, hit.time) {
                (Some(name), Some(t)) => gates.inside_region(name, t, hit.e),
                _ => false,
            };
            summary.good_ez |= good_ez;
            summary.good_time |= good_time;

            fill_hit(sink, &hit, good_ez, &hit_gates);
            if let Some(c) = &coincidence {
                fill_coincidence(sink, &hit, good_ez, c, &config.coincidence);
            }
            self.accepted_counts[hit.detector.index()] += 1;
            summary.hits.push(hit);
        }

        self.events_sorted += 1;
        Ok(summary)
    }

    pub fn accepted_counts(&self) -> &[u64; NUMBER_OF_DETECTORS] {
        &self.accepted_counts
    }

    pub fn events_sorted(&self) -> u64 {
        self.events_sorted
    }

    /// Write the per-detector accepted counts to the log. Call when the run stops.
    pub fn run_summary(&self) {
        spdlog::info!("Sorted {} events", self.events_sorted);
        for (idx, count) in self.accepted_counts.iter().enumerate() {
            spdlog::info!("Detector {:>2}: {} hits accepted", idx + 1, count);
        }
    }
}

fn fill_raw(sink: &mut dyn HistogramSink, aux: &AuxReadout, hits: &[HitRecord]) {
    for hit in hits {
        sink.fill2(
            HistogramKey::adc(hit.adc),
            hit.value as f64,
            hit.channel as f64,
        );
    }
    for (word, value) in aux.aux.iter().enumerate() {
        sink.fill2(
            HistogramKey::array(HistogramCategory::Aux),
            *value as f64,
            word as f64,
        );
    }
    for (word, value) in aux.time.iter().enumerate() {
        sink.fill2(
            HistogramKey::array(HistogramCategory::Tdc),
            *value as f64,
            word as f64,
        );
    }
}

/// Beam, luminosity, and recoil monitors, read straight from the auxiliary words
fn fill_monitors(sink: &mut dyn HistogramSink, monitors: &MonitorLayout, aux: &AuxReadout) {
    use HistogramCategory::*;
    let aux_word = |word: usize| aux.aux.get(word).map(|v| *v as f64);
    let time_word = |word: usize| aux.time.get(word).map(|v| *v as f64);

    for (idx, word) in monitors.elum.iter().enumerate() {
        let energy = match aux_word(*word) {
            Some(v) => v,
            None => continue,
        };
        sink.fill1(HistogramKey::indexed(Elum, idx), energy);
        if energy > 0.0 {
            if let Some(rf) = time_word(monitors.elum_rf) {
                sink.fill2(HistogramKey::indexed(ElumRf, idx), energy, rf);
            }
        }
    }
    for (idx, (de, e)) in monitors.recoil.iter().enumerate() {
        if let (Some(de), Some(e)) = (aux_word(*de), aux_word(*e)) {
            sink.fill2(HistogramKey::indexed(Recoil, idx), de, e);
        }
    }
    if let Some(e0) = aux_word(monitors.e0) {
        if let Some(de0) = aux_word(monitors.de0) {
            sink.fill2(HistogramKey::array(BeamMonitor), e0, de0);
        }
        if let Some(rf) = time_word(monitors.de0_rf) {
            sink.fill2(HistogramKey::array(BeamMonitorRf), e0, rf);
        }
    }
}

/// Array-recoil coincidence state of one event
#[derive(Debug, Clone, Copy)]
struct Coincidence {
    tac: f32,
    good_tac: bool,
    good_csi: [bool; 4],
}

impl Coincidence {
    /// None if the variant has no array TAC, or the event is missing it
    fn from_readout(
        monitors: &MonitorLayout,
        aux: &AuxReadout,
        windows: &CoincidenceWindows,
    ) -> Option<Self> {
        let tac = *aux.time.get(monitors.array_tac?)? as f32;
        let mut good_csi = [false; 4];
        for (good, (_, e)) in good_csi.iter_mut().zip(monitors.recoil.iter()) {
            *good = matches!(aux.aux.get(*e), Some(v) if windows.good_csi(*v as f32));
        }
        Some(Self {
            tac,
            good_tac: windows.good_tac(tac),
            good_csi,
        })
    }
}

/// The fill windows, and whether the E sum window is in force at these calibration levels
#[derive(Debug, Clone, Copy)]
struct HitGates {
    windows: FillWindows,
    esum_applies: bool,
}

fn fill_hit(sink: &mut dyn HistogramSink, hit: &CalibratedHit, good_ez: bool, gates: &HitGates) {
    use HistogramCategory::*;
    let det = hit.detector;
    let number = det.number() as f64;
    let (e, xf, xn, z) = (hit.e as f64, hit.xf as f64, hit.xn as f64, hit.z as f64);
    let windows = &gates.windows;

    let in_energy = windows.energy.map_or(true, |w| w.contains(hit.e_channel));
    let in_position = windows.position.map_or(true, |w| w.contains(hit.x));
    let consistent = !gates.esum_applies || windows.esum.map_or(true, |w| w.accepts(hit));

    if in_energy {
        sink.fill2(HistogramKey::detector(XfXn, det), xn, xf);
        sink.fill2(HistogramKey::array(XfXn), xn, xf);
    }
    sink.fill2(HistogramKey::array(Energy), number, e);
    sink.fill2(HistogramKey::array(XFar), number, xf);
    sink.fill2(HistogramKey::array(XNear), number, xn);
    sink.fill2(HistogramKey::detector(EnergySum, det), xf + xn, e);
    if in_position && consistent {
        sink.fill2(HistogramKey::detector(EnergyX, det), hit.x as f64, e);
        sink.fill2(HistogramKey::array(EnergyZ), z, e);
        if good_ez {
            sink.fill2(HistogramKey::array(EnergyZGated), z, e);
        }
    }

    if let Some(t) = hit.time {
        sink.fill2(HistogramKey::array(Time), number, t as f64);
        sink.fill2(HistogramKey::array(TimeZ), z, t as f64);
    }

    if let Some(kin) = hit.kinematics {
        sink.fill1(HistogramKey::array(QValue), kin.excitation as f64);
        if let Some(ecm) = kin.ecm {
            sink.fill1(HistogramKey::array(Ecm), ecm as f64);
        }
        if let Some(theta) = kin.theta_cm {
            sink.fill1(HistogramKey::array(ThetaCm), theta as f64);
        }
    }
}

/// TAC vs E and the recoil-gated E vs Z
fn fill_coincidence(
    sink: &mut dyn HistogramSink,
    hit: &CalibratedHit,
    good_ez: bool,
    coincidence: &Coincidence,
    windows: &CoincidenceWindows,
) {
    use HistogramCategory::*;
    let (e, z, tac) = (hit.e as f64, hit.z as f64, coincidence.tac as f64);
    let good_csi = &coincidence.good_csi;

    if coincidence.tac > windows.tac_floor {
        sink.fill2(HistogramKey::array(TacEnergy), e, tac);
        for (idx, _) in good_csi.iter().enumerate().filter(|(_, good)| **good) {
            sink.fill2(HistogramKey::indexed(TacEnergy, idx), e, tac);
        }
        if good_ez {
            sink.fill2(HistogramKey::array(TacEnergyGated), e, tac);
            for (idx, _) in good_csi.iter().enumerate().filter(|(_, good)| **good) {
                sink.fill2(HistogramKey::indexed(TacEnergyGated, idx), e, tac);
            }
        }
    }

    if good_ez && coincidence.good_tac {
        if good_csi.iter().any(|good| *good) {
            sink.fill2(HistogramKey::array(EnergyZCoincidence), z, e);
        }
        for (idx, _) in good_csi.iter().enumerate().filter(|(_, good)| **good) {
            sink.fill2(HistogramKey::indexed(EnergyZCoincidence, idx), z, e);
        }
    }
}
