//! # helios_sort
//!
//! helios_sort is the event sort for the HELIOS (Helical Orbit Spectrometer) silicon array,
//! written in Rust. It takes the raw readout words of a triggered event from the data
//! acquisition, unpacks the five ADCs onto the 24 position-sensitive detectors of the
//! array, calibrates energy, position, and time, reconstructs the two-body kinematics, and
//! hands the results to a histogram sink for online monitoring or offline analysis.
//!
//! The library does not own the event source, the histograms, or the thread which sorts;
//! those belong to the host. A host builds a [`setup::SortSetup`] once per run, wraps it in
//! an `Arc`, and feeds each event to a [`sorter::Sorter`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use libhelios_sort::bitfield::RawEvent;
//! use libhelios_sort::config::SortConfig;
//! use libhelios_sort::setup::SortSetup;
//! use libhelios_sort::sink::FillRecorder;
//! use libhelios_sort::sorter::Sorter;
//!
//! let config = SortConfig::read_config_file(std::path::Path::new("sort.yml")).unwrap();
//! let setup = Arc::new(SortSetup::load(&config).unwrap());
//! let mut sorter = Sorter::new(setup);
//! let mut sink = FillRecorder::new();
//! let event = RawEvent::from_bytes(&[0u8; 40]);
//! if let Err(e) = sorter.sort_event(&event, &mut sink) {
//!     eprintln!("Bad event: {e}");
//! }
//! sorter.run_summary();
//! ```
//!
//! The library logs through spdlog; it is up to the host to install a sink for the logs.
//!
//! ## Experiment Variants
//!
//! The same decode is used for every experiment. What differs between them is data:
//!
//! - `H007`: online monitor. 16 auxiliary words and 6 TDC words precede the ADCs. Straight
//! cabling, no thresholds. The beam, luminosity, and recoil monitors in the auxiliary words
//! are filled; kinematics are off.
//! - `O19`: as H007, with kinematics, and with the array TAC (TDC word 4) and the recoil CsI
//! energies used to gate the array on recoil coincidences.
//! - `Si28`: one TAC word precedes the ADCs and is the array time. Part of ADC 2 is
//! recabled, and detector 13 lost its XF signal, which is rebuilt from E and a rescaled XN.
//! Thresholds of 75 channels on E, XF, XN and 28 channels on the time.
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! variant: Si28
//! calibration_path: null
//! channel_map_path: null
//! gate_path: null
//! levels:
//!   energy: 0
//!   position: 0
//!   time: 0
//!   q_value: 0
//! thresholds:
//!   low: 75.0
//!   min_time: 28.0
//! excluded_detectors: []
//! geometry:
//!   separation_mm: 500.0
//!   active_length_mm: 50.5
//!   centers_mm: [66.76, 124.12, 182.48, 241.11, 299.87, 358.68]
//! reaction:
//!   particle_mass_kg: 1.673e-27
//!   vcm: 31740000.0
//!   cyclotron_period_ns: 34.246
//!   intercept: 11.672
//!   excitation_scale: 1.0347874
//! kinematics: true
//! gates:
//!   ez: cEZ
//!   time: cTime2D
//! windows:
//!   energy:
//!     center: 1024.0
//!     half_width: 13.0
//!   position: null
//!   esum:
//!     sum_half_width: 17.88
//!     diff_margin: 143.04
//! coincidence:
//!   tac_min: 140.0
//!   tac_max: 2500.0
//!   csi_min: 100.0
//!   csi_max: 4000.0
//!   tac_floor: 50.0
//! ```
//!
//! `windows` gate the per-detector fills and may be left out, in which case every window is
//! open. The energy window (E in channels) gates XF vs XN. The position window on x gates E vs
//! x and E vs Z, and so does the E sum window once position calibration is at level 2 or
//! higher. `coincidence` is only used by variants with recoil telescopes.
//!
//! If `calibration_path` is `null` a template with every coefficient unset is used, which
//! sorts raw data. If `channel_map_path` is `null` the cabling bundled for the variant is
//! used.
//!
//! ### Calibration Levels
//!
//! - Energy: 0 raw, 1 correct the position dependence of E, 2 calibrate E in MeV
//! - Position: 0 raw, 1 gain match XF to XN, 2 gain match (XF+XN) to E, 3 adjust the Z
//! offset, 4 expand x about the detector center
//! - Time: 0 raw, 1 piecewise walk correction, 2 linear walk correction, 3 flatten T vs Z,
//! 4 calibrate T in ns
//! - Q-value: 0 raw, 1 calibrate the excitation energy
//!
//! ### Cabling Format
//!
//! The cabling is a CSV file with a header line. The columns are as follows:
//!
//! ```csv
//! adc,channel,detector,signal
//! ```
//!
//! ADC and channel are zero based. The detector is the zero based detector index, and the
//! signal is one of `e`, `xf`, `xn`. Channels which are not cabled are left out.
//!
//! ### Calibration Format
//!
//! Whitespace delimited text with one row per detector. The first column is the detector
//! number, starting from 1, and the remaining 21 columns are the coefficients in the order
//! given in [`calibration`]. A coefficient equal to its own column index is unset. `#`
//! starts a comment.
//!
//! ### Gate Format
//!
//! A YAML map of gate names to polygon vertices:
//!
//! ```yml
//! cEZ: [[-600.0, 2.0], [-300.0, 2.0], [-300.0, 8.0]]
//! ```
pub mod bitfield;
pub mod calibration;
pub mod channel_map;
pub mod config;
pub mod constants;
pub mod detector;
pub mod error;
pub mod event;
pub mod gate;
pub mod kinematics;
pub mod pipeline;
pub mod setup;
pub mod sink;
pub mod sorter;
pub mod unpacker;
pub mod variant;
