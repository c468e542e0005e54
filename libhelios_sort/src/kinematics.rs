use serde::{Deserialize, Serialize};

use super::constants::MEV;

/// Properties of the reaction being measured.
///
/// Defaults are those of the 28Si(d,p) setup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Mass of the detected particle in kg
    pub particle_mass_kg: f64,
    /// Center-of-mass velocity in m/s
    pub vcm: f64,
    /// Cyclotron period of the detected particle in ns
    pub cyclotron_period_ns: f64,
    /// Ground state intercept of the kinematic lines in MeV
    pub intercept: f64,
    /// Mass ratio converting the lab energy difference to excitation energy
    pub excitation_scale: f64,
}

impl Default for Reaction {
    fn default() -> Self {
        Self {
            particle_mass_kg: 1.673E-27,
            vcm: 3.174E7,
            cyclotron_period_ns: 34.246,
            intercept: 11.672,
            excitation_scale: 29.984 / 28.976,
        }
    }
}

/// Result of reconstructing one detector hit.
///
/// Quantities which come out unphysical (negative square roots, angles outside of acos
/// range, division by zero) are None.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    /// Energy the particle would have at 90 degrees in the lab, MeV
    pub e90: f32,
    /// Excitation energy, MeV
    pub excitation: f32,
    /// Lab velocity, m/s
    pub lab_velocity: Option<f32>,
    /// Velocity in the center-of-mass frame, m/s
    pub cm_velocity: Option<f32>,
    /// Center-of-mass energy, MeV
    pub ecm: Option<f32>,
    /// Time of flight, ns
    pub tof: Option<f32>,
    /// Center-of-mass angle in degrees from the energies
    pub theta_cm: Option<f32>,
    /// Center-of-mass angle in degrees from the axial velocity
    pub theta_cm_axial: Option<f32>,
}

fn finite(value: f64) -> Option<f32> {
    if value.is_finite() {
        Some(value as f32)
    } else {
        None
    }
}

impl Reaction {
    fn period_s(&self) -> f64 {
        self.cyclotron_period_ns * 1.0E-9
    }

    /// Slope of the kinematic lines in the E vs Z plane, MeV/mm
    pub fn slope_ecm(&self) -> f64 {
        ((self.particle_mass_kg * self.vcm) / self.period_s()) / MEV / 1000.0
    }

    /// Reconstruct the two-body kinematics from the lab energy (MeV) and the beam-axis
    /// position (mm) of a hit
    pub fn reconstruct(&self, energy: f32, z: f32) -> Kinematics {
        let e = energy as f64;
        let z_mm = z as f64;
        let slope = self.slope_ecm();
        let mass = self.particle_mass_kg;
        let axial_velocity = (z_mm / 1000.0) / self.period_s();

        let e90 = e - slope * z_mm;
        let excitation = (self.intercept - e90) * self.excitation_scale;

        let v = (2.0 * e * MEV / mass).sqrt();
        let z0 = (e - self.intercept) / slope;
        let tof = self.cyclotron_period_ns * z_mm / z0;
        let v0 = (v * v + self.vcm * self.vcm - 2.0 * self.vcm * axial_velocity).sqrt();
        let ecm = 0.5 * mass * (v0 * v0 - self.vcm * self.vcm) / MEV;
        let theta = 180.0
            - ((v * v - v0 * v0 - self.vcm * self.vcm) / (2.0 * v0 * self.vcm))
                .acos()
                .to_degrees();
        let theta_axial = 180.0 - ((axial_velocity - self.vcm) / v0).acos().to_degrees();

        Kinematics {
            e90: e90 as f32,
            excitation: excitation as f32,
            lab_velocity: finite(v),
            cm_velocity: finite(v0),
            ecm: finite(ecm),
            tof: finite(tof),
            theta_cm: finite(theta),
            theta_cm_axial: finite(theta_axial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_state_line() {
        let reaction = Reaction::default();
        let z: f32 = -500.0;
        let e = (reaction.intercept + reaction.slope_ecm() * z as f64) as f32;
        let result = reaction.reconstruct(e, z);
        assert!((result.e90 - reaction.intercept as f32).abs() < 1.0e-4);
        assert!(result.excitation.abs() < 1.0e-4);
    }

    #[test]
    fn test_consistent_event() {
        let reaction = Reaction::default();
        let v0: f64 = 2.0E7;
        let theta: f64 = 130.0_f64.to_radians();
        let axial = v0 * theta.cos() + reaction.vcm;
        let z_mm = axial * reaction.period_s() * 1000.0;
        let v_sq = v0 * v0 + reaction.vcm * reaction.vcm + 2.0 * v0 * reaction.vcm * theta.cos();
        let e = 0.5 * reaction.particle_mass_kg * v_sq / MEV;

        let result = reaction.reconstruct(e as f32, z_mm as f32);
        let expected_angle = 180.0 - 130.0;
        let cm_velocity = match result.cm_velocity {
            Some(v) => v as f64,
            None => panic!(),
        };
        assert!((cm_velocity - v0).abs() / v0 < 1.0e-3);
        match (result.theta_cm, result.theta_cm_axial) {
            (Some(t1), Some(t2)) => {
                assert!((t1 - expected_angle).abs() < 0.1);
                assert!((t2 - expected_angle).abs() < 0.1);
            }
            _ => panic!(),
        }
        let ecm = 0.5 * reaction.particle_mass_kg * (v0 * v0 - reaction.vcm * reaction.vcm) / MEV;
        match result.ecm {
            Some(value) => assert!(((value as f64) - ecm).abs() < 1.0e-2 * ecm.abs().max(1.0)),
            None => panic!(),
        }
    }

    #[test]
    fn test_unphysical_is_none() {
        let reaction = Reaction::default();
        // Negative energy has no lab velocity
        let result = reaction.reconstruct(-1.0, -400.0);
        assert_eq!(result.lab_velocity, None);
        assert_eq!(result.theta_cm, None);
        // On the intercept the flight time diverges
        let result = reaction.reconstruct(reaction.intercept as f32, 0.0);
        assert!(result.tof.is_none() || result.tof == Some(0.0));
    }
}
