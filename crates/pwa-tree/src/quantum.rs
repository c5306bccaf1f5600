//! Quantum numbers, angular-momentum coupling rules and declarative particle specs.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Spin (as twice its value) and electric charge of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantumNumbers {
    /// Twice the spin.
    pub two_j: u32,
    /// Electric charge in units of the elementary charge.
    pub charge: i32,
}

impl QuantumNumbers {
    /// Creates quantum numbers from twice the spin and the charge.
    pub fn new(two_j: u32, charge: i32) -> Self {
        Self { two_j, charge }
    }
}

impl Display for QuantumNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(J = {}, Q = {:+})", spin_to_string(self.two_j), self.charge)
    }
}

/// Whether three angular momenta (given doubled) satisfy the triangle rule.
pub fn triangle(two_a: u32, two_b: u32, two_c: u32) -> bool {
    (two_a + two_b + two_c) % 2 == 0 && two_a.abs_diff(two_b) <= two_c && two_c <= two_a + two_b
}

/// Smallest total spin `S` (doubled) that couples the daughters `j1`, `j2`
/// and couples with orbital angular momentum `l` to the parent spin.
pub fn coupled_spin(two_j_parent: u32, l: u32, two_j1: u32, two_j2: u32) -> Option<u32> {
    let lowest = two_j1.abs_diff(two_j2);
    (lowest..=two_j1 + two_j2)
        .step_by(2)
        .find(|two_s| triangle(two_j_parent, 2 * l, *two_s))
}

/// Renders a doubled spin as `1`, `3/2`, ...
pub fn spin_to_string(two_j: u32) -> String {
    if two_j % 2 == 0 {
        (two_j / 2).to_string()
    } else {
        format!("{two_j}/2")
    }
}

/// Lineshape of a decaying particle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ShapeSpec {
    /// Constant unit lineshape (non-resonant or initial state).
    #[default]
    Flat,
    /// Relativistic Breit-Wigner around the nominal mass.
    BreitWigner {
        /// Nominal width.
        width: f64,
    },
}

fn default_radial_size() -> f64 {
    3.0
}

/// Declarative description of a particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSpec {
    /// Unique name; final-state entries with equal names are identical particles.
    pub name: String,
    /// Spin and charge.
    pub quantum: QuantumNumbers,
    /// Nominal mass.
    pub mass: f64,
    /// Radial size entering the barrier factor (decaying particles only).
    #[serde(default = "default_radial_size")]
    pub radial_size: f64,
    /// Lineshape (decaying particles only).
    #[serde(default)]
    pub shape: ShapeSpec,
}

impl ParticleSpec {
    /// Creates a spec with the default radial size and a flat shape.
    pub fn new(name: impl Into<String>, quantum: QuantumNumbers, mass: f64) -> Self {
        Self {
            name: name.into(),
            quantum,
            mass,
            radial_size: default_radial_size(),
            shape: ShapeSpec::Flat,
        }
    }

    /// Sets a Breit-Wigner lineshape with the given width.
    pub fn with_breit_wigner(mut self, width: f64) -> Self {
        self.shape = ShapeSpec::BreitWigner { width };
        self
    }

    /// Sets the radial size.
    pub fn with_radial_size(mut self, radial_size: f64) -> Self {
        self.radial_size = radial_size;
        self
    }
}

fn default_amplitude() -> [f64; 2] {
    [1.0, 0.0]
}

/// Declarative description of a two-body decay channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Orbital angular momentum between the daughters.
    pub l: u32,
    /// Doubled total spin of the daughters; the smallest allowed value when absent.
    #[serde(default)]
    pub two_s: Option<u32>,
    /// Initial free amplitude as `[re, im]`.
    #[serde(default = "default_amplitude")]
    pub amplitude: [f64; 2],
    /// Whether the free amplitude is excluded from fits.
    #[serde(default)]
    pub fixed: bool,
}

impl ChannelSpec {
    /// Channel with orbital angular momentum `l` and unit free amplitude.
    pub fn new(l: u32) -> Self {
        Self {
            l,
            two_s: None,
            amplitude: default_amplitude(),
            fixed: false,
        }
    }

    /// Sets the doubled total daughter spin.
    pub fn with_two_s(mut self, two_s: u32) -> Self {
        self.two_s = Some(two_s);
        self
    }

    /// Sets the initial free amplitude.
    pub fn with_amplitude(mut self, re: f64, im: f64) -> Self {
        self.amplitude = [re, im];
        self
    }

    /// Excludes the free amplitude from fits.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_rule() {
        assert!(triangle(0, 2, 2));
        assert!(triangle(2, 2, 0));
        assert!(!triangle(0, 2, 0));
        assert!(!triangle(1, 1, 1));
        assert!(triangle(1, 1, 2));
    }

    #[test]
    fn coupled_spin_picks_smallest_allowed() {
        // vector -> two scalars needs S = 0 and L = 1
        assert_eq!(coupled_spin(2, 1, 0, 0), Some(0));
        assert_eq!(coupled_spin(2, 0, 0, 0), None);
        // scalar -> vector + scalar with L = 1 couples through S = 1
        assert_eq!(coupled_spin(0, 1, 2, 0), Some(2));
    }

    #[test]
    fn specs_fill_defaults_from_json() {
        let spec: ParticleSpec = serde_json::from_str(
            r#"{"name":"rho0","quantum":{"two_j":2,"charge":0},"mass":0.775,
                "shape":{"kind":"breit-wigner","width":0.149}}"#,
        )
        .unwrap();
        assert_eq!(spec.radial_size, 3.0);
        assert_eq!(spec.shape, ShapeSpec::BreitWigner { width: 0.149 });

        let channel: ChannelSpec = serde_json::from_str(r#"{"l":1}"#).unwrap();
        assert_eq!(channel, ChannelSpec::new(1));
        assert_eq!(spin_to_string(3), "3/2");
    }
}
