use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::GateError;

/// Anything which can answer "is (x, y) inside the region called name".
///
/// A name which is not known evaluates to false; a missing gate is never an error.
pub trait RegionEvaluator {
    fn inside_region(&self, name: &str, x: f32, y: f32) -> bool;
}

/// An evaluator with no regions at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGates;

impl RegionEvaluator for NoGates {
    fn inside_region(&self, _name: &str, _x: f32, _y: f32) -> bool {
        false
    }
}

/// A closed polygon in a 2-D histogram plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    vertices: Vec<[f32; 2]>,
}

impl Polygon {
    pub fn new(vertices: Vec<[f32; 2]>) -> Self {
        Self { vertices }
    }

    /// Even-odd rule; points exactly on an edge may fall either way
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let [xi, yi] = self.vertices[i];
            let [xj, yj] = self.vertices[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// GateSet is the collection of named graphical cuts for a run.
///
/// Gates are read from a YAML file mapping the gate name to its list of vertices:
///
/// ```yml
/// cEZ:
///   - [-600.0, 2.0]
///   - [-300.0, 2.0]
///   - [-300.0, 8.0]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateSet {
    gates: FxHashMap<String, Polygon>,
}

impl GateSet {
    /// Load gates from a YAML file
    pub fn read_gate_file(path: &Path) -> Result<Self, GateError> {
        if !path.exists() {
            return Err(GateError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        Self::parse(&yaml_str)
    }

    pub fn parse(yaml_str: &str) -> Result<Self, GateError> {
        let set = serde_yaml::from_str::<Self>(yaml_str)?;
        for (name, polygon) in set.gates.iter() {
            if polygon.vertices.len() < 3 {
                return Err(GateError::Degenerate(name.clone()));
            }
        }
        Ok(set)
    }

    pub fn insert(&mut self, name: &str, polygon: Polygon) {
        self.gates.insert(name.to_string(), polygon);
    }

    pub fn contains_gate(&self, name: &str) -> bool {
        self.gates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

impl RegionEvaluator for GateSet {
    fn inside_region(&self, name: &str, x: f32, y: f32) -> bool {
        match self.gates.get(name) {
            Some(polygon) => polygon.contains(x, y),
            None => false,
        }
    }
}
