use std::{collections::HashSet, ops::Index, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    fix::{Coordinate, LocationComponent, Positioned, check_coordinates},
    prelude::*,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, specta::Type)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
/// Clue pointing the player toward a landmark
pub enum TaskHint {
    Text(String),
    /// URL of an image
    Image(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// What the player has to do once they reach a landmark
pub struct TaskDefinition {
    /// Name of the handler in a [crate::TaskRegistry]
    pub app: String,
    /// Handler specific data, opaque to everything else
    #[serde(default)]
    pub payload: Value,
    pub title: String,
    pub hint: TaskHint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Landmark {
    pub id: String,
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: LocationComponent,
    #[serde(rename = "lng")]
    pub longitude: LocationComponent,
    /// How close a player has to be for the task to unlock
    pub radius_meters: f64,
    pub task: TaskDefinition,
}

impl Landmark {
    fn validate(&self) -> Result {
        if self.id.trim().is_empty() {
            bail!("Landmark \"{}\" has an empty id", self.name);
        }
        check_coordinates(self.latitude, self.longitude).map_err(|why| anyhow!(why))?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            bail!("Radius must be greater than 0, got {}", self.radius_meters);
        }
        Ok(())
    }
}

impl Positioned for Landmark {
    fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Validated, read-only list of landmarks in hunt order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet(Vec<Landmark>);

impl LandmarkSet {
    pub fn new(landmarks: Vec<Landmark>) -> Result<Self> {
        Self::validate_all(&landmarks)?;
        Ok(Self(landmarks))
    }

    fn validate_all(landmarks: &[Landmark]) -> Result {
        let mut seen = HashSet::with_capacity(landmarks.len());
        for (i, landmark) in landmarks.iter().enumerate() {
            landmark
                .validate()
                .with_context(|| format!("Invalid landmark #{i} ({})", landmark.id))?;
            if !seen.insert(landmark.id.as_str()) {
                bail!("Duplicate landmark id \"{}\"", landmark.id);
            }
        }
        Ok(())
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let landmarks: Vec<Landmark> =
            serde_json::from_str(raw).context("Failed to parse landmark list")?;
        Self::new(landmarks)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read landmarks from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid landmarks in {}", path.display()))
    }

    pub fn get(&self, id: &str) -> Option<&Landmark> {
        self.0.iter().find(|l| l.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Landmark] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<usize> for LandmarkSet {
    type Output = Landmark;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a LandmarkSet {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
