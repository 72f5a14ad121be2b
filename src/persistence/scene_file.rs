//! The exported scene document
//!
//! ```json
//! { "name": "...", "readonly": false, "gravity": 1, "bounce": 0.6,
//!   "instrument": "marimba",
//!   "spawners": [{ "x": 0, "y": 0, "r": 10, "delay": 0 }],
//!   "bars": [{ "x": 0, "y": 0, "w": 160, "h": 16, "angle": 0, "note": "C4",
//!              "shape": "rect", "instrument": "bell",
//!              "curvatureTop": 0, "curvatureBottom": 0, "maxHits": 3 }] }
//! ```
//!
//! Import is forgiving: anything but a missing `bars` array is defaulted.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::audio::{Instrument, Note, instrument_or_default, note_or_default};
use crate::consts::*;
use crate::sim::state::BarShape;

/// One bar as stored in files and snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarRecord {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub angle: f32,
    pub note: Note,
    pub shape: BarShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<Instrument>,
    #[serde(default)]
    pub curvature_top: f32,
    #[serde(default)]
    pub curvature_bottom: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hits: Option<u32>,
}

/// One spawner as stored in files and snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnerRecord {
    pub x: f32,
    pub y: f32,
    pub r: f32,
    /// Milliseconds
    pub delay: u32,
}

/// One placeholder as stored in files and snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderRecord {
    pub x: f32,
    pub y: f32,
    pub r: f32,
}

/// The whole exported document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    pub name: String,
    pub readonly: bool,
    pub gravity: f32,
    pub bounce: f32,
    pub instrument: Instrument,
    pub spawners: Vec<SpawnerRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub placeholders: Vec<PlaceholderRecord>,
    pub bars: Vec<BarRecord>,
}

impl Default for SceneFile {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            readonly: false,
            gravity: DEFAULT_GRAVITY,
            bounce: DEFAULT_BOUNCE,
            instrument: instrument_or_default(None),
            spawners: Vec::new(),
            placeholders: Vec::new(),
            bars: Vec::new(),
        }
    }
}

/// Why an import was refused
#[derive(Debug)]
pub enum ImportError {
    /// Not valid JSON at all
    Json(serde_json::Error),
    /// Valid JSON but not an object
    NotAnObject,
    /// The object has no `bars` array
    MissingBars,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Json(e) => write!(f, "scene is not valid JSON: {e}"),
            ImportError::NotAnObject => write!(f, "scene must be a JSON object"),
            ImportError::MissingBars => write!(f, "scene has no \"bars\" array"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Json(e) => Some(e),
            _ => None,
        }
    }
}

/// Why an export was refused
#[derive(Debug)]
pub enum ExportError {
    /// The title slugifies to nothing
    EmptyTitle,
    Json(serde_json::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::EmptyTitle => write!(f, "enter a title with at least one letter or digit"),
            ExportError::Json(e) => write!(f, "failed to serialize scene: {e}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Json(e) => Some(e),
            ExportError::EmptyTitle => None,
        }
    }
}

/// Best-effort numeric coercion: numbers, numeric strings and booleans
fn number(value: Option<&Value>) -> Option<f32> {
    let n = match value? {
        Value::Number(n) => n.as_f64()? as f32,
        Value::String(s) => s.trim().parse::<f32>().ok()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn number_or(obj: &Map<String, Value>, key: &str, default: f32) -> f32 {
    number(obj.get(key)).unwrap_or(default)
}

fn string<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn boolean(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim(), "true" | "1"),
        other => number(other).is_some_and(|n| n != 0.0),
    }
}

/// Entries of an optional array that are objects
fn objects<'a>(obj: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Map<String, Value>> {
    obj.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

impl BarRecord {
    fn from_json(obj: &Map<String, Value>) -> Self {
        let shape = string(obj, "shape")
            .and_then(BarShape::from_name)
            .unwrap_or_default();
        let max_hits = number(obj.get("maxHits"))
            .filter(|n| *n >= 1.0)
            .map(|n| n as u32);
        Self {
            x: number_or(obj, "x", 0.0),
            y: number_or(obj, "y", 0.0),
            w: number_or(obj, "w", BAR_WIDTH).max(MIN_BAR_SIZE),
            h: number_or(obj, "h", BAR_HEIGHT).max(MIN_BAR_SIZE),
            angle: crate::normalize_angle(number_or(obj, "angle", 0.0)),
            note: note_or_default(string(obj, "note")),
            shape,
            instrument: string(obj, "instrument").and_then(Instrument::from_name),
            curvature_top: number_or(obj, "curvatureTop", 0.0).clamp(-1.0, 1.0),
            curvature_bottom: number_or(obj, "curvatureBottom", 0.0).clamp(-1.0, 1.0),
            max_hits,
        }
    }
}

impl SpawnerRecord {
    fn from_json(obj: &Map<String, Value>) -> Self {
        Self {
            x: number_or(obj, "x", 0.0),
            y: number_or(obj, "y", 0.0),
            r: number_or(obj, "r", BALL_RADIUS).max(1.0),
            delay: number_or(obj, "delay", 0.0).max(0.0) as u32,
        }
    }
}

impl PlaceholderRecord {
    fn from_json(obj: &Map<String, Value>) -> Self {
        Self {
            x: number_or(obj, "x", 0.0),
            y: number_or(obj, "y", 0.0),
            r: number_or(obj, "r", BALL_RADIUS).max(1.0),
        }
    }
}

impl SceneFile {
    /// Parse an exported scene, defaulting everything but `bars`
    pub fn from_json(text: &str) -> Result<Self, ImportError> {
        let value: Value = serde_json::from_str(text).map_err(ImportError::Json)?;
        let obj = value.as_object().ok_or(ImportError::NotAnObject)?;
        if !obj.get("bars").is_some_and(Value::is_array) {
            return Err(ImportError::MissingBars);
        }

        let defaults = SceneFile::default();
        let mut spawners: Vec<SpawnerRecord> =
            objects(obj, "spawners").map(SpawnerRecord::from_json).collect();
        if spawners.len() > MAX_SPAWNERS {
            log::debug!(
                "Import: keeping {} of {} spawners",
                MAX_SPAWNERS,
                spawners.len()
            );
            spawners.truncate(MAX_SPAWNERS);
        }

        let file = Self {
            name: string(obj, "name")
                .map(str::to_string)
                .unwrap_or(defaults.name),
            readonly: boolean(obj.get("readonly")),
            gravity: number_or(obj, "gravity", defaults.gravity),
            bounce: number_or(obj, "bounce", defaults.bounce).clamp(0.0, 1.5),
            instrument: instrument_or_default(string(obj, "instrument")),
            spawners,
            placeholders: objects(obj, "placeholders")
                .map(PlaceholderRecord::from_json)
                .collect(),
            bars: objects(obj, "bars").map(BarRecord::from_json).collect(),
        };
        log::info!(
            "Imported scene {:?}: {} bars, {} spawners, {} placeholders",
            file.name,
            file.bars.len(),
            file.spawners.len(),
            file.placeholders.len()
        );
        Ok(file)
    }

    pub fn to_json_pretty(&self) -> Result<String, ExportError> {
        serde_json::to_string_pretty(self).map_err(ExportError::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_bars_rejected() {
        assert!(matches!(
            SceneFile::from_json(r#"{"name": "x", "spawners": []}"#),
            Err(ImportError::MissingBars)
        ));
        assert!(matches!(
            SceneFile::from_json(r#"{"bars": {}}"#),
            Err(ImportError::MissingBars)
        ));
        assert!(matches!(
            SceneFile::from_json("[1, 2]"),
            Err(ImportError::NotAnObject)
        ));
        assert!(matches!(
            SceneFile::from_json("{not json"),
            Err(ImportError::Json(_))
        ));
    }

    #[test]
    fn test_minimal_scene_defaults() {
        let file = SceneFile::from_json(r#"{"bars": [{}]}"#).unwrap();
        assert_eq!(file.name, "Untitled");
        assert!(!file.readonly);
        assert_eq!(file.gravity, DEFAULT_GRAVITY);
        assert_eq!(file.bounce, DEFAULT_BOUNCE);
        assert_eq!(file.instrument, Instrument::Marimba);
        assert!(file.spawners.is_empty());
        let bar = &file.bars[0];
        assert_eq!((bar.x, bar.y), (0.0, 0.0));
        assert_eq!((bar.w, bar.h), (BAR_WIDTH, BAR_HEIGHT));
        assert_eq!(bar.shape, BarShape::Rect);
        assert_eq!(bar.note, Note::parse(DEFAULT_NOTE).unwrap());
        assert_eq!(bar.instrument, None);
        assert_eq!(bar.max_hits, None);
    }

    #[test]
    fn test_numbers_are_coerced() {
        let file = SceneFile::from_json(
            r#"{"gravity": "2.5", "readonly": "true",
                "spawners": [{"x": "12", "y": true, "r": null, "delay": "-5"}],
                "bars": [{"x": "40.5", "y": "abc", "w": "NaN", "angle": false,
                          "shape": "Seesaw", "note": "G3", "maxHits": "2"}]}"#,
        )
        .unwrap();
        assert_eq!(file.gravity, 2.5);
        assert!(file.readonly);
        let s = &file.spawners[0];
        assert_eq!((s.x, s.y, s.r, s.delay), (12.0, 1.0, BALL_RADIUS, 0));
        let b = &file.bars[0];
        assert_eq!(b.x, 40.5);
        assert_eq!(b.y, 0.0);
        assert_eq!(b.w, BAR_WIDTH);
        assert_eq!(b.angle, 0.0);
        assert_eq!(b.shape, BarShape::Seesaw);
        assert_eq!(b.note.name(), "G3");
        assert_eq!(b.max_hits, Some(2));
    }

    #[test]
    fn test_non_object_entries_skipped() {
        let file = SceneFile::from_json(r#"{"bars": [1, "x", {"x": 5}], "spawners": "nope"}"#)
            .unwrap();
        assert_eq!(file.bars.len(), 1);
        assert!(file.spawners.is_empty());
    }

    #[test]
    fn test_spawner_limit_on_import() {
        let spawners: Vec<String> = (0..8).map(|i| format!(r#"{{"x": {i}}}"#)).collect();
        let text = format!(r#"{{"bars": [], "spawners": [{}]}}"#, spawners.join(","));
        let file = SceneFile::from_json(&text).unwrap();
        assert_eq!(file.spawners.len(), MAX_SPAWNERS);
    }

    #[test]
    fn test_export_uses_camel_case_and_omits_empty() {
        let mut file = SceneFile::default();
        file.bars.push(BarRecord {
            x: 1.0,
            y: 2.0,
            w: 100.0,
            h: 10.0,
            angle: 0.25,
            note: Note::parse("E4").unwrap(),
            shape: BarShape::Curve,
            instrument: None,
            curvature_top: 0.5,
            curvature_bottom: 0.5,
            max_hits: None,
        });
        let json = file.to_json_pretty().unwrap();
        assert!(json.contains("\"curvatureTop\": 0.5"));
        assert!(json.contains("\"shape\": \"curve\""));
        assert!(json.contains("\"note\": \"E4\""));
        assert!(!json.contains("maxHits"));
        assert!(!json.contains("placeholders"));

        let back = SceneFile::from_json(&json).unwrap();
        assert_eq!(back, file);
    }
}
