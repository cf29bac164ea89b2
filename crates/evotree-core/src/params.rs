//! World construction parameters and their three persisted encodings.
//!
//! The same [`WorldParams`] value is written as
//! - a human-edited JSON document,
//! - a flat string key/value preference map,
//! - a binary buffer in which every decorator parameter carries a type tag.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DECORATOR_BY_TIME: &str = "ChangeLightByTime";
pub const DECORATOR_BY_X: &str = "ChangeLightByX";

const PREF_WIDTH: &str = "world.width";
const PREF_HEIGHT: &str = "world.height";
const PREF_CELL_SIZE: &str = "world.cellSize";
const PREF_SUN_LIGHT: &str = "world.sunLight";
const PREF_ABSORPTION_STEP: &str = "world.lightAbsorptionStep";
const PREF_LIGHT_DECAY: &str = "world.lightDecay";
const PREF_DECORATORS: &str = "selectedDecorators";
const PREF_PARAM_PREFIX: &str = "decorator.param.";

/// A named decorator parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Str(String),
}

impl ParamValue {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Long(v) => i32::try_from(*v).ok(),
            ParamValue::Float(v) => Some(*v as i32),
            ParamValue::Bool(_) | ParamValue::Str(_) => None,
        }
    }

    /// Preference form `<type>:<value>`, so strings that look like numbers
    /// or booleans keep their type.
    fn to_pref_string(&self) -> String {
        match self {
            ParamValue::Bool(v) => format!("bool:{}", v),
            ParamValue::Int(v) => format!("int:{}", v),
            ParamValue::Long(v) => format!("long:{}", v),
            ParamValue::Float(v) => format!("float:{:?}", v),
            ParamValue::Str(v) => format!("str:{}", v),
        }
    }

    fn from_pref_string(raw: &str) -> Result<Self> {
        let malformed = || Error::Config(format!("unparseable parameter value {:?}", raw));
        let (tag, value) = raw.split_once(':').ok_or_else(malformed)?;
        match tag {
            "bool" => value.parse().map(ParamValue::Bool).map_err(|_| malformed()),
            "int" => value.parse().map(ParamValue::Int).map_err(|_| malformed()),
            "long" => value.parse().map(ParamValue::Long).map_err(|_| malformed()),
            "float" => value.parse().map(ParamValue::Float).map_err(|_| malformed()),
            "str" => Ok(ParamValue::Str(value.to_string())),
            _ => Err(malformed()),
        }
    }
}

/// Externally tagged mirror of [`ParamValue`] for the binary encoding,
/// which cannot decode untagged enums.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TaggedValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Str(String),
}

impl From<&ParamValue> for TaggedValue {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Bool(v) => TaggedValue::Bool(*v),
            ParamValue::Int(v) => TaggedValue::Int(*v),
            ParamValue::Long(v) => TaggedValue::Long(*v),
            ParamValue::Float(v) => TaggedValue::Float(*v),
            ParamValue::Str(v) => TaggedValue::Str(v.clone()),
        }
    }
}

impl From<TaggedValue> for ParamValue {
    fn from(value: TaggedValue) -> Self {
        match value {
            TaggedValue::Bool(v) => ParamValue::Bool(v),
            TaggedValue::Int(v) => ParamValue::Int(v),
            TaggedValue::Long(v) => ParamValue::Long(v),
            TaggedValue::Float(v) => ParamValue::Float(v),
            TaggedValue::Str(v) => ParamValue::Str(v),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BinaryParams {
    version: u32,
    width: i32,
    height: i32,
    cell_size: i32,
    sun_light: i32,
    light_absorption_step: i32,
    light_decay: f32,
    decorators: Vec<String>,
    decorator_params: Vec<(String, TaggedValue)>,
}

const BINARY_VERSION: u32 = 1;

/// Parameters needed to construct a world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldParams {
    /// Grid width in cells
    pub width: i32,
    /// Grid height in cells
    pub height: i32,
    /// Size of one cell in world units
    pub cell_size: i32,
    /// Light at the top row before decorators
    pub sun_light: i32,
    /// Light lost per row below the top
    pub light_absorption_step: i32,
    /// Multiplier applied to light on every propagation hop
    pub light_decay: f32,
    /// Light decorators, applied in order
    pub decorators: Vec<String>,
    /// Named decorator parameters, e.g. `ChangeLightByTime.delay`
    pub decorator_params: BTreeMap<String, ParamValue>,
}

impl Default for WorldParams {
    fn default() -> Self {
        let mut decorator_params = BTreeMap::new();
        decorator_params.insert("ChangeLightByTime.max".to_string(), ParamValue::Int(10));
        decorator_params.insert("ChangeLightByTime.min".to_string(), ParamValue::Int(-10));
        decorator_params.insert("ChangeLightByTime.delay".to_string(), ParamValue::Int(20));
        decorator_params.insert("ChangeLightByTime.step".to_string(), ParamValue::Int(1));
        decorator_params.insert("ChangeLightByX.halfMagnitude".to_string(), ParamValue::Int(8));

        Self {
            width: 250,
            height: 50,
            cell_size: 8,
            sun_light: 60,
            light_absorption_step: 1,
            light_decay: 0.9,
            decorators: Vec::new(),
            decorator_params,
        }
    }
}

impl WorldParams {
    /// Integer decorator parameter, or a `MissingParameter` error.
    pub fn int_param(&self, name: &str) -> Result<i32> {
        self.decorator_params
            .get(name)
            .and_then(ParamValue::as_i32)
            .ok_or_else(|| Error::MissingParameter(name.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::Config(format!(
                "grid must not be empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.cell_size <= 0 {
            return Err(Error::Config(format!("cell size {} must be positive", self.cell_size)));
        }
        if !(self.light_decay > 0.0 && self.light_decay < 1.0) {
            return Err(Error::Config(format!(
                "light decay {} must lie in (0, 1)",
                self.light_decay
            )));
        }
        for name in &self.decorators {
            if name != DECORATOR_BY_TIME && name != DECORATOR_BY_X {
                return Err(Error::UnknownDecorator(name.clone()));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Flattens the parameters into a preference store.
    pub fn to_preferences(&self) -> BTreeMap<String, String> {
        let mut prefs = BTreeMap::new();
        prefs.insert(PREF_WIDTH.to_string(), self.width.to_string());
        prefs.insert(PREF_HEIGHT.to_string(), self.height.to_string());
        prefs.insert(PREF_CELL_SIZE.to_string(), self.cell_size.to_string());
        prefs.insert(PREF_SUN_LIGHT.to_string(), self.sun_light.to_string());
        prefs.insert(
            PREF_ABSORPTION_STEP.to_string(),
            self.light_absorption_step.to_string(),
        );
        prefs.insert(PREF_LIGHT_DECAY.to_string(), format!("{:?}", self.light_decay));
        prefs.insert(PREF_DECORATORS.to_string(), self.decorators.join(","));
        for (name, value) in &self.decorator_params {
            prefs.insert(format!("{}{}", PREF_PARAM_PREFIX, name), value.to_pref_string());
        }
        prefs
    }

    pub fn from_preferences(prefs: &BTreeMap<String, String>) -> Result<Self> {
        fn required<T: std::str::FromStr>(prefs: &BTreeMap<String, String>, key: &str) -> Result<T> {
            let raw = prefs
                .get(key)
                .ok_or_else(|| Error::MissingParameter(key.to_string()))?;
            raw.parse()
                .map_err(|_| Error::Config(format!("unparseable preference {}={}", key, raw)))
        }

        let decorators = prefs
            .get(PREF_DECORATORS)
            .map(|raw| {
                raw.split(',')
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let decorator_params = prefs
            .iter()
            .filter_map(|(key, raw)| {
                key.strip_prefix(PREF_PARAM_PREFIX)
                    .map(|name| ParamValue::from_pref_string(raw).map(|value| (name.to_string(), value)))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self {
            width: required(prefs, PREF_WIDTH)?,
            height: required(prefs, PREF_HEIGHT)?,
            cell_size: required(prefs, PREF_CELL_SIZE)?,
            sun_light: required(prefs, PREF_SUN_LIGHT)?,
            light_absorption_step: required(prefs, PREF_ABSORPTION_STEP)?,
            light_decay: required(prefs, PREF_LIGHT_DECAY)?,
            decorators,
            decorator_params,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let binary = BinaryParams {
            version: BINARY_VERSION,
            width: self.width,
            height: self.height,
            cell_size: self.cell_size,
            sun_light: self.sun_light,
            light_absorption_step: self.light_absorption_step,
            light_decay: self.light_decay,
            decorators: self.decorators.clone(),
            decorator_params: self
                .decorator_params
                .iter()
                .map(|(name, value)| (name.clone(), TaggedValue::from(value)))
                .collect(),
        };
        Ok(bincode::serialize(&binary)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let binary: BinaryParams = bincode::deserialize(bytes)?;
        if binary.version != BINARY_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported parameter buffer version {}",
                binary.version
            )));
        }
        Ok(Self {
            width: binary.width,
            height: binary.height,
            cell_size: binary.cell_size,
            sun_light: binary.sun_light,
            light_absorption_step: binary.light_absorption_step,
            light_decay: binary.light_decay,
            decorators: binary.decorators,
            decorator_params: binary
                .decorator_params
                .into_iter()
                .map(|(name, value)| (name, ParamValue::from(value)))
                .collect(),
        })
    }
}
