use hdf5::types::{TypeDescriptor, VarLenUnicode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::error::SettingsError;

/// A single typed value of the configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Boolean(bool),
    Integer(i64),
    Floating(f64),
    Text(String),
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Floating(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Settings is the dynamic configuration tree used at the edges of the engine.
///
/// Keys are dotted paths; indexed entries are written as `name.N` (see [`Settings::key`]).
/// Spill state snapshots and persisted spectrum metadata both use this type. Inside
/// the engine everything is converted to strongly typed structs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, SettingValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose an indexed key, i.e. `key("value_id", 1) == "value_id.1"`
    pub fn key(name: &str, idx: usize) -> String {
        format!("{name}.{idx}")
    }

    pub fn set<V: Into<SettingValue>>(&mut self, key: &str, value: V) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Builder flavor of set
    pub fn with<V: Into<SettingValue>>(mut self, key: &str, value: V) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.values.remove(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(SettingValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Integers are also accepted from whole floating point values
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(SettingValue::Integer(i)) => Some(*i),
            Some(SettingValue::Floating(f)) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Floating point values are also accepted from integers
    pub fn get_floating(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(SettingValue::Floating(f)) => Some(*f),
            Some(SettingValue::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(SettingValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.values.iter()
    }

    /// Copy every entry of other into self, overwriting existing keys
    pub fn merge(&mut self, other: &Settings) {
        for (key, value) in other.iter() {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Write every entry as a typed attribute of the group
    pub fn write_attributes(&self, group: &hdf5::Group) -> Result<(), SettingsError> {
        for (key, value) in self.values.iter() {
            match value {
                SettingValue::Boolean(b) => group.new_attr::<bool>().create(key.as_str())?.write_scalar(b)?,
                SettingValue::Integer(i) => group.new_attr::<i64>().create(key.as_str())?.write_scalar(i)?,
                SettingValue::Floating(f) => group.new_attr::<f64>().create(key.as_str())?.write_scalar(f)?,
                SettingValue::Text(s) => {
                    let text = VarLenUnicode::from_str(s)
                        .map_err(|e| SettingsError::TextError(e.to_string()))?;
                    group
                        .new_attr::<VarLenUnicode>()
                        .create(key.as_str())?
                        .write_scalar(&text)?
                }
            }
        }
        Ok(())
    }

    /// Read every attribute of the group back into a Settings
    pub fn read_attributes(group: &hdf5::Group) -> Result<Self, SettingsError> {
        let mut settings = Self::new();
        for name in group.attr_names()? {
            let attr = group.attr(&name)?;
            let value = match attr.dtype()?.to_descriptor()? {
                TypeDescriptor::Boolean => SettingValue::Boolean(attr.read_scalar::<bool>()?),
                TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
                    SettingValue::Integer(attr.read_scalar::<i64>()?)
                }
                TypeDescriptor::Float(_) => SettingValue::Floating(attr.read_scalar::<f64>()?),
                TypeDescriptor::VarLenUnicode => {
                    SettingValue::Text(attr.read_scalar::<VarLenUnicode>()?.to_string())
                }
                _ => return Err(SettingsError::UnsupportedType(name)),
            };
            settings.values.insert(name, value);
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let settings = Settings::new()
            .with("stream_id", "adc")
            .with("downsample.0", 3_i64)
            .with("coinc_window", 50.0)
            .with("trim", true);
        assert_eq!(settings.get_text("stream_id"), Some("adc"));
        assert_eq!(settings.get_integer("downsample.0"), Some(3));
        assert_eq!(settings.get_floating("downsample.0"), Some(3.0));
        assert_eq!(settings.get_integer("coinc_window"), Some(50));
        assert_eq!(settings.get_bool("trim"), Some(true));
        assert_eq!(settings.get_text("trim"), None);
        assert_eq!(Settings::key("value_id", 2), "value_id.2");
    }

    #[test]
    fn test_yaml_untagged() {
        let yaml = "native_time: 1000.5\nlive_time: 900\nname: run\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.get_floating("native_time"), Some(1000.5));
        assert_eq!(settings.get("live_time"), Some(&SettingValue::Integer(900)));
        assert_eq!(settings.get_text("name"), Some("run"));
    }

    #[test]
    fn test_attribute_roundtrip() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = hdf5::File::create(tmp.path()).unwrap();
        let group = file.create_group("metadata").unwrap();
        let settings = Settings::new()
            .with("stream_id", "adc")
            .with("downsample.0", 3_i64)
            .with("coinc_window", 50.5)
            .with("trim", false);
        settings.write_attributes(&group).unwrap();
        let read = Settings::read_attributes(&group).unwrap();
        assert_eq!(read, settings);
    }
}
