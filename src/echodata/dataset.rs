use crate::echodata::BackendError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Group tree of a converted acquisition (`Sonar`, `Sonar/Beam_group1`, `Platform`, ...).
#[derive(Debug, Clone, Default)]
pub struct DatasetTree {
    pub attrs: BTreeMap<String, AttrValue>,
    groups: BTreeMap<String, Dataset>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub attrs: BTreeMap<String, AttrValue>,
    pub dims: BTreeMap<String, usize>,
    pub variables: BTreeMap<String, Variable>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Numbers(Vec<f64>),
    Texts(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub attrs: BTreeMap<String, AttrValue>,
    pub data: VarData,
}

/// Flattened row-major values.
#[derive(Debug, Clone, PartialEq)]
pub enum VarData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
    Time(Vec<Option<NaiveDateTime>>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Texts(v) => v.first().map(String::as_str),
            _ => None,
        }
    }
}

impl DatasetTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_group<S: Into<String>>(&mut self, path: S, dataset: Dataset) {
        let path = path.into();
        self.groups
            .insert(path.trim_matches('/').to_string(), dataset);
    }

    pub fn group(&self, path: &str) -> Option<&Dataset> {
        self.groups.get(path.trim_matches('/'))
    }

    pub fn require_group(&self, path: &str) -> Result<&Dataset, BackendError> {
        self.group(path).ok_or_else(|| BackendError::MissingGroup {
            path: path.to_string(),
        })
    }

    pub fn group_paths(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn attr_text(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_text)
    }

    /// Parse a document of the form `{"attrs": {..}, "groups": {"<path>": <dataset>}}`
    /// where each dataset uses the xarray `to_dict` layout.
    pub fn from_json_value(value: &Value) -> Result<Self, BackendError> {
        let root = value
            .as_object()
            .ok_or_else(|| BackendError::malformed("document root is not an object"))?;

        let mut tree = DatasetTree {
            attrs: parse_attrs(root.get("attrs"))?,
            groups: BTreeMap::new(),
        };

        let groups = root
            .get("groups")
            .and_then(Value::as_object)
            .ok_or_else(|| BackendError::malformed("document has no \"groups\" object"))?;

        for (path, dataset) in groups {
            let dataset = Dataset::from_json_value(dataset)
                .map_err(|e| BackendError::malformed(format!("group {}: {}", path, e)))?;
            tree.insert_group(path.as_str(), dataset);
        }

        Ok(tree)
    }
}

impl Dataset {
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn require(&self, group: &str, name: &str) -> Result<&Variable, BackendError> {
        self.variable(name).ok_or_else(|| BackendError::MissingVariable {
            group: group.to_string(),
            name: name.to_string(),
        })
    }

    pub fn dim_len(&self, name: &str) -> Option<usize> {
        self.dims.get(name).copied().or_else(|| {
            self.variables
                .values()
                .find_map(|v| v.axis(name).map(|axis| v.shape[axis]))
        })
    }

    pub fn attr_text(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_text)
    }

    pub fn insert_variable<S: Into<String>>(&mut self, name: S, variable: Variable) {
        for (dim, len) in variable.dims.iter().zip(&variable.shape) {
            self.dims.entry(dim.clone()).or_insert(*len);
        }
        self.variables.insert(name.into(), variable);
    }

    fn from_json_value(value: &Value) -> Result<Self, BackendError> {
        let object = value
            .as_object()
            .ok_or_else(|| BackendError::malformed("dataset is not an object"))?;

        let mut dataset = Dataset {
            attrs: parse_attrs(object.get("attrs"))?,
            ..Default::default()
        };

        if let Some(dims) = object.get("dims").and_then(Value::as_object) {
            for (name, len) in dims {
                let len = len
                    .as_u64()
                    .ok_or_else(|| BackendError::malformed(format!("dimension {} has no length", name)))?;
                dataset.dims.insert(name.clone(), len as usize);
            }
        }

        for section in ["coords", "data_vars"] {
            if let Some(vars) = object.get(section).and_then(Value::as_object) {
                for (name, var) in vars {
                    let variable = Variable::from_json_value(name, var)?;
                    dataset.insert_variable(name.as_str(), variable);
                }
            }
        }

        Ok(dataset)
    }
}

impl Variable {
    pub fn numeric(dims: &[&str], shape: &[usize], values: Vec<f64>) -> Self {
        Self::new(dims, shape, VarData::Numeric(values))
    }

    pub fn text(dims: &[&str], shape: &[usize], values: Vec<String>) -> Self {
        Self::new(dims, shape, VarData::Text(values))
    }

    pub fn time(dims: &[&str], shape: &[usize], values: Vec<Option<NaiveDateTime>>) -> Self {
        Self::new(dims, shape, VarData::Time(values))
    }

    fn new(dims: &[&str], shape: &[usize], data: VarData) -> Self {
        Self {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            shape: shape.to_vec(),
            attrs: BTreeMap::new(),
            data,
        }
    }

    pub fn with_attr<S: Into<String>>(mut self, name: S, value: AttrValue) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        match &self.data {
            VarData::Numeric(v) => v.len(),
            VarData::Text(v) => v.len(),
            VarData::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn numbers(&self) -> Result<&[f64], BackendError> {
        match &self.data {
            VarData::Numeric(v) => Ok(v),
            _ => Err(BackendError::malformed(format!(
                "expected numeric values along {:?}",
                self.dims
            ))),
        }
    }

    pub fn strings(&self) -> Result<&[String], BackendError> {
        match &self.data {
            VarData::Text(v) => Ok(v),
            _ => Err(BackendError::malformed(format!(
                "expected text values along {:?}",
                self.dims
            ))),
        }
    }

    /// Timestamps, from native values, ISO-8601 text or CF `<unit> since <epoch>` numbers.
    pub fn times(&self) -> Result<Vec<Option<NaiveDateTime>>, BackendError> {
        match &self.data {
            VarData::Time(v) => Ok(v.clone()),
            VarData::Text(v) => v
                .iter()
                .map(|s| {
                    let s = s.trim();
                    if s.is_empty() || s.eq_ignore_ascii_case("nat") {
                        Ok(None)
                    } else {
                        parse_timestamp(s)
                            .map(Some)
                            .ok_or_else(|| BackendError::malformed(format!("invalid timestamp: {}", s)))
                    }
                })
                .collect(),
            VarData::Numeric(v) => {
                let units = self
                    .attrs
                    .get("units")
                    .and_then(AttrValue::as_text)
                    .ok_or_else(|| BackendError::malformed("numeric time values without units"))?;
                decode_cf_times(v, units)
            }
        }
    }

    fn from_json_value(name: &str, value: &Value) -> Result<Self, BackendError> {
        let object = value
            .as_object()
            .ok_or_else(|| BackendError::malformed(format!("variable {} is not an object", name)))?;

        let dims: Vec<String> = match object.get("dims") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|d| {
                    d.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| BackendError::malformed(format!("variable {}: bad dimension name", name)))
                })
                .collect::<Result<_, _>>()?,
            Some(Value::String(d)) => vec![d.clone()],
            _ => Vec::new(),
        };

        let data = object.get("data").unwrap_or(&Value::Null);
        let shape = shape_of(data);
        if shape.len() != dims.len() {
            return Err(BackendError::malformed(format!(
                "variable {}: {} dimensions but data of rank {}",
                name,
                dims.len(),
                shape.len()
            )));
        }

        let mut leaves = Vec::new();
        flatten(data, &mut leaves);
        let expected: usize = shape.iter().product();
        if leaves.len() != expected {
            return Err(BackendError::malformed(format!(
                "variable {}: ragged data ({} values for shape {:?})",
                name,
                leaves.len(),
                shape
            )));
        }

        let data = if leaves.iter().any(|v| v.is_string()) {
            VarData::Text(
                leaves
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect(),
            )
        } else {
            VarData::Numeric(
                leaves
                    .iter()
                    .map(|v| match v {
                        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
                        Value::Bool(b) => f64::from(u8::from(*b)),
                        _ => f64::NAN,
                    })
                    .collect(),
            )
        };

        Ok(Self {
            dims,
            shape,
            attrs: parse_attrs(object.get("attrs"))?,
            data,
        })
    }
}

fn parse_attrs(value: Option<&Value>) -> Result<BTreeMap<String, AttrValue>, BackendError> {
    let mut attrs = BTreeMap::new();
    let object: &Map<String, Value> = match value {
        None | Some(Value::Null) => return Ok(attrs),
        Some(Value::Object(object)) => object,
        Some(_) => return Err(BackendError::malformed("attrs is not an object")),
    };

    for (name, value) in object {
        let attr = match value {
            Value::String(s) => AttrValue::Text(s.clone()),
            Value::Number(n) => AttrValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::Bool(b) => AttrValue::Number(f64::from(u8::from(*b))),
            Value::Array(items) if items.iter().all(Value::is_string) => AttrValue::Texts(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            Value::Array(items) => {
                AttrValue::Numbers(items.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect())
            }
            // nested metadata is not used by the extractor
            Value::Object(_) | Value::Null => continue,
        };
        attrs.insert(name.clone(), attr);
    }

    Ok(attrs)
}

fn shape_of(value: &Value) -> Vec<usize> {
    match value {
        Value::Array(items) => {
            let mut shape = vec![items.len()];
            if let Some(first) = items.first() {
                shape.extend(shape_of(first));
            }
            shape
        }
        _ => Vec::new(),
    }
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten(item, out)),
        leaf => out.push(leaf),
    }
}

/// Accepts ISO-8601 with `T` or space separator, optional fraction and offset.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.naive_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Decode CF-convention numeric times such as `seconds since 1900-01-01T00:00:00+00:00`.
pub fn decode_cf_times(
    values: &[f64],
    units: &str,
) -> Result<Vec<Option<NaiveDateTime>>, BackendError> {
    let (unit, epoch) = units
        .split_once(" since ")
        .ok_or_else(|| BackendError::malformed(format!("not a CF time unit: {}", units)))?;

    let nanos_per_unit = match unit.trim().to_lowercase().as_str() {
        "nanoseconds" | "nanosecond" | "ns" => 1.0,
        "microseconds" | "microsecond" | "us" => 1e3,
        "milliseconds" | "millisecond" | "ms" => 1e6,
        "seconds" | "second" | "s" => 1e9,
        "minutes" | "minute" => 60e9,
        "hours" | "hour" | "h" => 3_600e9,
        "days" | "day" | "d" => 86_400e9,
        other => {
            return Err(BackendError::malformed(format!("unsupported time unit: {}", other)));
        }
    };

    let epoch = parse_timestamp(epoch.trim())
        .ok_or_else(|| BackendError::malformed(format!("invalid time epoch: {}", epoch)))?;

    Ok(values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                Some(epoch + Duration::nanoseconds((v * nanos_per_unit).round() as i64))
            } else {
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> Value {
        json!({
            "attrs": {"keywords": "EK60"},
            "groups": {
                "Sonar/Beam_group1": {
                    "attrs": {"beam_mode": "vertical"},
                    "dims": {"channel": 2, "ping_time": 3, "range_sample": 500},
                    "coords": {
                        "channel": {"dims": ["channel"], "attrs": {}, "data": ["GPT  18 kHz", "GPT  38 kHz"]}
                    },
                    "data_vars": {
                        "sample_interval": {
                            "dims": ["channel", "ping_time"],
                            "attrs": {"units": "s"},
                            "data": [[0.000256, 0.000256, null], [0.000256, 0.000256, 0.000256]]
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_parse_group_tree() {
        let tree = DatasetTree::from_json_value(&sample_document()).unwrap();
        assert_eq!(tree.attr_text("keywords"), Some("EK60"));

        let beam = tree.group("/Sonar/Beam_group1/").unwrap();
        assert_eq!(beam.dim_len("range_sample"), Some(500));
        assert_eq!(beam.attr_text("beam_mode"), Some("vertical"));

        let channels = beam.require("Sonar/Beam_group1", "channel").unwrap();
        assert_eq!(channels.strings().unwrap()[1], "GPT  38 kHz");

        let interval = beam.variable("sample_interval").unwrap();
        assert_eq!(interval.shape, vec![2, 3]);
        let values = interval.numbers().unwrap();
        assert_eq!(values.len(), 6);
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_missing_variable_is_reported() {
        let tree = DatasetTree::from_json_value(&sample_document()).unwrap();
        let beam = tree.require_group("Sonar/Beam_group1").unwrap();
        let err = beam.require("Sonar/Beam_group1", "transmit_power").unwrap_err();
        assert!(matches!(err, BackendError::MissingVariable { .. }));
        assert!(tree.require_group("Platform").is_err());
    }

    #[test]
    fn test_rank_mismatch_rejected() {
        let doc = json!({
            "groups": {
                "Platform": {
                    "data_vars": {
                        "latitude": {"dims": ["time1", "extra"], "data": [1.0, 2.0]}
                    }
                }
            }
        });
        let err = DatasetTree::from_json_value(&doc).unwrap_err();
        assert!(matches!(err, BackendError::Malformed { .. }));
    }

    #[test]
    fn test_text_timestamps() {
        let var = Variable::text(
            &["time1"],
            &[3],
            vec![
                "2018-07-18T02:03:10.123".to_string(),
                "2018-07-18 02:03:11".to_string(),
                "NaT".to_string(),
            ],
        );
        let times = var.times().unwrap();
        assert_eq!(
            times[0].unwrap().format("%H:%M:%S%.3f").to_string(),
            "02:03:10.123"
        );
        assert_eq!(times[1].unwrap().format("%S").to_string(), "11");
        assert!(times[2].is_none());
    }

    #[test]
    fn test_cf_time_decoding() {
        let times = decode_cf_times(
            &[0.0, 86_400.5, f64::NAN],
            "seconds since 1900-01-01T00:00:00+00:00",
        )
        .unwrap();
        assert_eq!(times[0].unwrap().to_string(), "1900-01-01 00:00:00");
        assert_eq!(times[1].unwrap().to_string(), "1900-01-02 00:00:00.500");
        assert!(times[2].is_none());

        assert!(decode_cf_times(&[1.0], "fortnights since 1970-01-01").is_err());
        assert!(decode_cf_times(&[1.0], "seconds").is_err());
    }
}
