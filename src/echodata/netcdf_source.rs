//! Reads converted acquisitions straight from netCDF4 files.

use crate::echodata::backend::DatasetSource;
use crate::echodata::dataset::{AttrValue, Dataset, DatasetTree, VarData, Variable};
use crate::echodata::BackendError;
use netcdf::AttributeValue;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfSource;

impl DatasetSource for NetcdfSource {
    fn load(&self, path: &Path) -> Result<DatasetTree, BackendError> {
        let file = netcdf::open(path).map_err(nc_error)?;

        let mut tree = DatasetTree::new();
        tree.attrs = read_attrs(file.attributes());

        for group in file.groups().map_err(nc_error)? {
            load_group(&mut tree, &group, "")?;
        }

        Ok(tree)
    }
}

fn nc_error(err: netcdf::Error) -> BackendError {
    BackendError::malformed(format!("netCDF: {}", err))
}

fn load_group(
    tree: &mut DatasetTree,
    group: &netcdf::Group<'_>,
    parent: &str,
) -> Result<(), BackendError> {
    let path = if parent.is_empty() {
        group.name()
    } else {
        format!("{}/{}", parent, group.name())
    };

    let mut dataset = Dataset {
        attrs: read_attrs(group.attributes()),
        ..Dataset::default()
    };
    for dim in group.dimensions() {
        dataset.dims.insert(dim.name(), dim.len());
    }
    for var in group.variables() {
        dataset.insert_variable(var.name(), read_variable(&var)?);
    }

    for child in group.groups() {
        load_group(tree, &child, &path)?;
    }
    tree.insert_group(path, dataset);
    Ok(())
}

fn read_attrs<'a>(attrs: impl Iterator<Item = netcdf::Attribute<'a>>) -> BTreeMap<String, AttrValue> {
    attrs
        .filter_map(|attr| {
            let value = attr.value().ok().and_then(convert_attr)?;
            Some((attr.name().to_string(), value))
        })
        .collect()
}

fn convert_attr(value: AttributeValue) -> Option<AttrValue> {
    let numbers = |v: Vec<f64>| {
        if v.len() == 1 {
            AttrValue::Number(v[0])
        } else {
            AttrValue::Numbers(v)
        }
    };

    Some(match value {
        AttributeValue::Str(s) => AttrValue::Text(s),
        AttributeValue::Strs(s) => AttrValue::Texts(s),
        AttributeValue::Double(v) => AttrValue::Number(v),
        AttributeValue::Doubles(v) => numbers(v),
        AttributeValue::Float(v) => AttrValue::Number(v as f64),
        AttributeValue::Floats(v) => numbers(v.into_iter().map(f64::from).collect()),
        AttributeValue::Int(v) => AttrValue::Number(v as f64),
        AttributeValue::Ints(v) => numbers(v.into_iter().map(f64::from).collect()),
        AttributeValue::Uint(v) => AttrValue::Number(v as f64),
        AttributeValue::Uints(v) => numbers(v.into_iter().map(f64::from).collect()),
        AttributeValue::Short(v) => AttrValue::Number(v as f64),
        AttributeValue::Shorts(v) => numbers(v.into_iter().map(f64::from).collect()),
        AttributeValue::Ushort(v) => AttrValue::Number(v as f64),
        AttributeValue::Ushorts(v) => numbers(v.into_iter().map(f64::from).collect()),
        AttributeValue::Schar(v) => AttrValue::Number(v as f64),
        AttributeValue::Schars(v) => numbers(v.into_iter().map(f64::from).collect()),
        AttributeValue::Uchar(v) => AttrValue::Number(v as f64),
        AttributeValue::Uchars(v) => numbers(v.into_iter().map(f64::from).collect()),
        AttributeValue::Longlong(v) => AttrValue::Number(v as f64),
        AttributeValue::Longlongs(v) => numbers(v.into_iter().map(|x| x as f64).collect()),
        AttributeValue::Ulonglong(v) => AttrValue::Number(v as f64),
        AttributeValue::Ulonglongs(v) => numbers(v.into_iter().map(|x| x as f64).collect()),
        #[allow(unreachable_patterns)]
        _ => return None,
    })
}

fn read_variable(var: &netcdf::Variable<'_>) -> Result<Variable, BackendError> {
    let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let attrs = read_attrs(var.attributes());

    // numeric first; NC_STRING variables refuse the conversion
    let data = match var.get_values::<f64, _>(..) {
        Ok(values) => VarData::Numeric(apply_fill_value(values, &attrs)),
        Err(_) => VarData::Text(read_strings(var, &shape)?),
    };

    Ok(Variable {
        dims,
        shape,
        attrs,
        data,
    })
}

fn apply_fill_value(mut values: Vec<f64>, attrs: &BTreeMap<String, AttrValue>) -> Vec<f64> {
    if let Some(AttrValue::Number(fill)) = attrs.get("_FillValue") {
        for v in values.iter_mut().filter(|v| **v == *fill) {
            *v = f64::NAN;
        }
    }
    values
}

fn read_strings(var: &netcdf::Variable<'_>, shape: &[usize]) -> Result<Vec<String>, BackendError> {
    match shape {
        [] => Ok(vec![var.get_string(..).map_err(nc_error)?]),
        [len] => (0..*len)
            .map(|i| var.get_string([i]).map_err(nc_error))
            .collect(),
        _ => Err(BackendError::malformed(format!(
            "string variable {} has more than one dimension",
            var.name()
        ))),
    }
}
