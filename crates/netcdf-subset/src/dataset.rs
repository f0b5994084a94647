//! Dataset access traits and the in-memory `GriddedDataset`.
//!
//! The subsetter reads through [`DatasetSource`] and writes through
//! [`DatasetSink`], so the same copy logic drives NetCDF files on disk and
//! in-memory datasets in tests.

use std::ops::Range;

use crate::error::{SubsetError, SubsetResult};
use crate::types::{AttrValue, Attribute, DataType, Dimension, VariableSchema};
use crate::values::ArrayValues;

/// Read access to a gridded dataset.
pub trait DatasetSource {
    /// Declared dimensions, in declaration order.
    fn dimensions(&self) -> SubsetResult<Vec<Dimension>>;

    /// Global (dataset-level) attributes, in declaration order.
    fn global_attributes(&self) -> SubsetResult<Vec<Attribute>>;

    /// Schemas of all variables, in declaration order.
    fn variables(&self) -> SubsetResult<Vec<VariableSchema>>;

    /// Read one hyperslab of a variable; `extents` has one range per axis.
    fn read_block(&self, variable: &str, extents: &[Range<usize>]) -> SubsetResult<ArrayValues>;

    /// Schema of a single variable.
    fn variable(&self, name: &str) -> SubsetResult<VariableSchema> {
        self.variables()?
            .into_iter()
            .find(|v| v.name == name)
            .ok_or_else(|| SubsetError::MissingVariable(name.to_string()))
    }

    /// Read a whole variable.
    fn read_all(&self, name: &str) -> SubsetResult<ArrayValues> {
        let schema = self.variable(name)?;
        let extents: Vec<Range<usize>> = schema.shape.iter().map(|&n| 0..n).collect();
        self.read_block(name, &extents)
    }
}

/// Write access to a gridded dataset under construction.
///
/// Dimensions must be added before the variables that use them.
pub trait DatasetSink {
    fn add_dimension(&mut self, dimension: &Dimension) -> SubsetResult<()>;

    fn add_global_attribute(&mut self, attribute: &Attribute) -> SubsetResult<()>;

    /// Declare a variable with its attributes. `schema.shape` is the final shape.
    fn add_variable(&mut self, schema: &VariableSchema) -> SubsetResult<()>;

    /// Write one hyperslab of a previously declared variable.
    fn write_block(
        &mut self,
        variable: &str,
        extents: &[Range<usize>],
        block: &ArrayValues,
    ) -> SubsetResult<()>;
}

/// One variable of an in-memory dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub values: ArrayValues,
}

impl Variable {
    pub fn new(name: impl Into<String>, dims: &[&str], values: impl Into<ArrayValues>) -> Self {
        Self {
            name: name.into(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            attributes: Vec::new(),
            values: values.into(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    pub fn dtype(&self) -> DataType {
        self.values.dtype()
    }

    pub fn schema(&self) -> VariableSchema {
        VariableSchema {
            name: self.name.clone(),
            dtype: self.values.dtype(),
            dims: self.dims.clone(),
            shape: self.values.shape().to_vec(),
            attributes: self.attributes.clone(),
        }
    }
}

/// A fully materialised gridded dataset: dimensions, variables and global attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GriddedDataset {
    dimensions: Vec<Dimension>,
    global_attributes: Vec<Attribute>,
    variables: Vec<Variable>,
}

impl GriddedDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.put_dimension(dimension);
        self
    }

    pub fn with_global_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Self {
        self.put_global_attribute(Attribute::new(name, value));
        self
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.retain(|v| v.name != variable.name);
        self.variables.push(variable);
        self
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn global_attribute(&self, name: &str) -> Option<&AttrValue> {
        crate::types::find_attribute(&self.global_attributes, name)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    /// Check that every variable only references declared dimensions and
    /// that its array shape matches those dimensions' lengths.
    pub fn validate(&self) -> SubsetResult<()> {
        for var in &self.variables {
            let shape = var.values.shape();
            if shape.len() != var.dims.len() {
                return Err(SubsetError::ShapeMismatch {
                    variable: var.name.clone(),
                    expected: var
                        .dims
                        .iter()
                        .map(|d| self.dimension(d).map_or(0, |dim| dim.len))
                        .collect(),
                    actual: shape.to_vec(),
                });
            }

            let mut expected = Vec::with_capacity(var.dims.len());
            for dim_name in &var.dims {
                let dim = self.dimension(dim_name).ok_or_else(|| {
                    SubsetError::UndeclaredDimension {
                        variable: var.name.clone(),
                        dimension: dim_name.clone(),
                    }
                })?;
                expected.push(dim.len);
            }

            if expected.as_slice() != shape {
                return Err(SubsetError::ShapeMismatch {
                    variable: var.name.clone(),
                    expected,
                    actual: shape.to_vec(),
                });
            }
        }
        Ok(())
    }

    fn put_dimension(&mut self, dimension: Dimension) {
        match self.dimensions.iter_mut().find(|d| d.name == dimension.name) {
            Some(existing) => *existing = dimension,
            None => self.dimensions.push(dimension),
        }
    }

    fn put_global_attribute(&mut self, attribute: Attribute) {
        match self
            .global_attributes
            .iter_mut()
            .find(|a| a.name == attribute.name)
        {
            Some(existing) => *existing = attribute,
            None => self.global_attributes.push(attribute),
        }
    }

    fn variable_mut(&mut self, name: &str) -> SubsetResult<&mut Variable> {
        self.variables
            .iter_mut()
            .find(|v| v.name == name)
            .ok_or_else(|| SubsetError::MissingVariable(name.to_string()))
    }
}

impl DatasetSource for GriddedDataset {
    fn dimensions(&self) -> SubsetResult<Vec<Dimension>> {
        Ok(self.dimensions.clone())
    }

    fn global_attributes(&self) -> SubsetResult<Vec<Attribute>> {
        Ok(self.global_attributes.clone())
    }

    fn variables(&self) -> SubsetResult<Vec<VariableSchema>> {
        Ok(self.variables.iter().map(Variable::schema).collect())
    }

    fn read_block(&self, variable: &str, extents: &[Range<usize>]) -> SubsetResult<ArrayValues> {
        let var = self
            .get_variable(variable)
            .ok_or_else(|| SubsetError::MissingVariable(variable.to_string()))?;
        var.values.slice(extents)
    }
}

impl DatasetSink for GriddedDataset {
    fn add_dimension(&mut self, dimension: &Dimension) -> SubsetResult<()> {
        self.put_dimension(dimension.clone());
        Ok(())
    }

    fn add_global_attribute(&mut self, attribute: &Attribute) -> SubsetResult<()> {
        self.put_global_attribute(attribute.clone());
        Ok(())
    }

    fn add_variable(&mut self, schema: &VariableSchema) -> SubsetResult<()> {
        for dim in &schema.dims {
            if self.dimension(dim).is_none() {
                return Err(SubsetError::UndeclaredDimension {
                    variable: schema.name.clone(),
                    dimension: dim.clone(),
                });
            }
        }

        let variable = Variable {
            name: schema.name.clone(),
            dims: schema.dims.clone(),
            attributes: schema.attributes.clone(),
            values: ArrayValues::zeros(schema.dtype, &schema.shape),
        };
        self.variables.retain(|v| v.name != schema.name);
        self.variables.push(variable);
        Ok(())
    }

    fn write_block(
        &mut self,
        variable: &str,
        extents: &[Range<usize>],
        block: &ArrayValues,
    ) -> SubsetResult<()> {
        let var = self.variable_mut(variable)?;
        var.values.assign(variable, extents, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn small() -> GriddedDataset {
        GriddedDataset::new()
            .with_dimension(Dimension::unlimited("time", 2))
            .with_dimension(Dimension::fixed("lon", 3))
            .with_global_attribute("title", "test")
            .with_variable(
                Variable::new(
                    "tx",
                    &["time", "lon"],
                    ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])
                        .unwrap(),
                )
                .with_attribute("units", "degC"),
            )
    }

    #[test]
    fn test_validate_accepts_consistent_dataset() {
        small().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_undeclared_dimension() {
        let ds = small().with_variable(Variable::new(
            "bad",
            &["lat"],
            ArrayD::<f64>::zeros(IxDyn(&[3])),
        ));
        assert!(matches!(
            ds.validate(),
            Err(SubsetError::UndeclaredDimension { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_shape() {
        let ds = small().with_variable(Variable::new(
            "bad",
            &["lon"],
            ArrayD::<f64>::zeros(IxDyn(&[4])),
        ));
        assert!(matches!(ds.validate(), Err(SubsetError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_source_reads_block() {
        let ds = small();
        let block = ds.read_block("tx", &[1..2, 1..3]).unwrap();
        assert_eq!(block.to_f64().iter().copied().collect::<Vec<_>>(), vec![5.0, 6.0]);
        assert_eq!(ds.variable("tx").unwrap().attribute("units"), Some(&AttrValue::from("degC")));
        assert!(matches!(
            ds.read_all("missing"),
            Err(SubsetError::MissingVariable(_))
        ));
    }

    #[test]
    fn test_sink_copies_back_to_equal_dataset() {
        let src = small();
        let mut dst = GriddedDataset::new();
        for dim in src.dimensions().unwrap() {
            dst.add_dimension(&dim).unwrap();
        }
        for attr in src.global_attributes().unwrap() {
            dst.add_global_attribute(&attr).unwrap();
        }
        for schema in src.variables().unwrap() {
            dst.add_variable(&schema).unwrap();
            let data = src.read_all(&schema.name).unwrap();
            dst.write_block(&schema.name, &[0..2, 0..3], &data).unwrap();
        }
        assert_eq!(src, dst);
    }
}
