use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    data::csv::read_columns,
    error::{Error, Result},
    math::matrix::Matrix,
};

/// Per-variable min/max used for `(raw - min) / (max - min)` scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormBounds {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

impl NormBounds {
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Result<NormBounds> {
        if min.len() != max.len() {
            return Err(Error::mismatch("normalization bound count", max.len(), min.len()));
        }
        if let Some(i) = (0..min.len()).find(|&i| !(min[i] <= max[i])) {
            return Err(Error::Dataset(format!(
                "normalization bounds of variable {i} are inverted: min {} > max {}",
                min[i], max[i]
            )));
        }
        Ok(NormBounds { min, max })
    }

    /// Column-wise bounds of `data`.
    pub fn from_matrix(data: &Matrix) -> Result<NormBounds> {
        if data.rows == 0 {
            return Err(Error::Dataset("cannot compute bounds of an empty table".into()));
        }
        let mut min = vec![f64::INFINITY; data.cols];
        let mut max = vec![f64::NEG_INFINITY; data.cols];
        for row in &data.data {
            for (j, &v) in row.iter().enumerate() {
                min[j] = min[j].min(v);
                max[j] = max[j].max(v);
            }
        }
        NormBounds::new(min, max)
    }

    pub fn len(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Constant variables get a unit range so they normalize to zero.
    fn range(&self, j: usize) -> f64 {
        let r = self.max[j] - self.min[j];
        if r > 0.0 { r } else { 1.0 }
    }

    pub fn normalize(&self, raw: &Matrix) -> Result<Matrix> {
        self.check(raw)?;
        let mut out = raw.clone();
        for row in out.data.iter_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.min[j]) / self.range(j);
            }
        }
        Ok(out)
    }

    pub fn denormalize(&self, scaled: &Matrix) -> Result<Matrix> {
        self.check(scaled)?;
        let mut out = scaled.clone();
        for row in out.data.iter_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = *v * self.range(j) + self.min[j];
            }
        }
        Ok(out)
    }

    fn check(&self, data: &Matrix) -> Result<()> {
        if data.cols != self.len() {
            return Err(Error::mismatch("normalized columns", data.cols, self.len()));
        }
        Ok(())
    }
}

/// Inputs and targets of one dataset split, one sample per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub inputs: Matrix,
    pub targets: Matrix,
}

impl Partition {
    pub fn new(inputs: Matrix, targets: Matrix) -> Result<Partition> {
        if inputs.rows != targets.rows {
            return Err(Error::mismatch("target rows", targets.rows, inputs.rows));
        }
        Ok(Partition { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.inputs.rows
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.rows == 0
    }

    fn normalized(&self, x: &NormBounds, y: &NormBounds) -> Result<Partition> {
        Ok(Partition {
            inputs: x.normalize(&self.inputs)?,
            targets: y.normalize(&self.targets)?,
        })
    }
}

/// Normalized train, validation and test splits plus the bounds used to
/// normalize them.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub controlling_vars: Vec<String>,
    pub trained_vars: Vec<String>,
    pub input_bounds: NormBounds,
    pub output_bounds: NormBounds,
    pub train: Partition,
    pub val: Partition,
    pub test: Partition,
}

impl Dataset {
    /// Normalizes raw splits with bounds computed from `full`.
    pub fn from_raw(
        controlling_vars: Vec<String>,
        trained_vars: Vec<String>,
        full: &Partition,
        train: &Partition,
        val: &Partition,
        test: &Partition,
    ) -> Result<Dataset> {
        for part in [full, train, val, test] {
            if part.inputs.cols != controlling_vars.len() {
                return Err(Error::mismatch("input columns", part.inputs.cols, controlling_vars.len()));
            }
            if part.targets.cols != trained_vars.len() {
                return Err(Error::mismatch("target columns", part.targets.cols, trained_vars.len()));
            }
        }
        for (name, part) in [("training", train), ("validation", val), ("test", test)] {
            if part.is_empty() {
                return Err(Error::Dataset(format!("{name} split is empty")));
            }
        }

        let input_bounds = NormBounds::from_matrix(&full.inputs)?;
        let output_bounds = NormBounds::from_matrix(&full.targets)?;

        Ok(Dataset {
            train: train.normalized(&input_bounds, &output_bounds)?,
            val: val.normalized(&input_bounds, &output_bounds)?,
            test: test.normalized(&input_bounds, &output_bounds)?,
            controlling_vars,
            trained_vars,
            input_bounds,
            output_bounds,
        })
    }

    /// Reads `<template>_full.csv`, `_train.csv`, `_val.csv` and `_test.csv`.
    pub fn load(template: &str, controlling_vars: &[String], trained_vars: &[String]) -> Result<Dataset> {
        info!("reading train, test, and validation data from {template}_*.csv");
        let read = |suffix: &str| -> Result<Partition> {
            let path = PathBuf::from(format!("{template}_{suffix}.csv"));
            let (x, y) = read_columns(&path, controlling_vars, trained_vars)?;
            Partition::new(x, y)
        };

        let full = read("full")?;
        let train = read("train")?;
        let test = read("test")?;
        let val = read("val")?;
        info!(
            "loaded {} full, {} train, {} validation and {} test samples",
            full.len(),
            train.len(),
            val.len(),
            test.len()
        );

        Dataset::from_raw(
            controlling_vars.to_vec(),
            trained_vars.to_vec(),
            &full,
            &train,
            &val,
            &test,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn part(x: Vec<Vec<f64>>, y: Vec<Vec<f64>>) -> Partition {
        Partition::new(Matrix::from_data(x), Matrix::from_data(y)).unwrap()
    }

    #[test]
    fn bounds_come_from_full_set() {
        let full = part(vec![vec![0.0, 10.0], vec![4.0, 20.0]], vec![vec![1.0], vec![3.0]]);
        let train = part(vec![vec![2.0, 15.0]], vec![vec![2.0]]);
        let ds = Dataset::from_raw(
            vec!["Density".into(), "Energy".into()],
            vec!["T".into()],
            &full,
            &train,
            &train,
            &train,
        )
        .unwrap();
        assert_eq!(ds.input_bounds.min, vec![0.0, 10.0]);
        assert_eq!(ds.input_bounds.max, vec![4.0, 20.0]);
        assert_abs_diff_eq!(ds.train.inputs.data[0][0], 0.5);
        assert_abs_diff_eq!(ds.train.inputs.data[0][1], 0.5);
        assert_abs_diff_eq!(ds.train.targets.data[0][0], 0.5);
    }

    #[test]
    fn denormalize_inverts_normalize() {
        let b = NormBounds::new(vec![-1.0, 5.0], vec![3.0, 5.0]).unwrap();
        let raw = Matrix::from_data(vec![vec![0.0, 5.0], vec![2.5, 5.0]]);
        let scaled = b.normalize(&raw).unwrap();
        assert_abs_diff_eq!(scaled.data[0][0], 0.25);
        assert_eq!(scaled.data[0][1], 0.0);
        assert_eq!(b.denormalize(&scaled).unwrap(), raw);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(NormBounds::new(vec![1.0], vec![0.0]).is_err());
    }

    #[test]
    fn column_mismatch_is_rejected() {
        let full = part(vec![vec![0.0]], vec![vec![1.0]]);
        let err = Dataset::from_raw(vec!["a".into(), "b".into()], vec!["T".into()], &full, &full, &full, &full)
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn empty_validation_split_is_rejected() {
        let full = part(vec![vec![0.0], vec![1.0]], vec![vec![1.0], vec![2.0]]);
        let empty = Partition::new(Matrix::zeros(0, 1), Matrix::zeros(0, 1)).unwrap();
        let err = Dataset::from_raw(vec!["a".into()], vec!["T".into()], &full, &full, &empty, &full)
            .unwrap_err();
        assert!(matches!(err, Error::Dataset(msg) if msg.contains("validation")));
    }
}
