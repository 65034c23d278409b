use crate::{
    error::{Error, Result},
    loss::reduction::LossReduction,
    math::matrix::Matrix,
};

pub struct MseLoss;

impl MseLoss {
    /// Per-channel MSE: `mean_over_rows((predicted - expected)²)`, one value
    /// per output column.
    pub fn loss(predicted: &Matrix, expected: &Matrix) -> Result<Vec<f64>> {
        check_shapes(predicted, expected)?;
        let n = predicted.rows.max(1) as f64;
        let mut sums = vec![0.0; predicted.cols];
        for (p_row, e_row) in predicted.data.iter().zip(expected.data.iter()) {
            for ((s, p), e) in sums.iter_mut().zip(p_row).zip(e_row) {
                *s += (p - e).powi(2);
            }
        }
        Ok(sums.into_iter().map(|s| s / n).collect())
    }

    /// ∂L/∂predicted for the scalar `reduction` of the per-channel loss.
    pub fn derivative(predicted: &Matrix, expected: &Matrix, reduction: LossReduction) -> Result<Matrix> {
        check_shapes(predicted, expected)?;
        let n = predicted.rows.max(1) as f64;
        let scale = 2.0 * reduction.channel_weight(predicted.cols) / n;
        Ok((predicted.clone() - expected.clone()).scale(scale))
    }
}

fn check_shapes(predicted: &Matrix, expected: &Matrix) -> Result<()> {
    if predicted.cols != expected.cols {
        return Err(Error::mismatch("target columns", expected.cols, predicted.cols));
    }
    if predicted.rows != expected.rows {
        return Err(Error::mismatch("target rows", expected.rows, predicted.rows));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn loss_is_reported_per_channel() {
        let p = Matrix::from_data(vec![vec![1.0, 0.0], vec![3.0, 0.0]]);
        let e = Matrix::from_data(vec![vec![0.0, 0.0], vec![1.0, 2.0]]);
        let l = MseLoss::loss(&p, &e).unwrap();
        assert_abs_diff_eq!(l[0], 2.5);
        assert_abs_diff_eq!(l[1], 2.0);
    }

    #[test]
    fn mean_reduction_derivative_scales_by_rows_and_channels() {
        let p = Matrix::from_data(vec![vec![1.0, 0.0]]);
        let e = Matrix::from_data(vec![vec![0.0, 1.0]]);
        let d = MseLoss::derivative(&p, &e, LossReduction::Mean).unwrap();
        assert_eq!(d.data, vec![vec![1.0, -1.0]]);
        let d = MseLoss::derivative(&p, &e, LossReduction::Sum).unwrap();
        assert_eq!(d.data, vec![vec![2.0, -2.0]]);
    }

    #[test]
    fn mismatched_targets_are_rejected() {
        let err = MseLoss::loss(&Matrix::zeros(2, 2), &Matrix::zeros(2, 1)).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }
}
