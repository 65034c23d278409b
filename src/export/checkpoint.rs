use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::{
    activation::activation::ActivationFunction,
    error::{Error, Result},
    math::matrix::Matrix,
    network::network::Network,
};

fn checkpoint_path(dir: &Path, kind: char, prefix: &str, layer: usize) -> PathBuf {
    if prefix.is_empty() {
        dir.join(format!("{kind}_{layer}.json"))
    } else {
        dir.join(format!("{kind}_{prefix}_{layer}.json"))
    }
}

fn write_matrix(tmp: &Path, matrix: &Matrix) -> Result<()> {
    let mut writer = BufWriter::new(fs::File::create(tmp)?);
    serde_json::to_writer(&mut writer, matrix)?;
    writer.flush()?;
    Ok(())
}

fn read_matrix(path: &Path) -> Result<Matrix> {
    let reader = BufReader::new(fs::File::open(path)?);
    let matrix: Matrix = serde_json::from_reader(reader)?;
    if matrix.data.len() != matrix.rows || matrix.data.iter().any(|row| row.len() != matrix.cols) {
        return Err(Error::Dataset(format!(
            "{} does not hold a {}x{} matrix",
            path.display(),
            matrix.rows,
            matrix.cols
        )));
    }
    Ok(matrix)
}

/// Saves every weight and bias array of `network` into `dir` as
/// `W_<prefix>_<i>.json` and `b_<prefix>_<i>.json`.
///
/// All arrays are first written to `.json.tmp` siblings and only renamed
/// once every one of them is on disk, so a failed save leaves the previous
/// checkpoint set whole.
pub fn save_checkpoint(dir: &Path, prefix: &str, network: &Network) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(2 * network.num_layers());
    for (i, layer) in network.layers().iter().enumerate() {
        for (kind, matrix) in [('W', &layer.weights), ('b', &layer.biases)] {
            let path = checkpoint_path(dir, kind, prefix, i);
            let tmp = path.with_extension("json.tmp");
            if let Err(err) = write_matrix(&tmp, matrix) {
                if tmp.is_file() {
                    let _ = fs::remove_file(&tmp);
                }
                for (done, _) in &staged {
                    let _ = fs::remove_file(done);
                }
                return Err(err);
            }
            staged.push((tmp, path));
        }
    }
    for (tmp, path) in &staged {
        fs::rename(tmp, path)?;
    }
    debug!("checkpoint of {} layers written to {}", network.num_layers(), dir.display());
    Ok(())
}

/// Loads a checkpoint written by [`save_checkpoint`]. `num_layers` is the
/// number of weight matrices (hidden layers plus one).
pub fn load_checkpoint(dir: &Path, prefix: &str, num_layers: usize, activation: ActivationFunction) -> Result<Network> {
    let mut weights = Vec::with_capacity(num_layers);
    let mut biases = Vec::with_capacity(num_layers);
    for i in 0..num_layers {
        weights.push(read_matrix(&checkpoint_path(dir, 'W', prefix, i))?);
        biases.push(read_matrix(&checkpoint_path(dir, 'b', prefix, i))?);
    }
    Network::from_parameters(weights, biases, activation)
}
