use std::fmt;
use std::path::Path;

use crate::{
    activation::activation::ActivationFunction,
    data::dataset::{Dataset, NormBounds},
    error::{Error, Result},
    layers::dense::Layer,
    math::matrix::Matrix,
    network::network::Network,
};

/// Formats `value` like C's `%+.<precision>e`: explicit sign and an exponent
/// of at least two digits with its own sign (`+1.5000e-03`).
pub fn format_sci(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return format!("{value:+}");
    }
    let s = format!("{value:+.precision$e}");
    match s.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or_default();
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
        }
        None => s,
    }
}

fn sci(value: f64) -> String {
    format_sci(value, 16)
}

/// A trained network together with the variable names and normalization
/// bounds that the interchange file carries.
#[derive(Debug, Clone, PartialEq)]
pub struct MlpModel {
    pub network: Network,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    pub input_bounds: NormBounds,
    pub output_bounds: NormBounds,
}

impl MlpModel {
    pub fn new(
        network: Network,
        input_names: Vec<String>,
        output_names: Vec<String>,
        input_bounds: NormBounds,
        output_bounds: NormBounds,
    ) -> Result<MlpModel> {
        let (n_in, n_out) = (network.input_dim(), network.output_dim());
        if input_names.len() != n_in {
            return Err(Error::mismatch("input name count", input_names.len(), n_in));
        }
        if input_bounds.len() != n_in {
            return Err(Error::mismatch("input bound count", input_bounds.len(), n_in));
        }
        if output_names.len() != n_out {
            return Err(Error::mismatch("output name count", output_names.len(), n_out));
        }
        if output_bounds.len() != n_out {
            return Err(Error::mismatch("output bound count", output_bounds.len(), n_out));
        }
        Ok(MlpModel { network, input_names, output_names, input_bounds, output_bounds })
    }

    /// Pairs a network with the names and bounds of the dataset it was trained on.
    pub fn from_dataset(network: Network, data: &Dataset) -> Result<MlpModel> {
        MlpModel::new(
            network,
            data.controlling_vars.clone(),
            data.trained_vars.clone(),
            data.input_bounds.clone(),
            data.output_bounds.clone(),
        )
    }

    /// Evaluates raw (unnormalized) inputs and returns raw outputs.
    pub fn predict(&self, raw_inputs: &Matrix) -> Result<Matrix> {
        let scaled = self.input_bounds.normalize(raw_inputs)?;
        let output = self.network.forward(&scaled)?;
        self.output_bounds.denormalize(&output)
    }

    pub fn to_mlp_string(&self) -> String {
        self.to_string()
    }

    /// Writes the interchange file to `path`, extension included.
    pub fn write_mlp(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_mlp_string())?;
        Ok(())
    }

    pub fn read_mlp(path: &Path) -> Result<MlpModel> {
        let text = std::fs::read_to_string(path)?;
        MlpModel::parse_mlp(&text)
    }

    pub fn parse_mlp(text: &str) -> Result<MlpModel> {
        let mut cur = Cursor::new(text);

        cur.tag("<header>")?;
        cur.tag("[number of layers]")?;
        let n_layers = cur.count()?;
        if n_layers < 2 {
            return Err(cur.error(format!("expected at least 2 layers, found {n_layers}")));
        }

        cur.tag("[neurons per layer]")?;
        let sizes = (0..n_layers).map(|_| cur.count()).collect::<Result<Vec<_>>>()?;
        if sizes.contains(&0) {
            return Err(cur.error("layers must hold at least one neuron".into()));
        }

        cur.tag("[activation function]")?;
        let activations = (0..n_layers)
            .map(|_| {
                let (line, name) = cur.next_line()?;
                name.parse::<ActivationFunction>()
                    .map_err(|e| Error::Format { line, message: e.to_string() })
            })
            .collect::<Result<Vec<_>>>()?;

        let n_in = sizes[0];
        let n_out = sizes[n_layers - 1];

        cur.tag("[input names]")?;
        let input_names = cur.names(n_in)?;
        cur.tag("[input normalization]")?;
        let input_bounds = cur.bounds(n_in)?;
        cur.tag("[output names]")?;
        let output_names = cur.names(n_out)?;
        cur.tag("[output normalization]")?;
        let output_bounds = cur.bounds(n_out)?;
        cur.tag("</header>")?;

        cur.tag("[weights per layer]")?;
        let mut weights = Vec::with_capacity(n_layers - 1);
        for pair in sizes.windows(2) {
            cur.tag("<layer>")?;
            let rows = (0..pair[0]).map(|_| cur.numbers(pair[1])).collect::<Result<Vec<_>>>()?;
            weights.push(Matrix::from_data(rows));
            cur.tag("</layer>")?;
        }

        cur.tag("[biases per layer]")?;
        // The input layer carries a row of zeros.
        cur.numbers(n_in)?;
        let mut layers = Vec::with_capacity(n_layers - 1);
        for (i, w) in weights.into_iter().enumerate() {
            let b = Matrix::row_vector(cur.numbers(sizes[i + 1])?);
            layers.push(Layer::from_parameters(w, b, activations[i + 1])?);
        }
        cur.finish()?;

        MlpModel::new(Network::from_layers(layers)?, input_names, output_names, input_bounds, output_bounds)
    }
}

impl fmt::Display for MlpModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let net = &self.network;
        let sizes = net.layer_sizes();

        write!(f, "<header>\n\n")?;
        write!(f, "[number of layers]\n{}\n\n", sizes.len())?;
        writeln!(f, "[neurons per layer]")?;
        for n in &sizes {
            writeln!(f, "{n}")?;
        }

        write!(f, "\n[activation function]\n")?;
        for act in net.activations() {
            writeln!(f, "{}", act.name())?;
        }

        write!(f, "\n[input names]\n")?;
        for name in &self.input_names {
            writeln!(f, "{name}")?;
        }
        write!(f, "\n[input normalization]\n")?;
        for (lo, hi) in self.input_bounds.min.iter().zip(&self.input_bounds.max) {
            writeln!(f, "{}\t{}", sci(*lo), sci(*hi))?;
        }

        write!(f, "\n[output names]\n")?;
        for name in &self.output_names {
            writeln!(f, "{name}")?;
        }
        write!(f, "\n[output normalization]\n")?;
        for (lo, hi) in self.output_bounds.min.iter().zip(&self.output_bounds.max) {
            writeln!(f, "{}\t{}", sci(*lo), sci(*hi))?;
        }
        write!(f, "\n</header>\n")?;

        write!(f, "\n[weights per layer]\n")?;
        for w in net.weights() {
            writeln!(f, "<layer>")?;
            for row in &w.data {
                writeln!(f, "{}", join_sci(row))?;
            }
            writeln!(f, "</layer>")?;
        }

        write!(f, "\n[biases per layer]\n")?;
        writeln!(f, "{}", join_sci(&vec![0.0; net.input_dim()]))?;
        for b in net.biases() {
            writeln!(f, "{}", join_sci(b.row(0)))?;
        }
        Ok(())
    }
}

fn join_sci(values: &[f64]) -> String {
    values.iter().map(|&v| sci(v)).collect::<Vec<_>>().join("\t")
}

/// Walks the non-blank lines of a `.mlp` file, keeping 1-based line numbers
/// for error messages.
struct Cursor<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        let lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty())
            .collect();
        Cursor { lines, pos: 0 }
    }

    fn line_number(&self) -> usize {
        self.lines
            .get(self.pos)
            .or_else(|| self.lines.last())
            .map_or(0, |&(n, _)| n)
    }

    fn error(&self, message: String) -> Error {
        Error::Format { line: self.line_number(), message }
    }

    fn next_line(&mut self) -> Result<(usize, &'a str)> {
        let line = self
            .lines
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error("unexpected end of file".into()))?;
        self.pos += 1;
        Ok(line)
    }

    fn tag(&mut self, tag: &str) -> Result<()> {
        let (line, text) = self.next_line()?;
        if text != tag {
            return Err(Error::Format { line, message: format!("expected '{tag}', found '{text}'") });
        }
        Ok(())
    }

    fn count(&mut self) -> Result<usize> {
        let (line, text) = self.next_line()?;
        text.parse()
            .map_err(|_| Error::Format { line, message: format!("expected a non-negative integer, found '{text}'") })
    }

    fn names(&mut self, n: usize) -> Result<Vec<String>> {
        (0..n).map(|_| self.next_line().map(|(_, s)| s.to_owned())).collect()
    }

    fn numbers(&mut self, expected: usize) -> Result<Vec<f64>> {
        let (line, text) = self.next_line()?;
        let values = text
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>()
                    .map_err(|_| Error::Format { line, message: format!("'{tok}' is not a number") })
            })
            .collect::<Result<Vec<_>>>()?;
        if values.len() != expected {
            return Err(Error::Format {
                line,
                message: format!("expected {expected} values, found {}", values.len()),
            });
        }
        Ok(values)
    }

    fn bounds(&mut self, n: usize) -> Result<NormBounds> {
        let mut min = Vec::with_capacity(n);
        let mut max = Vec::with_capacity(n);
        for _ in 0..n {
            let pair = self.numbers(2)?;
            min.push(pair[0]);
            max.push(pair[1]);
        }
        NormBounds::new(min, max)
    }

    fn finish(&self) -> Result<()> {
        match self.lines.get(self.pos) {
            Some(&(line, text)) => Err(Error::Format { line, message: format!("unexpected trailing content '{text}'") }),
            None => Ok(()),
        }
    }
}
