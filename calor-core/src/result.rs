//! Analysis results and their export.
//!
//! A [`ThermalResult`] holds one snapshot per time point (a single snapshot
//! at t = 0 for steady analyses): nodal temperatures plus per-element
//! gradient and heat flux triples.
//!
//! The binary format is little-endian throughout:
//!
//! ```text
//! b"CALORRES"  u32 version  u8 analysis type  u64 N  u64 E  u64 T
//! f64 × T                 time points
//! f64 × T × N             temperatures
//! f64 × T × E × 3         heat fluxes
//! f64 × T × E × 3         thermal gradients
//! ```

use crate::error::{Error, Result};
use crate::settings::AnalysisType;
use crate::types::triple_norm;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 8] = b"CALORRES";
const VERSION: u32 = 1;

/// Temperatures, gradients and fluxes over time.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalResult {
    pub analysis_type: AnalysisType,
    pub n_nodes: usize,
    pub n_elements: usize,
    /// Strictly increasing output times.
    pub time_points: Vec<f64>,
    /// `temperatures[t][node]`.
    pub temperatures: Vec<Vec<f64>>,
    /// `heat_fluxes[t][3 * element + axis]`, q = −D·∇T (W/m²).
    pub heat_fluxes: Vec<Vec<f64>>,
    /// `thermal_gradients[t][3 * element + axis]` (K/m).
    pub thermal_gradients: Vec<Vec<f64>>,
}

impl ThermalResult {
    /// An empty result for a mesh of the given size.
    pub fn new(analysis_type: AnalysisType, n_nodes: usize, n_elements: usize) -> Self {
        Self {
            analysis_type,
            n_nodes,
            n_elements,
            time_points: Vec::new(),
            temperatures: Vec::new(),
            heat_fluxes: Vec::new(),
            thermal_gradients: Vec::new(),
        }
    }

    /// Append a snapshot.
    pub fn push(
        &mut self,
        time: f64,
        temperatures: Vec<f64>,
        gradients: Vec<f64>,
        fluxes: Vec<f64>,
    ) -> Result<()> {
        if temperatures.len() != self.n_nodes
            || gradients.len() != 3 * self.n_elements
            || fluxes.len() != 3 * self.n_elements
        {
            return Err(Error::Format(format!(
                "snapshot sizes {}/{}/{} do not match {} nodes and {} elements",
                temperatures.len(),
                gradients.len(),
                fluxes.len(),
                self.n_nodes,
                self.n_elements
            )));
        }
        if let Some(&last) = self.time_points.last() {
            if !(time > last) {
                return Err(Error::Format(format!(
                    "time {} does not follow {}",
                    time, last
                )));
            }
        }
        self.time_points.push(time);
        self.temperatures.push(temperatures);
        self.thermal_gradients.push(gradients);
        self.heat_fluxes.push(fluxes);
        Ok(())
    }

    /// Number of stored snapshots.
    pub fn n_time_points(&self) -> usize {
        self.time_points.len()
    }

    /// Temperatures of the last snapshot.
    pub fn final_temperatures(&self) -> Option<&[f64]> {
        self.temperatures.last().map(Vec::as_slice)
    }

    /// Lowest temperature over all snapshots.
    pub fn min_temperature(&self) -> Option<f64> {
        self.temperatures.iter().flatten().copied().reduce(f64::min)
    }

    /// Highest temperature over all snapshots.
    pub fn max_temperature(&self) -> Option<f64> {
        self.temperatures.iter().flatten().copied().reduce(f64::max)
    }

    /// Largest element heat flux magnitude over all snapshots.
    pub fn max_flux_magnitude(&self) -> Option<f64> {
        self.heat_fluxes
            .iter()
            .flat_map(|q| (0..self.n_elements).map(move |e| triple_norm(q, e)))
            .reduce(f64::max)
    }

    /// (time, temperature) history of one node.
    pub fn node_history(&self, node: usize) -> Option<Vec<(f64, f64)>> {
        if node >= self.n_nodes {
            return None;
        }
        Some(
            self.time_points
                .iter()
                .zip(&self.temperatures)
                .map(|(&t, temps)| (t, temps[node]))
                .collect(),
        )
    }

    /// Write the binary result format.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&[self.analysis_type.to_u8()])?;
        w.write_all(&(self.n_nodes as u64).to_le_bytes())?;
        w.write_all(&(self.n_elements as u64).to_le_bytes())?;
        w.write_all(&(self.time_points.len() as u64).to_le_bytes())?;

        write_f64s(w, &self.time_points)?;
        for block in [&self.temperatures, &self.heat_fluxes, &self.thermal_gradients] {
            for snapshot in block {
                write_f64s(w, snapshot)?;
            }
        }
        Ok(())
    }

    /// Read the binary result format.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        read_exact(r, &mut magic)?;
        if &magic != MAGIC {
            return Err(Error::Format("not a calor result file".into()));
        }

        let mut word = [0u8; 4];
        read_exact(r, &mut word)?;
        let version = u32::from_le_bytes(word);
        if version != VERSION {
            return Err(Error::Format(format!(
                "unsupported result version {}",
                version
            )));
        }

        let mut tag = [0u8; 1];
        read_exact(r, &mut tag)?;
        let analysis_type = AnalysisType::from_u8(tag[0])
            .ok_or_else(|| Error::Format(format!("unknown analysis type {}", tag[0])))?;

        let n_nodes = read_count(r)?;
        let n_elements = read_count(r)?;
        let n_times = read_count(r)?;
        let triples = n_elements
            .checked_mul(3)
            .ok_or_else(|| Error::Format("element count overflows".into()))?;

        let time_points = read_f64s(r, n_times)?;
        let temperatures = read_blocks(r, n_times, n_nodes)?;
        let heat_fluxes = read_blocks(r, n_times, triples)?;
        let thermal_gradients = read_blocks(r, n_times, triples)?;

        Ok(Self {
            analysis_type,
            n_nodes,
            n_elements,
            time_points,
            temperatures,
            heat_fluxes,
            thermal_gradients,
        })
    }

    /// Save to a binary file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        self.write_to(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Load from a binary file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut r = BufReader::new(File::open(path)?);
        Self::read_from(&mut r)
    }

    /// Write the temperature history of `nodes` as CSV.
    ///
    /// One row per time point: `time,node_<i>,...`.
    pub fn write_history_csv<W: Write>(&self, w: &mut W, nodes: &[usize]) -> Result<()> {
        if let Some(&bad) = nodes.iter().find(|&&n| n >= self.n_nodes) {
            return Err(Error::MeshInvalid(format!(
                "history requested for node {} ({} nodes)",
                bad, self.n_nodes
            )));
        }
        write!(w, "time")?;
        for n in nodes {
            write!(w, ",node_{}", n)?;
        }
        writeln!(w)?;
        for (t, temps) in self.time_points.iter().zip(&self.temperatures) {
            write!(w, "{}", t)?;
            for &n in nodes {
                write!(w, ",{}", temps[n])?;
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

fn write_f64s<W: Write>(w: &mut W, values: &[f64]) -> io::Result<()> {
    for v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::Format("result file is truncated".into()),
        _ => Error::Io(e),
    })
}

fn read_count<R: Read>(r: &mut R) -> Result<usize> {
    let mut word = [0u8; 8];
    read_exact(r, &mut word)?;
    usize::try_from(u64::from_le_bytes(word))
        .map_err(|_| Error::Format("count does not fit in memory".into()))
}

fn read_f64s<R: Read>(r: &mut R, count: usize) -> Result<Vec<f64>> {
    // Counts come from the file; grow as data actually arrives.
    let mut values = Vec::with_capacity(count.min(1 << 16));
    let mut word = [0u8; 8];
    for _ in 0..count {
        read_exact(r, &mut word)?;
        values.push(f64::from_le_bytes(word));
    }
    Ok(values)
}

fn read_blocks<R: Read>(r: &mut R, blocks: usize, len: usize) -> Result<Vec<Vec<f64>>> {
    (0..blocks).map(|_| read_f64s(r, len)).collect()
}
