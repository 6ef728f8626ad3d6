//! Per-ray trajectory streams and final result output.
//!
//! A [`TrajectorySink`] is an append-only CSV stream for one ray, flushed
//! after every sample so partial progress survives an aborted run. Sample
//! lines carry the completion flag, the elapsed coordinate time with 12
//! decimal places, then the position and direction components:
//!
//! ```text
//! false, 0.000000000000, 0.000000000000, 10.000000000000, ...
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::store::{RayStore, DIM};

/// Append-only sample stream for a single ray.
pub struct TrajectorySink {
    writer: Box<dyn Write + Send>,
}

impl TrajectorySink {
    /// Wrap an arbitrary writer as a sink.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    /// Create a buffered file sink at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }

    /// Append one sample and flush it.
    ///
    /// `pos` and `dir` must hold exactly [`DIM`] components each.
    pub fn write_sample(
        &mut self,
        finished: bool,
        t: f64,
        pos: &[f32],
        dir: &[f32],
    ) -> io::Result<()> {
        debug_assert_eq!(pos.len(), DIM);
        debug_assert_eq!(dir.len(), DIM);

        write!(self.writer, "{}", if finished { "true" } else { "false" })?;
        write!(self.writer, ", {:.12}", t)?;
        for &p in pos {
            write!(self.writer, ", {:.12}", f64::from(p))?;
        }
        for &d in dir {
            write!(self.writer, ", {:.12}", f64::from(d))?;
        }
        writeln!(self.writer)?;
        self.writer.flush()
    }
}

impl std::fmt::Debug for TrajectorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrajectorySink").finish_non_exhaustive()
    }
}

/// Open one sink per ray under `dir`, named `00000.csv`, `00001.csv`, ...
pub fn open_ray_sinks(dir: &Path, num_rays: usize) -> io::Result<Vec<TrajectorySink>> {
    (0..num_rays)
        .map(|i| TrajectorySink::create(&dir.join(format!("{:05}.csv", i))))
        .collect()
}

/// Write the final state table: `finished,pos0..pos3,dir0..dir3` header and
/// one row per ray.
pub fn write_final_state<W: Write>(mut writer: W, store: &RayStore) -> io::Result<()> {
    write!(writer, "finished")?;
    for i in 0..DIM {
        write!(writer, ",pos{}", i)?;
    }
    for i in 0..DIM {
        write!(writer, ",dir{}", i)?;
    }
    writeln!(writer)?;

    for i in 0..store.len() {
        write!(writer, "{}", if store.is_finished(i) { "true" } else { "false" })?;
        for &p in store.pos_of(i) {
            write!(writer, ",{:.6}", f64::from(p))?;
        }
        for &d in store.dir_of(i) {
            write!(writer, ",{:.6}", f64::from(d))?;
        }
        writeln!(writer)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RayStore;

    #[test]
    fn test_sample_format() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut sink = TrajectorySink::create(&path).unwrap();
        sink.write_sample(false, 0.0, &[0.0, 10.0, 0.5, 0.0], &[1.0, -1.0, 0.0, 0.25])
            .unwrap();
        sink.write_sample(true, 1.5, &[0.0, 8.5, 0.5, 0.0], &[1.0, -1.0, 0.0, 0.25])
            .unwrap();
        drop(sink);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("false, 0.000000000000, 0.000000000000, 10.000000000000"));
        assert!(lines[1].starts_with("true, 1.500000000000"));
        assert_eq!(lines[0].split(", ").count(), 2 + 2 * DIM);
    }

    #[test]
    fn test_final_state_table() {
        let mut store = RayStore::from_rays([
            ([0.0, 1.0, 2.0, 3.0], [4.0, 5.0, 6.0, 7.0]),
            ([1.0; DIM], [2.0; DIM]),
        ]);
        store.finished[1] = 1;

        let mut out = Vec::new();
        write_final_state(&mut out, &store).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "finished,pos0,pos1,pos2,pos3,dir0,dir1,dir2,dir3");
        assert!(lines[1].starts_with("false,0.000000,1.000000"));
        assert!(lines[2].starts_with("true,1.000000"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_open_ray_sinks_naming() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = open_ray_sinks(dir.path(), 3).unwrap();
        assert_eq!(sinks.len(), 3);
        assert!(dir.path().join("00000.csv").exists());
        assert!(dir.path().join("00002.csv").exists());
    }
}
