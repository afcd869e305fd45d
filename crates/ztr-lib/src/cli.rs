use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// io_lib's transform chains (delta, shrink, follow, run-length, zlib)
    Reference,
    /// Every chunk stored untransformed
    Raw,
}

#[derive(Clone, Debug)]
pub struct InspectConfig {
    /// ZTR file to walk
    pub input: PathBuf,
}

#[derive(Clone, Debug)]
pub struct RecompressConfig {
    /// Input ZTR file(s)
    pub input: Vec<PathBuf>,
    /// Directory the re-encoded files are written to, under their original names
    pub output_dir: PathBuf,
    /// Number of threads (0 = auto-detect)
    pub threads: usize,
    /// Transform chains to re-encode with
    pub preset: Preset,
    /// Compression level for every zlib stage (0-9), overriding the preset's
    pub zlib_level: Option<u32>,
}

impl Default for RecompressConfig {
    fn default() -> Self {
        Self {
            input: Vec::new(),
            output_dir: PathBuf::from("."),
            threads: 0,
            preset: Preset::Reference,
            zlib_level: None,
        }
    }
}

pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}
