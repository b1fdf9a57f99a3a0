use clap::Parser;

/// Example PIO rearranger driver: writes and/or reads one distributed
/// variable through a BOX decomposition, the way the original's
/// example drivers exercise the library from the command line.
///
/// Reference: spec.md "CLI / command surface" — `--wdecomp FILE`,
/// `--rdecomp FILE`, `--variable NAME` are carried over verbatim; the
/// rest (`--gdims`, `--nio`, `--backend`) configure the demo run since
/// the original's equivalents come from a shared test harness this
/// crate doesn't reproduce. `--wdecomp`/`--rdecomp` double as the
/// back-end path: for "flat" that's a directory, for "mock" it's an
/// opaque in-memory key.
#[derive(Parser, Debug)]
#[command(name = "pio-bench", about = "Example PIO rearranger driver")]
pub struct CliArgs {
    /// Write the variable, rearranging from compute to I/O tasks.
    #[arg(long = "wdecomp", value_name = "FILE")]
    pub wdecomp: Option<String>,

    /// Read the variable back, rearranging from I/O to compute tasks.
    #[arg(long = "rdecomp", value_name = "FILE")]
    pub rdecomp: Option<String>,

    /// Variable name.
    #[arg(long = "variable", default_value = "var")]
    pub variable: String,

    /// Global array shape, comma-separated.
    #[arg(long = "gdims", value_delimiter = ',', default_value = "16")]
    pub gdims: Vec<usize>,

    /// Number of I/O tasks, taken from the highest-ranked union ranks.
    #[arg(long = "nio", default_value_t = 2)]
    pub nio: usize,

    /// Back-end driver: "mock" (in-memory) or "flat" (on-disk).
    #[arg(long = "backend", default_value = "mock")]
    pub backend: String,
}
