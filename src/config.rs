/// Tunables that the CLI layer feeds into the Chunker and IfcBuilder.
///
/// Kept as plain data (not globals) so tests can exercise non-default
/// thresholds; see `spec.md` §9 on the hard-coded 400-node short circuit.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Maximum retained-node count per chunk window.
    pub split_size: usize,
    /// Below this source node count, the Chunker saves a single unmodified
    /// copy instead of splitting, regardless of `split_size`.
    pub short_circuit_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            split_size: 100,
            short_circuit_threshold: 400,
        }
    }
}
