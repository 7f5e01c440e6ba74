use std::fmt;

/// Grid and block extents of one kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchDimensions {
    pub block_counts: [usize; 3],
    pub thread_counts_per_block: [usize; 3],
}

impl LaunchDimensions {
    pub fn new(block_counts: [usize; 3], thread_counts_per_block: [usize; 3]) -> Self {
        Self { block_counts, thread_counts_per_block }
    }

    pub fn num_blocks(&self) -> usize {
        self.block_counts.iter().product()
    }

    pub fn num_threads_per_block(&self) -> usize {
        self.thread_counts_per_block.iter().product()
    }

    /// Total number of threads in the grid.
    pub fn launch_bound(&self) -> usize {
        self.num_blocks() * self.num_threads_per_block()
    }
}

impl fmt::Display for LaunchDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [bx, by, bz] = self.block_counts;
        let [tx, ty, tz] = self.thread_counts_per_block;
        write!(f, "blocks: {{{bx}, {by}, {bz}}}, threads: {{{tx}, {ty}, {tz}}}")
    }
}
