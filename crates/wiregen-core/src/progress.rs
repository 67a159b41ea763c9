/// Phases of a generation run that report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Walking the address space to count usable addresses and find the server.
    Scan,
    /// Merging, keying and rendering peers.
    Configure,
    /// Collecting records into the output document.
    Collect,
}

/// Observer for run progress. Implementations must not influence the run;
/// every method defaults to doing nothing, so `()` disables reporting.
pub trait Progress: Send + Sync {
    fn start(&self, _stage: Stage, _total: u64) {}

    fn advance(&self, _stage: Stage, _delta: u64) {}

    fn finish(&self, _stage: Stage) {}
}

impl Progress for () {}
