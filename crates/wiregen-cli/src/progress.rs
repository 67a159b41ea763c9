use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use wiregen_core::{Progress, Stage};

const TEMPLATE: &str = "{spinner:.green} {prefix:<22} [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Terminal progress bars, one per generation stage.
pub struct TerminalProgress {
    _multi: MultiProgress,
    scan: ProgressBar,
    configure: ProgressBar,
    collect: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ");

        let bar = |prefix: &'static str| {
            let pb = multi.add(ProgressBar::new(0));
            pb.set_style(style.clone());
            pb.set_prefix(prefix);
            pb
        };

        let scan = bar("Pre-processing IPs");
        let configure = bar("Peers configured");
        let collect = bar("Peers post-processed");

        Self {
            _multi: multi,
            scan,
            configure,
            collect,
        }
    }

    fn bar(&self, stage: Stage) -> &ProgressBar {
        match stage {
            Stage::Scan => &self.scan,
            Stage::Configure => &self.configure,
            Stage::Collect => &self.collect,
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for TerminalProgress {
    fn start(&self, stage: Stage, total: u64) {
        let pb = self.bar(stage);
        pb.set_length(total);
        pb.reset();
    }

    fn advance(&self, stage: Stage, delta: u64) {
        self.bar(stage).inc(delta);
    }

    fn finish(&self, stage: Stage) {
        let pb = self.bar(stage);
        // the scan total is an estimate that skipped addresses never reach
        pb.set_length(pb.position());
        pb.finish();
    }
}
