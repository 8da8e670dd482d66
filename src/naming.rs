/// Name used when a request carries no file name, or only whitespace.
pub const DEFAULT_FILE_NAME: &str = "screenshot";

/// Output label of one capture: `"<name>_<sequence>"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedName {
    pub name: String,
    pub sequence: u32,
}

impl ResolvedName {
    pub fn label(&self) -> String {
        format!("{}_{}", self.name, self.sequence)
    }

    pub fn diff_label(&self) -> String {
        format!("{}_Diff", self.label())
    }
}

/// Output-name and sequence counter shared by every request of one
/// orchestrator.
///
/// Only the view thread touches this, one request at a time. The counter
/// restarts at zero whenever the requested name differs from the previous
/// one, including when switching back to a name used earlier.
#[derive(Debug, Default)]
pub struct NameCounterState {
    current_name: String,
    counter: u32,
}

impl NameCounterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, requested: &str) -> ResolvedName {
        let name = effective_name(requested);
        if name != self.current_name {
            self.current_name = name.to_string();
            self.counter = 0;
        }
        let sequence = self.counter;
        self.counter = self.counter.wrapping_add(1);
        ResolvedName {
            name: self.current_name.clone(),
            sequence,
        }
    }
}

fn effective_name(requested: &str) -> &str {
    if requested.trim().is_empty() {
        DEFAULT_FILE_NAME
    } else {
        requested
    }
}
