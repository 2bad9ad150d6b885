/// One progress report for the collaborator's progress bar.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub message: String,
    pub percent: f64,
    pub completed: usize,
    pub total: usize,
}

/// Pure progress counter for one batch.
///
/// Emits one update at start and exactly one per completed unit. The
/// percentage never decreases and is 100 only once every unit has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    total: usize,
    completed: usize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    pub fn start(&self) -> ProgressUpdate {
        let message = if self.total == 0 {
            "Nothing to harvest".to_string()
        } else {
            format!("Starting harvest of {} pages", self.total)
        };
        self.update(message)
    }

    /// Counts one more completed unit, saturating at the batch size.
    pub fn record_completion(&mut self) -> ProgressUpdate {
        if self.completed < self.total {
            self.completed += 1;
        }
        let message = format!(
            "Harvested {} of {} ({:.0}%)",
            self.completed,
            self.total,
            self.percent()
        );
        self.update(message)
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        if self.completed >= self.total {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }

    fn update(&self, message: String) -> ProgressUpdate {
        ProgressUpdate {
            message,
            percent: self.percent(),
            completed: self.completed,
            total: self.total,
        }
    }
}
