/// A one-shot deadline on the virtual clock. Owners poll it from their event
/// loop and re-arm it from the expiry handler for periodic behaviour.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<u64>,
}

impl Timer {
    pub fn new() -> Self {
        Timer { deadline: None }
    }

    /// Arms the timer for `deadline_ns`. An already armed timer keeps the
    /// earlier of the two deadlines.
    pub fn mod_anticipate(&mut self, deadline_ns: u64) {
        self.deadline = match self.deadline {
            Some(current) if current <= deadline_ns => Some(current),
            _ => Some(deadline_ns),
        };
    }

    pub fn del(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarms and returns true if the deadline has passed.
    pub fn take_expired(&mut self, now_ns: u64) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now_ns => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
