use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub file_name: String,
    pub current_file_index: u32,
    pub total_files: u32,
    pub units_done: u64,
    pub units_total: u64,
    pub retransmission_count: Option<u32>,
    pub generation: u64,
    pub origin: Option<u64>,
    pub visible: bool,
}

impl ProgressRecord {
    pub fn percentage(&self) -> f64 {
        percentage(self.units_done, self.units_total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub file_name: String,
    pub current_file_index: u32,
    pub total_files: u32,
    pub units_done: u64,
    pub units_total: u64,
    pub percentage: f64,
    pub retransmission_count: Option<u32>,
}

pub fn percentage(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64).clamp(0.0, 1.0) * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    Stale,
    NoRecord,
}

#[derive(Debug, Default)]
pub struct ProgressAggregator {
    generation: u64,
    last_origin: Option<u64>,
    record: Option<ProgressRecord>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn record(&self) -> Option<&ProgressRecord> {
        self.record.as_ref()
    }

    /// Opens a record under a fresh local generation. `origin` is the
    /// backend's own stamp; a stamped start no newer than the last stamped
    /// start belongs to a superseded transfer and is discarded.
    pub fn begin(
        &mut self,
        file_name: impl Into<String>,
        current_file_index: u32,
        total_files: u32,
        origin: Option<u64>,
        visible: bool,
    ) -> Option<u64> {
        if let (Some(origin), Some(last)) = (origin, self.last_origin) {
            if origin <= last {
                debug!(origin, last, "dropping stale transfer start");
                return None;
            }
        }
        let Some(generation) = self.generation.checked_add(1) else {
            debug!(current = self.generation, "generation counter exhausted, dropping start");
            return None;
        };

        self.generation = generation;
        if origin.is_some() {
            self.last_origin = origin;
        }
        self.record = Some(ProgressRecord {
            file_name: file_name.into(),
            current_file_index,
            total_files,
            units_done: 0,
            units_total: 1,
            retransmission_count: None,
            generation,
            origin,
            visible,
        });
        Some(generation)
    }

    pub fn update(&mut self, origin: Option<u64>, units_done: u64, units_total: u64) -> Applied {
        let Some(record) = self.current_mut(origin) else {
            return self.rejection();
        };
        record.units_total = units_total;
        record.units_done = units_done.min(units_total);
        Applied::Updated
    }

    pub fn set_retransmissions(&mut self, origin: Option<u64>, count: u32) -> Applied {
        let Some(record) = self.current_mut(origin) else {
            return self.rejection();
        };
        record.retransmission_count = Some(count);
        Applied::Updated
    }

    pub fn show(&mut self) {
        if let Some(record) = self.record.as_mut() {
            record.visible = true;
        }
    }

    pub fn hide(&mut self, generation: u64) -> bool {
        match self.record.as_mut() {
            Some(record) if record.generation == generation => {
                record.visible = false;
                true
            }
            _ => false,
        }
    }

    pub fn view(&self) -> Option<ProgressView> {
        let record = self.record.as_ref().filter(|record| record.visible)?;
        Some(ProgressView {
            file_name: record.file_name.clone(),
            current_file_index: record.current_file_index,
            total_files: record.total_files,
            units_done: record.units_done,
            units_total: record.units_total,
            percentage: record.percentage(),
            retransmission_count: record.retransmission_count,
        })
    }

    // Unstamped updates belong to whatever record is current.
    fn current_mut(&mut self, origin: Option<u64>) -> Option<&mut ProgressRecord> {
        self.record
            .as_mut()
            .filter(|record| origin.is_none() || record.origin == origin)
    }

    fn rejection(&self) -> Applied {
        if self.record.is_some() {
            Applied::Stale
        } else {
            Applied::NoRecord
        }
    }
}
