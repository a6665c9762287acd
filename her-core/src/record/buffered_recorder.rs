use super::{AggregateRecorder, Record, RecordValue, Recorder};

/// Buffered recorder.
///
/// Keeps every record in memory. Stored records are tagged with the step
/// given to the next [`AggregateRecorder::flush`] call.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
    pending: Vec<Record>,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// Returns the values of a scalar key over all records containing it.
    pub fn scalars(&self, key: &str) -> Vec<f32> {
        self.buf
            .iter()
            .filter_map(|r| r.get_scalar(key).ok())
            .collect()
    }
}

impl Recorder for BufferedRecorder {
    /// Write a [`Record`] to the buffer.
    fn write(&mut self, record: Record) {
        self.buf.push(record);
    }
}

impl AggregateRecorder for BufferedRecorder {
    fn store(&mut self, record: Record) {
        self.pending.push(record);
    }

    fn flush(&mut self, step: i64) {
        for mut record in self.pending.drain(..) {
            record.insert("step", RecordValue::Scalar(step as f32));
            self.buf.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_tags_step() {
        let mut recorder = BufferedRecorder::new();
        recorder.store(Record::from_scalar("cycle_return", -3.0));
        assert_eq!(recorder.iter().count(), 0);

        recorder.flush(7);
        recorder.write(Record::from_scalar("cycle_return", -1.0));
        assert_eq!(recorder.scalars("cycle_return"), vec![-3.0, -1.0]);
        assert_eq!(recorder.scalars("step"), vec![7.0]);
    }
}
