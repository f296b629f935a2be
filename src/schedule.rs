//! Deferred teardown on the audio clock

use crate::voice::VoiceId;

/// Tear down a voice's graph once its fade-out has finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownTask {
    pub voice: VoiceId,
    /// Activation the task was scheduled for; a mismatch makes it stale
    pub generation: u64,
    /// Audio frame at or after which the task may run
    pub due_frame: u64,
}

/// Pending teardowns ordered by due frame
#[derive(Debug, Default)]
pub struct TeardownQueue {
    tasks: Vec<TeardownTask>,
}

impl TeardownQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task, replacing any earlier task for the same voice
    pub fn schedule(&mut self, task: TeardownTask) {
        self.cancel(task.voice);
        let index = self
            .tasks
            .partition_point(|t| t.due_frame <= task.due_frame);
        self.tasks.insert(index, task);
    }

    /// Drop the pending task for `voice`, if any
    pub fn cancel(&mut self, voice: VoiceId) -> Option<TeardownTask> {
        let index = self.tasks.iter().position(|t| t.voice == voice)?;
        Some(self.tasks.remove(index))
    }

    /// Remove and return every task due at `now`
    pub fn take_due(&mut self, now: u64) -> Vec<TeardownTask> {
        let split = self.tasks.partition_point(|t| t.due_frame <= now);
        self.tasks.drain(..split).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(voice: u64, generation: u64, due_frame: u64) -> TeardownTask {
        TeardownTask {
            voice: VoiceId(voice),
            generation,
            due_frame,
        }
    }

    #[test]
    fn test_tasks_come_out_in_due_order() {
        let mut queue = TeardownQueue::new();
        queue.schedule(task(1, 1, 300));
        queue.schedule(task(2, 1, 100));
        queue.schedule(task(3, 1, 200));

        assert!(queue.take_due(50).is_empty());
        let due: Vec<u64> = queue.take_due(250).iter().map(|t| t.voice.0).collect();
        assert_eq!(due, vec![2, 3]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_reschedule_replaces() {
        let mut queue = TeardownQueue::new();
        queue.schedule(task(1, 1, 100));
        queue.schedule(task(1, 2, 400));
        assert_eq!(queue.len(), 1);
        assert!(queue.take_due(100).is_empty());
        assert_eq!(queue.take_due(400), vec![task(1, 2, 400)]);
    }

    #[test]
    fn test_cancel() {
        let mut queue = TeardownQueue::new();
        queue.schedule(task(7, 3, 10));
        assert_eq!(queue.cancel(VoiceId(7)), Some(task(7, 3, 10)));
        assert!(queue.cancel(VoiceId(7)).is_none());
        assert!(queue.take_due(u64::MAX).is_empty());
    }
}
