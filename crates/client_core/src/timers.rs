use std::{collections::HashMap, hash::Hash, time::Duration};

use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{sleep_until, Instant},
};

pub(crate) struct TimerSet<K, M> {
    tx: UnboundedSender<M>,
    tasks: HashMap<K, JoinHandle<()>>,
}

impl<K, M> TimerSet<K, M>
where
    K: Eq + Hash + Clone,
    M: Send + 'static,
{
    pub(crate) fn new(tx: UnboundedSender<M>) -> Self {
        Self {
            tx,
            tasks: HashMap::new(),
        }
    }

    /// Posts `message` once `delay` has elapsed, measured from now. A timer
    /// already pending under `key` is aborted first.
    pub(crate) fn schedule(&mut self, key: K, delay: Duration, message: M) {
        let deadline = Instant::now() + delay;
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            sleep_until(deadline).await;
            let _ = tx.send(message);
        });
        if let Some(previous) = self.tasks.insert(key, task) {
            previous.abort();
        }
    }

    pub(crate) fn cancel(&mut self, key: &K) -> bool {
        match self.tasks.remove(key) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn fired(&mut self, key: &K) {
        self.tasks.remove(key);
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.tasks.len()
    }
}

impl<K, M> Drop for TimerSet<K, M> {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
