//! A simple blocking multi-producer, multi-consumer (MPMC) channel.
//!
//! Similar to `std::sync::mpsc` but the receiving half can be cloned, so a
//! pool of worker threads can pull from one queue. The channel is unbounded;
//! callers that need backpressure apply it above the channel (the commit
//! pipeline bounds outstanding work by cost, not by queue length).
//!
//! **Note**: to be replaced with `std::sync::mpmc` once it stabilizes.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// Creates a new channel, returning the sender/receiver halves. Either half
/// can be cloned; the channel disconnects when all senders (for receivers) or
/// all receivers (for senders) are gone.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(Inner {
        state: Mutex::new(State {
            queue: VecDeque::new(),
            producers: 1,
            consumers: 1,
        }),
        not_empty: Condvar::new(),
    });
    (Sender(inner.clone()), Receiver(inner))
}

/// The sending half of the channel.
pub struct Sender<T>(Arc<Inner<T>>);

impl<T> Sender<T> {
    /// Enqueues a value, returning it back if every receiver has been
    /// dropped. Never blocks.
    pub fn send(&self, value: T) -> Result<(), std::sync::mpsc::SendError<T>> {
        let mut state = self.0.state.lock().unwrap();
        if state.consumers == 0 {
            return Err(std::sync::mpsc::SendError(value));
        }
        state.queue.push_back(value);
        drop(state);
        self.0.not_empty.notify_one();
        Ok(())
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.0.state.lock().unwrap().producers += 1;
        Sender(self.0.clone())
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let last = {
            let mut state = self.0.state.lock().unwrap();
            state.producers -= 1;
            state.producers == 0
        };
        if last {
            // Wake blocked receivers so they observe the disconnect.
            self.0.not_empty.notify_all();
        }
    }
}

/// The receiving half of the channel. Clone it to share one queue among
/// several worker threads.
pub struct Receiver<T>(Arc<Inner<T>>);

impl<T> Receiver<T> {
    /// Blocks until a value is available. Returns an error only once the
    /// queue is drained and every sender has been dropped.
    pub fn recv(&self) -> Result<T, std::sync::mpsc::RecvError> {
        let mut state = self.0.state.lock().unwrap();
        loop {
            if let Some(value) = state.queue.pop_front() {
                return Ok(value);
            }
            if state.producers == 0 {
                return Err(std::sync::mpsc::RecvError);
            }
            state = self.0.not_empty.wait(state).unwrap();
        }
    }

    /// Dequeues a value without blocking.
    pub fn try_recv(&self) -> Result<T, std::sync::mpsc::TryRecvError> {
        let mut state = self.0.state.lock().unwrap();
        if let Some(value) = state.queue.pop_front() {
            Ok(value)
        } else if state.producers == 0 {
            Err(std::sync::mpsc::TryRecvError::Disconnected)
        } else {
            Err(std::sync::mpsc::TryRecvError::Empty)
        }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.0.state.lock().unwrap().consumers += 1;
        Receiver(self.0.clone())
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.0.state.lock().unwrap().consumers -= 1;
    }
}

struct Inner<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
}

struct State<T> {
    queue: VecDeque<T>,
    producers: usize,
    consumers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_recv_preserves_order() {
        let (tx, rx) = channel();
        for i in 0..10 {
            tx.send(i).unwrap();
        }
        for i in 0..10 {
            assert_eq!(rx.recv().unwrap(), i);
        }
    }

    #[test]
    fn test_recv_fails_after_all_senders_drop() {
        let (tx, rx) = channel();
        tx.send(1).unwrap();
        drop(tx);
        assert_eq!(rx.recv().unwrap(), 1);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_send_fails_after_all_receivers_drop() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(tx.send(5).is_err());
    }

    #[test]
    fn test_shared_receivers_consume_each_value_once() {
        let (tx, rx) = channel();
        let total: u64 = (0..1000).sum();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let rx = rx.clone();
                    scope.spawn(move || {
                        let mut sum = 0u64;
                        while let Ok(v) = rx.recv() {
                            sum += v;
                        }
                        sum
                    })
                })
                .collect();
            for i in 0..1000u64 {
                tx.send(i).unwrap();
            }
            drop(tx);
            drop(rx);
            let sum: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
            assert_eq!(sum, total);
        });
    }
}
