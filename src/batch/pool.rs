//! Fixed-size worker pool pulling from a shared work queue.
//!
//! At most `workers` tasks are in flight at any time; the bound is structural
//! (there are only that many threads), not a convention callers must honour.

use std::thread;

use crossbeam_channel as channel;

/// Run `task` over every item with at most `workers` threads.
///
/// Results come back in input order. Each worker sends exactly one result per
/// item it pulls, over a channel; no worker touches another's result.
pub fn run_bounded<T, R, F>(items: Vec<T>, workers: usize, task: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, total);

    // Sized to hold every item so seeding never blocks.
    let (work_tx, work_rx) = channel::bounded::<(usize, T)>(total);
    for entry in items.into_iter().enumerate() {
        let _ = work_tx.send(entry);
    }
    drop(work_tx);

    let (result_tx, result_rx) = channel::unbounded::<(usize, R)>();

    thread::scope(|scope| {
        let mut spawned = 0usize;
        for n in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let task = &task;
            let spawn = thread::Builder::new()
                .name(format!("reaper-worker-{n}"))
                .spawn_scoped(scope, move || {
                    for (index, item) in &work_rx {
                        let _ = result_tx.send((index, task(item)));
                    }
                });
            if spawn.is_ok() {
                spawned += 1;
            }
        }

        // Could not get a single thread: drain the queue on the caller's thread.
        if spawned == 0 {
            for (index, item) in &work_rx {
                let _ = result_tx.send((index, task(item)));
            }
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    for (index, result) in result_rx.try_iter() {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn empty_input_returns_empty_output() {
        let out: Vec<u32> = run_bounded(Vec::<u32>::new(), 4, |x| x);
        assert!(out.is_empty());
    }

    #[test]
    fn results_preserve_input_order() {
        let items: Vec<u64> = (0..50).collect();
        let out = run_bounded(items, 8, |x| {
            // Later items finish first.
            std::thread::sleep(Duration::from_micros(500 * (50 - x)));
            x * 2
        });
        assert_eq!(out, (0..50).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn in_flight_never_exceeds_worker_count() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<usize> = (0..40).collect();

        let out = run_bounded(items, 3, |x| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            x
        });

        assert_eq!(out.len(), 40);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn zero_workers_still_processes_everything() {
        let out = run_bounded(vec![1, 2, 3], 0, |x| x + 1);
        assert_eq!(out, vec![2, 3, 4]);
    }
}
