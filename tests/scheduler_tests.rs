#[cfg(test)]
mod tests {
    use crossbeam::channel::bounded;
    use pllsyncrs::{create_scheduler, create_shared_state, Scheduler};
    use std::time::Duration;

    #[test]
    fn test_scheduler_with_transport() {
        let scheduler = create_scheduler();
        let shared_state = create_shared_state();
        let task_state = shared_state.clone();
        let (done_tx, done_rx) = bounded(1);

        // Spawn a task that modifies transport state
        scheduler.spawn("tempo-writer", move || {
            task_state.set_tempo(133.0);
            task_state.set_running(true);
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("Task should have completed");
        assert_eq!(shared_state.tempo(), 133.0);
        assert!(shared_state.is_running());
    }
}
