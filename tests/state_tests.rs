use pllsyncrs::state::TransportState;
use std::sync::Arc;
use std::thread;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_initialization() {
        let state = TransportState::new();
        assert_eq!(state.tempo(), 120.0);
        assert_eq!(state.tick_position(), 0);
        assert_eq!(state.beat(), 1);
        assert_eq!(state.bar(), 1);
        assert!(!state.is_running());
        assert!(!state.is_synced());
    }

    #[test]
    fn test_tempo_management() {
        let state = TransportState::new();

        state.set_tempo(140.5);
        assert_eq!(state.tempo(), 140.5);

        state.set_tempo(30.0);
        assert_eq!(state.tempo(), 30.0);

        state.set_tempo(300.0);
        assert_eq!(state.tempo(), 300.0);
    }

    #[test]
    fn test_beat_and_bar_from_position() {
        let state = TransportState::new();
        state.set_position(24 * 5 + 3, 24);
        assert_eq!(state.beat(), 2);
        assert_eq!(state.bar(), 2);

        state.set_position(96 * 3, 96);
        assert_eq!(state.beat(), 4);
        assert_eq!(state.bar(), 1);
    }

    #[test]
    fn test_run_state() {
        let state = TransportState::new();
        state.set_running(true);
        assert!(state.is_running());
        state.set_running(false);
        assert!(!state.is_running());
    }

    #[test]
    fn test_concurrent_readers() {
        let state = Arc::new(TransportState::new());
        let writer_state = state.clone();

        let writer = thread::spawn(move || {
            for tick in 0..1000 {
                writer_state.set_position(tick, 24);
                writer_state.set_tempo(100.0 + f64::from(tick % 10));
            }
        });
        let reader_state = state.clone();
        let reader = thread::spawn(move || {
            for _ in 0..1000 {
                let tempo = reader_state.tempo();
                assert!((100.0..=120.0).contains(&tempo));
            }
        });

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(state.tick_position(), 999);
    }
}
