//! The bounded, culling queue between the sensor tick and the dispatch
//! tick.
//!
//! The producer pushes at sensor rate; the consumer drains one action
//! per dispatch tick. When the consumer falls behind, stale `Move`
//! actions are dropped from the front — deliberately and silently —
//! but discrete events (`Down`/`Up`/`Cancel`/`None`) are never culled.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::geom::Vec2;
use crate::interaction::{InputAction, InputType};

/// How many queued actions may remain after a cull pass.
pub const DEFAULT_RETENTION: usize = 2;

#[derive(Debug)]
struct QueueState {
    queue: VecDeque<InputAction>,
    /// Position of the last dispatched non-up action. `Up` actions are
    /// rewritten to land here, since the `Move`s between the press and
    /// the release may have been culled.
    last_known_position: Vec2,
}

/// Single-producer/single-consumer action queue. The mutex is held only
/// for queue surgery, so neither tick can stall the other meaningfully.
#[derive(Debug)]
pub struct ActionQueue {
    state: Mutex<QueueState>,
    retention: usize,
}

impl ActionQueue {
    pub fn new(retention: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                last_known_position: Vec2::ZERO,
            }),
            retention,
        }
    }

    /// Producer side: never blocks beyond the mutex, never fails.
    pub fn push(&self, action: InputAction) {
        let mut state = self.state.lock().unwrap();
        state.queue.push_back(action);
    }

    /// Consumer side: cull stale moves down to the retention floor,
    /// then dequeue exactly one action for dispatch.
    pub fn drain_one(&self) -> Option<InputAction> {
        let mut state = self.state.lock().unwrap();

        while state.queue.len() > self.retention {
            let head_is_move = matches!(
                state.queue.front(),
                Some(action) if action.input_type == InputType::Move
            );
            if !head_is_move {
                // A discrete event at the head stops the cull.
                break;
            }
            state.queue.pop_front();
        }

        let mut action = state.queue.pop_front()?;
        if action.input_type == InputType::Up {
            action.cursor_position = state.last_known_position;
        } else {
            state.last_known_position = action.cursor_position;
        }
        Some(action)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything (tracking restarted, mode switched).
    pub fn clear(&self) {
        self.state.lock().unwrap().queue.clear();
    }
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{HandType, InteractionType};
    use crate::tracking::Chirality;

    fn action(input_type: InputType, x: f32, ts: i64) -> InputAction {
        InputAction {
            timestamp_us: ts,
            interaction: InteractionType::Push,
            hand_type: HandType::Primary,
            chirality: Chirality::Right,
            input_type,
            cursor_position: Vec2::new(x, 0.0),
            distance_from_screen_m: 0.1,
            progress_to_click: 0.0,
        }
    }

    #[test]
    fn test_fifo_order_preserved() {
        let queue = ActionQueue::new(10);
        for i in 0..3 {
            queue.push(action(InputType::Move, i as f32, i));
        }
        assert_eq!(queue.drain_one().unwrap().timestamp_us, 0);
        assert_eq!(queue.drain_one().unwrap().timestamp_us, 1);
        assert_eq!(queue.drain_one().unwrap().timestamp_us, 2);
        assert!(queue.drain_one().is_none());
    }

    #[test]
    fn test_backlog_of_moves_is_culled() {
        let queue = ActionQueue::new(2);
        for i in 0..10 {
            queue.push(action(InputType::Move, i as f32, i));
        }
        // Cull down to 2, then dispatch the first survivor.
        let dispatched = queue.drain_one().unwrap();
        assert_eq!(dispatched.timestamp_us, 8);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_discrete_event_stops_cull() {
        let queue = ActionQueue::new(2);
        queue.push(action(InputType::Move, 0.0, 0));
        queue.push(action(InputType::Down, 1.0, 1));
        queue.push(action(InputType::Move, 2.0, 2));
        queue.push(action(InputType::Move, 3.0, 3));
        queue.push(action(InputType::Move, 4.0, 4));

        // The head move is culled, then the Down stops further culling.
        let first = queue.drain_one().unwrap();
        assert_eq!(first.input_type, InputType::Down);
    }

    #[test]
    fn test_cull_invariant_after_drain() {
        // After any drain pass: len <= retention, or head is non-move.
        let queue = ActionQueue::new(2);
        for i in 0..5 {
            queue.push(action(InputType::Move, i as f32, i));
        }
        queue.push(action(InputType::Cancel, 5.0, 5));
        for i in 6..12 {
            queue.push(action(InputType::Move, i as f32, i));
        }

        while queue.drain_one().is_some() {
            let state = queue.state.lock().unwrap();
            let head_is_discrete = state
                .queue
                .front()
                .map(|a| a.input_type != InputType::Move)
                .unwrap_or(true);
            assert!(
                state.queue.len() <= queue.retention || head_is_discrete,
                "cull invariant violated: len={} head_discrete={}",
                state.queue.len(),
                head_is_discrete
            );
        }
    }

    #[test]
    fn test_up_position_rewritten_to_last_dispatched() {
        let queue = ActionQueue::new(10);
        queue.push(action(InputType::Down, 10.0, 0));
        queue.push(action(InputType::Move, 20.0, 1));
        queue.push(action(InputType::Up, 99.0, 2));

        queue.drain_one(); // down at x=10
        queue.drain_one(); // move at x=20
        let up = queue.drain_one().unwrap();
        assert_eq!(
            up.cursor_position,
            Vec2::new(20.0, 0.0),
            "up must land at the last dispatched non-up position"
        );
    }

    #[test]
    fn test_up_position_survives_culling() {
        // Even when intervening moves are culled, the up lands at the
        // last position the consumer actually saw.
        let queue = ActionQueue::new(2);
        queue.push(action(InputType::Down, 10.0, 0));
        let down = queue.drain_one().unwrap();
        assert_eq!(down.cursor_position.x, 10.0);

        for i in 0..8 {
            queue.push(action(InputType::Move, 30.0 + i as f32, 1 + i));
        }
        let survivor = queue.drain_one().unwrap();
        let survivor_x = survivor.cursor_position.x;

        queue.push(action(InputType::Up, 0.0, 20));
        // Cull the remaining backlog, then check the up's position.
        let mut last = queue.drain_one().unwrap();
        while last.input_type != InputType::Up {
            last = queue.drain_one().unwrap();
        }
        assert!(
            last.cursor_position.x >= survivor_x,
            "up position {} must be a recently dispatched position (>= {})",
            last.cursor_position.x,
            survivor_x
        );
        assert_ne!(last.cursor_position.x, 0.0, "up must never land at the origin");
    }

    #[test]
    fn test_clear_empties_queue() {
        let queue = ActionQueue::default();
        queue.push(action(InputType::Move, 0.0, 0));
        queue.clear();
        assert!(queue.is_empty());
    }
}
