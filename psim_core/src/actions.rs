use std::collections::BTreeSet;

use psim_schema::Milliseconds;
use serde::Serialize;

use crate::model::{EventKind, EventModel};
use crate::simulate::RunState;
use crate::SimOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Press { channel: usize },
    Release { channel: usize },
}

impl Action {
    pub fn channel(&self) -> usize {
        match self {
            Action::Press { channel } | Action::Release { channel } => *channel,
        }
    }

    fn order_key(&self) -> (u8, usize) {
        match self {
            Action::Release { channel } => (0, *channel),
            Action::Press { channel } => (1, *channel),
        }
    }
}

/// Actions sharing one timestamp. `held` lists the channels down afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFrame {
    pub time_ms: Milliseconds,
    pub actions: Vec<Action>,
    pub held: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionStream {
    pub skill_level: f64,
    pub frames: Vec<ActionFrame>,
}

#[derive(Debug, Clone, Copy)]
struct Hold {
    press: Milliseconds,
    release: Option<Milliseconds>,
}

impl ActionStream {
    /// Turns a finished run into press/release frames. Missed events emit nothing.
    pub fn generate(model: &EventModel, state: &RunState, options: &SimOptions) -> Self {
        let mut per_channel: Vec<Vec<Hold>> = vec![Vec::new(); model.columns()];
        for event in model.events() {
            let Some(press) = state.press(event.index) else {
                continue;
            };
            match event.kind {
                EventKind::Tap => per_channel[event.channel].push(Hold {
                    press,
                    release: None,
                }),
                EventKind::HoldHead { tail } => per_channel[event.channel].push(Hold {
                    press,
                    release: state.release(tail),
                }),
                EventKind::HoldTail { .. } | EventKind::HoldTick { .. } => {}
            }
        }

        let mut points: Vec<(Milliseconds, Action)> = Vec::new();
        for (channel, holds) in per_channel.iter_mut().enumerate() {
            holds.sort_by(|a, b| a.press.total_cmp(&b.press));
            for (k, hold) in holds.iter().enumerate() {
                let next_press = holds.get(k + 1).map(|h| h.press);
                let release = match hold.release {
                    Some(r) => r,
                    None => tap_release(hold.press, next_press, options.tap_release_delay),
                };
                let release = next_press.map_or(release, |n| release.min(n));

                points.push((hold.press, Action::Press { channel }));
                points.push((release, Action::Release { channel }));
            }
        }

        points.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.1.order_key().cmp(&b.1.order_key()))
        });

        let mut frames: Vec<ActionFrame> = Vec::new();
        let mut held = BTreeSet::new();
        for (time_ms, action) in points {
            match action {
                Action::Press { channel } => {
                    held.insert(channel);
                }
                Action::Release { channel } => {
                    held.remove(&channel);
                }
            }
            match frames.last_mut() {
                Some(frame) if frame.time_ms == time_ms => {
                    frame.actions.push(action);
                    frame.held = held.iter().copied().collect();
                }
                _ => frames.push(ActionFrame {
                    time_ms,
                    actions: vec![action],
                    held: held.iter().copied().collect(),
                }),
            }
        }

        log::debug!(
            "skill {:.2}: {} action frames",
            state.skill_level(),
            frames.len()
        );

        Self {
            skill_level: state.skill_level(),
            frames,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn press_count(&self) -> usize {
        self.frames
            .iter()
            .flat_map(|f| &f.actions)
            .filter(|a| matches!(a, Action::Press { .. }))
            .count()
    }
}

/// Taps are held for `delay`, or 90% of the gap when the next press comes sooner.
fn tap_release(
    press: Milliseconds,
    next_press: Option<Milliseconds>,
    delay: Milliseconds,
) -> Milliseconds {
    match next_press {
        Some(next) if next <= press + delay => press + (next - press) * 0.9,
        _ => press + delay,
    }
}
