use psim_schema::{HitWindows, Milliseconds};

use crate::model::{EventId, EventKind, EventModel, HitEvent};
use crate::options::check_skill_level;
use crate::{SimError, SimOptions};

/// Press/release timings of one run, plus the run's copy of the
/// miss-skipping chain. Allocated once and reset for every skill level.
#[derive(Debug, Clone)]
pub struct RunState {
    skill_level: f64,
    press: Vec<Option<Milliseconds>>,
    release: Vec<Option<Milliseconds>>,
    anchors: Vec<Option<EventId>>,
    skip_prev: Vec<Option<EventId>>,
    skip_next: Vec<Option<EventId>>,
}

impl RunState {
    pub fn new(model: &EventModel) -> Self {
        let n = model.len();
        let adj = model.adjacency();
        Self {
            skill_level: 0.0,
            press: vec![None; n],
            release: vec![None; n],
            anchors: vec![None; n],
            skip_prev: adj.skip_prev.clone(),
            skip_next: adj.skip_next.clone(),
        }
    }

    fn reset(&mut self, model: &EventModel) {
        let adj = model.adjacency();
        self.press.fill(None);
        self.release.fill(None);
        self.anchors.fill(None);
        self.skip_prev.copy_from_slice(&adj.skip_prev);
        self.skip_next.copy_from_slice(&adj.skip_next);
    }

    pub fn len(&self) -> usize {
        self.press.len()
    }

    pub fn is_empty(&self) -> bool {
        self.press.is_empty()
    }

    pub fn skill_level(&self) -> f64 {
        self.skill_level
    }

    pub fn press_timings(&self) -> &[Option<Milliseconds>] {
        &self.press
    }

    pub fn release_timings(&self) -> &[Option<Milliseconds>] {
        &self.release
    }

    pub fn press(&self, id: EventId) -> Option<Milliseconds> {
        self.press.get(id).copied().flatten()
    }

    pub fn release(&self, id: EventId) -> Option<Milliseconds> {
        self.release.get(id).copied().flatten()
    }

    /// Press time, or release time for a hold tail.
    pub fn input_time(&self, event: &HitEvent) -> Option<Milliseconds> {
        match event.kind {
            EventKind::HoldTail { .. } => self.release(event.index),
            _ => self.press(event.index),
        }
    }

    pub fn is_hit(&self, event: &HitEvent) -> bool {
        self.input_time(event).is_some()
    }

    /// Event whose input anchored this event's press, as seen when it was simulated.
    pub fn anchor_of(&self, id: EventId) -> Option<EventId> {
        self.anchors.get(id).copied().flatten()
    }

    pub fn skip_prev(&self) -> &[Option<EventId>] {
        &self.skip_prev
    }

    pub fn skip_next(&self) -> &[Option<EventId>] {
        &self.skip_next
    }

    /// Fails when any skip link points at an event without input time.
    pub fn check_skip_chain(&self, model: &EventModel) -> Result<(), SimError> {
        if self.len() != model.len() {
            return Err(SimError::new("E9003", "run state does not belong to this model"));
        }
        for event in model.events() {
            let links = [
                self.skip_prev[event.index],
                self.skip_next[event.index],
            ];
            for target in links.into_iter().flatten() {
                let target_event = model.event(target).ok_or_else(|| {
                    SimError::new("E9002", format!("skip link to unknown event {target}"))
                        .with_event(event.index)
                })?;
                if !self.is_hit(target_event) {
                    return Err(SimError::new(
                        "E9004",
                        format!("skip chain still references missed event {target}"),
                    )
                    .with_event(event.index)
                    .with_channel(event.channel));
                }
            }
        }
        Ok(())
    }

    /// Removes a missed event from the skip chain and clears its own links.
    fn unlink(&mut self, id: EventId) {
        let (prev, next) = (self.skip_prev[id], self.skip_next[id]);
        if let Some(n) = next {
            if self.skip_prev[n] == Some(id) {
                self.skip_prev[n] = prev;
            }
        }
        if let Some(p) = prev {
            if self.skip_next[p] == Some(id) {
                self.skip_next[p] = next;
            }
        }
        self.skip_prev[id] = None;
        self.skip_next[id] = None;
    }
}

/// The input that a press has to follow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub time_ms: Milliseconds,
    /// Subtracted from the reaction interval; non-zero after a release.
    pub leniency_ms: Milliseconds,
}

/// Everything that decides when a press event can be hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingContext {
    pub start_ms: Milliseconds,
    pub windows: HitWindows,
    pub anchor: Option<Anchor>,
    /// The press must land after this (previous note still pending before it).
    pub holdable_after_ms: Milliseconds,
    pub next_start_ms: Option<Milliseconds>,
    pub options: SimOptions,
}

impl TimingContext {
    /// Earliest press that still counts as the tightest grade.
    pub fn floor_ms(&self) -> Milliseconds {
        self.start_ms - self.windows.perfect
    }

    /// Lower bound on the press that doesn't depend on skill.
    pub fn fixed_lower_bound_ms(&self) -> Milliseconds {
        self.floor_ms().max(self.holdable_after_ms)
    }

    /// Press time at a skill level, or `None` for a miss.
    pub fn press_at(&self, skill_level: f64) -> Option<Milliseconds> {
        let Some(anchor) = self.anchor else {
            return Some(self.floor_ms());
        };

        let reach =
            anchor.time_ms + self.options.reaction_interval(skill_level) - anchor.leniency_ms;
        let candidate = reach.max(self.fixed_lower_bound_ms());

        let in_window = candidate <= self.start_ms + self.windows.meh;
        let before_next = self.next_start_ms.map_or(true, |next| candidate < next);
        (in_window && before_next).then_some(candidate)
    }
}

/// Deterministic single-pass player simulation over an [`EventModel`].
#[derive(Debug, Clone, Copy)]
pub struct Simulation<'m> {
    model: &'m EventModel,
    options: SimOptions,
}

impl<'m> Simulation<'m> {
    pub fn new(model: &'m EventModel, options: SimOptions) -> Result<Self, SimError> {
        options.validate()?;
        Ok(Self { model, options })
    }

    pub fn model(&self) -> &'m EventModel {
        self.model
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    pub fn new_state(&self) -> RunState {
        RunState::new(self.model)
    }

    pub fn run(&self, state: &mut RunState, skill_level: f64) -> Result<(), SimError> {
        check_skill_level(skill_level)?;
        if state.len() != self.model.len() {
            return Err(SimError::new(
                "E9003",
                format!(
                    "run state holds {} events, model has {}",
                    state.len(),
                    self.model.len()
                ),
            ));
        }

        state.reset(self.model);
        state.skill_level = skill_level;

        let mut misses = 0usize;
        for event in self.model.events() {
            match event.kind {
                EventKind::HoldTick { head } => {
                    let head_event = self.event(head)?;
                    if state.is_hit(head_event) {
                        state.press[event.index] = Some(event.start_ms);
                    }
                }
                EventKind::HoldTail { .. } => self.resolve_release(state, event)?,
                EventKind::Tap | EventKind::HoldHead { .. } => {
                    state.anchors[event.index] = state.skip_prev[event.index];
                    let ctx = self.context_for(state, event)?;
                    state.press[event.index] = ctx.press_at(skill_level);
                }
            }

            if !state.is_hit(event) {
                misses += 1;
                log::trace!(
                    "skill {skill_level:.2}: event {} (channel {}, {} ms) missed",
                    event.index,
                    event.channel,
                    event.start_ms
                );
                state.unlink(event.index);
            }
        }

        log::debug!(
            "skill {skill_level:.2}: {misses} of {} events missed",
            self.model.len()
        );
        Ok(())
    }

    /// Context of a press event (tap or hold head) in a finished or running state.
    pub fn context_for(
        &self,
        state: &RunState,
        event: &HitEvent,
    ) -> Result<TimingContext, SimError> {
        let adj = self.model.adjacency();
        let anchor_id = state.anchor_of(event.index);

        let anchor = match anchor_id {
            None => None,
            Some(a) => {
                let anchor_event = self.event(a)?;
                let time_ms = state.input_time(anchor_event).ok_or_else(|| {
                    SimError::new("E9001", format!("anchor event {a} has no input time"))
                        .with_event(event.index)
                        .with_channel(event.channel)
                        .with_time_ms(event.start_ms)
                })?;
                let leniency_ms = if anchor_event.kind.is_tail() {
                    self.options.release_leniency
                } else {
                    0.0
                };
                Some(Anchor {
                    time_ms,
                    leniency_ms,
                })
            }
        };

        let holdable_after_ms = match adj.strict_prev[event.index] {
            None => f64::NEG_INFINITY,
            Some(p) => {
                let prev = self.event(p)?;
                if anchor_id == Some(p) {
                    prev.start_ms + self.options.hold_epsilon
                } else {
                    // Missed previous note: wait until it can no longer be judged.
                    prev.start_ms + prev.max_judgement_offset() + self.options.hold_epsilon
                }
            }
        };

        let next_start_ms = match adj.strict_next[event.index] {
            None => None,
            Some(n) => Some(self.event(n)?.start_ms),
        };

        Ok(TimingContext {
            start_ms: event.start_ms,
            windows: event.windows,
            anchor,
            holdable_after_ms,
            next_start_ms,
            options: self.options,
        })
    }

    fn resolve_release(&self, state: &mut RunState, event: &HitEvent) -> Result<(), SimError> {
        let Some(head) = self.model.adjacency().strict_prev[event.index] else {
            return Err(SimError::new("E9002", "hold tail without a previous event")
                .with_event(event.index)
                .with_channel(event.channel));
        };
        let head_event = self.event(head)?;
        if let Some(pressed) = state.input_time(head_event) {
            state.release[event.index] =
                Some(event.start_ms.max(pressed + self.options.min_release_gap));
        }
        Ok(())
    }

    fn event(&self, id: EventId) -> Result<&'m HitEvent, SimError> {
        self.model
            .event(id)
            .ok_or_else(|| {
                SimError::new("E9002", format!("adjacency references unknown event {id}"))
            })
    }
}

/// One run at `skill_level` with default options.
pub fn simulate(model: &EventModel, skill_level: f64) -> Result<RunState, SimError> {
    let sim = Simulation::new(model, SimOptions::default())?;
    let mut state = sim.new_state();
    sim.run(&mut state, skill_level)?;
    Ok(state)
}
