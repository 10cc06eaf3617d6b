//! Deterministic virtual-player simulation for lane-based rhythm charts.
//!
//! A chart is flattened into an [`EventModel`] once. Each run of the
//! [`Simulation`] at a skill level assigns press/release timings to every
//! event; the results feed either the [`CurveSampler`] (difficulty curves)
//! or the [`ActionStream`] generator (autoplay input).

mod actions;
mod curve;
mod error;
mod judge;
mod model;
mod options;
mod simulate;


pub use actions::{Action, ActionFrame, ActionStream};
pub use curve::{Annotations, Curve, CurveSample, CurveSampler, CurveSamples, Tally, MAX_SCORE};
pub use error::{SimError, SimErrorKind};
pub use judge::{
    classify_run, grade_from_offset, required_skill, tightest_achievable_grade, Judgement,
    SkillRequirement,
};
pub use model::{Adjacency, EventId, EventKind, EventModel, HitEvent, HoldSpec, NoteSpec};
pub use options::{SimOptions, SweepOptions, MAX_SWEEP_SAMPLES};
pub use simulate::{simulate, Anchor, RunState, Simulation, TimingContext};

pub use psim_schema::{Grade, HitWindows};

/// Sweeps `sweep` and collects the whole curve.
pub fn sample_curve(
    model: &EventModel,
    sweep: SweepOptions,
    options: SimOptions,
) -> Result<Curve, SimError> {
    CurveSampler::new(model, sweep, options)?.collect()
}

/// Single run at `skill_level` turned into an action stream.
pub fn generate_actions(
    model: &EventModel,
    skill_level: f64,
    options: SimOptions,
) -> Result<ActionStream, SimError> {
    let sim = Simulation::new(model, options)?;
    let mut state = sim.new_state();
    sim.run(&mut state, skill_level)?;
    Ok(ActionStream::generate(model, &state, sim.options()))
}
