use std::time::Instant;

use psim_schema::{Grade, Milliseconds};
use rayon::prelude::*;
use serde::Serialize;

use crate::judge::{classify_run, Judgement};
use crate::model::EventModel;
use crate::simulate::{RunState, Simulation};
use crate::{SimError, SimOptions, SweepOptions};

/// Score of a run where every judged event is Perfect.
pub const MAX_SCORE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Indexed by [`Grade::index`].
    pub counts: [u32; 6],
    pub ticks_held: u32,
    pub ticks_dropped: u32,
    pub points: u64,
}

impl Tally {
    fn add(&mut self, judgement: Judgement) {
        match judgement {
            Judgement::Graded(grade) => {
                self.counts[grade.index()] += 1;
                self.points += u64::from(grade.points());
            }
            Judgement::TickHeld => self.ticks_held += 1,
            Judgement::TickDropped => self.ticks_dropped += 1,
        }
    }

    pub fn count(&self, grade: Grade) -> u32 {
        self.counts[grade.index()]
    }

    /// Number of graded (non-tick) events.
    pub fn judged(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Running totals in grade order: Perfect, Perfect+Great, ...
    pub fn cumulative(&self) -> [u32; 6] {
        let mut out = self.counts;
        for i in 1..out.len() {
            out[i] += out[i - 1];
        }
        out
    }

    /// Standardised score out of [`MAX_SCORE`]; ticks don't contribute.
    pub fn score(&self) -> f64 {
        let judged = self.judged();
        if judged == 0 {
            return 0.0;
        }
        let max_points = u64::from(judged) * u64::from(Grade::Perfect.points());
        MAX_SCORE * self.points as f64 / max_points as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveSample {
    pub skill_level: f64,
    pub score: f64,
    pub total: Tally,
    pub channels: Vec<Tally>,
    /// Nominal times of events judged Miss.
    pub miss_times_ms: Vec<Milliseconds>,
    /// Nominal times of events judged Great..Meh.
    pub non_perfect_times_ms: Vec<Milliseconds>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Annotations {
    pub miss_levels: Vec<f64>,
    pub non_perfect_levels: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    pub sweep: SweepOptions,
    pub samples: Vec<CurveSample>,
}

impl Curve {
    pub fn score_points(&self) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .map(|s| (s.skill_level, s.score))
            .collect()
    }

    pub fn channel_score_points(&self, channel: usize) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.channels.get(channel).map(|t| (s.skill_level, t.score())))
            .collect()
    }

    /// (skill, events judged `grade` or tighter) for every sample.
    pub fn cumulative_points(&self, grade: Grade) -> Vec<(f64, u32)> {
        self.samples
            .iter()
            .map(|s| (s.skill_level, s.total.cumulative()[grade.index()]))
            .collect()
    }

    pub fn annotations(&self) -> Annotations {
        let mut out = Annotations::default();
        for s in &self.samples {
            if !s.miss_times_ms.is_empty() {
                out.miss_levels.push(s.skill_level);
            }
            if !s.non_perfect_times_ms.is_empty() {
                out.non_perfect_levels.push(s.skill_level);
            }
        }
        out
    }

    /// Lowest sampled level at which every judged event is `grade` or tighter.
    pub fn first_level_reaching(&self, grade: Grade) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.total.cumulative()[grade.index()] == s.total.judged())
            .map(|s| s.skill_level)
    }
}

/// Runs the simulator across a skill sweep.
#[derive(Debug, Clone, Copy)]
pub struct CurveSampler<'m> {
    sim: Simulation<'m>,
    sweep: SweepOptions,
}

impl<'m> CurveSampler<'m> {
    pub fn new(
        model: &'m EventModel,
        sweep: SweepOptions,
        options: SimOptions,
    ) -> Result<Self, SimError> {
        sweep.validate()?;
        Ok(Self {
            sim: Simulation::new(model, options)?,
            sweep,
        })
    }

    pub fn len(&self) -> usize {
        self.sweep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweep.is_empty()
    }

    /// Lazy iterator over the sweep. Every call starts over with fresh run state.
    pub fn samples(&self) -> CurveSamples<'_, 'm> {
        CurveSamples {
            sampler: self,
            state: self.sim.new_state(),
            next: 0,
            len: self.sweep.len(),
        }
    }

    /// Simulates and tallies one skill level, reusing `state`.
    pub fn sample_at(
        &self,
        state: &mut RunState,
        skill_level: f64,
    ) -> Result<CurveSample, SimError> {
        self.sim.run(state, skill_level)?;

        let model = self.sim.model();
        let judgements = classify_run(model, state);

        let mut total = Tally::default();
        let mut channels = vec![Tally::default(); model.columns()];
        let mut miss_times_ms = Vec::new();
        let mut non_perfect_times_ms = Vec::new();

        for (event, judgement) in model.events().iter().zip(judgements) {
            total.add(judgement);
            channels[event.channel].add(judgement);
            match judgement.grade() {
                Some(Grade::Miss) => miss_times_ms.push(event.start_ms),
                Some(Grade::Perfect) | None => {}
                Some(_) => non_perfect_times_ms.push(event.start_ms),
            }
        }

        Ok(CurveSample {
            skill_level,
            score: total.score(),
            total,
            channels,
            miss_times_ms,
            non_perfect_times_ms,
        })
    }

    pub fn collect(&self) -> Result<Curve, SimError> {
        let started = Instant::now();
        let samples = self.samples().collect::<Result<Vec<_>, _>>()?;
        log::info!(
            "sampled {} skill levels in {:?}",
            samples.len(),
            started.elapsed()
        );
        Ok(Curve {
            sweep: self.sweep,
            samples,
        })
    }

    /// Same result as [`collect`](Self::collect), one run state per worker.
    pub fn collect_parallel(&self) -> Result<Curve, SimError> {
        let started = Instant::now();
        let samples = (0..self.sweep.len())
            .into_par_iter()
            .map_init(
                || self.sim.new_state(),
                |state, k| self.sample_at(state, self.sweep.level_at(k)),
            )
            .collect::<Result<Vec<_>, _>>()?;
        log::info!(
            "sampled {} skill levels in {:?} (parallel)",
            samples.len(),
            started.elapsed()
        );
        Ok(Curve {
            sweep: self.sweep,
            samples,
        })
    }
}

impl<'s, 'm> IntoIterator for &'s CurveSampler<'m> {
    type Item = Result<CurveSample, SimError>;
    type IntoIter = CurveSamples<'s, 'm>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples()
    }
}

pub struct CurveSamples<'s, 'm> {
    sampler: &'s CurveSampler<'m>,
    state: RunState,
    next: usize,
    len: usize,
}

impl Iterator for CurveSamples<'_, '_> {
    type Item = Result<CurveSample, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.len {
            return None;
        }
        let level = self.sampler.sweep.level_at(self.next);
        self.next += 1;
        Some(self.sampler.sample_at(&mut self.state, level))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for CurveSamples<'_, '_> {}
