use psim_schema::{Grade, HitWindows, Milliseconds};

use crate::model::{EventKind, EventModel};
use crate::simulate::{RunState, TimingContext};

/// Tightest grade whose window contains `offset`. An unset offset is a miss.
pub fn grade_from_offset(offset: Option<Milliseconds>, windows: &HitWindows) -> Grade {
    let Some(offset) = offset else {
        return Grade::Miss;
    };
    let abs = offset.abs();
    Grade::HITS
        .into_iter()
        .find(|&g| abs <= windows.window_for(g))
        .unwrap_or(Grade::Miss)
}

/// Lowest skill level at which a grade becomes reachable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillRequirement {
    pub level: f64,
    /// Whether `level` itself already qualifies.
    pub inclusive: bool,
}

impl SkillRequirement {
    const ANY: Self = Self {
        level: 0.0,
        inclusive: true,
    };

    pub fn is_met_by(&self, skill_level: f64) -> bool {
        if self.inclusive {
            skill_level >= self.level
        } else {
            skill_level > self.level
        }
    }
}

/// Minimum skill needed to land `grade` (or tighter) on the event described
/// by `ctx`; `None` when no skill level reaches it.
///
/// The press has to come late enough after the anchor for the reaction
/// interval to fit, and early enough to stay inside the grade window and
/// before the next note in the channel. Both bounds cap the reaction
/// interval, and the tighter one sets the requirement.
pub fn required_skill(ctx: &TimingContext, grade: Grade) -> Option<SkillRequirement> {
    if grade == Grade::Miss {
        return Some(SkillRequirement::ANY);
    }
    let Some(anchor) = ctx.anchor else {
        // Nothing to react to: the earliest press always lands.
        return Some(SkillRequirement::ANY);
    };

    let bound = ctx.start_ms + ctx.windows.window_for(grade);
    let fixed = ctx.fixed_lower_bound_ms();
    if fixed > bound || ctx.next_start_ms.is_some_and(|next| fixed >= next) {
        return None;
    }

    let base = anchor.time_ms - anchor.leniency_ms;

    let window_budget = bound - base;
    if window_budget <= 0.0 {
        return None;
    }
    let mut requirement = SkillRequirement {
        level: ctx.options.skill_for_interval(window_budget),
        inclusive: true,
    };

    if let Some(next) = ctx.next_start_ms {
        let next_budget = next - base;
        if next_budget <= 0.0 {
            return None;
        }
        let level = ctx.options.skill_for_interval(next_budget);
        if level >= requirement.level {
            requirement = SkillRequirement {
                level,
                inclusive: false,
            };
        }
    }

    Some(requirement)
}

/// Linear scan tightest to loosest for the first grade whose skill
/// requirement `skill_level` meets.
pub fn tightest_achievable_grade(skill_level: f64, ctx: &TimingContext) -> Grade {
    Grade::HITS
        .into_iter()
        .find(|&g| required_skill(ctx, g).is_some_and(|r| r.is_met_by(skill_level)))
        .unwrap_or(Grade::Miss)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgement {
    Graded(Grade),
    TickHeld,
    TickDropped,
}

impl Judgement {
    pub fn grade(&self) -> Option<Grade> {
        match self {
            Judgement::Graded(g) => Some(*g),
            Judgement::TickHeld | Judgement::TickDropped => None,
        }
    }
}

/// Judges every event of a finished run, indexed like `model.events()`.
pub fn classify_run(model: &EventModel, state: &RunState) -> Vec<Judgement> {
    let adj = model.adjacency();
    model
        .events()
        .iter()
        .map(|event| match event.kind {
            EventKind::HoldTick { .. } => {
                if state.is_hit(event) {
                    Judgement::TickHeld
                } else {
                    Judgement::TickDropped
                }
            }
            EventKind::HoldTail { .. } => {
                let release = state.release(event.index);
                let late_for_next = match (release, adj.strict_next[event.index]) {
                    (Some(r), Some(n)) => model.event(n).is_some_and(|next| r >= next.start_ms),
                    _ => false,
                };
                if late_for_next {
                    Judgement::Graded(Grade::Miss)
                } else {
                    Judgement::Graded(grade_from_offset(
                        release.map(|r| r - event.start_ms),
                        &event.windows,
                    ))
                }
            }
            EventKind::Tap | EventKind::HoldHead { .. } => Judgement::Graded(grade_from_offset(
                state.press(event.index).map(|p| p - event.start_ms),
                &event.windows,
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::Anchor;
    use crate::SimOptions;

    fn od0() -> HitWindows {
        HitWindows::from_overall_difficulty(0.0)
    }

    fn ctx_after_tap(anchor_ms: f64, start_ms: f64, next: Option<f64>) -> TimingContext {
        TimingContext {
            start_ms,
            windows: od0(),
            anchor: Some(Anchor {
                time_ms: anchor_ms,
                leniency_ms: 0.0,
            }),
            holdable_after_ms: f64::NEG_INFINITY,
            next_start_ms: next,
            options: SimOptions::default(),
        }
    }

    #[test]
    fn offset_grades_follow_window_table() {
        let w = od0();
        assert_eq!(grade_from_offset(Some(0.0), &w), Grade::Perfect);
        assert_eq!(grade_from_offset(Some(-16.0), &w), Grade::Perfect);
        assert_eq!(grade_from_offset(Some(16.5), &w), Grade::Great);
        assert_eq!(grade_from_offset(Some(-97.0), &w), Grade::Good);
        assert_eq!(grade_from_offset(Some(120.0), &w), Grade::Ok);
        assert_eq!(grade_from_offset(Some(151.0), &w), Grade::Meh);
        assert_eq!(grade_from_offset(Some(151.5), &w), Grade::Miss);
        assert_eq!(grade_from_offset(None, &w), Grade::Miss);
    }

    #[test]
    fn no_anchor_is_always_perfect() {
        let ctx = TimingContext {
            anchor: None,
            ..ctx_after_tap(0.0, 100.0, None)
        };
        assert_eq!(tightest_achievable_grade(0.0, &ctx), Grade::Perfect);
        assert_eq!(tightest_achievable_grade(3.0, &ctx), Grade::Perfect);
    }

    #[test]
    fn requirement_for_window_bound() {
        // Anchor at 0, note at 100: Perfect needs the interval <= 116.
        let ctx = ctx_after_tap(0.0, 100.0, None);
        let req = required_skill(&ctx, Grade::Perfect).unwrap();
        assert!(req.inclusive);
        assert!((req.level - 1000.0 / 116.0).abs() < 1e-12);

        assert_eq!(tightest_achievable_grade(1000.0 / 116.0 + 0.01, &ctx), Grade::Perfect);
        assert_eq!(tightest_achievable_grade(1000.0 / 150.0, &ctx), Grade::Great);
        assert_eq!(tightest_achievable_grade(1.0, &ctx), Grade::Miss);
    }

    #[test]
    fn next_note_caps_requirement_exclusively() {
        // Next note at 130 is tighter than the Meh bound (251).
        let ctx = ctx_after_tap(0.0, 100.0, Some(130.0));
        let req = required_skill(&ctx, Grade::Meh).unwrap();
        assert!(!req.inclusive);
        assert!((req.level - 1000.0 / 130.0).abs() < 1e-12);
        assert!(!req.is_met_by(1000.0 / 130.0));
    }

    #[test]
    fn fixed_bound_past_window_is_unreachable() {
        let mut ctx = ctx_after_tap(0.0, 100.0, None);
        ctx.holdable_after_ms = 300.0;
        assert_eq!(required_skill(&ctx, Grade::Meh), None);
        assert_eq!(tightest_achievable_grade(100.0, &ctx), Grade::Miss);
    }

    #[test]
    fn grade_never_degrades_with_skill() {
        let ctx = ctx_after_tap(-16.0, 100.0, Some(260.0));
        let mut last = Grade::Miss;
        for k in 0..400 {
            let g = tightest_achievable_grade(k as f64 * 0.05, &ctx);
            assert!(g <= last, "grade got worse at level {}", k as f64 * 0.05);
            last = g;
        }
        assert_eq!(last, Grade::Perfect);
    }
}
