use std::collections::BTreeMap;

use psim_core::{
    classify_run, Action, ActionStream, EventKind, EventModel, Grade, SimOptions, Simulation,
};
use psim_schema::{Metadata, Milliseconds};

#[derive(Debug)]
struct Row {
    time_ms: Milliseconds,
    lanes: Vec<Option<char>>,
    held_after: Option<Vec<usize>>,
    info: Vec<String>,
}

/// Rows are keyed by microsecond so equal timestamps from different sources merge.
fn key(time_ms: Milliseconds) -> i64 {
    (time_ms * 1000.0).round() as i64
}

fn row_at(rows: &mut BTreeMap<i64, Row>, time_ms: Milliseconds, columns: usize) -> &mut Row {
    rows.entry(key(time_ms)).or_insert_with(|| Row {
        time_ms,
        lanes: vec![None; columns],
        held_after: None,
        info: Vec::new(),
    })
}

pub fn print_timeline(
    meta: &Metadata,
    model: &EventModel,
    skill_level: f64,
    options: SimOptions,
) -> anyhow::Result<()> {
    let sim = Simulation::new(model, options)?;
    let mut state = sim.new_state();
    sim.run(&mut state, skill_level)?;

    let stream = ActionStream::generate(model, &state, sim.options());
    let judgements = classify_run(model, &state);
    let columns = model.columns();

    let mut rows: BTreeMap<i64, Row> = BTreeMap::new();

    for frame in &stream.frames {
        let row = row_at(&mut rows, frame.time_ms, columns);
        for action in &frame.actions {
            let c = match action {
                Action::Press { .. } => 'P',
                Action::Release { .. } => 'R',
            };
            row.lanes[action.channel()] = Some(c);
        }
        row.held_after = Some(frame.held.clone());
    }

    for (event, judgement) in model.events().iter().zip(&judgements) {
        let Some(grade) = judgement.grade() else {
            continue;
        };
        if grade == Grade::Miss {
            let row = row_at(&mut rows, event.start_ms, columns);
            row.lanes[event.channel] = Some('x');
            row.info.push(format!("ch{} miss", event.channel));
            continue;
        }
        if grade == Grade::Perfect {
            continue;
        }
        let at = match event.kind {
            EventKind::HoldTail { .. } => state.release(event.index),
            _ => state.press(event.index),
        };
        if let Some(at) = at {
            row_at(&mut rows, at, columns).info.push(format!("ch{} {grade}", event.channel));
        }
    }

    if rows.is_empty() {
        println!("Nothing to play.");
        return Ok(());
    }

    let lane_header: String = (0..columns)
        .map(|c| (c % 10).to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let lane_rule = "-".repeat(lane_header.len() + 2);

    println!(
        "{} - {} [{}] at skill {skill_level:.2}",
        meta.artist, meta.title, meta.version
    );
    println!("Time(ms)  | {lane_header} | Info");
    println!("----------|{lane_rule}|------------------");

    let mut holding = vec![false; columns];
    for row in rows.values() {
        let lane_str = row
            .lanes
            .iter()
            .zip(&holding)
            .map(|(c, &held)| match c {
                Some(c) => c.to_string(),
                None if held => "|".to_string(),
                None => ".".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");

        println!(
            "{:9.1} | {} | {}",
            row.time_ms,
            lane_str,
            row.info.join(", ")
        );

        if let Some(held) = &row.held_after {
            holding.fill(false);
            for &c in held {
                holding[c] = true;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_merge_equal_times_and_keep_order() {
        assert_eq!(key(-16.0), -16_000);
        assert_eq!(key(84.0), key(84.0000001));
        assert!(key(-16.0) < key(4.0));
    }
}
