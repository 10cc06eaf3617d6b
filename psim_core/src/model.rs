use psim_schema::{HitWindows, Milliseconds, NoteKind, PlayChart};

use crate::SimError;

pub type EventId = usize;

/// One note as handed over by the chart/mod layer.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSpec {
    pub channel: usize,
    pub start_ms: Milliseconds,
    pub hold: Option<HoldSpec>,
    pub windows: HitWindows,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldSpec {
    pub end_ms: Milliseconds,
    pub ticks_ms: Vec<Milliseconds>,
}

impl NoteSpec {
    pub fn tap(channel: usize, start_ms: Milliseconds, windows: HitWindows) -> Self {
        Self {
            channel,
            start_ms,
            hold: None,
            windows,
        }
    }

    pub fn hold(
        channel: usize,
        start_ms: Milliseconds,
        end_ms: Milliseconds,
        windows: HitWindows,
    ) -> Self {
        Self {
            channel,
            start_ms,
            hold: Some(HoldSpec {
                end_ms,
                ticks_ms: Vec::new(),
            }),
            windows,
        }
    }

    pub fn with_ticks(mut self, ticks_ms: impl IntoIterator<Item = Milliseconds>) -> Self {
        if let Some(hold) = &mut self.hold {
            hold.ticks_ms = ticks_ms.into_iter().collect();
        }
        self
    }

    pub fn end_ms(&self) -> Milliseconds {
        self.hold.as_ref().map_or(self.start_ms, |h| h.end_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Tap,
    HoldHead { tail: EventId },
    HoldTail { head: EventId },
    HoldTick { head: EventId },
}

impl EventKind {
    pub fn is_tick(&self) -> bool {
        matches!(self, EventKind::HoldTick { .. })
    }

    pub fn is_tail(&self) -> bool {
        matches!(self, EventKind::HoldTail { .. })
    }

    /// Taps and hold heads are the events that need a fresh press.
    pub fn is_press(&self) -> bool {
        matches!(self, EventKind::Tap | EventKind::HoldHead { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HitEvent {
    pub index: EventId,
    pub channel: usize,
    pub start_ms: Milliseconds,
    /// Equal to `start_ms` for everything but hold heads.
    pub end_ms: Milliseconds,
    pub kind: EventKind,
    pub windows: HitWindows,
    /// Index of the originating note in the builder input.
    pub note: usize,
}

impl HitEvent {
    pub fn max_judgement_offset(&self) -> Milliseconds {
        self.windows.miss
    }
}

/// Per-channel neighbour links. `None` means there is no such neighbour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjacency {
    pub strict_prev: Vec<Option<EventId>>,
    pub strict_next: Vec<Option<EventId>>,
    pub skip_prev: Vec<Option<EventId>>,
    pub skip_next: Vec<Option<EventId>>,
}

impl Adjacency {
    fn with_len(n: usize) -> Self {
        Self {
            strict_prev: vec![None; n],
            strict_next: vec![None; n],
            skip_prev: vec![None; n],
            skip_next: vec![None; n],
        }
    }
}

/// Flattened, time-ordered events plus their channel adjacency.
/// Built once per chart and shared read-only by every run.
#[derive(Debug, Clone)]
pub struct EventModel {
    columns: usize,
    note_count: usize,
    events: Vec<HitEvent>,
    adjacency: Adjacency,
}

#[derive(Debug, Clone, Copy)]
enum PendingKind {
    Tap,
    Head { tail: usize },
    Tail { head: usize },
    Tick { head: usize },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    order: usize,
    note: usize,
    channel: usize,
    start_ms: Milliseconds,
    end_ms: Milliseconds,
    kind: PendingKind,
}

impl EventModel {
    pub fn build(columns: usize, notes: &[NoteSpec]) -> Result<Self, SimError> {
        validate_notes(columns, notes)?;

        let pending = decompose(notes);
        let events = order_events(notes, pending);
        let adjacency = link_channels(columns, &events);

        log::debug!(
            "built event model: {} notes -> {} events over {} channels",
            notes.len(),
            events.len(),
            columns
        );

        Ok(Self {
            columns,
            note_count: notes.len(),
            events,
            adjacency,
        })
    }

    pub fn from_chart(chart: &PlayChart) -> Result<Self, SimError> {
        let defaults = chart.default_windows();
        let notes: Vec<NoteSpec> = chart
            .notes
            .iter()
            .map(|n| {
                let windows = n.hit_windows.unwrap_or(defaults);
                match &n.kind {
                    NoteKind::Tap => NoteSpec::tap(n.col as usize, n.time_ms, windows),
                    NoteKind::Hold {
                        end_time_ms,
                        tick_times_ms,
                    } => NoteSpec::hold(n.col as usize, n.time_ms, *end_time_ms, windows)
                        .with_ticks(tick_times_ms.iter().copied()),
                }
            })
            .collect();
        Self::build(chart.columns as usize, &notes)
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn note_count(&self) -> usize {
        self.note_count
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[HitEvent] {
        &self.events
    }

    pub fn event(&self, id: EventId) -> Option<&HitEvent> {
        self.events.get(id)
    }

    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Events of one channel in time order.
    pub fn channel_events(&self, channel: usize) -> impl Iterator<Item = &HitEvent> + '_ {
        self.events.iter().filter(move |e| e.channel == channel)
    }
}

fn validate_notes(columns: usize, notes: &[NoteSpec]) -> Result<(), SimError> {
    if columns == 0 {
        return Err(SimError::new("E1002", "chart must have at least one column"));
    }
    if notes.is_empty() {
        return Err(SimError::new("E1001", "note sequence is empty"));
    }

    for (i, note) in notes.iter().enumerate() {
        let at = || format!("note #{i}");

        if note.channel >= columns {
            return Err(SimError::new(
                "E1002",
                format!("channel {} out of range (columns={columns})", note.channel),
            )
            .with_channel(note.channel)
            .with_context(at()));
        }
        if !note.start_ms.is_finite() {
            return Err(SimError::new("E1003", "note time must be finite")
                .with_channel(note.channel)
                .with_context(at()));
        }
        if !note.windows.is_well_formed() {
            return Err(SimError::new(
                "E1007",
                "hit windows must be finite, >= 0 and non-decreasing",
            )
            .with_channel(note.channel)
            .with_time_ms(note.start_ms)
            .with_context(at()));
        }

        let Some(hold) = &note.hold else {
            continue;
        };
        if !hold.end_ms.is_finite() {
            return Err(SimError::new("E1003", "hold end time must be finite")
                .with_channel(note.channel)
                .with_time_ms(note.start_ms)
                .with_context(at()));
        }
        if hold.end_ms <= note.start_ms {
            return Err(SimError::new(
                "E1004",
                format!(
                    "hold must end after it starts (start={}, end={})",
                    note.start_ms, hold.end_ms
                ),
            )
            .with_channel(note.channel)
            .with_time_ms(note.start_ms)
            .with_context(at()));
        }
        let mut last = note.start_ms;
        for &tick in &hold.ticks_ms {
            if !(tick > last && tick < hold.end_ms) {
                return Err(SimError::new(
                    "E1005",
                    format!(
                        "hold ticks must be increasing and strictly inside ({}, {}) (tick={tick})",
                        note.start_ms, hold.end_ms
                    ),
                )
                .with_channel(note.channel)
                .with_time_ms(tick)
                .with_context(at()));
            }
            last = tick;
        }
    }

    let mut by_channel: Vec<Vec<usize>> = vec![Vec::new(); columns];
    for (i, note) in notes.iter().enumerate() {
        by_channel[note.channel].push(i);
    }
    for (channel, ids) in by_channel.iter_mut().enumerate() {
        ids.sort_by(|&a, &b| notes[a].start_ms.total_cmp(&notes[b].start_ms).then(a.cmp(&b)));
        for pair in ids.windows(2) {
            let (prev, next) = (&notes[pair[0]], &notes[pair[1]]);
            if next.start_ms <= prev.end_ms() {
                return Err(SimError::new(
                    "E1006",
                    format!(
                        "notes overlap in channel {channel} \
                         (previous ends at {}, next starts at {})",
                        prev.end_ms(),
                        next.start_ms
                    ),
                )
                .with_channel(channel)
                .with_time_ms(next.start_ms)
                .with_context(format!("note #{}", pair[1])));
            }
        }
    }

    Ok(())
}

/// Splits holds into head, ticks and tail. `order` is the stable input order.
fn decompose(notes: &[NoteSpec]) -> Vec<Pending> {
    let mut out = Vec::new();
    for (note_idx, note) in notes.iter().enumerate() {
        let base = out.len();
        match &note.hold {
            None => out.push(Pending {
                order: base,
                note: note_idx,
                channel: note.channel,
                start_ms: note.start_ms,
                end_ms: note.start_ms,
                kind: PendingKind::Tap,
            }),
            Some(hold) => {
                let tail = base + 1 + hold.ticks_ms.len();
                out.push(Pending {
                    order: base,
                    note: note_idx,
                    channel: note.channel,
                    start_ms: note.start_ms,
                    end_ms: hold.end_ms,
                    kind: PendingKind::Head { tail },
                });
                for (k, &tick) in hold.ticks_ms.iter().enumerate() {
                    out.push(Pending {
                        order: base + 1 + k,
                        note: note_idx,
                        channel: note.channel,
                        start_ms: tick,
                        end_ms: tick,
                        kind: PendingKind::Tick { head: base },
                    });
                }
                out.push(Pending {
                    order: tail,
                    note: note_idx,
                    channel: note.channel,
                    start_ms: hold.end_ms,
                    end_ms: hold.end_ms,
                    kind: PendingKind::Tail { head: base },
                });
            }
        }
    }
    out
}

fn order_events(notes: &[NoteSpec], mut pending: Vec<Pending>) -> Vec<HitEvent> {
    pending.sort_by(|a, b| {
        a.start_ms
            .total_cmp(&b.start_ms)
            .then(a.channel.cmp(&b.channel))
            .then(a.order.cmp(&b.order))
    });

    let mut index_of = vec![0; pending.len()];
    for (index, p) in pending.iter().enumerate() {
        index_of[p.order] = index;
    }

    pending
        .iter()
        .enumerate()
        .map(|(index, p)| HitEvent {
            index,
            channel: p.channel,
            start_ms: p.start_ms,
            end_ms: p.end_ms,
            kind: match p.kind {
                PendingKind::Tap => EventKind::Tap,
                PendingKind::Head { tail } => EventKind::HoldHead {
                    tail: index_of[tail],
                },
                PendingKind::Tail { head } => EventKind::HoldTail {
                    head: index_of[head],
                },
                PendingKind::Tick { head } => EventKind::HoldTick {
                    head: index_of[head],
                },
            },
            windows: notes[p.note].windows,
            note: p.note,
        })
        .collect()
}

/// Two linear passes: forward links every event to the buffered previous
/// event of its channel, backward fills successors the forward pass never
/// reached.
fn link_channels(columns: usize, events: &[HitEvent]) -> Adjacency {
    let n = events.len();
    let mut adj = Adjacency::with_len(n);
    let mut resolved = vec![false; n];

    let mut buffered: Vec<Option<EventId>> = vec![None; columns];
    for (i, event) in events.iter().enumerate() {
        let c = event.channel;
        match buffered[c] {
            None => buffered[c] = Some(i),
            Some(p) => {
                adj.strict_prev[i] = Some(p);
                adj.skip_prev[i] = Some(p);
                adj.strict_next[p] = Some(i);
                adj.skip_next[p] = Some(i);
                resolved[p] = true;
                // Ticks never anchor the next press.
                if !event.kind.is_tick() {
                    buffered[c] = Some(i);
                }
            }
        }
    }
    // Last anchor of each channel: resolved, with no successor.
    for last in buffered.into_iter().flatten() {
        resolved[last] = true;
    }

    let mut later: Vec<Option<EventId>> = vec![None; columns];
    for i in (0..n).rev() {
        let c = events[i].channel;
        if resolved[i] {
            later[c] = Some(i);
        } else {
            adj.strict_next[i] = later[c];
            adj.skip_next[i] = later[c];
        }
    }

    adj
}
