use serde::{Deserialize, Serialize};

pub type Milliseconds = f64;

/// Judgement grades ordered from the tightest window to the loosest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Perfect,
    Great,
    Good,
    Ok,
    Meh,
    Miss,
}

impl Grade {
    /// Every grade, tightest first.
    pub const ALL: [Grade; 6] = [
        Grade::Perfect,
        Grade::Great,
        Grade::Good,
        Grade::Ok,
        Grade::Meh,
        Grade::Miss,
    ];

    /// Grades that have a bounded window.
    pub const HITS: [Grade; 5] = [
        Grade::Perfect,
        Grade::Great,
        Grade::Good,
        Grade::Ok,
        Grade::Meh,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Base point value used by the standardised score.
    pub fn points(self) -> u32 {
        match self {
            Grade::Perfect => 305,
            Grade::Great => 300,
            Grade::Good => 200,
            Grade::Ok => 100,
            Grade::Meh => 50,
            Grade::Miss => 0,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::Perfect => "perfect",
            Grade::Great => "great",
            Grade::Good => "good",
            Grade::Ok => "ok",
            Grade::Meh => "meh",
            Grade::Miss => "miss",
        };
        f.write_str(s)
    }
}

/// Maximum absolute timing offset per grade, in milliseconds.
///
/// `miss` is the maximum judgement offset: a press later than
/// `start + miss` is no longer attributed to the note at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitWindows {
    pub perfect: Milliseconds,
    pub great: Milliseconds,
    pub good: Milliseconds,
    pub ok: Milliseconds,
    pub meh: Milliseconds,
    pub miss: Milliseconds,
}

impl Default for HitWindows {
    fn default() -> Self {
        Self::from_overall_difficulty(0.0)
    }
}

impl HitWindows {
    /// Mania windows for an overall difficulty value.
    pub fn from_overall_difficulty(od: f64) -> Self {
        Self {
            perfect: 16.0,
            great: 64.0 - 3.0 * od,
            good: 97.0 - 3.0 * od,
            ok: 127.0 - 3.0 * od,
            meh: 151.0 - 3.0 * od,
            miss: 188.0 - 3.0 * od,
        }
    }

    /// Window for a grade. `Miss` has no bound.
    pub fn window_for(&self, grade: Grade) -> Milliseconds {
        match grade {
            Grade::Perfect => self.perfect,
            Grade::Great => self.great,
            Grade::Good => self.good,
            Grade::Ok => self.ok,
            Grade::Meh => self.meh,
            Grade::Miss => f64::INFINITY,
        }
    }

    /// Windows in grade order, including the miss window last.
    pub fn as_array(&self) -> [Milliseconds; 6] {
        [
            self.perfect,
            self.great,
            self.good,
            self.ok,
            self.meh,
            self.miss,
        ]
    }

    /// True when every window is finite, non-negative and never shrinks
    /// towards looser grades. Zero-width and equal windows are allowed.
    pub fn is_well_formed(&self) -> bool {
        let w = self.as_array();
        w.iter().all(|v| v.is_finite() && *v >= 0.0) && w.windows(2).all(|p| p[0] <= p[1])
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PlayChart {
    pub meta: Metadata,
    pub columns: u8,
    #[serde(default)]
    pub overall_difficulty: Option<f64>,
    #[serde(default)]
    pub hit_windows: Option<HitWindows>,
    pub notes: Vec<Note>,
}

impl PlayChart {
    /// Windows applied to notes that carry none of their own.
    pub fn default_windows(&self) -> HitWindows {
        self.hit_windows.unwrap_or_else(|| {
            HitWindows::from_overall_difficulty(self.overall_difficulty.unwrap_or(0.0))
        })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub artist: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub time_ms: Milliseconds,
    pub col: u8,
    #[serde(flatten)]
    pub kind: NoteKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_windows: Option<HitWindows>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum NoteKind {
    #[serde(rename = "tap")]
    Tap,

    #[serde(rename = "hold")]
    Hold {
        end_time_ms: Milliseconds,
        #[serde(default)]
        tick_times_ms: Vec<Milliseconds>,
    },
}
