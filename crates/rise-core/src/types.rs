use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label used whenever an alarm has no (or only whitespace) label.
pub const DEFAULT_LABEL: &str = "Alarm";

// =============================================================================
// Enums
// =============================================================================

/// A weekday tag used in an alarm's repeat set.
///
/// Ordering follows the week starting on Sunday, which keeps a serialized
/// `BTreeSet<DayOfWeek>` in calendar order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl DayOfWeek {
    /// Every weekday, Sunday first.
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sun,
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
    ];

    /// Convert from chrono's weekday representation.
    pub fn from_chrono(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Sun => DayOfWeek::Sun,
            chrono::Weekday::Mon => DayOfWeek::Mon,
            chrono::Weekday::Tue => DayOfWeek::Tue,
            chrono::Weekday::Wed => DayOfWeek::Wed,
            chrono::Weekday::Thu => DayOfWeek::Thu,
            chrono::Weekday::Fri => DayOfWeek::Fri,
            chrono::Weekday::Sat => DayOfWeek::Sat,
        }
    }

    /// Convert into chrono's weekday representation.
    pub fn to_chrono(self) -> chrono::Weekday {
        match self {
            DayOfWeek::Sun => chrono::Weekday::Sun,
            DayOfWeek::Mon => chrono::Weekday::Mon,
            DayOfWeek::Tue => chrono::Weekday::Tue,
            DayOfWeek::Wed => chrono::Weekday::Wed,
            DayOfWeek::Thu => chrono::Weekday::Thu,
            DayOfWeek::Fri => chrono::Weekday::Fri,
            DayOfWeek::Sat => chrono::Weekday::Sat,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayOfWeek::Sun => write!(f, "sun"),
            DayOfWeek::Mon => write!(f, "mon"),
            DayOfWeek::Tue => write!(f, "tue"),
            DayOfWeek::Wed => write!(f, "wed"),
            DayOfWeek::Thu => write!(f, "thu"),
            DayOfWeek::Fri => write!(f, "fri"),
            DayOfWeek::Sat => write!(f, "sat"),
        }
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sun" | "sunday" => Ok(DayOfWeek::Sun),
            "mon" | "monday" => Ok(DayOfWeek::Mon),
            "tue" | "tuesday" => Ok(DayOfWeek::Tue),
            "wed" | "wednesday" => Ok(DayOfWeek::Wed),
            "thu" | "thursday" => Ok(DayOfWeek::Thu),
            "fri" | "friday" => Ok(DayOfWeek::Fri),
            "sat" | "saturday" => Ok(DayOfWeek::Sat),
            _ => Err(format!("Unknown weekday: {}", s)),
        }
    }
}

/// Where the sound for an alarm comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSourceType {
    /// User recorded audio.
    Recording,
    /// Generated speech.
    Tts,
    /// Pre-made template from the library.
    Template,
    /// Default system sound.
    #[default]
    Default,
}

/// Voice gender for generated speech.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceGender {
    Male,
    Female,
}

/// Delivery style for generated speech.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceTemperature {
    Calm,
    Neutral,
    Motivating,
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Opaque alarm identifier, assigned once by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(pub Uuid);

impl AlarmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AlarmId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(AlarmId)
            .map_err(|e| format!("Invalid alarm id {}: {}", s, e))
    }
}

/// Milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

// =============================================================================
// Domain Structs
// =============================================================================

/// Voice settings for generated speech.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsVoiceConfig {
    pub gender: VoiceGender,
    pub temperature: VoiceTemperature,
}

/// Reference to the sound an alarm plays. Opaque to scheduling.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSource {
    #[serde(rename = "type")]
    pub kind: AudioSourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts_voice_config: Option<TtsVoiceConfig>,
}

/// A user-defined alarm.
///
/// `hour`/`minute` are a local wall-clock time with no zone attached. An
/// empty `repeat_days` set makes this a one-time alarm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: AlarmId,
    pub hour: u8,
    pub minute: u8,
    pub label: String,
    pub enabled: bool,
    pub repeat_days: BTreeSet<DayOfWeek>,
    pub audio_source: AudioSource,
    pub snooze_enabled: bool,
    pub snooze_duration_minutes: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Alarm {
    /// Build a stored alarm from creation input.
    pub fn from_new(input: NewAlarm, id: AlarmId, now: Timestamp) -> Self {
        Self {
            id,
            hour: input.hour,
            minute: input.minute,
            label: normalize_label(&input.label),
            enabled: input.enabled,
            repeat_days: input.repeat_days,
            audio_source: input.audio_source,
            snooze_enabled: input.snooze_enabled,
            snooze_duration_minutes: input.snooze_duration_minutes,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the alarm has no repeat days.
    pub fn is_one_time(&self) -> bool {
        self.repeat_days.is_empty()
    }

    /// The label shown to the user, never empty.
    pub fn display_label(&self) -> &str {
        let trimmed = self.label.trim();
        if trimmed.is_empty() {
            DEFAULT_LABEL
        } else {
            trimmed
        }
    }

    /// Minutes since local midnight; the sort key for alarm lists.
    pub fn minutes_of_day(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }

    /// Wall-clock time formatted for display, e.g. `7:05 AM`.
    pub fn formatted_time(&self) -> String {
        format_alarm_time(self.hour, self.minute)
    }
}

/// Input for creating an alarm. Id and timestamps are assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewAlarm {
    pub hour: u8,
    pub minute: u8,
    pub label: String,
    pub enabled: bool,
    pub repeat_days: BTreeSet<DayOfWeek>,
    pub audio_source: AudioSource,
    pub snooze_enabled: bool,
    pub snooze_duration_minutes: u32,
}

impl Default for NewAlarm {
    fn default() -> Self {
        Self {
            hour: 7,
            minute: 0,
            label: DEFAULT_LABEL.to_string(),
            enabled: true,
            repeat_days: BTreeSet::new(),
            audio_source: AudioSource::default(),
            snooze_enabled: true,
            snooze_duration_minutes: 5,
        }
    }
}

impl NewAlarm {
    /// Convenience constructor for an enabled alarm at `hour:minute`.
    pub fn at(hour: u8, minute: u8) -> Self {
        Self {
            hour,
            minute,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_repeat_days(mut self, days: impl IntoIterator<Item = DayOfWeek>) -> Self {
        self.repeat_days = days.into_iter().collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Partial update for an existing alarm. `None` fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmPatch {
    pub id: AlarmId,
    #[serde(default)]
    pub hour: Option<u8>,
    #[serde(default)]
    pub minute: Option<u8>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub repeat_days: Option<BTreeSet<DayOfWeek>>,
    #[serde(default)]
    pub audio_source: Option<AudioSource>,
    #[serde(default)]
    pub snooze_enabled: Option<bool>,
    #[serde(default)]
    pub snooze_duration_minutes: Option<u32>,
}

impl AlarmPatch {
    /// An empty patch targeting `id`.
    pub fn new(id: AlarmId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Merge the set fields into `alarm`. Does not touch `updated_at`.
    pub fn apply_to(&self, alarm: &mut Alarm) {
        if let Some(hour) = self.hour {
            alarm.hour = hour;
        }
        if let Some(minute) = self.minute {
            alarm.minute = minute;
        }
        if let Some(ref label) = self.label {
            alarm.label = normalize_label(label);
        }
        if let Some(enabled) = self.enabled {
            alarm.enabled = enabled;
        }
        if let Some(ref days) = self.repeat_days {
            alarm.repeat_days = days.clone();
        }
        if let Some(ref source) = self.audio_source {
            alarm.audio_source = source.clone();
        }
        if let Some(snooze_enabled) = self.snooze_enabled {
            alarm.snooze_enabled = snooze_enabled;
        }
        if let Some(minutes) = self.snooze_duration_minutes {
            alarm.snooze_duration_minutes = minutes;
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Trim a label, substituting [`DEFAULT_LABEL`] when nothing is left.
pub fn normalize_label(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a wall-clock time in 12-hour notation, e.g. `12:00 AM`, `7:05 PM`.
pub fn format_alarm_time(hour: u8, minute: u8) -> String {
    let period = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display_hour, minute, period)
}
