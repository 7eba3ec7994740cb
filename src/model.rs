use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, Weekday};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::limits::LIMITED_SPOTS_THRESHOLD;

/// Excursion display name. Content arrives either as a plain string or as a
/// `{en, fr, es, it}` object; both shapes decode into one tagged union with an
/// explicit resolution function instead of runtime type sniffing.
///
/// JSON keeps the original wire shape (untagged). The WAL encoding is a fixed
/// five-field record so bincode can round-trip it without self-description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalizedText {
    Plain(String),
    Localized {
        en: Option<String>,
        fr: Option<String>,
        es: Option<String>,
        it: Option<String>,
    },
}

impl LocalizedText {
    /// Resolve to the requested language, falling back en → first non-empty.
    pub fn resolve(&self, lang: &str) -> Option<&str> {
        match self {
            Self::Plain(t) => Some(t.as_str()),
            Self::Localized { en, fr, es, it } => {
                let preferred = match lang {
                    "fr" => fr,
                    "es" => es,
                    "it" => it,
                    _ => en,
                };
                preferred
                    .as_deref()
                    .or(en.as_deref())
                    .or(fr.as_deref())
                    .or(es.as_deref())
                    .or(it.as_deref())
            }
        }
    }

    /// All texts carried by this value, for length validation.
    pub fn texts(&self) -> Vec<&str> {
        match self {
            Self::Plain(t) => vec![t.as_str()],
            Self::Localized { en, fr, es, it } => [en, fr, es, it]
                .into_iter()
                .filter_map(|v| v.as_deref())
                .collect(),
        }
    }
}

/// Binary (WAL) representation: `plain` set means the Plain variant.
#[derive(Serialize, Deserialize)]
struct PackedText {
    plain: Option<String>,
    en: Option<String>,
    fr: Option<String>,
    es: Option<String>,
    it: Option<String>,
}

impl Serialize for LocalizedText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            match self {
                Self::Plain(t) => serializer.serialize_str(t),
                Self::Localized { en, fr, es, it } => {
                    let mut map = serializer.serialize_map(None)?;
                    for (key, value) in [("en", en), ("fr", fr), ("es", es), ("it", it)] {
                        if let Some(v) = value {
                            map.serialize_entry(key, v)?;
                        }
                    }
                    map.end()
                }
            }
        } else {
            let packed = match self {
                Self::Plain(t) => PackedText {
                    plain: Some(t.clone()),
                    en: None,
                    fr: None,
                    es: None,
                    it: None,
                },
                Self::Localized { en, fr, es, it } => PackedText {
                    plain: None,
                    en: en.clone(),
                    fr: fr.clone(),
                    es: es.clone(),
                    it: it.clone(),
                },
            };
            packed.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for LocalizedText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            struct TextVisitor;

            impl<'de> Visitor<'de> for TextVisitor {
                type Value = LocalizedText;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a string or an object of language codes")
                }

                fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                    Ok(LocalizedText::Plain(v.to_owned()))
                }

                fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                    let (mut en, mut fr, mut es, mut it) = (None, None, None, None);
                    while let Some((key, value)) = map.next_entry::<String, Option<String>>()? {
                        match key.as_str() {
                            "en" => en = value,
                            "fr" => fr = value,
                            "es" => es = value,
                            "it" => it = value,
                            _ => {}
                        }
                    }
                    Ok(LocalizedText::Localized { en, fr, es, it })
                }
            }

            deserializer.deserialize_any(TextVisitor)
        } else {
            let packed = PackedText::deserialize(deserializer)?;
            Ok(match packed.plain {
                Some(t) => Self::Plain(t),
                None => Self::Localized {
                    en: packed.en,
                    fr: packed.fr,
                    es: packed.es,
                    it: packed.it,
                },
            })
        }
    }
}

/// Which weekdays an excursion runs. The wire format is a list of English
/// weekday names; an empty list or the sentinel `"everyday"` means no
/// restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub enum DaySelection {
    Everyday,
    Days(Vec<Weekday>),
}

impl Default for DaySelection {
    fn default() -> Self {
        Self::Everyday
    }
}

impl DaySelection {
    pub fn allows(&self, day: Weekday) -> bool {
        match self {
            Self::Everyday => true,
            Self::Days(days) => days.contains(&day),
        }
    }
}

impl TryFrom<Vec<String>> for DaySelection {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        if names.is_empty() {
            return Ok(Self::Everyday);
        }
        let mut days: Vec<Weekday> = Vec::new();
        for name in &names {
            let lower = name.trim().to_ascii_lowercase();
            if lower == "everyday" {
                return Ok(Self::Everyday);
            }
            let day: Weekday = lower
                .parse()
                .map_err(|_| format!("unknown weekday: {name}"))?;
            if !days.contains(&day) {
                days.push(day);
            }
        }
        Ok(Self::Days(days))
    }
}

impl From<DaySelection> for Vec<String> {
    fn from(sel: DaySelection) -> Self {
        match sel {
            DaySelection::Everyday => vec!["everyday".to_string()],
            DaySelection::Days(days) => {
                days.iter().map(|d| weekday_name(*d).to_string()).collect()
            }
        }
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Departure window, kept as the `HH:MM` strings the content store uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
}

/// Per-excursion configuration feeding the rule evaluator. An excursion with
/// no registered configuration has no day or slot restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcursionConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<LocalizedText>,
    #[serde(default)]
    pub available_days: DaySelection,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
}

/// Capacity counters for one (excursion, date) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityRecord {
    pub max_capacity: u32,
    pub booked: u32,
    pub is_available: bool,
}

impl CapacityRecord {
    pub fn new(max_capacity: u32, is_available: bool) -> Self {
        Self {
            max_capacity,
            booked: 0,
            is_available,
        }
    }

    /// Remaining seats. Negative when overbooked (e.g. the ceiling was lowered
    /// below the booked count after the fact).
    pub fn spots(&self) -> i64 {
        i64::from(self.max_capacity) - i64::from(self.booked)
    }

    /// Status is a function of remaining seats only — the availability flag
    /// and day rules gate `can_book`, not the status shown to the UI.
    pub fn status(&self) -> AvailabilityStatus {
        let spots = self.spots();
        if spots <= 0 {
            AvailabilityStatus::Full
        } else if spots <= LIMITED_SPOTS_THRESHOLD {
            AvailabilityStatus::Limited
        } else {
            AvailabilityStatus::Available
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    Available,
    Limited,
    Full,
}

/// Per-excursion capacity ledger, ordered by date for range scans.
#[derive(Debug, Clone)]
pub struct DayBook {
    pub excursion_id: String,
    pub days: BTreeMap<NaiveDate, CapacityRecord>,
}

impl DayBook {
    pub fn new(excursion_id: String) -> Self {
        Self {
            excursion_id,
            days: BTreeMap::new(),
        }
    }

    pub fn record(&self, date: NaiveDate) -> Option<CapacityRecord> {
        self.days.get(&date).copied()
    }

    pub fn in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = (&NaiveDate, &CapacityRecord)> {
        self.days.range(start..=end)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ExcursionRegistered {
        id: String,
        name: Option<LocalizedText>,
        available_days: DaySelection,
        time_slots: Vec<TimeSlot>,
    },
    ExcursionUpdated {
        id: String,
        name: Option<LocalizedText>,
        available_days: DaySelection,
        time_slots: Vec<TimeSlot>,
    },
    ExcursionRemoved {
        id: String,
    },
    CapacityOpened {
        excursion_id: String,
        date: NaiveDate,
        max_capacity: u32,
        is_available: bool,
    },
    CapacityUpdated {
        excursion_id: String,
        date: NaiveDate,
        max_capacity: u32,
        is_available: bool,
    },
    SeatsReserved {
        excursion_id: String,
        date: NaiveDate,
        seats: u32,
    },
    SeatsReleased {
        excursion_id: String,
        date: NaiveDate,
        seats: u32,
    },
}

impl Event {
    /// The excursion a day-level event belongs to. None for registry events,
    /// which are handled at the map level.
    pub fn excursion_id(&self) -> Option<&str> {
        match self {
            Event::CapacityOpened { excursion_id, .. }
            | Event::CapacityUpdated { excursion_id, .. }
            | Event::SeatsReserved { excursion_id, .. }
            | Event::SeatsReleased { excursion_id, .. } => Some(excursion_id),
            Event::ExcursionRegistered { .. }
            | Event::ExcursionUpdated { .. }
            | Event::ExcursionRemoved { .. } => None,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// The can-book decision the checkout flow consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityDecision {
    pub can_book: bool,
    /// None means no capacity record exists — unlimited.
    pub available_spots: Option<i64>,
    pub availability_status: AvailabilityStatus,
    pub has_capacity_limit: bool,
}

/// One row of a day report or bulk-open response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: NaiveDate,
    pub max_capacity: u32,
    pub booked: u32,
    pub available_spots: i64,
    pub is_available: bool,
    pub status: AvailabilityStatus,
}

impl DayRecord {
    pub fn new(date: NaiveDate, record: &CapacityRecord) -> Self {
        Self {
            date,
            max_capacity: record.max_capacity,
            booked: record.booked,
            available_spots: record.spots(),
            is_available: record.is_available,
            status: record.status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub created: u32,
    pub skipped: u32,
    pub records: Vec<DayRecord>,
}
