use chrono::NaiveDate;

#[derive(Debug, PartialEq, Eq)]
pub enum EngineError {
    UnknownExcursion(String),
    AlreadyRegistered(String),
    NoSuchDay {
        excursion_id: String,
        date: NaiveDate,
    },
    DayClosed {
        date: NaiveDate,
    },
    SoldOut {
        date: NaiveDate,
        requested: u32,
        left: u32,
    },
    Invalid(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownExcursion(id) => write!(f, "unknown excursion: {id}"),
            EngineError::AlreadyRegistered(id) => write!(f, "excursion already registered: {id}"),
            EngineError::NoSuchDay { excursion_id, date } => {
                write!(f, "no capacity record for {excursion_id} on {date}")
            }
            EngineError::DayClosed { date } => write!(f, "day {date} is closed to bookings"),
            EngineError::SoldOut {
                date,
                requested,
                left,
            } => write!(f, "sold out on {date}: {requested} requested, {left} left"),
            EngineError::Invalid(msg) => write!(f, "invalid request: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
