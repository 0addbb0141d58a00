pub mod archive;
pub mod cancellation;
pub mod config;
pub mod conflict;
pub mod mail;
pub mod model;
pub mod provider;
pub mod schedule;
pub mod secrets;
pub mod store;

pub type Timestamp = time::OffsetDateTime;

pub mod timestamp {
    use time::format_description::well_known::Rfc3339;

    pub fn now() -> crate::Timestamp {
        time::OffsetDateTime::now_utc()
    }

    pub fn format(ts: &crate::Timestamp) -> Result<String, time::error::Format> {
        ts.format(&Rfc3339)
    }

    /// Parses an RFC 3339 timestamp. Timestamps without an offset are taken to be UTC.
    pub fn parse(s: &str) -> Result<crate::Timestamp, time::error::Parse> {
        match time::OffsetDateTime::parse(s, &Rfc3339) {
            Ok(ts) => Ok(ts),
            Err(err) => {
                let naive = time::macros::format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second]"
                );
                time::PrimitiveDateTime::parse(s, naive)
                    .map(|ts| ts.assume_utc())
                    .map_err(|_| err)
            }
        }
    }
}

pub const VERSION: Option<&str> = option_env!("PACKRAT_VERSION");
