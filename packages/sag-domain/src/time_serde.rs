//! Timestamps arrive from retrieval backends either as RFC 3339 strings or as Unix seconds.
//! Both forms are accepted; RFC 3339 is always written back.

pub mod option;

use serde::{Deserialize, Deserializer, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum RawTimestamp {
	Text(String),
	Seconds(i64),
	FractionalSeconds(f64),
}
impl RawTimestamp {
	pub(crate) fn into_datetime(self) -> Result<OffsetDateTime, String> {
		match self {
			Self::Text(raw) => OffsetDateTime::parse(raw.trim(), &Rfc3339)
				.map_err(|err| format!("Invalid RFC 3339 timestamp {raw:?}: {err}")),
			Self::Seconds(secs) => OffsetDateTime::from_unix_timestamp(secs)
				.map_err(|err| format!("Invalid Unix timestamp {secs}: {err}")),
			Self::FractionalSeconds(secs) => {
				let nanos = (secs * 1_000_000_000.0) as i128;

				OffsetDateTime::from_unix_timestamp_nanos(nanos)
					.map_err(|err| format!("Invalid Unix timestamp {secs}: {err}"))
			},
		}
	}
}

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	RawTimestamp::deserialize(deserializer)?.into_datetime().map_err(serde::de::Error::custom)
}
