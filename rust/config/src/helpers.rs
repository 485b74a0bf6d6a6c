use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

pub fn deserialize_duration_from_seconds<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs: u64 = Deserialize::deserialize(d)?;
    Ok(Duration::from_secs(secs))
}

pub fn serialize_duration_to_seconds<S>(duration: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs().serialize(s)
}

pub fn deserialize_duration_from_millis<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis: u64 = Deserialize::deserialize(d)?;
    Ok(Duration::from_millis(millis))
}

pub fn serialize_duration_to_millis<S>(duration: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    // Saturates for durations that do not fit in u64 milliseconds.
    u64::try_from(duration.as_millis())
        .unwrap_or(u64::MAX)
        .serialize(s)
}
