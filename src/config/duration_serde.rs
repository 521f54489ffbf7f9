//! Serde support for human-readable durations in configuration
//!
//! Accepts either a number of seconds or a humantime string (`"30s"`,
//! `"1m30s"`, `"500ms"`); always serializes as a humantime string.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let duration_str = humantime::format_duration(*duration).to_string();
    serializer.serialize_str(&duration_str)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration as seconds (number) or human-readable string (e.g., '30s', '500ms', '1m')")
        }

        fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(seconds))
        }

        // TOML integers arrive as i64
        fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(seconds)
                .map(Duration::from_secs)
                .map_err(|_| de::Error::custom(format!("Duration cannot be negative: {seconds}")))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(value)
                .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super")]
        delay: Duration,
    }

    #[test]
    fn test_deserialize_human_readable() {
        let holder: Holder = toml::from_str(r#"delay = "1m30s""#).unwrap();
        assert_eq!(holder.delay, Duration::from_secs(90));

        let holder: Holder = toml::from_str(r#"delay = "250ms""#).unwrap();
        assert_eq!(holder.delay, Duration::from_millis(250));
    }

    #[test]
    fn test_deserialize_seconds() {
        let holder: Holder = toml::from_str("delay = 30").unwrap();
        assert_eq!(holder.delay, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert!(toml::from_str::<Holder>("delay = -5").is_err());
        assert!(toml::from_str::<Holder>(r#"delay = "soon""#).is_err());
    }

    #[test]
    fn test_serialize_round_trips_through_humantime() {
        let text = toml::to_string(&Holder { delay: Duration::from_secs(10) }).unwrap();
        assert_eq!(text.trim(), r#"delay = "10s""#);
    }
}
