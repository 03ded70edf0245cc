//! Serde adapter: `Duration` as (possibly fractional) seconds.
//!
//! Use with `#[serde(with = "crate::config::duration_secs")]`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
}

/// Same encoding for `Option<Duration>`; `null` is `None`.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Timeouts {
        #[serde(with = "super")]
        total: Duration,
        #[serde(with = "super::option")]
        idle: Option<Duration>,
    }

    #[test]
    fn fractional_seconds() {
        let t: Timeouts = serde_json::from_str(r#"{"total": 1.5, "idle": null}"#).unwrap();
        assert_eq!(t.total, Duration::from_millis(1500));
        assert_eq!(t.idle, None);
        assert_eq!(
            serde_json::to_string(&t).unwrap(),
            r#"{"total":1.5,"idle":null}"#
        );
    }

    #[test]
    fn negative_is_rejected() {
        assert!(serde_json::from_str::<Timeouts>(r#"{"total": -1, "idle": 3}"#).is_err());
    }
}
