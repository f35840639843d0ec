use std::str::FromStr;

use derive_more::{AsRef, Display, Into};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::SerializeDisplay;
use thiserror::Error;

/// Numeric id of a level, kept as the digit string found in the dashboard.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, AsRef, Into, Serialize)]
pub struct LevelId(String);

#[derive(PartialEq, Eq, Debug, Error)]
#[error("Level id must be a non-empty run of decimal digits: {0:?}")]
pub struct LevelIdParseError(String);

impl FromStr for LevelId {
    type Err = LevelIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(LevelIdParseError(s.to_owned()))
        }
    }
}

/// Loose truthiness of the dashboard API, where flags arrive as bools, numbers or strings.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A JSON number with an integral value, so `2` and `2.0` are the same tier.
fn integral(n: f64) -> Option<i64> {
    (n.fract() == 0.).then_some(n as i64)
}

fn tier(value: &Value) -> Option<i64> {
    integral(value.as_f64()?)
}

/// Like [`tier`], but also reads numeric strings and booleans the way the dashboard
/// front end does arithmetic on them.
fn coerced_tier(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => integral(n.as_f64()?),
        Value::String(s) => match s.trim() {
            "" => Some(0),
            s => integral(s.parse().ok()?),
        },
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Keeps an explicit `null` apart from an absent key.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

// Response bodies of the dashboard API.
// Pass-through fields are `None` when absent, and absent fields are left out of responses.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RateLookupResponse {
    pub success: Value,
    #[serde(deserialize_with = "present")]
    pub level: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub rates: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct LevelSearchResponse {
    #[serde(default)]
    pub success: Value,
    #[serde(default)]
    pub level: Option<RawLevel>,
}

#[derive(Debug, Deserialize)]
pub struct RawLevel {
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub desc: Option<Value>,
    pub stats: RawStats,
    // Misspelled upstream.
    #[serde(rename = "diffuculty")]
    pub difficulty: RawDifficulty,
    pub author: RawAuthor,
    pub song: RawSong,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawStats {
    pub featured: Value,
    pub epic: Value,
    #[serde(deserialize_with = "present")]
    pub stars: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub likes: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub downloads: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub is_rated: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawDifficulty {
    pub is_demon: Value,
    pub demon_diff: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawAuthor {
    #[serde(deserialize_with = "present")]
    pub username: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSong {
    #[serde(deserialize_with = "present")]
    pub name: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub author: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub download: Option<Value>,
}

// Normalized values.

/// The latest "Rated a level" entry of the moderation log, joined with the rate lookup.
#[derive(Clone, Debug)]
pub struct ModerationEvent {
    pub level: Option<Value>,
    pub level_id: LevelId,
    pub rates: Option<Value>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, strum::Display, SerializeDisplay)]
pub enum Rating {
    #[strum(serialize = "Normal Rated")]
    Normal,
    #[strum(serialize = "Featured Rated")]
    Featured,
}
impl Rating {
    pub fn from_featured(featured: &Value) -> Self {
        if is_truthy(featured) {
            Self::Featured
        } else {
            Self::Normal
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, strum::Display, SerializeDisplay)]
pub enum EpicRating {
    #[strum(serialize = "Normal Rated")]
    Normal,
    #[strum(serialize = "Epic Rated")]
    Epic,
    #[strum(serialize = "Legendary Rated")]
    Legendary,
    #[strum(serialize = "Mythical Rated")]
    Mythical,
}
impl EpicRating {
    /// Only numbers are tiers; anything else falls back to [`EpicRating::Normal`].
    pub fn from_raw(epic: &Value) -> Self {
        match tier(epic) {
            Some(1) => Self::Epic,
            Some(2) => Self::Legendary,
            Some(3) => Self::Mythical,
            _ => Self::Normal,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, strum::Display, SerializeDisplay)]
pub enum DemonDifficulty {
    #[strum(serialize = "Not Demon")]
    NotDemon,
    #[strum(serialize = "Easy Demon")]
    Easy,
    #[strum(serialize = "Medium Demon")]
    Medium,
    #[strum(serialize = "Hard Demon")]
    Hard,
    #[strum(serialize = "Insane Demon")]
    Insane,
    #[strum(serialize = "Extreme Demon")]
    Extreme,
    #[strum(serialize = "Unknown Demon")]
    Unknown,
}
impl DemonDifficulty {
    pub fn from_raw(difficulty: &RawDifficulty) -> Self {
        if !is_truthy(&difficulty.is_demon) {
            return Self::NotDemon;
        }
        match coerced_tier(&difficulty.demon_diff) {
            Some(1) => Self::Easy,
            Some(2) => Self::Medium,
            Some(3) => Self::Hard,
            Some(4) => Self::Insane,
            Some(5) => Self::Extreme,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_link: Option<Value>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stars: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_rated: Option<Value>,
    pub rating: Rating,
    pub epic_rating: EpicRating,
    pub demon_difficulty: DemonDifficulty,
    pub song: Song,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
}
impl From<RawLevel> for LevelDetails {
    fn from(level: RawLevel) -> Self {
        let RawLevel {
            name,
            desc,
            stats,
            difficulty,
            author,
            song,
        } = level;
        Self {
            name,
            description: desc,
            rating: Rating::from_featured(&stats.featured),
            epic_rating: EpicRating::from_raw(&stats.epic),
            demon_difficulty: DemonDifficulty::from_raw(&difficulty),
            stars: stats.stars,
            likes: stats.likes,
            downloads: stats.downloads,
            is_rated: stats.is_rated,
            song: Song {
                name: song.name,
                author: song.author,
                download_link: song.download,
            },
            author: author.username,
        }
    }
}

/// Body of a successful `/api/newrate` response.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(rename = "levelID")]
    pub level_id: LevelId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stars: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_rated: Option<Value>,
    pub rating: Rating,
    pub epic_rating: EpicRating,
    pub demon_difficulty: DemonDifficulty,
    pub song: Song,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rates: Option<Value>,
}
impl ResponseEnvelope {
    pub fn new(event: ModerationEvent, details: LevelDetails) -> Self {
        Self {
            level_id: event.level_id,
            level_name: details.name,
            description: details.description,
            stars: details.stars,
            likes: details.likes,
            downloads: details.downloads,
            is_rated: details.is_rated,
            rating: details.rating,
            epic_rating: details.epic_rating,
            demon_difficulty: details.demon_difficulty,
            song: details.song,
            author: details.author,
            rates: event.rates,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn difficulty(is_demon: Value, demon_diff: Value) -> RawDifficulty {
        RawDifficulty {
            is_demon,
            demon_diff,
        }
    }

    #[test]
    fn parse_level_id() {
        let id: LevelId = "12345".parse().unwrap();
        assert_eq!(id.as_ref(), "12345");
        assert_eq!(id.to_string(), "12345");
        assert!("".parse::<LevelId>().is_err());
        assert!("12a45".parse::<LevelId>().is_err());
        assert!("-1".parse::<LevelId>().is_err());
        assert!("١٢".parse::<LevelId>().is_err());
    }

    #[test]
    fn truthiness() {
        for value in [json!(true), json!(1), json!(-2.5), json!("0"), json!([]), json!({})] {
            assert!(is_truthy(&value), "{value}");
        }
        for value in [json!(false), json!(0), json!(0.0), json!(""), Value::Null] {
            assert!(!is_truthy(&value), "{value}");
        }
    }

    #[test]
    fn epic_rating_table() {
        assert_eq!(EpicRating::from_raw(&json!(0)), EpicRating::Normal);
        assert_eq!(EpicRating::from_raw(&json!(1)), EpicRating::Epic);
        assert_eq!(EpicRating::from_raw(&json!(2)), EpicRating::Legendary);
        assert_eq!(EpicRating::from_raw(&json!(3)), EpicRating::Mythical);
        assert_eq!(EpicRating::from_raw(&json!(4)), EpicRating::Normal);
        assert_eq!(EpicRating::from_raw(&json!(2.0)), EpicRating::Legendary);
        assert_eq!(EpicRating::from_raw(&json!(3.0)), EpicRating::Mythical);
        assert_eq!(EpicRating::from_raw(&json!(1.5)), EpicRating::Normal);
        assert_eq!(EpicRating::from_raw(&json!(-1)), EpicRating::Normal);
        assert_eq!(EpicRating::from_raw(&json!("2")), EpicRating::Normal);
        assert_eq!(EpicRating::from_raw(&json!(true)), EpicRating::Normal);
        assert_eq!(EpicRating::from_raw(&Value::Null), EpicRating::Normal);
        assert_eq!(EpicRating::Legendary.to_string(), "Legendary Rated");
    }

    #[test]
    fn demon_difficulty_table() {
        let cases = [
            (1, "Easy Demon"),
            (2, "Medium Demon"),
            (3, "Hard Demon"),
            (4, "Insane Demon"),
            (5, "Extreme Demon"),
            (0, "Unknown Demon"),
            (9, "Unknown Demon"),
        ];
        for (tier, label) in cases {
            let d = DemonDifficulty::from_raw(&difficulty(json!(true), json!(tier)));
            assert_eq!(d.to_string(), label);
        }
        let coerced = [
            (json!(5.0), "Extreme Demon"),
            (json!("2"), "Medium Demon"),
            (json!(" 4 "), "Insane Demon"),
            (json!("3.0"), "Hard Demon"),
            (json!(true), "Easy Demon"),
            (json!(2.5), "Unknown Demon"),
            (json!("9"), "Unknown Demon"),
            (json!("hard"), "Unknown Demon"),
            (json!(""), "Unknown Demon"),
            (json!("NaN"), "Unknown Demon"),
            (Value::Null, "Unknown Demon"),
        ];
        for (tier, label) in coerced {
            let d = DemonDifficulty::from_raw(&difficulty(json!(true), tier.clone()));
            assert_eq!(d.to_string(), label, "{tier}");
        }
        assert_eq!(
            DemonDifficulty::from_raw(&difficulty(json!(false), json!(5))),
            DemonDifficulty::NotDemon
        );
        assert_eq!(
            DemonDifficulty::from_raw(&difficulty(json!(1), json!(4))),
            DemonDifficulty::Insane
        );
        assert_eq!(
            DemonDifficulty::from_raw(&RawDifficulty::default()),
            DemonDifficulty::NotDemon
        );
    }

    #[test]
    fn rating_from_featured() {
        assert_eq!(Rating::from_featured(&json!(1)), Rating::Featured);
        assert_eq!(Rating::from_featured(&json!(true)), Rating::Featured);
        assert_eq!(Rating::from_featured(&json!(0)), Rating::Normal);
        assert_eq!(Rating::from_featured(&Value::Null), Rating::Normal);
    }

    #[test]
    fn decode_and_normalize_level() {
        let body = json!({
            "success": true,
            "level": {
                "name": "Bloodbath",
                "desc": "Whose blood will be spilt",
                "stats": {
                    "featured": 1,
                    "epic": 2,
                    "stars": 10,
                    "likes": 420,
                    "downloads": 9001,
                    "isRated": true
                },
                "diffuculty": { "isDemon": true, "demonDiff": 5 },
                "author": { "username": "Riot" },
                "song": { "name": "At the Speed of Light", "author": "Dimrain47", "download": "https://example.com/467339.mp3" }
            }
        });
        let response: LevelSearchResponse = serde_json::from_value(body).unwrap();
        assert!(is_truthy(&response.success));
        let details = LevelDetails::from(response.level.unwrap());
        assert_eq!(details.rating, Rating::Featured);
        assert_eq!(details.epic_rating, EpicRating::Legendary);
        assert_eq!(details.demon_difficulty, DemonDifficulty::Extreme);

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(
            json,
            json!({
                "name": "Bloodbath",
                "description": "Whose blood will be spilt",
                "stars": 10,
                "likes": 420,
                "downloads": 9001,
                "isRated": true,
                "rating": "Featured Rated",
                "epicRating": "Legendary Rated",
                "demonDifficulty": "Extreme Demon",
                "song": {
                    "name": "At the Speed of Light",
                    "author": "Dimrain47",
                    "downloadLink": "https://example.com/467339.mp3"
                },
                "author": "Riot"
            })
        );
    }

    #[test]
    fn level_without_nested_objects_is_rejected() {
        let body = json!({ "success": true, "level": { "name": "x", "stats": {} } });
        assert!(serde_json::from_value::<LevelSearchResponse>(body).is_err());
    }

    #[test]
    fn absent_leaf_fields_are_omitted() {
        let body = json!({
            "success": true,
            "level": {
                "name": "Untitled",
                "stats": { "stars": null },
                "diffuculty": {},
                "author": {},
                "song": { "name": "Unknown" }
            }
        });
        let response: LevelSearchResponse = serde_json::from_value(body).unwrap();
        let details = LevelDetails::from(response.level.unwrap());
        assert_eq!(details.stars, Some(Value::Null));
        assert_eq!(details.likes, None);
        assert_eq!(details.author, None);
        assert_eq!(details.demon_difficulty, DemonDifficulty::NotDemon);
        assert_eq!(
            serde_json::to_value(&details).unwrap(),
            json!({
                "name": "Untitled",
                "stars": null,
                "rating": "Normal Rated",
                "epicRating": "Normal Rated",
                "demonDifficulty": "Not Demon",
                "song": { "name": "Unknown" }
            })
        );
    }

    #[test]
    fn rate_lookup_body() {
        let response: RateLookupResponse =
            serde_json::from_value(json!({ "success": true, "level": null })).unwrap();
        assert_eq!(response.level, Some(Value::Null));
        assert_eq!(response.rates, None);
        let response: RateLookupResponse = serde_json::from_value(json!({})).unwrap();
        assert!(!is_truthy(&response.success));
    }

    fn stereo_madness() -> LevelDetails {
        LevelDetails {
            name: Some(json!("Stereo Madness")),
            description: Some(json!("")),
            stars: Some(json!(2)),
            likes: Some(json!(1)),
            downloads: Some(json!(3)),
            is_rated: Some(json!(1)),
            rating: Rating::Normal,
            epic_rating: EpicRating::Normal,
            demon_difficulty: DemonDifficulty::NotDemon,
            song: Song {
                name: Some(json!("Stereo Madness")),
                author: Some(json!("ForeverBound")),
                download_link: Some(Value::Null),
            },
            author: Some(json!("RobTop")),
        }
    }

    #[test]
    fn envelope_keys() {
        let event = ModerationEvent {
            level: Some(json!({ "levelID": 500 })),
            level_id: "500".parse().unwrap(),
            rates: Some(json!([{ "mod": "RobTop", "stars": 2 }])),
        };
        let json = serde_json::to_value(ResponseEnvelope::new(event, stereo_madness())).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        let mut expected = vec![
            "levelID",
            "levelName",
            "description",
            "stars",
            "likes",
            "downloads",
            "isRated",
            "rating",
            "epicRating",
            "demonDifficulty",
            "song",
            "author",
            "rates",
        ];
        expected.sort();
        assert_eq!(keys, expected);
        assert_eq!(json["levelID"], json!("500"));
        assert_eq!(json["rates"], json!([{ "mod": "RobTop", "stars": 2 }]));
        assert_eq!(json["song"]["downloadLink"], Value::Null);
    }

    #[test]
    fn envelope_without_rates() {
        let event = ModerationEvent {
            level: None,
            level_id: "500".parse().unwrap(),
            rates: None,
        };
        let json = serde_json::to_value(ResponseEnvelope::new(event, stereo_madness())).unwrap();
        assert!(json.get("rates").is_none());
        assert_eq!(json["levelName"], json!("Stereo Madness"));
    }
}
