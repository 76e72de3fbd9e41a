use crate::model::stats::{PlayerStats, StatField};
use crate::search::Searchable;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A player profile as extracted from one page, before it is stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_name: String,

    /// File name of the headshot, without the directory part
    pub player_image: Option<String>,

    /// Comma-separated positions played, empty when unknown
    pub position: String,

    pub first_nba_season: Option<i32>,

    #[serde(flatten)]
    pub stats: PlayerStats,
}

impl PlayerRecord {
    pub fn named(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            ..Self::default()
        }
    }
}

/// A stored player row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,

    #[serde(flatten)]
    pub record: PlayerRecord,
}

impl Player {
    /// JSON view with the shooting numbers grouped under `shooting`
    pub fn to_json(&self) -> Value {
        let mut shooting = Map::new();
        let mut data = Map::new();

        data.insert("id".into(), json!(self.id));
        data.insert("player_name".into(), json!(self.record.player_name));
        data.insert("player_image".into(), json!(self.record.player_image));
        data.insert("positions".into(), json!(self.record.position));
        data.insert("first_nba_season".into(), json!(self.record.first_nba_season));

        for field in StatField::ALL {
            let value = json!(self.record.stats.get(field));
            if field.is_shooting() {
                shooting.insert(field.column().into(), value);
            } else {
                data.insert(field.column().into(), value);
            }
        }

        data.insert("shooting".into(), Value::Object(shooting));
        Value::Object(data)
    }
}

impl Searchable for Player {
    fn search_id(&self) -> i64 {
        self.id
    }

    fn searchable_fields() -> &'static [&'static str] {
        &["player_name", "position"]
    }

    fn field_value(&self, field: &str) -> Value {
        match field {
            "player_name" => json!(self.record.player_name),
            "position" => json!(self.record.position),
            _ => Value::Null,
        }
    }
}

/// Headshot found on a player page, matched to a stored row by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerImage {
    pub player_name: String,
    pub file_name: String,
}
