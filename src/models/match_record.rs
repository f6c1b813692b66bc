use serde::{Deserialize, Serialize};

/// Number of player slots per team
pub const TEAM_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Blue,
    Red,
}

impl Team {
    /// Region name prefix (`blue` / `red`)
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Red => "red",
        }
    }
}

/// One scoreboard row. Numeric fields hold non-negative integers as strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerStats {
    pub name: String,
    pub team: Team,
    pub e: String,
    pub a: String,
    pub d: String,
    pub dmg: String,
    pub h: String,
    pub mit: String,
    pub hero: Option<String>,
}

impl PlayerStats {
    /// Empty slot: blank name, zeroed stats
    pub fn empty(team: Team) -> Self {
        Self {
            name: String::new(),
            team,
            e: "0".to_string(),
            a: "0".to_string(),
            d: "0".to_string(),
            dmg: "0".to_string(),
            h: "0".to_string(),
            mit: "0".to_string(),
            hero: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FinalScore {
    pub blue: String,
    pub red: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    /// `VICTORY`, `DEFEAT`, blank, or whatever the banner said, uppercased
    pub result: String,
    pub final_score: FinalScore,
    pub date: String,
    pub game_mode: String,
    pub map: String,
    pub game_length: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Blue slots 1-5 followed by red slots 1-5
    pub players: Vec<PlayerStats>,
    pub match_info: MatchInfo,
}

impl MatchRecord {
    pub fn team(&self, team: Team) -> impl Iterator<Item = &PlayerStats> {
        self.players.iter().filter(move |p| p.team == team)
    }
}
