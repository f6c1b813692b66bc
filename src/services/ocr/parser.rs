use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::match_record::{FinalScore, MatchInfo, MatchRecord, PlayerStats, Team, TEAM_SIZE};

/// Region names for the match metadata lines
pub const RESULT_REGION: &str = "result";
pub const FINAL_SCORE_REGION: &str = "final_score";
pub const DATE_REGION: &str = "date";
pub const GAME_MODE_REGION: &str = "game_mode";
pub const MAP_REGION: &str = "map";
pub const GAME_LENGTH_REGION: &str = "game_length";
/// `MODE | - | MAP` line some scoreboards show instead of separate labels
pub const MATCH_INFO_REGION: &str = "match_info";

/// `blue_player3_dmg`
pub fn player_region_name(team: Team, slot: usize, field: &str) -> String {
    format!("{}_player{}_{}", team.prefix(), slot, field)
}

/// Build a record from the merged region → text map.
/// Total: every combination of present or missing keys gives a full record
/// with exactly five players per team.
pub fn parse_match_record(values: &HashMap<String, String>) -> MatchRecord {
    let mut players = Vec::with_capacity(TEAM_SIZE * 2);
    for team in [Team::Blue, Team::Red] {
        for slot in 1..=TEAM_SIZE {
            players.push(parse_player(values, team, slot));
        }
    }

    MatchRecord {
        players,
        match_info: parse_match_info(values),
    }
}

fn parse_player(values: &HashMap<String, String>, team: Team, slot: usize) -> PlayerStats {
    let raw = |field: &str| values.get(&player_region_name(team, slot, field)).map(String::as_str);
    let stat = |field: &str| parse_numeric(raw(field).unwrap_or(""));

    let hero = raw("hero")
        .map(str::trim)
        .filter(|hero| !hero.is_empty())
        .map(str::to_string);

    PlayerStats {
        name: raw("name").map(str::trim).unwrap_or("").to_string(),
        team,
        e: stat("e"),
        a: stat("a"),
        d: stat("d"),
        dmg: stat("dmg"),
        h: stat("h"),
        mit: stat("mit"),
        hero,
    }
}

fn parse_match_info(values: &HashMap<String, String>) -> MatchInfo {
    let raw = |key: &str| values.get(key).map(String::as_str).unwrap_or("");
    let (info_mode, info_map) = parse_info_line(raw(MATCH_INFO_REGION));

    let game_mode = extract_labeled_value(raw(GAME_MODE_REGION));
    let map = extract_labeled_value(raw(MAP_REGION));

    MatchInfo {
        result: normalize_result(raw(RESULT_REGION)),
        final_score: parse_score(raw(FINAL_SCORE_REGION)),
        date: extract_labeled_value(raw(DATE_REGION)),
        game_mode: if game_mode.is_empty() { info_mode } else { game_mode },
        map: if map.is_empty() { info_map } else { map },
        game_length: extract_labeled_value(raw(GAME_LENGTH_REGION)),
    }
}

/// Parse a stat cell: commas stripped, anything non-numeric becomes "0"
/// Example: "17,542" → "17542"
pub fn parse_numeric(text: &str) -> String {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return "0".to_string();
    }

    let trimmed = cleaned.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Numeric portion of one side of the score, after any label colon
fn score_side(text: &str) -> String {
    let value = match text.split_once(':') {
        Some((_, after)) => after,
        None => text,
    };
    digits_re()
        .find(value)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn digits_re() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").unwrap())
}

/// Parse "SCORE: 3VS2" → blue "3", red "2".
/// No `VS` token yields blank scores on both sides.
pub fn parse_score(text: &str) -> FinalScore {
    let upper = text.to_uppercase();

    match upper.split_once("VS") {
        Some((left, right)) => FinalScore {
            blue: score_side(left),
            red: score_side(right),
        },
        None => FinalScore::default(),
    }
}

/// Canonicalize the result banner: any casing of victory/defeat becomes
/// `VICTORY`/`DEFEAT`, anything else is passed through uppercased
pub fn normalize_result(text: &str) -> String {
    let upper = text.trim().to_uppercase();
    match upper.as_str() {
        "VICTORY" => "VICTORY".to_string(),
        "DEFEAT" => "DEFEAT".to_string(),
        _ => upper,
    }
}

/// Value of a `LABEL: value` line: everything after the first colon, trimmed.
/// Lines without a colon are taken whole.
pub fn extract_labeled_value(text: &str) -> String {
    match text.split_once(':') {
        Some((_, value)) => value.trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Split a `MODE | - | MAP` info line into (mode, map).
/// Missing segments come back empty.
pub fn parse_info_line(text: &str) -> (String, String) {
    if !text.contains('|') {
        return (String::new(), String::new());
    }

    let segments: Vec<&str> = text
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "-")
        .collect();

    let mode = segments.first().map(|s| extract_labeled_value(s)).unwrap_or_default();
    let map = if segments.len() > 1 {
        segments.last().map(|s| extract_labeled_value(s)).unwrap_or_default()
    } else {
        String::new()
    };

    (mode, map)
}
