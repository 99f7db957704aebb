//! Last week's top scores, shown under the announcement when available.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreLine {
    pub player: String,
    pub score: u64,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRecord {
    pub game_id: String,
    pub game_title: String,
    pub top_scores: Vec<ScoreLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScore {
    #[serde(rename = "userId", default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default, deserialize_with = "loose_score")]
    pub score: i64,
}

// scores arrive as integers, floats (`1200.0`) or occasionally strings; anything else is 0
fn loose_score<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Deserialize)]
struct LeaderboardReply {
    #[serde(default)]
    result: Option<LeaderboardResult>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardResult {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    scores: Vec<RawScore>,
}

/// Best score per player, highest first, re-ranked from 1.
///
/// Players keep the position of their first appearance, and the sort is stable, so equal
/// scores stay in response order.
pub fn rank_top_scores(scores: Vec<RawScore>, top_count: usize) -> Vec<ScoreLine> {
    let mut best: Vec<(String, i64)> = Vec::new();
    let mut seen: HashMap<Option<String>, usize> = HashMap::new();
    for raw in scores {
        let key = raw.user_id.as_ref().map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let player = raw.player.unwrap_or_else(|| "Joueur Inconnu".to_string());
        match seen.get(&key) {
            Some(&i) => {
                if raw.score > best[i].1 {
                    best[i] = (player, raw.score);
                }
            }
            None => {
                seen.insert(key, best.len());
                best.push((player, raw.score));
            }
        }
    }
    best.sort_by(|a, b| b.1.cmp(&a.1));
    best.into_iter()
        .take(top_count)
        .enumerate()
        .map(|(i, (player, score))| ScoreLine {
            player,
            score: score.max(0) as u64,
            rank: i as u32 + 1,
        })
        .collect()
}

/// Placeholder podium used instead of calling the leaderboard during dry runs.
pub fn sample_scores(top_count: usize) -> Vec<ScoreLine> {
    [("Joueur Test 1", 50_000), ("Joueur Test 2", 45_000), ("Joueur Test 3", 40_000)]
        .into_iter()
        .take(top_count)
        .enumerate()
        .map(|(i, (player, score))| ScoreLine {
            player: player.to_string(),
            score,
            rank: i as u32 + 1,
        })
        .collect()
}

/// Query the leaderboard for a game. Every failure is logged and yields `None`.
pub async fn fetch_top_scores(
    transport: &dyn Transport,
    api_url: &str,
    game_id: &str,
    top_count: usize,
) -> Option<Vec<ScoreLine>> {
    let payload = json!({ "data": { "timeRange": "all", "gameId": game_id } });
    let reply = match transport.post_json(api_url, &payload).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(game_id, error = %e, "leaderboard unreachable");
            return None;
        }
    };
    if !reply.is_success() {
        warn!(game_id, status = reply.status, "leaderboard returned an error status");
        return None;
    }
    let parsed: LeaderboardReply = match serde_json::from_str(&reply.body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(game_id, error = %e, "leaderboard reply did not parse");
            return None;
        }
    };
    let Some(result) = parsed.result.filter(|r| r.success) else {
        warn!(game_id, "leaderboard reported an unsuccessful lookup");
        return None;
    };
    if result.scores.is_empty() {
        info!(game_id, "no scores recorded yet");
        return None;
    }
    let top = rank_top_scores(result.scores, top_count);
    debug!(game_id, count = top.len(), "fetched top scores");
    Some(top)
}
