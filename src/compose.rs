//! Renders a validated record into the email body and the chat message template.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::LinkSettings;
use crate::content::ValidatedRecord;
use crate::error::{DispatchError, Result};
use crate::highlight::HighlightRecord;

const JOYSTICK: &str = "🕹️";
const RED_DOT: &str = "🔴";
const KEYCAP_DIGITS: [&str; 10] = ["0️⃣", "1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣"];

/// Placeholder replaced by each chat channel's bold marker.
pub const BOLD_TOKEN: &str = "{b}";

/// Compress control instructions to their leading glyphs.
///
/// Two or more joystick lines collapse to `🕹️🕹️`. Otherwise each non-blank line contributes
/// its first whitespace-delimited token, with keycap digits shown as a red dot.
pub fn summarize_controls<S: AsRef<str>>(controls: &[S]) -> String {
    let joysticks = controls
        .iter()
        .filter(|line| line.as_ref().trim().starts_with(JOYSTICK))
        .count();
    if joysticks >= 2 {
        return format!("{JOYSTICK}{JOYSTICK}");
    }
    controls
        .iter()
        .filter_map(|line| line.as_ref().split_whitespace().next())
        .map(|first| if KEYCAP_DIGITS.contains(&first) { RED_DOT } else { first })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title with every parenthetical segment removed, e.g. `Galaxian (Namco)` -> `Galaxian`.
pub fn clean_title(title: &str) -> String {
    static PARENTHETICAL: OnceLock<Regex> = OnceLock::new();
    let re = PARENTHETICAL.get_or_init(|| Regex::new(r"\s*\([^)]*\)").unwrap());
    re.replace_all(title, "").trim().to_string()
}

pub fn medal(rank: u32) -> Option<&'static str> {
    match rank {
        1 => Some("🥇"),
        2 => Some("🥈"),
        3 => Some("🥉"),
        _ => None,
    }
}

/// `50000` -> `50,000`
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn score_label(rank: u32, player: &str) -> String {
    match medal(rank) {
        Some(glyph) => format!("{glyph} {player}"),
        None => format!("{rank}. {player}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub description: String,
    pub html: String,
}

/// One chat message with [`BOLD_TOKEN`] wherever bold text starts or ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTemplate(String);

impl ChatTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn render(&self, bold: &str) -> String {
        self.0.replace(BOLD_TOKEN, bold)
    }

    pub fn raw(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub game_id: String,
    pub email: EmailContent,
    pub chat: ChatTemplate,
}

/// Build both renderings. Fails when the announcement is blank once the override is applied.
pub fn compose(
    record: &ValidatedRecord,
    highlight: Option<&HighlightRecord>,
    message_override: Option<&str>,
    links: &LinkSettings,
) -> Result<Composition> {
    let announcement = record
        .effective_announcement(message_override)
        .ok_or_else(|| DispatchError::EmptyAnnouncement {
            game_id: record.game_id.clone(),
            path: record.source.clone(),
        })?;
    let controls = summarize_controls(record.controls.as_slice());
    let urls = Urls {
        cover: links.cover_url(&record.game_id),
        play: links.play_url(&record.game_id),
        leaderboard: links.leaderboard_url(&record.game_id),
    };
    let clean = clean_title(&record.title);

    let email = EmailContent {
        subject: format!("🕹️ Jeu de la semaine - {}", record.title),
        description: clean.clone(),
        html: email_html(record, &clean, &announcement, &controls, &urls, highlight),
    };
    let chat = ChatTemplate::new(chat_text(record, &announcement, &controls, &urls, highlight));
    Ok(Composition {
        game_id: record.game_id.clone(),
        email,
        chat,
    })
}

struct Urls {
    cover: String,
    play: String,
    leaderboard: String,
}

fn chat_text(
    record: &ValidatedRecord,
    announcement: &str,
    controls: &str,
    urls: &Urls,
    highlight: Option<&HighlightRecord>,
) -> String {
    let b = BOLD_TOKEN;
    let mut text = format!(
        "Annonce du jeu de la semaine!\n\
         {announcement}\n\n\
         {b}Jeu de la semaine :{b} {title}\n\
         {b}Développeur :{b} {developer}\n\
         {b}Année :{b} {year}\n\
         {b}Genre :{b} {genre}\n\
         {b}Contrôles :{b} {controls}\n\
         {b}Image :{b} {cover}\n\
         {b}Classements :{b} {leaderboard}\n\n\
         🕹️ {b}Faites-en l'essai :{b} {play}\n",
        title = record.title,
        developer = record.developer,
        year = record.year,
        genre = record.genre,
        cover = urls.cover,
        leaderboard = urls.leaderboard,
        play = urls.play,
    );
    if let Some(h) = highlight.filter(|h| !h.top_scores.is_empty()) {
        text.push_str(&format!(
            "\nTop scores de la semaine dernière sur {} :\n",
            h.game_title
        ));
        for line in &h.top_scores {
            text.push_str(&format!(
                "{}: {} points\n",
                score_label(line.rank, &line.player),
                thousands(line.score)
            ));
        }
    }
    text.push_str("\nBonne semaine ! ☀️");
    text
}

fn email_html(
    record: &ValidatedRecord,
    clean: &str,
    announcement: &str,
    controls: &str,
    urls: &Urls,
    highlight: Option<&HighlightRecord>,
) -> String {
    let clean = escape_html(clean);
    let scores = highlight
        .filter(|h| !h.top_scores.is_empty())
        .map(|h| {
            let items: String = h
                .top_scores
                .iter()
                .map(|line| {
                    format!(
                        "<li style=\"margin:8px 0;\"><strong>{}</strong>: {} points</li>",
                        escape_html(&score_label(line.rank, &line.player)),
                        thousands(line.score)
                    )
                })
                .collect();
            format!(
                r#"<div style="background:#f8f9fa;border-left:4px solid #007bff;padding:16px;margin:18px 0;border-radius:4px;">
<h3 style="margin:0 0 12px 0;color:#007bff;">🏆 Top scores de la semaine dernière sur {title}</h3>
<ul style="margin:0;padding-left:20px;font-size:1.1em;">{items}</ul>
</div>"#,
                title = escape_html(&h.game_title),
            )
        })
        .unwrap_or_default();

    // the announcement is authored HTML-safe text and may carry inline markup
    format!(
        r#"<html><body>
<h1 style="color:#333;text-align:center;margin-bottom:30px;">🎮 Annonce du jeu de la semaine!</h1>
<div style="background:#f0f8ff;border:2px solid #007bff;border-radius:8px;padding:20px;margin:20px 0;">
<h2 style="color:#007bff;margin-top:0;">🎯 Jeu de la semaine : {clean}</h2>
<div style="margin-bottom:20px;font-size:1.1em;line-height:1.6;">{announcement}</div>
<div style="display:flex;flex-direction:row;gap:20px;align-items:flex-start;">
<div style="flex:1;min-width:0;">
<ul style="margin:0;padding-left:20px;font-size:1.1em;">
<li><b>Développeur :</b> {developer}</li>
<li><b>Année :</b> {year}</li>
<li><b>Genre :</b> {genre}</li>
<li><b>Contrôles :</b> {controls}</li>
</ul>
</div>
<div style="flex:1;min-width:0;text-align:center;">
<img src="{cover}" alt="Cover de {clean}" style="max-width:100%;height:auto;border-radius:8px;" />
</div>
</div>
</div>
<div style="text-align:center;margin:30px 0;">
<a href="{play}" style="background:#007bff;color:white;padding:15px 30px;text-decoration:none;border-radius:5px;font-size:18px;font-weight:bold;margin-right:15px;display:inline-block;">🎮 Jouer maintenant !</a>
<a href="{leaderboard}" style="background:#ffc107;color:#212529;padding:15px 30px;text-decoration:none;border-radius:5px;font-size:18px;font-weight:bold;display:inline-block;">🏆 Classements</a>
</div>
{scores}
<p style="text-align:center;color:#666;font-style:italic;">Bonne semaine ! ☀️</p>
</body></html>"#,
        developer = escape_html(&record.developer),
        year = escape_html(&record.year),
        genre = escape_html(&record.genre),
        controls = escape_html(controls),
        cover = urls.cover,
        play = urls.play,
        leaderboard = urls.leaderboard,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::ScoreLine;
    use std::path::PathBuf;

    fn record() -> ValidatedRecord {
        ValidatedRecord {
            game_id: "galaxian".into(),
            source: PathBuf::from("public/games/galaxian/metadata.yaml"),
            title: "Galaxian (Namco)".into(),
            developer: "Namco".into(),
            year: "1979".into(),
            genre: "Shoot'em up".into(),
            controls: vec!["🕹️ move".into(), "1️⃣ shoot".into()],
            to_start: "Press Start".into(),
            announcement_message: Some("Jouez à Galaxian!".into()),
        }
    }

    fn highlight() -> HighlightRecord {
        let line = |player: &str, score, rank| ScoreLine {
            player: player.into(),
            score,
            rank,
        };
        HighlightRecord {
            game_id: "frogger".into(),
            game_title: "Frogger".into(),
            top_scores: vec![line("Bea", 50_000, 1), line("<Ada>", 1_234, 2), line("Cy", 7, 4)],
        }
    }

    #[test]
    fn joystick_pairs_collapse() {
        assert_eq!(summarize_controls(&["🕹️ left/right", "🕹️ up/down"]), "🕹️🕹️");
    }

    #[test]
    fn keycaps_become_red_dots() {
        assert_eq!(summarize_controls(&["1️⃣ jump", "🔴 shoot"]), "🔴 🔴");
        assert_eq!(summarize_controls(&["🕹️ move", "  ", "0️⃣ coin", "⏸️ pause"]), "🕹️ 🔴 ⏸️");
        assert_eq!(summarize_controls::<&str>(&[]), "");
    }

    #[test]
    fn titles_lose_parentheticals() {
        assert_eq!(clean_title("Galaxian (Namco)"), "Galaxian");
        assert_eq!(clean_title("Street Fighter II (World 910522) (Capcom)"), "Street Fighter II");
        assert_eq!(clean_title("Frogger"), "Frogger");
    }

    #[test]
    fn medals_only_for_the_podium() {
        assert_eq!(medal(1), Some("🥇"));
        assert_eq!(medal(3), Some("🥉"));
        assert_eq!(medal(4), None);
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(50_000), "50,000");
        assert_eq!(thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn email_and_chat_share_the_content() {
        let links = LinkSettings::default();
        let c = compose(&record(), Some(&highlight()), None, &links).unwrap();
        assert_eq!(c.email.subject, "🕹️ Jeu de la semaine - Galaxian (Namco)");
        assert_eq!(c.email.description, "Galaxian");
        assert!(c.email.html.contains("Jouez à Galaxian!"));
        assert!(c.email.html.contains("<li><b>Contrôles :</b> 🕹️ 🔴</li>"));
        assert!(c.email.html.contains("🥇 Bea</strong>: 50,000 points"));
        assert!(c.email.html.contains("&lt;Ada&gt;"));
        assert!(c.email.html.contains(&links.play_url("galaxian")));

        let discord = c.chat.render("**");
        assert!(discord.starts_with("Annonce du jeu de la semaine!\nJouez à Galaxian!\n"));
        assert!(discord.contains("**Jeu de la semaine :** Galaxian (Namco)"));
        assert!(discord.contains("🥈 <Ada>: 1,234 points"));
        assert!(discord.contains("4. Cy: 7 points"));
        assert!(discord.ends_with("Bonne semaine ! ☀️"));
        let chat = c.chat.render("*");
        assert!(chat.contains("*Genre :* Shoot'em up"));
        assert!(!chat.contains(BOLD_TOKEN));
    }

    #[test]
    fn missing_highlight_leaves_no_block() {
        let c = compose(&record(), None, None, &LinkSettings::default()).unwrap();
        assert!(!c.email.html.contains("Top scores"));
        assert!(!c.chat.raw().contains("Top scores"));
    }

    #[test]
    fn blank_announcement_stops_composition() {
        let mut r = record();
        r.announcement_message = None;
        let err = compose(&r, None, Some("  "), &LinkSettings::default()).unwrap_err();
        assert!(matches!(err, DispatchError::EmptyAnnouncement { .. }));

        let c = compose(&r, None, Some("Un classique!"), &LinkSettings::default()).unwrap();
        assert!(c.chat.raw().contains("Un classique!"));
    }
}
