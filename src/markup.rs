//! Export-markup conversion for description text.
//!
//! OggDude descriptions use a bracket markup (`[B]`, `[I]`, `[P]`, dice
//! tags like `[BO]` or `[SUCCESS]`) that the campaign API renders as HTML
//! with inline dice spans. The export data is inconsistent (closing tags
//! are sometimes lowercase openers like `[B]...[b]`, sometimes missing), so
//! the conversion is tolerant of both forms.

use once_cell::sync::Lazy;
use regex::Regex;

// The closing level is not checked against the opening one; export data
// never nests headers, and the lazy match stops at the nearest closer.
static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[H(\d)\](.*?)\[(?:/H|h)\d\]").unwrap());
static BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[B\](.*?)\[(?:/B|/b|b)\]").unwrap());
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[I\](.*?)\[(?:/I|/i|i)\]").unwrap());
static LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[UL\](.*?)\[(?:/UL|ul)\]").unwrap());
static ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[LI\](.*?)\[(?:/LI|li)\]").unwrap());
static LEFTOVER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([A-Z]+)\]").unwrap());

/// Dice/symbol tags and their renderer names, long form before short so
/// `[SETBACK]` is never half-eaten by `[SE]`.
const DICE_TAGS: &[(&str, &str)] = &[
    ("[ABILITY]", "ability"),
    ("[DIFFICULTY]", "difficulty"),
    ("[PROFICIENCY]", "proficiency"),
    ("[CHALLENGE]", "challenge"),
    ("[BOOST]", "boost"),
    ("[SETBACK]", "setback"),
    ("[FORCE]", "force"),
    ("[LIGHTSIDEPOINT]", "light"),
    ("[LIGHTSIDE]", "light"),
    ("[LIGHTPOINT]", "light"),
    ("[DARKSIDEPOINT]", "dark"),
    ("[DARKSIDE]", "dark"),
    ("[DARKPOINT]", "dark"),
    ("[SUCCESS]", "success"),
    ("[ADVANTAGE]", "advantage"),
    ("[FAILURE]", "failure"),
    ("[THREAT]", "threat"),
    ("[TRIUMPH]", "triumph"),
    ("[DESPAIR]", "despair"),
    ("[AB]", "ability"),
    ("[DI]", "difficulty"),
    ("[PR]", "proficiency"),
    ("[CH]", "challenge"),
    ("[BO]", "boost"),
    ("[SE]", "setback"),
    ("[FO]", "force"),
    ("[LI]", "light"),
    ("[DA]", "dark"),
    ("[SU]", "success"),
    ("[AD]", "advantage"),
    ("[FA]", "failure"),
    ("[TH]", "threat"),
    ("[TR]", "triumph"),
    ("[DE]", "despair"),
];

fn dice_span(dice_type: &str) -> String {
    format!(
        "<span class=\"{0}\" data-dice-type=\"{0}\" contenteditable=\"false\"></span>",
        dice_type
    )
}

/// Convert export markup to the HTML the campaign API renders.
///
/// Empty input stays empty. Unknown uppercase tags are left visible in a
/// marker span rather than silently stripped, so data errors in the
/// export surface in the imported record instead of vanishing.
pub fn convert(description: &str) -> String {
    if description.is_empty() {
        return String::new();
    }

    let mut html = description.to_string();

    // The export doubly-escapes a handful of literal HTML tags.
    for (escaped, plain) in [
        ("&lt;b&gt;", "<strong>"),
        ("&lt;/b&gt;", "</strong>"),
        ("&lt;p&gt;", "<p>"),
        ("&lt;/p&gt;", "</p>"),
        ("&lt;ul&gt;", "<ul>"),
        ("&lt;/ul&gt;", "</ul>"),
        ("&lt;li&gt;", "<li>"),
        ("&lt;/li&gt;", "</li>"),
        ("&amp;#", "&#"),
    ] {
        html = html.replace(escaped, plain);
    }

    // A known export typo: lowercase [p]/[/p] means bold, not paragraph.
    html = html.replace("[p]", "[B]").replace("[/p]", "[/B]");

    // Normalize misordered nesting before structural conversion.
    html = html.replace("[B][P]", "[P][B]");
    html = html.replace("[/P][/B]", "[/B][/P]");

    html = HEADER_RE.replace_all(&html, "<h$1>$2</h$1>").into_owned();
    html = LIST_RE.replace_all(&html, "<ul>$1</ul>").into_owned();
    html = ITEM_RE.replace_all(&html, "<li>$1</li>").into_owned();
    html = BOLD_RE.replace_all(&html, "<strong>$1</strong>").into_owned();
    html = ITALIC_RE.replace_all(&html, "<em>$1</em>").into_owned();

    html = html.replace("[P]", "\n<p>");
    html = html.replace("[/P]", "</p>");
    html = html.replace("[BR]", "\n<p>");

    for (tag, dice_type) in DICE_TAGS {
        if html.contains(tag) {
            html = html.replace(tag, &dice_span(dice_type));
        }
    }

    // Whatever bracket tags remain are export data errors; keep them
    // visible so the imported record shows what the source contained.
    LEFTOVER_RE
        .replace_all(&html, "<span class=\"oggdude-tag\">[$1]</span>")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_passthrough() {
        assert_eq!(convert(""), "");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(convert("A sturdy vibro-axe."), "A sturdy vibro-axe.");
    }

    #[test]
    fn test_bold_and_italic() {
        assert_eq!(
            convert("[B]Setback:[/B] add [I]one[/I] die"),
            "<strong>Setback:</strong> add <em>one</em> die"
        );
    }

    #[test]
    fn test_lowercase_closers() {
        // OggDude data frequently closes [B] with [b].
        assert_eq!(convert("[B]Ranked[b]"), "<strong>Ranked</strong>");
        assert_eq!(convert("[I]Ranked[i]"), "<em>Ranked</em>");
    }

    #[test]
    fn test_paragraph_tags() {
        let out = convert("First[P]Second");
        assert_eq!(out, "First\n<p>Second");
    }

    #[test]
    fn test_dice_tags_short_form() {
        let out = convert("Add [BO] to the check");
        assert!(out.contains("data-dice-type=\"boost\""));
        assert!(!out.contains("[BO]"));
    }

    #[test]
    fn test_dice_tags_long_form() {
        let out = convert("Spend [ADVANTAGE] or suffer [THREAT]");
        assert!(out.contains("data-dice-type=\"advantage\""));
        assert!(out.contains("data-dice-type=\"threat\""));
    }

    #[test]
    fn test_long_form_wins_over_short() {
        // [SETBACK] must not decompose into [SE] + "TBACK]".
        let out = convert("[SETBACK]");
        assert_eq!(out.matches("data-dice-type=\"setback\"").count(), 1);
        assert!(!out.contains("TBACK"));
    }

    #[test]
    fn test_headers() {
        assert_eq!(convert("[H3]Special[/H3]"), "<h3>Special</h3>");
        // Improper closer, same output.
        assert_eq!(convert("[H3]Special[h3]"), "<h3>Special</h3>");
    }

    #[test]
    fn test_unknown_tag_kept_visible() {
        let out = convert("does [XYZQ] things");
        assert!(out.contains("<span class=\"oggdude-tag\">[XYZQ]</span>"));
    }

    #[test]
    fn test_bold_typo_p_tag() {
        assert_eq!(convert("[p]Models:[/p]"), "<strong>Models:</strong>");
    }
}
