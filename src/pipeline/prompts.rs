use crate::textutil::normalize_ascii;

pub const DEFAULT_PERSONA: &str = "stoner";
pub const DEFAULT_NOTES_PRESET: &str = "outline";

const PERSONA_RULES: &str = "Keep all proper nouns unchanged. One output line per verse. No extra commentary. Keep info density similar to the source. Do not add or remove facts.";

pub const PERSONA_PRESETS: &[(&str, &str)] = &[
    ("stoner", "You are rewriting each scripture verse in a stoner voice. {rules} Make every line unique. No Repetition. Do not narrate what you are doing. Just do it... and do it with exaggerated tone."),
    ("zoomer", "You are rewriting each scripture verse in a zoomer voice. {rules} Make every line unique. No Repetition. Use tight, internet-native phrasing with occasional slang and lowercasing where natural, but keep names correctly cased. No emojis. No slurs."),
    ("plain", "You are rewriting each scripture verse in plain modern English. {rules} Short, clear sentences. Make every line unique. No Repetition. No emojis. No slurs."),
    ("kid", "You are rewriting each scripture verse for kids. {rules} Use simple words and short, friendly phrases. Make every line unique. No Repetition. No emojis. No slurs."),
    ("headline", "You are rewriting each scripture verse as a news headline. {rules} Compact and punchy; ~12-18 words. Make every line unique. No Repetition. No emojis. No slurs."),
    ("legal", "You are rewriting each scripture verse in the tone of a formal legal brief. {rules} Precise, neutral wording; use whereas/therefore sparingly. Make every line unique. No Repetition. No emojis. No slurs."),
    ("study", "You are rewriting each scripture verse as a concise study note. {rules} Clarify relationships with plain connectors (because, therefore, but). Make every line unique. No Repetition. No emojis. No slurs."),
    ("minimalist", "You are rewriting each scripture verse in a minimalist style. {rules} 15-25 words max; remove filler; keep structure clear. Make every line unique. No Repetition. No emojis. No slurs."),
    ("bard", "You are rewriting each scripture verse in a Shakespeare-like bardic voice. {rules} Use thee/thy/'tis where natural. Make every line unique. No Repetition. No emojis. No slurs."),
    ("pirate", "You are rewriting each scripture verse in a clean pirate voice. {rules} Light nautical slang; no profanity. Make every line unique. No Repetition. No emojis. No slurs."),
    ("noir", "You are rewriting each scripture verse in a noir detective voice. {rules} Short, moody, hardboiled cadence. Make every line unique. No Repetition. No emojis. No slurs."),
    ("stoic", "You are rewriting each scripture verse in a stoic, aphoristic voice. {rules} Calm, terse, disciplined tone. Make every line unique. No Repetition. No emojis. No slurs."),
];

pub const NOTES_SYSTEM_PROMPT: &str = "You are Scripture Buddy, a neutral multi-tradition study assistant. You write clear, reliable notes for passages from any scripture tradition. Avoid dogma; cite cross-references by canonical name when apparent, otherwise suggest likely parallels. Maintain respect across faiths.";

pub const NOTES_PRESETS: &[(&str, &str)] = &[
    ("outline", "Produce concise study notes with the following markdown sections: Summary, Literary Context, Historical/Cultural Context, Cross-References (list key passages with brief phrases), Themes, Key Terms, Application Ideas, Questions for Reflection. Remain non-sectarian and acknowledge uncertainty when relevant."),
    ("exegetical", "Create verse-by-verse exegetical notes. For each reference, give: Translation observations (if any), Key terms, Immediate context, Cross-references, Interpretive options, and a 1-sentence takeaway."),
    ("sermon", "Draft sermon-prep notes: Big Idea, Supporting Movements (2-4), Illustrations/analogies suggestions, Cross-References, Application, Call to Action. Warm, accessible tone."),
    ("youth", "Write youth-friendly notes: Short Summary, What's Happening, Why It Matters, Cross-References, Try This, Discussion Questions (3). Simple language, no slang."),
    ("academic", "Provide academic-style notes with citations where possible: Literary form/genre, Intertextual links, Historical-critical background, Semantic range of key terms (high-level), Interpretive debates, Bibliography suggestions (placeholder if unknown)."),
];

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{k}}}");
        out = out.replace(&pat, v);
    }
    out
}

fn lookup(table: &[(&'static str, &'static str)], name: &str) -> Option<&'static str> {
    let name = name.trim();
    table
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| *v)
}

pub fn persona_preset(name: &str) -> Option<String> {
    lookup(PERSONA_PRESETS, name).map(|t| render_template(t, &[("rules", PERSONA_RULES)]))
}

pub fn persona_names() -> Vec<&'static str> {
    PERSONA_PRESETS.iter().map(|(k, _)| *k).collect()
}

/// Unknown names fall back to the outline preset.
pub fn notes_instructions(preset: &str) -> &'static str {
    lookup(NOTES_PRESETS, preset)
        .or_else(|| lookup(NOTES_PRESETS, DEFAULT_NOTES_PRESET))
        .unwrap_or_default()
}

pub fn expected_prefix(reference: &str) -> String {
    format!("[{reference}]")
}

pub fn build_user_prompt(reference: &str, source_text: &str) -> String {
    format!(
        "Reference: {reference}\nText: \"{}\"",
        normalize_ascii(source_text)
    )
}

pub fn build_notes_prompt(passage: &str, preset: &str) -> String {
    format!(
        "Passage (may contain [Book C:V] markers):\n\n{passage}\n\nInstructions: {}",
        notes_instructions(preset)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_normalizes_source_text() {
        assert_eq!(
            build_user_prompt("Genesis 1:3", "And God said, \u{201C}Let there be light\u{201D}"),
            "Reference: Genesis 1:3\nText: \"And God said, \"Let there be light\"\""
        );
        assert_eq!(expected_prefix("Genesis 1:3"), "[Genesis 1:3]");
    }

    #[test]
    fn persona_presets_render_shared_rules() {
        let p = persona_preset("Pirate").expect("pirate");
        assert!(p.contains("Keep all proper nouns unchanged."));
        assert!(!p.contains("{rules}"));
        assert!(persona_preset("nope").is_none());
        assert!(persona_names().contains(&DEFAULT_PERSONA));
    }

    #[test]
    fn unknown_notes_preset_uses_outline() {
        assert_eq!(notes_instructions("mystery"), notes_instructions("outline"));
        assert!(notes_instructions("youth").starts_with("Write youth-friendly notes"));
        let prompt = build_notes_prompt("[Genesis 1:1] yo", "sermon");
        assert!(prompt
            .starts_with("Passage (may contain [Book C:V] markers):\n\n[Genesis 1:1] yo\n\n"));
        assert!(prompt.ends_with(notes_instructions("sermon")));
    }
}
