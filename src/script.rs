use tracing::debug;

/// One spoken turn: who says it and what they say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub speaker: String,
    pub dialogue: String,
}

impl ScriptLine {
    pub fn new(speaker: impl Into<String>, dialogue: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            dialogue: dialogue.into(),
        }
    }
}

/// Speaker-tagged lines in the order the hosts speak.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    lines: Vec<ScriptLine>,
}

impl Script {
    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScriptLine> {
        self.lines.iter()
    }
}

/// Parses free-form model output into a script.
///
/// Every line of the form `Speaker: dialogue` becomes one [`ScriptLine`],
/// split on the first colon only. Blank lines, lines without a colon and lines
/// whose speaker or dialogue is empty are dropped. Never fails; an input with
/// no usable lines yields an empty script.
pub fn parse(raw: &str) -> Script {
    let mut lines = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((speaker, dialogue)) = line.split_once(':') else {
            debug!("Skipping line without speaker tag: {:.80}", line);
            continue;
        };
        let speaker = speaker.trim();
        let dialogue = dialogue.trim();
        if speaker.is_empty() || dialogue.is_empty() {
            debug!("Skipping incomplete line: {:.80}", line);
            continue;
        }
        lines.push(ScriptLine::new(speaker, dialogue));
    }
    Script { lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_blank_and_untagged_lines() {
        let script = parse("Alex: Hi there\n\nSarah: Hello!\nNotALine");
        assert_eq!(
            script.lines(),
            &[
                ScriptLine::new("Alex", "Hi there"),
                ScriptLine::new("Sarah", "Hello!"),
            ]
        );
    }

    #[test]
    fn test_parse_splits_on_first_colon_only() {
        let script = parse("Sarah: The ratio is 3:1, believe it or not: really.");
        assert_eq!(script.len(), 1);
        assert_eq!(script.lines()[0].speaker, "Sarah");
        assert_eq!(
            script.lines()[0].dialogue,
            "The ratio is 3:1, believe it or not: really."
        );
    }

    #[test]
    fn test_parse_trims_and_handles_crlf() {
        let script = parse("   Alex  :   So what's new?   \r\n\tSarah:Plenty.\r\n");
        assert_eq!(
            script.lines(),
            &[
                ScriptLine::new("Alex", "So what's new?"),
                ScriptLine::new("Sarah", "Plenty."),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_empty_speaker_or_dialogue() {
        let script = parse(": orphan dialogue\nAlex:\nAlex:    \nSarah: kept");
        assert_eq!(script.lines(), &[ScriptLine::new("Sarah", "kept")]);
    }

    #[test]
    fn test_parse_keeps_unknown_speakers() {
        // Voice lookup happens at synthesis time, not here.
        let script = parse("Narrator: Once upon a time\n[Music fades in]\nAlex: Welcome!");
        assert_eq!(script.len(), 2);
        assert_eq!(script.lines()[0].speaker, "Narrator");
        assert_eq!(script.lines()[1].speaker, "Alex");
    }

    #[test]
    fn test_parse_no_valid_lines_is_empty() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n   \n").is_empty());
        assert!(parse("Sorry, I can't help with that.").is_empty());
    }

    #[test]
    fn test_parse_preserves_order_for_long_scripts() {
        let raw: String = (0..40)
            .map(|i| {
                let who = if i % 2 == 0 { "Alex" } else { "Sarah" };
                format!("{who}: line {i}\n")
            })
            .collect();
        let script = parse(&raw);
        assert_eq!(script.len(), 40);
        for (i, line) in script.iter().enumerate() {
            assert_eq!(line.dialogue, format!("line {i}"));
        }
    }
}
