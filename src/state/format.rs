//! Decoding of the round format mini-language.
//!
//! Formats are `|`-separated flags: `Q<n>` questions per slide, `A<n>` answers per slide,
//! `C<n>` combined questions and answers (sudden death), `I` trailing interval, `E<tag>` extra
//! end-of-round slide. Parsing is lenient: unknown flags are skipped and bad numbers fall back
//! to the default capacity.

/// Behaviour flags decoded from a round's format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundFormat {
    /// Questions per slide.
    pub slide_questions: usize,
    /// Answers per slide.
    pub slide_answers: usize,
    /// Questions and answers share slides; marks a sudden-death tie-break.
    pub combined: bool,
    /// An interval page follows the round.
    pub interval: bool,
    /// The whole `E...` flag, when an extra end slide is requested.
    pub additional: Option<String>,
}

impl RoundFormat {
    /// Format for a round with no flags.
    pub fn plain(slide_items: usize) -> Self {
        Self {
            slide_questions: slide_items,
            slide_answers: slide_items,
            combined: false,
            interval: false,
            additional: None,
        }
    }

    /// Decode `format` against the site-wide slide capacity.
    pub fn decode(format: &str, slide_items: usize) -> Self {
        let mut rf = Self::plain(slide_items);

        for flag in format.split('|') {
            let Some(first) = flag.chars().next() else {
                continue;
            };
            match first {
                'E' => rf.additional = Some(flag.to_string()),
                'I' => rf.interval = true,
                'Q' => rf.slide_questions = decode_max(flag, slide_items),
                'A' => rf.slide_answers = decode_max(flag, slide_items),
                'C' => {
                    rf.slide_questions = decode_max(flag, slide_items / 2);
                    rf.combined = true;
                }
                _ => {}
            }
        }
        rf
    }
}

fn decode_max(flag: &str, default: usize) -> usize {
    match flag[1..].trim().parse::<usize>() {
        Ok(max) if max > 1 => max,
        _ => default,
    }
}
