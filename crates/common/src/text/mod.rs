//! Sentence segmentation for story and timeline prose

/// Splits a paragraph into sentences
pub trait Segmenter: Send + Sync {
    /// Ordered, trimmed, non-empty sentences. Blank input yields none.
    fn segment(&self, text: &str) -> Vec<String>;
}

const TERMINATORS: [char; 4] = ['.', '!', '?', '…'];
const CLOSERS: [char; 8] = ['"', '\'', ')', ']', '”', '’', '»', '}'];
const OPENERS: [char; 6] = ['"', '\'', '(', '“', '‘', '«'];

const ABBREVIATIONS: [&str; 12] = [
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "gen", "gov", "sen",
];

/// Rule-based segmenter for English news prose.
///
/// A sentence ends at `.`, `!`, `?` or `…` (with any closing quotes or
/// brackets) when followed by end of text, or by whitespace and then an
/// uppercase letter, digit or opening quote. Known honorifics and dotted
/// initialisms such as `U.S.` do not end a sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PunctuationSegmenter;

impl PunctuationSegmenter {
    pub fn new() -> Self {
        Self
    }
}

impl Segmenter for PunctuationSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            current.push(ch);
            i += 1;

            if !TERMINATORS.contains(&ch) {
                continue;
            }

            // Swallow runs like `?!` and trailing `")`
            while i < chars.len() && (TERMINATORS.contains(&chars[i]) || CLOSERS.contains(&chars[i])) {
                current.push(chars[i]);
                i += 1;
            }

            if is_boundary(&chars[i..]) && !(ch == '.' && ends_with_abbreviation(&current)) {
                push_trimmed(&mut sentences, &current);
                current.clear();
            }
        }

        push_trimmed(&mut sentences, &current);
        sentences
    }
}

fn is_boundary(rest: &[char]) -> bool {
    match rest.first() {
        None => true,
        Some(c) if c.is_whitespace() => match rest.iter().find(|c| !c.is_whitespace()) {
            None => true,
            Some(next) => next.is_uppercase() || next.is_ascii_digit() || OPENERS.contains(next),
        },
        Some(_) => false,
    }
}

fn ends_with_abbreviation(sentence: &str) -> bool {
    let word = sentence
        .trim_end_matches(|c: char| TERMINATORS.contains(&c) || CLOSERS.contains(&c))
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric());

    if word.contains('.') {
        return is_initialism(word);
    }
    ABBREVIATIONS.contains(&word.to_lowercase().as_str())
}

/// `U.S` or `D.C`: every dot-separated piece is one letter
fn is_initialism(word: &str) -> bool {
    word.split('.').all(|piece| {
        let mut chars = piece.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
    })
}

fn push_trimmed(sentences: &mut Vec<String>, piece: &str) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        PunctuationSegmenter::new().segment(text)
    }

    #[test]
    fn test_empty_and_blank() {
        assert!(split("").is_empty());
        assert!(split("   \n\t ").is_empty());
    }

    #[test]
    fn test_two_short_sentences() {
        assert_eq!(split("A. B."), vec!["A.", "B."]);
    }

    #[test]
    fn test_mixed_terminators_and_quotes() {
        assert_eq!(
            split("Is it over? \"Not yet,\" she said. Talks resume Monday!"),
            vec!["Is it over?", "\"Not yet,\" she said.", "Talks resume Monday!"]
        );
        assert_eq!(
            split("He said \"stop.\" Then he left."),
            vec!["He said \"stop.\"", "Then he left."]
        );
    }

    #[test]
    fn test_no_split_inside_numbers_or_initialisms() {
        assert_eq!(
            split("Growth hit 3.5 percent in the U.S. economy. Markets rose."),
            vec!["Growth hit 3.5 percent in the U.S. economy.", "Markets rose."]
        );
    }

    #[test]
    fn test_split_after_trailing_decimal_or_domain() {
        assert_eq!(
            split("Inflation fell to 3.5. Markets rallied."),
            vec!["Inflation fell to 3.5.", "Markets rallied."]
        );
        assert_eq!(
            split("Read more at example.com. Then reply."),
            vec!["Read more at example.com.", "Then reply."]
        );
        assert_eq!(
            split("She flew to Washington, D.C. and back."),
            vec!["She flew to Washington, D.C. and back."]
        );
        assert_eq!(
            split("They met at the U.S. Embassy. Talks resumed."),
            vec!["They met at the U.S. Embassy.", "Talks resumed."]
        );
    }

    #[test]
    fn test_no_split_after_honorific() {
        assert_eq!(
            split("Dr. Smith met Mr. Jones. They talked."),
            vec!["Dr. Smith met Mr. Jones.", "They talked."]
        );
    }

    #[test]
    fn test_lowercase_continuation_is_not_a_boundary() {
        assert_eq!(split("Prices rose approx. ten percent."), vec!["Prices rose approx. ten percent."]);
    }

    #[test]
    fn test_trailing_fragment_kept() {
        assert_eq!(split("First one. and a tail"), vec!["First one. and a tail"]);
        assert_eq!(split("One. Two"), vec!["One.", "Two"]);
    }

    #[test]
    fn test_idempotent() {
        let text = "The vote passed 52-48. Officials said 12 people were hurt. Dr. Lee disagreed.";
        let first = split(text);
        let again: Vec<String> = first.iter().flat_map(|s| split(s)).collect();
        assert_eq!(first, again);
        assert_eq!(first.len(), 3);
    }
}
