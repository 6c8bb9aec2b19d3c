//! Transcript matching for spoken-repetition items.
//!
//! The rules are deliberately forgiving of transcription noise: after
//! normalization an exact match is accepted, and so is any transcript that
//! contains every expected word. That fallback also accepts strict supersets
//! of the target sentence ("i think i see a cat" for "I see a cat"); the
//! leniency is preserved as shipped and is under product review, so do not
//! tighten it here.

/// Punctuation stripped during normalization.
const STRIPPED: &[char] = &['.', ',', '!', '?', ';', ':', '\'', '"'];

/// The sentence the participant is supposed to say: the prompt minus its
/// instructional prefix. The prefix is everything up to and including the
/// first `:` ("Repeat after me: I see a cat" → "I see a cat"); prompts
/// without a colon are used whole.
#[must_use]
pub fn expected_sentence(prompt: &str) -> &str {
    match prompt.split_once(':') {
        Some((_, rest)) => rest.trim(),
        None => prompt.trim(),
    }
}

/// Lowercase, strip punctuation, trim, collapse runs of whitespace.
#[must_use]
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let stripped: String = lowered.chars().filter(|c| !STRIPPED.contains(c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decide whether a transcript counts as a correct repetition of the
/// expected sentence.
///
/// Accepts an exact normalized match, or (lenient fallback) a transcript in
/// which every whitespace token of the normalized expectation appears as a
/// substring. An empty transcript is never correct.
#[must_use]
pub fn transcript_matches(expected: &str, transcript: &str) -> bool {
    let expected = normalize(expected);
    let transcript = normalize(transcript);
    if transcript.is_empty() || expected.is_empty() {
        return false;
    }
    if expected == transcript {
        return true;
    }
    expected
        .split_whitespace()
        .all(|word| transcript.contains(word))
}
