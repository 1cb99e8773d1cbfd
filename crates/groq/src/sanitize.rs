/// Search-input sanitization.
///
/// Free-text search terms are interpolated into `match` patterns, so any
/// character with GROQ syntactic meaning is stripped rather than escaped.
/// The result is length-capped; applying the function twice yields the
/// same output as applying it once.

const MAX_INPUT_LEN: usize = 256;

const STRIPPED: &[char] = &[
    '"', '\'', '`', '{', '}', '[', ']', '|', '$', '\\', ';',
];

pub fn sanitize_groq_input(input: &str) -> String {
    input
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .take(MAX_INPUT_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_groq_metacharacters() {
        assert_eq!(
            sanitize_groq_input(r#"mo'on ["$taj|e;\{}"#),
            "moon taje"
        );
    }

    #[test]
    fn passes_plain_terms_through() {
        assert_eq!(sanitize_groq_input("Gato Audio DIA-250"), "Gato Audio DIA-250");
    }

    #[test]
    fn caps_length() {
        let long = "a".repeat(1000);
        assert_eq!(sanitize_groq_input(&long).len(), MAX_INPUT_LEN);
    }

    #[test]
    fn is_idempotent() {
        let inputs = [r#"we"ird$ [input] | x;"#, "plain", "", "ó ż ł unicode"];
        for input in inputs {
            let once = sanitize_groq_input(input);
            let twice = sanitize_groq_input(&once);
            assert_eq!(once, twice);
        }
    }
}
