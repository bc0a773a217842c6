//! Shell-like tokenizing of command text.

/// Splits `input` into whitespace-separated tokens.
///
/// Handles:
/// - Single and double quoted tokens (`'a b'`, `"a b"`)
/// - Backslash escapes inside double quotes
/// - Quotes glued to a word (`--name="a b"` becomes `--name=a b`)
pub fn shell_split(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match (quote, ch) {
            (Some('"'), '\\') => escape_next = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    tokens
}
