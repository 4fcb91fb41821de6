//! Tokenizer for HIR text.

use crate::error::HirError;

/// Characters that always form a token on their own.
const PUNCT: &[char] = &['=', '<', '>', ',', '{', '}', '(', ')', ';', ':', '[', ']', '@'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum TokenKind {
    /// A run of non-space, non-punctuation characters.
    Word(String),
    /// A double-quoted string, escapes already resolved.
    Str(String),
    Punct(char),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Token {
    pub kind: TokenKind,
    /// 1-based source line.
    pub line: usize,
}

pub(super) fn tokenize(text: &str) -> Result<Vec<Token>, HirError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        if c == '\n' {
            line += 1;
            chars.next();
        } else if c.is_whitespace() {
            chars.next();
        } else if PUNCT.contains(&c) {
            chars.next();
            tokens.push(Token {
                kind: TokenKind::Punct(c),
                line,
            });
        } else if c == '"' {
            chars.next();
            let start = line;
            let mut s = String::new();
            loop {
                match chars.next() {
                    None | Some('\n') => {
                        return Err(HirError::malformed(start, "unterminated string"));
                    }
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some('"') => s.push('"'),
                        Some('\\') => s.push('\\'),
                        other => {
                            return Err(HirError::malformed(
                                start,
                                format!("invalid escape {:?} in string", other.unwrap_or(' ')),
                            ));
                        }
                    },
                    Some(ch) => s.push(ch),
                }
            }
            tokens.push(Token {
                kind: TokenKind::Str(s),
                line: start,
            });
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || ch == '"' || PUNCT.contains(&ch) {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Word(word),
                line,
            });
        }
    }

    Ok(tokens)
}
