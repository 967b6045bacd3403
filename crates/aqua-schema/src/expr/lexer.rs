//! Tokenizer for the expression language.

use super::ExprError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => push(&mut tokens, &mut chars, Token::LParen),
            ')' => push(&mut tokens, &mut chars, Token::RParen),
            '[' => push(&mut tokens, &mut chars, Token::LBracket),
            ']' => push(&mut tokens, &mut chars, Token::RBracket),
            ',' => push(&mut tokens, &mut chars, Token::Comma),
            '"' | '\'' => {
                chars.next();
                tokens.push(Token::Str(read_string(src, &mut chars, c, pos)?));
            }
            '=' | '!' | '&' | '|' => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let tok = match (c, next) {
                    ('=', Some('=')) => Token::EqEq,
                    ('!', Some('=')) => Token::NotEq,
                    ('&', Some('&')) => Token::AndAnd,
                    ('|', Some('|')) => Token::OrOr,
                    ('!', _) => {
                        tokens.push(Token::Bang);
                        continue;
                    }
                    _ => return Err(unexpected(src, pos)),
                };
                chars.next();
                tokens.push(tok);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            _ => return Err(unexpected(src, pos)),
        }
    }

    Ok(tokens)
}

fn push(
    tokens: &mut Vec<Token>,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    tok: Token,
) {
    chars.next();
    tokens.push(tok);
}

fn read_string(
    src: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    quote: char,
    start: usize,
) -> Result<String, ExprError> {
    let mut out = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            c if c == quote => return Ok(out),
            c => out.push(c),
        }
    }
    Err(ExprError::Syntax {
        expr: src.to_string(),
        message: format!("unterminated string starting at {start}"),
    })
}

fn unexpected(src: &str, pos: usize) -> ExprError {
    ExprError::Syntax {
        expr: src.to_string(),
        message: format!("unexpected character at {pos}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_operators() {
        let toks = tokenize(r#"Version != "v1" && !(GOOS == 'linux')"#).unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Ident("Version".into()),
                Token::NotEq,
                Token::Str("v1".into()),
                Token::AndAnd,
                Token::Bang,
                Token::LParen,
                Token::Ident("GOOS".into()),
                Token::EqEq,
                Token::Str("linux".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize(r#"Version == "v1"#).is_err());
    }

    #[test]
    fn test_escaped_quote() {
        let toks = tokenize(r#""a\"b""#).unwrap();
        assert_eq!(toks, vec![Token::Str("a\"b".into())]);
    }
}
