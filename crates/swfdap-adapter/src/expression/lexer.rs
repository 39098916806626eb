//! Tokenizer for debugger expressions.

use logos::Logos;

use super::ExpressionError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // === Literals ===
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| i64::from_str_radix(&lex.slice()[2..], 16).ok().map(|v| v as f64))]
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    Str(String),

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("undefined")]
    Undefined,
    #[token("this")]
    This,

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),

    // === Punctuation ===
    #[token(".")]
    Dot,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,

    // === Operators ===
    #[token("!")]
    Bang,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEq,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEq,
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("===")]
    StrictEq,
    #[token("!==")]
    StrictNotEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("=")]
    Assign,
}

fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(ExpressionError::Parse(format!(
                    "unexpected input '{}' at {}",
                    lexer.slice(),
                    lexer.span().start
                )))
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(
            tokenize("42 0x1F 2.5 .5").unwrap(),
            vec![
                Token::Number(42.0),
                Token::Number(31.0),
                Token::Number(2.5),
                Token::Number(0.5)
            ]
        );
    }

    #[test]
    fn strings_are_unescaped() {
        assert_eq!(
            tokenize(r#""a\"b" 'c\nd'"#).unwrap(),
            vec![Token::Str("a\"b".into()), Token::Str("c\nd".into())]
        );
    }

    #[test]
    fn keywords_win_over_identifiers() {
        assert_eq!(
            tokenize("this.trueish true").unwrap(),
            vec![
                Token::This,
                Token::Dot,
                Token::Ident("trueish".into()),
                Token::True
            ]
        );
    }

    #[test]
    fn longest_operator_matches() {
        assert_eq!(
            tokenize("a !== b <= c = d").unwrap(),
            vec![
                Token::Ident("a".into()),
                Token::StrictNotEq,
                Token::Ident("b".into()),
                Token::LessEq,
                Token::Ident("c".into()),
                Token::Assign,
                Token::Ident("d".into())
            ]
        );
    }

    #[test]
    fn unknown_character_is_an_error() {
        assert!(matches!(tokenize("a # b"), Err(ExpressionError::Parse(_))));
    }
}
