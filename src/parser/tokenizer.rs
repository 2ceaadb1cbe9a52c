// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tokenizer for FHIRPath expression text. Produces zero-copy string-slice
//! tokens tagged with the byte offset they started at, for diagnostics.

use crate::error::{FhirPathError, Result};
use unicode_xid::UnicodeXID;

/// A lexical token, borrowing from the source text where possible.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Integer(i64),
    Decimal(&'a str),
    String(String),
    Boolean(bool),
    Date(&'a str),
    DateTime(&'a str),
    Time(&'a str),
    Quantity { value: &'a str, unit: &'a str },
    Identifier(&'a str),
    DelimitedIdentifier(String),
    ExternalConstant(&'a str),
    QuotedExternalConstant(String),
    This,
    Index,
    Total,
    Null,

    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Ampersand,
    Pipe,
    Equal,
    NotEqual,
    Equivalent,
    NotEquivalent,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Dot,
    Comma,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    And,
    Or,
    Xor,
    Implies,
    Div,
    Mod,
    In,
    Contains,
    Is,
    As,

    Eof,
}

/// A token plus the byte offset it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<'a> {
    pub token: Token<'a>,
    pub position: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Spanned<'_>>> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let token = match c {
            '/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            '/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                continue;
            }
            '+' => {
                i += 1;
                Token::Plus
            }
            '-' => {
                i += 1;
                Token::Minus
            }
            '*' => {
                i += 1;
                Token::Star
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '%' => {
                i += 1;
                match lex_identifier_like(input, i) {
                    Some(end) => {
                        let name = &input[i..end];
                        i = end;
                        Token::ExternalConstant(name)
                    }
                    None if bytes.get(i) == Some(&b'\'') => {
                        let (text, end) = lex_quoted(input, i, '\'')?;
                        i = end;
                        Token::QuotedExternalConstant(text)
                    }
                    None => return Err(FhirPathError::parse(i, "expected identifier after '%'")),
                }
            }
            '^' => {
                i += 1;
                Token::Caret
            }
            '&' => {
                i += 1;
                Token::Ampersand
            }
            '|' => {
                i += 1;
                Token::Pipe
            }
            '=' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::Equivalent
            }
            '=' => {
                i += 1;
                Token::Equal
            }
            '!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::NotEqual
            }
            '!' if bytes.get(i + 1) == Some(&b'~') => {
                i += 2;
                Token::NotEquivalent
            }
            '~' => {
                i += 1;
                Token::Equivalent
            }
            '<' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::LessOrEqual
            }
            '<' => {
                i += 1;
                Token::LessThan
            }
            '>' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::GreaterOrEqual
            }
            '>' => {
                i += 1;
                Token::GreaterThan
            }
            '.' => {
                i += 1;
                Token::Dot
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '(' => {
                i += 1;
                Token::LeftParen
            }
            ')' => {
                i += 1;
                Token::RightParen
            }
            '[' => {
                i += 1;
                Token::LeftBracket
            }
            ']' => {
                i += 1;
                Token::RightBracket
            }
            '{' if bytes.get(i + 1) == Some(&b'}') => {
                i += 2;
                Token::Null
            }
            '{' => {
                i += 1;
                Token::LeftBrace
            }
            '}' => {
                i += 1;
                Token::RightBrace
            }
            '\'' => {
                let (text, end) = lex_quoted(input, i, '\'')?;
                i = end;
                Token::String(text)
            }
            '`' => {
                let (text, end) = lex_quoted(input, i, '`')?;
                i = end;
                Token::DelimitedIdentifier(text)
            }
            '@' => {
                i += 1;
                lex_temporal(input, &mut i)?
            }
            '$' => {
                i += 1;
                match &input[i..] {
                    s if s.starts_with("this") => {
                        i += 4;
                        Token::This
                    }
                    s if s.starts_with("index") => {
                        i += 5;
                        Token::Index
                    }
                    s if s.starts_with("total") => {
                        i += 5;
                        Token::Total
                    }
                    _ => return Err(FhirPathError::parse(i, "unknown '$' variable")),
                }
            }
            c if c.is_ascii_digit() => lex_number_or_quantity(input, &mut i)?,
            c if c.is_xid_start() || c == '_' => lex_word(input, &mut i),
            other => return Err(FhirPathError::parse(i, format!("unexpected character '{other}'"))),
        };
        tokens.push(Spanned { token, position: start });
    }
    tokens.push(Spanned { token: Token::Eof, position: bytes.len() });
    Ok(tokens)
}

fn lex_identifier_like(input: &str, start: usize) -> Option<usize> {
    let mut end = start;
    let mut chars = input[start..].char_indices();
    match chars.next() {
        Some((_, c)) if c.is_xid_start() || c == '_' => end += c.len_utf8(),
        _ => return None,
    }
    for (offset, c) in chars {
        if c.is_xid_continue() {
            end = start + offset + c.len_utf8();
        } else {
            break;
        }
    }
    Some(end)
}

fn lex_quoted(input: &str, start: usize, delim: char) -> Result<(String, usize)> {
    let mut chars = input[start + 1..].char_indices();
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(FhirPathError::parse(start, "unterminated quoted literal")),
            Some((offset, c)) if c == delim => {
                return Ok((out, start + 1 + offset + c.len_utf8()));
            }
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, '\'')) => out.push('\''),
                Some((_, '"')) => out.push('"'),
                Some((_, '`')) => out.push('`'),
                Some((_, '/')) => out.push('/'),
                Some((_, other)) => out.push(other),
                None => return Err(FhirPathError::parse(start, "unterminated escape sequence")),
            },
            Some((_, c)) => out.push(c),
        }
    }
}

fn lex_word<'a>(input: &'a str, i: &mut usize) -> Token<'a> {
    let start = *i;
    let end = lex_identifier_like(input, start).unwrap_or(start);
    *i = end;
    let word = &input[start..end];
    match word {
        "true" => Token::Boolean(true),
        "false" => Token::Boolean(false),
        "and" => Token::And,
        "or" => Token::Or,
        "xor" => Token::Xor,
        "implies" => Token::Implies,
        "div" => Token::Div,
        "mod" => Token::Mod,
        "in" => Token::In,
        "contains" => Token::Contains,
        "is" => Token::Is,
        "as" => Token::As,
        _ => Token::Identifier(word),
    }
}

fn lex_number_or_quantity<'a>(input: &'a str, i: &mut usize) -> Result<Token<'a>> {
    let start = *i;
    let bytes = input.as_bytes();
    while *i < bytes.len() && bytes[*i].is_ascii_digit() {
        *i += 1;
    }
    let mut is_decimal = false;
    if bytes.get(*i) == Some(&b'.') && bytes.get(*i + 1).is_some_and(u8::is_ascii_digit) {
        is_decimal = true;
        *i += 1;
        while *i < bytes.len() && bytes[*i].is_ascii_digit() {
            *i += 1;
        }
    }
    let number_text = &input[start..*i];

    // Trailing whitespace is allowed between a numeric literal and its unit.
    let mut lookahead = *i;
    while bytes.get(lookahead) == Some(&b' ') {
        lookahead += 1;
    }
    if bytes.get(lookahead) == Some(&b'\'') {
        let (unit_text, end) = lex_quoted(input, lookahead, '\'')?;
        let _ = unit_text;
        // Re-slice the unit as a borrowed range rather than owned text so
        // Token::Quantity keeps the zero-copy shape of its siblings.
        let unit_start = lookahead + 1;
        let unit_end = end - 1;
        *i = end;
        return Ok(Token::Quantity { value: number_text, unit: &input[unit_start..unit_end] });
    }
    if let Some(word_end) = lex_identifier_like(input, lookahead) {
        let word = &input[lookahead..word_end];
        if is_calendar_duration_keyword(word) {
            *i = word_end;
            return Ok(Token::Quantity { value: number_text, unit: word });
        }
    }

    if is_decimal {
        Ok(Token::Decimal(number_text))
    } else {
        number_text
            .parse::<i64>()
            .map(Token::Integer)
            .map_err(|_| FhirPathError::parse(start, "integer literal out of range"))
    }
}

fn is_calendar_duration_keyword(word: &str) -> bool {
    matches!(
        word,
        "year" | "years" | "month" | "months" | "week" | "weeks" | "day" | "days" | "hour"
            | "hours" | "minute" | "minutes" | "second" | "seconds" | "millisecond" | "milliseconds"
    )
}

fn lex_temporal<'a>(input: &'a str, i: &mut usize) -> Result<Token<'a>> {
    let start = *i;
    let bytes = input.as_bytes();
    if bytes.get(*i) == Some(&b'T') {
        *i += 1;
        while *i < bytes.len() && is_time_char(bytes[*i] as char) {
            *i += 1;
        }
        return Ok(Token::Time(&input[start..*i]));
    }
    while *i < bytes.len() && (bytes[*i].is_ascii_digit() || bytes[*i] == b'-') {
        *i += 1;
    }
    if bytes.get(*i) == Some(&b'T') {
        *i += 1;
        while *i < bytes.len() && is_time_char(bytes[*i] as char) {
            *i += 1;
        }
        Ok(Token::DateTime(&input[start..*i]))
    } else {
        Ok(Token::Date(&input[start..*i]))
    }
}

fn is_time_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, ':' | '.' | '+' | '-' | 'Z')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token<'_>> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn tokenizes_member_access() {
        assert_eq!(
            kinds("Patient.name"),
            vec![Token::Identifier("Patient"), Token::Dot, Token::Identifier("name"), Token::Eof]
        );
    }

    #[test]
    fn tokenizes_quoted_unit_quantity() {
        assert_eq!(
            kinds("4 'wk'"),
            vec![Token::Quantity { value: "4", unit: "wk" }, Token::Eof]
        );
    }

    #[test]
    fn tokenizes_calendar_keyword_quantity() {
        assert_eq!(
            kinds("4 weeks"),
            vec![Token::Quantity { value: "4", unit: "weeks" }, Token::Eof]
        );
    }

    #[test]
    fn tokenizes_comparison_operators() {
        assert_eq!(
            kinds("1 <= 2"),
            vec![Token::Integer(1), Token::LessOrEqual, Token::Integer(2), Token::Eof]
        );
    }

    #[test]
    fn tokenizes_environment_variable() {
        assert_eq!(kinds("%resource"), vec![Token::ExternalConstant("resource"), Token::Eof]);
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(tokenize("'unterminated").is_err());
    }
}
