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

//! `indexOf substring startsWith endsWith contains upper lower replace
//! matches matchesFull replaceMatches length toChars trim split join`
//! (spec.md §4.4, String group). Regex operations use single-line mode
//! (`.` matches newline), per the spec's explicit mode requirement.

use super::require_singleton;
use crate::error::{FhirPathError, Result};
use crate::model::{Collection, Value};
use regex::RegexBuilder;

fn receiver_str<'a>(receiver: &'a Collection, fn_name: &str) -> Result<Option<&'a str>> {
    match require_singleton(receiver, fn_name)? {
        Some(Value::String(s)) => Ok(Some(s.as_ref())),
        Some(_) => Err(FhirPathError::type_error(format!("{fn_name} requires a String receiver"))),
        None => Ok(None),
    }
}

fn build_regex(pattern: &str, fn_name: &str) -> Result<regex::Regex> {
    RegexBuilder::new(pattern)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| FhirPathError::type_error(format!("{fn_name}: invalid pattern: {e}")))
}

pub fn index_of(receiver: &Collection, substring: &str) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "indexOf")? else {
        return Ok(Collection::empty());
    };
    let index = s.find(substring).map(|byte_pos| s[..byte_pos].chars().count() as i32).unwrap_or(-1);
    Ok(Collection::singleton(Value::Integer(index)))
}

pub fn substring(receiver: &Collection, start: i64, length: Option<i64>) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "substring")? else {
        return Ok(Collection::empty());
    };
    let chars: Vec<char> = s.chars().collect();
    if start < 0 || start as usize >= chars.len() {
        return Ok(Collection::empty());
    }
    let start = start as usize;
    let end = match length {
        Some(len) if len >= 0 => (start + len as usize).min(chars.len()),
        _ => chars.len(),
    };
    Ok(Collection::singleton(Value::string(chars[start..end].iter().collect::<String>())))
}

pub fn starts_with(receiver: &Collection, prefix: &str) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "startsWith")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(Value::Boolean(s.starts_with(prefix))))
}

pub fn ends_with(receiver: &Collection, suffix: &str) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "endsWith")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(Value::Boolean(s.ends_with(suffix))))
}

pub fn string_contains(receiver: &Collection, needle: &str) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "contains")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(Value::Boolean(s.contains(needle))))
}

pub fn upper(receiver: &Collection) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "upper")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(Value::string(s.to_uppercase())))
}

pub fn lower(receiver: &Collection) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "lower")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(Value::string(s.to_lowercase())))
}

pub fn replace(receiver: &Collection, pattern: &str, substitution: &str) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "replace")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(Value::string(s.replace(pattern, substitution))))
}

pub fn matches(receiver: &Collection, pattern: &str) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "matches")? else {
        return Ok(Collection::empty());
    };
    let re = build_regex(pattern, "matches")?;
    Ok(Collection::singleton(Value::Boolean(re.is_match(s))))
}

pub fn matches_full(receiver: &Collection, pattern: &str) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "matchesFull")? else {
        return Ok(Collection::empty());
    };
    let anchored = format!("^(?:{pattern})$");
    let re = build_regex(&anchored, "matchesFull")?;
    Ok(Collection::singleton(Value::Boolean(re.is_match(s))))
}

pub fn replace_matches(receiver: &Collection, pattern: &str, substitution: &str) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "replaceMatches")? else {
        return Ok(Collection::empty());
    };
    let re = build_regex(pattern, "replaceMatches")?;
    Ok(Collection::singleton(Value::string(re.replace_all(s, substitution).into_owned())))
}

pub fn length(receiver: &Collection) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "length")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(Value::Integer(s.chars().count() as i32)))
}

pub fn to_chars(receiver: &Collection) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "toChars")? else {
        return Ok(Collection::empty());
    };
    Ok(s.chars().map(|c| Value::string(c.to_string())).collect())
}

pub fn trim(receiver: &Collection) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "trim")? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::singleton(Value::string(s.trim())))
}

pub fn split(receiver: &Collection, separator: &str) -> Result<Collection> {
    let Some(s) = receiver_str(receiver, "split")? else {
        return Ok(Collection::empty());
    };
    if separator.is_empty() {
        return Ok(Collection::singleton(Value::string(s)));
    }
    Ok(s.split(separator).map(Value::string).collect())
}

pub fn join(receiver: &Collection, separator: &str) -> Result<Collection> {
    let mut pieces = Vec::with_capacity(receiver.len());
    for item in receiver.iter() {
        match item {
            Value::String(s) => pieces.push(s.to_string()),
            _ => return Err(FhirPathError::type_error("join requires a collection of Strings")),
        }
    }
    Ok(Collection::singleton(Value::string(pieces.join(separator))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(s: &str) -> Collection {
        Collection::singleton(Value::string(s))
    }

    #[test]
    fn substring_respects_length() {
        let result = substring(&one("abcdef"), 1, Some(3)).unwrap();
        assert_eq!(result, Collection::singleton(Value::string("bcd")));
    }

    #[test]
    fn substring_out_of_range_start_is_empty() {
        assert!(substring(&one("abc"), 10, None).unwrap().is_empty());
    }

    #[test]
    fn matches_uses_single_line_mode() {
        let result = matches(&one("a\nb"), "a.b").unwrap();
        assert_eq!(result, Collection::singleton(Value::Boolean(true)));
    }

    #[test]
    fn split_and_join_round_trip() {
        let parts = split(&one("a,b,c"), ",").unwrap();
        let joined = join(&parts, "-").unwrap();
        assert_eq!(joined, Collection::singleton(Value::string("a-b-c")));
    }

    #[test]
    fn index_of_counts_codepoints_not_bytes() {
        let result = index_of(&one("héllo"), "llo").unwrap();
        assert_eq!(result, Collection::singleton(Value::Integer(2)));
    }
}
