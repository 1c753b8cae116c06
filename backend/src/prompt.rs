//! Parser for the bracketed trip prompt:
//!
//! ```text
//! [2025.06.01,10:00,2025.06.03,18:00][제주시,애월읍][{오션뷰,조용한},흑돼지]
//! ```
//!
//! Sections are the date range, the locations, then keywords. Keywords inside
//! `{...}` are ranked in order of appearance; bare keywords are unranked.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::places::Keyword;

const DATE_FORMATS: [&str; 3] = ["%Y.%m.%d", "%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("expected 3 bracketed sections, found {0}")]
    MissingSection(usize),
    #[error("unterminated `[` or `{{` in prompt")]
    Unbalanced,
    #[error("invalid date `{0}`")]
    InvalidDate(String),
    #[error("invalid time `{0}`")]
    InvalidTime(String),
    #[error("date range needs a start and an end, found {0} dates")]
    DateCount(usize),
    #[error("trip ends before it starts")]
    EndBeforeStart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPrompt {
    pub start_datetime: NaiveDateTime,
    pub end_datetime: NaiveDateTime,
    pub locations: Vec<String>,
    pub keywords: Vec<Keyword>,
}

impl ParsedPrompt {
    pub fn ranked_keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter().filter(|k| k.rank.is_some())
    }

    pub fn unranked_keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter().filter(|k| k.rank.is_none())
    }

    /// Calendar days covered, counting both ends.
    pub fn day_count(&self) -> u32 {
        let days = (self.end_datetime.date() - self.start_datetime.date()).num_days();
        u32::try_from(days + 1).unwrap_or(1)
    }
}

pub fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}

pub fn default_end_time() -> NaiveTime {
    NaiveTime::from_hms_opt(21, 0, 0).unwrap_or_default()
}

pub fn parse_prompt(prompt: &str) -> Result<ParsedPrompt, PromptError> {
    let sections = bracket_sections(prompt)?;
    let [range, locations, keywords] = sections.as_slice() else {
        return Err(PromptError::MissingSection(sections.len()));
    };

    let (start_datetime, end_datetime) = parse_range(range)?;
    let locations = split_items(locations);
    let keywords = parse_keywords(keywords)?;

    Ok(ParsedPrompt {
        start_datetime,
        end_datetime,
        locations,
        keywords,
    })
}

fn bracket_sections(prompt: &str) -> Result<Vec<&str>, PromptError> {
    let mut sections = Vec::new();
    let mut open: Option<usize> = None;

    for (idx, ch) in prompt.char_indices() {
        match (ch, open) {
            ('[', None) => open = Some(idx + ch.len_utf8()),
            ('[', Some(_)) => return Err(PromptError::Unbalanced),
            (']', Some(start)) => {
                sections.push(&prompt[start..idx]);
                open = None;
            }
            _ => {}
        }
    }
    if open.is_some() {
        return Err(PromptError::Unbalanced);
    }
    Ok(sections)
}

fn parse_range(section: &str) -> Result<(NaiveDateTime, NaiveDateTime), PromptError> {
    let mut dates: Vec<(NaiveDate, Option<NaiveTime>)> = Vec::new();

    for token in section.split([',', ' ']).map(str::trim).filter(|t| !t.is_empty()) {
        if token.contains(':') {
            let time = NaiveTime::parse_from_str(token, "%H:%M")
                .map_err(|_| PromptError::InvalidTime(token.to_string()))?;
            match dates.last_mut() {
                Some((_, slot @ None)) => *slot = Some(time),
                _ => return Err(PromptError::InvalidTime(token.to_string())),
            }
        } else {
            dates.push((parse_date(token)?, None));
        }
    }

    let [(start_date, start_time), (end_date, end_time)] = dates.as_slice() else {
        return Err(PromptError::DateCount(dates.len()));
    };
    let start = start_date.and_time(start_time.unwrap_or_else(default_start_time));
    let end = end_date.and_time(end_time.unwrap_or_else(default_end_time));
    if end < start {
        return Err(PromptError::EndBeforeStart);
    }
    Ok((start, end))
}

fn parse_date(token: &str) -> Result<NaiveDate, PromptError> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
        .ok_or_else(|| PromptError::InvalidDate(token.to_string()))
}

fn split_items(section: &str) -> Vec<String> {
    section
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_keywords(section: &str) -> Result<Vec<Keyword>, PromptError> {
    let mut keywords = Vec::new();
    let mut rank = 0usize;
    let mut rest = section;

    while let Some(open) = rest.find('{') {
        keywords.extend(split_items(&rest[..open]).into_iter().map(Keyword::unranked));
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or(PromptError::Unbalanced)?;
        for item in split_items(&after[..close]) {
            rank += 1;
            keywords.push(Keyword::ranked(item, rank));
        }
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(PromptError::Unbalanced);
    }
    keywords.extend(split_items(rest).into_iter().map(Keyword::unranked));

    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn parses_full_prompt() {
        let parsed =
            parse_prompt("[2025.06.01,10:00,2025.06.03,18:00][제주시, 애월읍][{오션뷰,조용한},흑돼지]")
                .unwrap();
        assert_eq!(parsed.start_datetime, dt(2025, 6, 1, 10, 0));
        assert_eq!(parsed.end_datetime, dt(2025, 6, 3, 18, 0));
        assert_eq!(parsed.locations, vec!["제주시", "애월읍"]);
        assert_eq!(
            parsed.keywords,
            vec![
                Keyword::ranked("오션뷰", 1),
                Keyword::ranked("조용한", 2),
                Keyword::unranked("흑돼지"),
            ]
        );
        assert_eq!(parsed.day_count(), 3);
        assert_eq!(parsed.ranked_keywords().count(), 2);
        assert_eq!(parsed.unranked_keywords().count(), 1);
    }

    #[test]
    fn missing_times_use_defaults() {
        let parsed = parse_prompt("[2025-06-01, 2025-06-02][][]").unwrap();
        assert_eq!(parsed.start_datetime, dt(2025, 6, 1, 9, 0));
        assert_eq!(parsed.end_datetime, dt(2025, 6, 2, 21, 0));
        assert!(parsed.locations.is_empty());
        assert!(parsed.keywords.is_empty());
    }

    #[test]
    fn space_separated_date_and_time() {
        let parsed = parse_prompt("[2025/06/01 08:30, 2025/06/01 20:00][서귀포시][카페]").unwrap();
        assert_eq!(parsed.start_datetime, dt(2025, 6, 1, 8, 30));
        assert_eq!(parsed.day_count(), 1);
    }

    #[test]
    fn ranks_continue_across_groups() {
        let parsed = parse_prompt("[2025.06.01,2025.06.01][x][a,{b},c,{d,e}]").unwrap();
        let ranks: Vec<_> = parsed.keywords.iter().map(|k| (k.text.as_str(), k.rank)).collect();
        assert_eq!(
            ranks,
            vec![("a", None), ("b", Some(1)), ("c", None), ("d", Some(2)), ("e", Some(3))]
        );
    }

    #[test]
    fn rejects_malformed_prompts() {
        assert_eq!(parse_prompt("[2025.06.01,2025.06.02][x]"), Err(PromptError::MissingSection(2)));
        assert_eq!(parse_prompt("[2025.06.01,2025.06.02][x][a"), Err(PromptError::Unbalanced));
        assert_eq!(parse_prompt("[2025.06.01,2025.06.02][x][{a,b]"), Err(PromptError::Unbalanced));
        assert_eq!(
            parse_prompt("[2025.13.01,2025.06.02][x][a]"),
            Err(PromptError::InvalidDate("2025.13.01".into()))
        );
        assert_eq!(parse_prompt("[2025.06.01][x][a]"), Err(PromptError::DateCount(1)));
        assert_eq!(
            parse_prompt("[10:00,2025.06.01,2025.06.02][x][a]"),
            Err(PromptError::InvalidTime("10:00".into()))
        );
        assert_eq!(
            parse_prompt("[2025.06.03,2025.06.01][x][a]"),
            Err(PromptError::EndBeforeStart)
        );
    }
}
