//! Number extraction (spec §4.8 "Context-aware number extraction").
//!
//! Operates over grapheme clusters — per the rewrite's emoji/number parsing
//! note (spec §9) — rather than raw bytes or `char`s, so a future
//! multi-codepoint token never misaligns an offset.

use unicode_segmentation::UnicodeSegmentation;

/// A recognized number and the grapheme index just past its match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFind {
    pub value: i32,
    pub end_index: usize,
}

/// The Chinese-numeral table, capped at `十`/`二十`/…/`九十九`/`一百` — no
/// thousands place exists in this domain's vocabulary. Includes `零` (0)
/// and the alternate `一十` spelling of 10, both present in the original
/// detector's numeral table alongside the canonical forms.
fn chinese_numeral_table() -> Vec<(String, u32)> {
    fn digit_char(d: u32) -> char {
        ['一', '二', '三', '四', '五', '六', '七', '八', '九'][(d - 1) as usize]
    }

    let mut table: Vec<(String, u32)> = (1..=100u32)
        .filter_map(|n| {
            let text = match n {
                10 => "十".to_string(),
                1..=9 => digit_char(n).to_string(),
                11..=19 => format!("十{}", digit_char(n - 10)),
                n if n % 10 == 0 && n < 100 => format!("{}十", digit_char(n / 10)),
                20..=99 => format!("{}十{}", digit_char(n / 10), digit_char(n % 10)),
                100 => "一百".to_string(),
                _ => return None,
            };
            Some((text, n))
        })
        .collect();

    table.push(("零".to_string(), 0));
    table.push(("一十".to_string(), 10));
    table
}

/// Finds every decimal run and Chinese-numeral substring in `text`, in
/// left-to-right order. Decimal runs greater than 100 are discarded rather
/// than clamped — values in 0..=100 are the only ones the domain assigns
/// meaning to.
pub fn find_numbers(text: &str) -> Vec<NumberFind> {
    let table = chinese_numeral_table();
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    let mut finds = Vec::new();
    let mut i = 0;

    while i < graphemes.len() {
        if graphemes[i].chars().all(|c| c.is_ascii_digit()) && !graphemes[i].is_empty() {
            let start = i;
            let mut j = i;
            while j < graphemes.len() && graphemes[j].chars().all(|c| c.is_ascii_digit()) {
                j += 1;
            }
            let run: String = graphemes[start..j].concat();
            if let Ok(value) = run.parse::<i32>() {
                if (0..=100).contains(&value) {
                    finds.push(NumberFind { value, end_index: j });
                }
            }
            i = j;
            continue;
        }

        let mut matched = false;
        for len in [3usize, 2, 1] {
            if i + len > graphemes.len() {
                continue;
            }
            let candidate: String = graphemes[i..i + len].concat();
            if let Some(&(_, value)) = table.iter().find(|(s, _)| *s == candidate) {
                finds.push(NumberFind {
                    value: value as i32,
                    end_index: i + len,
                });
                i += len;
                matched = true;
                break;
            }
        }
        if !matched {
            i += 1;
        }
    }

    finds
}

/// Picks the number whose match is closest to the nearest occurrence of any
/// of `context_keywords` in `text`, scoring a number that appears *after*
/// the keyword as `distance` and one that appears *before* it as
/// `distance + 1000` — so, all else equal, a following number wins.
/// Returns `-1` if no number is found anywhere in `text`.
pub fn extract_context_number(text: &str, context_keywords: &[&str]) -> i32 {
    let finds = find_numbers(text);
    if finds.is_empty() {
        return -1;
    }

    let keyword_index = context_keywords
        .iter()
        .find_map(|kw| text.find(kw))
        .map(|byte_offset| grapheme_index_at(text, byte_offset));

    let Some(keyword_index) = keyword_index else {
        return finds[0].value;
    };

    finds
        .iter()
        .min_by_key(|f| {
            let distance = (f.end_index as i64 - keyword_index as i64).unsigned_abs();
            if f.end_index as i64 > keyword_index as i64 {
                distance
            } else {
                distance + 1000
            }
        })
        .map(|f| f.value)
        .unwrap_or(-1)
}

fn grapheme_index_at(text: &str, byte_offset: usize) -> usize {
    text.grapheme_indices(true)
        .take_while(|(idx, _)| *idx < byte_offset)
        .count()
}
