//! Fixed-column decoder for ICAO 9303 TD3 passport MRZ lines, as pulled out
//! of noisy OCR text blocks (spec.md §4.2).
//!
//! No checksum verification is performed in this revision. Any parse error
//! anywhere in the record yields `None` rather than propagating — a single
//! bad OCR block must never fail the rest of the ingest.

use crate::models::MrzRecord;
use chrono::NaiveDate;

const LINE_WIDTH: usize = 44;

/// Parse the first TD3 passport MRZ record found in `ocr_text`, if any.
pub fn parse(ocr_text: &str) -> Option<MrzRecord> {
    let upper = ocr_text.to_uppercase();
    let lines: Vec<&str> = upper.split('\n').collect();

    let line1_idx = lines
        .iter()
        .position(|line| line.trim_start().starts_with("P<"))?;
    let line1_raw = lines.get(line1_idx)?.trim();
    let line2_raw = lines.get(line1_idx + 1)?.trim();

    let line1 = pad_truncate(line1_raw);
    let line2 = pad_truncate(line2_raw);

    let (first_name, last_name, full_name) = parse_names(&line1)?;

    let passport_number = line2.get(0..9)?.replace('<', "").trim().to_string();
    let nationality = line2.get(10..13)?.to_string();
    let date_of_birth = parse_mrz_date(line2.get(13..19)?);
    let sex = line2.get(20..21)?.to_string();
    let expiry_date = parse_mrz_date(line2.get(21..27)?);

    Some(MrzRecord {
        passport_number,
        full_name,
        first_name,
        last_name,
        date_of_birth,
        nationality,
        sex,
        expiry_date,
        mrz_line1: line1,
        mrz_line2: line2,
    })
}

fn pad_truncate(line: &str) -> String {
    let mut s = line.to_string();
    while s.len() < LINE_WIDTH {
        s.push('<');
    }
    s.chars().take(LINE_WIDTH).collect()
}

/// Names field occupies columns 5..44 of line 1: surname, then `<<`, then
/// given names, all `<`-padded. The double-space separator (after `<` → ` `
/// replacement) splits surname from given names.
fn parse_names(line1: &str) -> Option<(String, String, String)> {
    let names_part = line1.get(5..44)?.replace('<', " ");
    let names_part = names_part.trim();
    let parts: Vec<&str> = names_part.split("  ").filter(|p| !p.is_empty()).collect();

    let last_name = parts.first().copied().unwrap_or("").trim().to_string();
    let first_name = if parts.len() > 1 {
        parts[1..].join(" ").trim().to_string()
    } else {
        String::new()
    };
    let full_name = format!("{} {}", first_name, last_name).trim().to_string();

    Some((first_name, last_name, full_name))
}

/// `YYMMDD` → `YYYY-MM-DD`, window: `YY <= 50 => 2000+YY else 1900+YY`.
fn parse_mrz_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 6 {
        return None;
    }
    let yy: i32 = raw.get(0..2)?.parse().ok()?;
    let mm: u32 = raw.get(2..4)?.parse().ok()?;
    let dd: u32 = raw.get(4..6)?.parse().ok()?;
    let yyyy = if yy <= 50 { 2000 + yy } else { 1900 + yy };
    NaiveDate::from_ymd_opt(yyyy, mm, dd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_passport() {
        let ocr = "\nP<LBNALHAJ<<ALI<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<\nAB1234567<LBN9001015M2501011<<<<<<<<<<<<<<06\n";
        let rec = parse(ocr).expect("should parse");
        assert_eq!(rec.passport_number, "AB1234567");
        assert_eq!(rec.full_name, "ALI ALHAJ");
        assert_eq!(rec.first_name, "ALI");
        assert_eq!(rec.last_name, "ALHAJ");
        assert_eq!(rec.nationality, "LBN");
        assert_eq!(rec.sex, "M");
        assert_eq!(rec.date_of_birth, NaiveDate::from_ymd_opt(1990, 1, 1));
    }

    #[test]
    fn no_p_line_returns_none() {
        assert!(parse("Some random text without MRZ").is_none());
    }

    #[test]
    fn missing_second_line_returns_none() {
        assert!(parse("P<LBNALHAJ<<ALI<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<").is_none());
    }

    #[test]
    fn mrz_date_century_window() {
        assert_eq!(parse_mrz_date("900101"), NaiveDate::from_ymd_opt(1990, 1, 1));
        assert_eq!(parse_mrz_date("250101"), NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(parse_mrz_date("500101"), NaiveDate::from_ymd_opt(2050, 1, 1));
        assert_eq!(parse_mrz_date("510101"), NaiveDate::from_ymd_opt(1951, 1, 1));
        assert_eq!(parse_mrz_date("invalid"), None);
    }

    #[test]
    fn lowercase_ocr_is_uppercased_before_matching() {
        let ocr = "p<lbnalhaj<<ali<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<\nab1234567<lbn9001015m2501011<<<<<<<<<<<<<<06\n";
        let rec = parse(ocr).expect("should parse lowercase OCR");
        assert_eq!(rec.passport_number, "AB1234567");
    }

    #[test]
    fn short_line_is_right_padded_with_fillers() {
        let ocr = "P<UTOSMITH<<JOHN\nAB12345<UTO9005054M3001012<<<<<<<<<<<<<<02";
        let rec = parse(ocr).expect("should parse even with a short line 1");
        assert_eq!(rec.last_name, "SMITH");
        assert_eq!(rec.first_name, "JOHN");
    }
}
