//! Deterministic stand-in for the downstream browser-driven issuance system
//! (spec.md §4.6). The real driver is an external collaborator out of scope
//! here; this stub only needs to be stable enough for tests and demos.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A single-pixel PNG, good enough to prove a screenshot artifact exists.
const STUB_PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("failed to write screenshot: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct IssuanceResult {
    pub screenshot_path: PathBuf,
    pub screenshot_url: Option<String>,
    pub policy_number: String,
    pub timestamp: DateTime<Utc>,
}

/// Writes a stub screenshot for `case_id` under `screenshot_dir` and
/// synthesizes a policy number from its first 8 hex characters.
pub fn simulate(
    screenshot_dir: &Path,
    case_id: Uuid,
    now: DateTime<Utc>,
) -> Result<IssuanceResult, IssuanceError> {
    std::fs::create_dir_all(screenshot_dir)?;
    let filename = format!("issuance_{case_id}.png");
    let screenshot_path = screenshot_dir.join(filename);
    std::fs::write(&screenshot_path, STUB_PNG_BYTES)?;

    let policy_number = policy_number_for(case_id);

    Ok(IssuanceResult {
        screenshot_path,
        screenshot_url: None,
        policy_number,
        timestamp: now,
    })
}

pub fn policy_number_for(case_id: Uuid) -> String {
    let hyphenated = case_id.simple().to_string();
    format!("TP-{}", hyphenated[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn policy_number_is_tp_prefixed_first_eight_upper() {
        let id = Uuid::parse_str("ab12cd34-0000-0000-0000-000000000000").unwrap();
        assert_eq!(policy_number_for(id), "TP-AB12CD34");
    }

    #[test]
    fn simulate_writes_png_and_returns_policy_number() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::parse_str("deadbeef-0000-0000-0000-000000000000").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let result = simulate(dir.path(), id, now).unwrap();

        assert!(result.screenshot_path.exists());
        assert_eq!(result.policy_number, "TP-DEADBEEF");
        assert_eq!(result.screenshot_url, None);
        assert_eq!(result.timestamp, now);
    }
}
