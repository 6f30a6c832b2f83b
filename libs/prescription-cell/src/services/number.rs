use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use uuid::Uuid;

use crate::models::PrescriptionError;

const SUFFIX_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

static PRESCRIPTION_NO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^RX-\d{13,}-[0-9A-Z]{6}$").unwrap());

/// `RX-<unix-millis>-<6 uppercase base36>`. Uniqueness is enforced by the
/// store, not here.
pub fn generate_prescription_no() -> String {
    generate_at(Utc::now())
}

pub fn generate_at(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("RX-{}-{}", now.timestamp_millis(), suffix)
}

pub fn is_well_formed(prescription_no: &str) -> bool {
    PRESCRIPTION_NO.is_match(prescription_no)
}

/// A prescription as addressed in a URL: its row id, or the number the
/// farmer was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrescriptionRef {
    Id(Uuid),
    Number(String),
}

impl FromStr for PrescriptionRef {
    type Err = PrescriptionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Ok(id) = Uuid::parse_str(raw) {
            return Ok(PrescriptionRef::Id(id));
        }

        let number = raw.to_ascii_uppercase();
        if is_well_formed(&number) {
            Ok(PrescriptionRef::Number(number))
        } else {
            Err(PrescriptionError::ValidationError(format!("Invalid prescription reference: {}", raw)))
        }
    }
}
