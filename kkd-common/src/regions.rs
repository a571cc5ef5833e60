//! Region codes
//!
//! Users and posts carry a `local_id` identifying one of the provincial-level
//! administrative regions. Board filtering and profile pages use this table.

use crate::error::{Error, Result};

/// Display name used when a stored code is not in the table
pub const UNKNOWN_REGION: &str = "알 수 없음";

/// (code, name) pairs, codes are stable once assigned
pub const REGIONS: &[(i64, &str)] = &[
    (1, "서울특별시"),
    (2, "부산광역시"),
    (3, "대구광역시"),
    (4, "인천광역시"),
    (5, "광주광역시"),
    (6, "대전광역시"),
    (7, "울산광역시"),
    (8, "세종특별자치시"),
    (9, "경기도"),
    (10, "강원특별자치도"),
    (11, "충청북도"),
    (12, "충청남도"),
    (13, "전북특별자치도"),
    (14, "전라남도"),
    (15, "경상북도"),
    (16, "경상남도"),
    (17, "제주특별자치도"),
];

/// Look up the region name for a code
pub fn region_name(local_id: i64) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(code, _)| *code == local_id)
        .map(|(_, name)| *name)
}

/// Region name, falling back to [`UNKNOWN_REGION`]
pub fn region_name_or_unknown(local_id: i64) -> &'static str {
    region_name(local_id).unwrap_or(UNKNOWN_REGION)
}

/// Region name, or [`Error::UnknownRegion`] for an unassigned code
pub fn require_region(local_id: i64) -> Result<&'static str> {
    region_name(local_id).ok_or(Error::UnknownRegion(local_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(region_name(1), Some("서울특별시"));
        assert_eq!(region_name(17), Some("제주특별자치도"));
        assert!(require_region(9).is_ok());
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(region_name(0), None);
        assert_eq!(region_name(18), None);
        assert!(require_region(-1).is_err());
        assert_eq!(region_name_or_unknown(99), UNKNOWN_REGION);
        assert!(matches!(require_region(18), Err(Error::UnknownRegion(18))));
        assert_eq!(require_region(15).unwrap(), "경상북도");
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<i64> = REGIONS.iter().map(|(c, _)| *c).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), REGIONS.len());
    }
}
