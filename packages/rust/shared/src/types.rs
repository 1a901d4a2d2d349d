//! Core domain types for course articulation data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ArticulateError, Result};

// ---------------------------------------------------------------------------
// Institution
// ---------------------------------------------------------------------------

/// A sending institution as listed by the transfer API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    /// Upstream numeric identifier.
    pub id: u32,
    /// Display name (first listed name upstream).
    pub name: String,
}

// ---------------------------------------------------------------------------
// Course equivalence
// ---------------------------------------------------------------------------

/// A course at a sending institution that satisfies a home course.
///
/// This is the record persisted in the output document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EquivalentCourse {
    /// Department prefix, e.g. `MATH`.
    pub dept_code: String,
    /// Course number, e.g. `1A`.
    pub number: String,
    /// Course title; empty when upstream omits it.
    pub title: String,
    /// Name of the institution offering the course.
    pub institution_name: String,
}

/// One extracted fact: `home_course_code` is satisfied by `equivalent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEquivalenceFact {
    /// Home course code, formatted as `"PREFIX NUMBER"`.
    pub home_course_code: String,
    /// The sending-side course.
    pub equivalent: EquivalentCourse,
}

/// How the equivalence map treats an entry it has already recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupPolicy {
    /// Append every fact, repeats included.
    #[default]
    Accumulate,
    /// Drop a fact whose entry is already listed under the same home course.
    Distinct,
}

impl std::fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accumulate => f.write_str("accumulate"),
            Self::Distinct => f.write_str("distinct"),
        }
    }
}

// ---------------------------------------------------------------------------
// Query plan
// ---------------------------------------------------------------------------

/// The `assist-data.json` structure driving which agreements are queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentDirectory {
    /// The home (receiving) institution id.
    #[serde(alias = "ucsc_id")]
    pub receiving_institution_id: u32,
    /// Academic year id used in agreement keys.
    #[serde(alias = "current_year")]
    pub year: u32,
    /// Department code → upstream department id.
    pub departments: BTreeMap<String, u32>,
}

impl DepartmentDirectory {
    /// Check that the directory can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.receiving_institution_id == 0 {
            return Err(ArticulateError::validation(
                "receiving_institution_id must be positive",
            ));
        }
        if self.year == 0 {
            return Err(ArticulateError::validation("year must be positive"));
        }
        if self.departments.is_empty() {
            return Err(ArticulateError::validation("no departments listed"));
        }
        if let Some((code, _)) = self.departments.iter().find(|(_, id)| **id == 0) {
            return Err(ArticulateError::validation(format!(
                "department {code} has an invalid id 0"
            )));
        }
        Ok(())
    }
}

/// Identifies one agreement request upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgreementKey {
    pub year: u32,
    pub sending_institution_id: u32,
    pub receiving_institution_id: u32,
    pub department_id: u32,
}

impl std::fmt::Display for AgreementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/to/{}/Department/{}",
            self.year,
            self.sending_institution_id,
            self.receiving_institution_id,
            self.department_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_key_format() {
        let key = AgreementKey {
            year: 74,
            sending_institution_id: 113,
            receiving_institution_id: 132,
            department_id: 11,
        };
        assert_eq!(key.to_string(), "74/113/to/132/Department/11");
    }

    #[test]
    fn equivalent_course_serialization() {
        let course = EquivalentCourse {
            dept_code: "MATH".into(),
            number: "1A".into(),
            title: "Calculus I".into(),
            institution_name: "Foothill College".into(),
        };
        let json = serde_json::to_value(&course).expect("serialize");
        assert_eq!(json["dept_code"], "MATH");
        assert_eq!(json["institution_name"], "Foothill College");

        let parsed: EquivalentCourse = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, course);
    }

    #[test]
    fn fact_serializes_with_nested_course() {
        let fact = CourseEquivalenceFact {
            home_course_code: "MATH 19A".into(),
            equivalent: EquivalentCourse {
                dept_code: "MATH".into(),
                number: "1A".into(),
                title: String::new(),
                institution_name: "Foothill College".into(),
            },
        };
        let json = serde_json::to_value(&fact).expect("serialize");
        assert_eq!(json["home_course_code"], "MATH 19A");
        assert_eq!(json["equivalent"]["number"], "1A");
        assert_eq!(json["equivalent"]["title"], "");
    }

    #[test]
    fn dedup_policy_serde_names() {
        assert_eq!(
            serde_json::to_string(&DedupPolicy::Distinct).expect("serialize"),
            "\"distinct\""
        );
        let parsed: DedupPolicy = serde_json::from_str("\"accumulate\"").expect("deserialize");
        assert_eq!(parsed, DedupPolicy::Accumulate);
        assert_eq!(DedupPolicy::default().to_string(), "accumulate");
    }

    #[test]
    fn directory_fixture_validates() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/assist-data.fixture.json")
            .expect("read fixture");
        let parsed: DepartmentDirectory =
            serde_json::from_str(&fixture).expect("deserialize fixture directory");
        parsed.validate().expect("fixture is valid");
        assert_eq!(parsed.receiving_institution_id, 132);
        assert_eq!(parsed.year, 75);
        assert_eq!(parsed.departments.get("MATH"), Some(&11));
    }

    #[test]
    fn directory_rejects_empty_departments() {
        let dir = DepartmentDirectory {
            receiving_institution_id: 132,
            year: 75,
            departments: BTreeMap::new(),
        };
        let err = dir.validate().unwrap_err();
        assert!(err.to_string().contains("no departments"));
    }

    #[test]
    fn directory_rejects_zero_department_id() {
        let dir = DepartmentDirectory {
            receiving_institution_id: 132,
            year: 75,
            departments: BTreeMap::from([("FREN".to_string(), 0)]),
        };
        let err = dir.validate().unwrap_err();
        assert!(err.to_string().contains("FREN"));
    }
}
