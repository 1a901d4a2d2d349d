//! Loading the department directory that drives a run.

use std::path::Path;

use tracing::debug;

use articulate_shared::{ArticulateError, DepartmentDirectory, Result};

/// Read and validate a department directory file (`assist-data.json`).
pub fn load_directory(path: &Path) -> Result<DepartmentDirectory> {
    let content = std::fs::read_to_string(path).map_err(|e| ArticulateError::io(path, e))?;

    let directory: DepartmentDirectory = serde_json::from_str(&content).map_err(|e| {
        ArticulateError::validation(format!("invalid directory file {}: {e}", path.display()))
    })?;
    directory.validate()?;

    debug!(
        path = %path.display(),
        departments = directory.departments.len(),
        year = directory.year,
        "department directory loaded"
    );
    Ok(directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("articulate-dir-{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&path, contents).expect("write temp directory file");
        path
    }

    #[test]
    fn loads_fixture() {
        let directory = load_directory(Path::new("../../../fixtures/json/assist-data.fixture.json"))
            .expect("load fixture");
        assert_eq!(directory.receiving_institution_id, 132);
        assert_eq!(directory.departments.len(), 2);
    }

    #[test]
    fn accepts_canonical_field_names() {
        let path = temp_file(r#"{"receiving_institution_id": 79, "year": 74, "departments": {"CSE": 5}}"#);
        let directory = load_directory(&path).expect("load");
        assert_eq!(directory.receiving_institution_id, 79);
        assert_eq!(directory.departments.get("CSE"), Some(&5));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_invalid_json() {
        let path = temp_file("{ not json");
        let err = load_directory(&path).unwrap_err();
        assert!(matches!(err, ArticulateError::Validation { .. }));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_empty_directory() {
        let path = temp_file(r#"{"ucsc_id": 132, "current_year": 75, "departments": {}}"#);
        let err = load_directory(&path).unwrap_err();
        assert!(err.to_string().contains("no departments"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_directory(Path::new("/nonexistent/assist-data.json")).unwrap_err();
        assert!(matches!(err, ArticulateError::Io { .. }));
    }
}
