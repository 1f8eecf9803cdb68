//! Dataset Import
//!
//! Turns source files into [`Records`] ready for registration:
//! - pipe-delimited course section exports (`.csv`, courses only)
//! - zip archives of section exports (`.zip`, courses only)
//! - JSON arrays of already-shaped records (`.json`, either kind)

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::dataset::error::{DatasetError, DatasetResult};
use crate::dataset::types::{CourseSection, DatasetKind, Records, Room};

/// Header line of a course section export
pub const COURSES_HEADER: [&str; 10] = [
    "Title", "id", "Professor", "Audit", "Year", "Course", "Pass", "Fail", "Avg", "Subject",
];

/// Local file header signature that opens every zip archive
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Result of parsing one course section export
#[derive(Debug, Default)]
pub struct CourseImport {
    pub sections: Vec<CourseSection>,
    pub rows_processed: usize,
    pub rows_skipped: usize,
}

/// Parse a pipe-delimited course section export.
///
/// Rows with the wrong number of fields or unparseable numbers are skipped and counted.
pub fn parse_courses_csv<R: Read>(reader: R) -> DatasetResult<CourseImport> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .quoting(false)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers()?;
    let matches_header = headers.len() == COURSES_HEADER.len()
        && headers
            .iter()
            .zip(COURSES_HEADER)
            .all(|(found, expected)| found.trim_end_matches('\r') == expected);
    if !matches_header {
        return Err(DatasetError::Import(format!(
            "unexpected header, expected {}",
            COURSES_HEADER.join("|")
        )));
    }

    let mut import = CourseImport {
        sections: Vec::new(),
        rows_processed: 0,
        rows_skipped: 0,
    };

    for result in rdr.records() {
        import.rows_processed += 1;

        let section = result
            .map_err(|e| e.to_string())
            .and_then(|record| section_from_record(&record));

        match section {
            Ok(section) => import.sections.push(section),
            Err(reason) => {
                tracing::debug!(row = import.rows_processed, %reason, "Skipping section row");
                import.rows_skipped += 1;
            }
        }
    }

    Ok(import)
}

fn section_from_record(record: &csv::StringRecord) -> Result<CourseSection, String> {
    if record.len() != COURSES_HEADER.len() {
        return Err(format!("expected 10 fields, found {}", record.len()));
    }

    let text = |i: usize| record.get(i).unwrap_or_default().trim_end_matches('\r').to_string();
    let number = |i: usize| {
        let raw = record.get(i).unwrap_or_default().trim();
        raw.parse::<f64>()
            .map_err(|_| format!("{} is not a number: {:?}", COURSES_HEADER[i], raw))
    };

    Ok(CourseSection {
        title: text(0),
        uuid: text(1),
        instructor: text(2),
        audit: number(3)?,
        year: number(4)?,
        id: text(5),
        pass: number(6)?,
        fail: number(7)?,
        avg: number(8)?,
        dept: text(9),
    })
}

/// Whether `bytes` look like a zip archive
pub fn is_zip_archive(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Parse a zip archive of course section exports.
///
/// Every file entry goes through [`parse_courses_csv`]; entries with the wrong header
/// or unreadable content are skipped. An archive without a single valid section is
/// rejected.
pub fn parse_courses_zip(bytes: &[u8]) -> DatasetResult<CourseImport> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DatasetError::Import(format!("invalid zip archive: {}", e)))?;

    let mut import = CourseImport::default();
    let mut files_used = 0;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| DatasetError::Import(format!("failed to read zip entry {}: {}", i, e)))?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let mut content = Vec::new();
        let parsed = entry
            .read_to_end(&mut content)
            .map_err(DatasetError::from)
            .and_then(|_| parse_courses_csv(content.as_slice()));

        match parsed {
            Ok(file) => {
                files_used += 1;
                import.rows_processed += file.rows_processed;
                import.rows_skipped += file.rows_skipped;
                import.sections.extend(file.sections);
            }
            Err(e) => tracing::debug!(entry = %name, "Skipping archive entry: {}", e),
        }
    }

    if import.sections.is_empty() {
        return Err(DatasetError::Import(
            "zip archive contains no valid course sections".to_string(),
        ));
    }

    tracing::debug!(
        files = files_used,
        sections = import.sections.len(),
        "Parsed course archive"
    );
    Ok(import)
}

/// Parse an uploaded dataset body: a course zip archive, or a JSON array of records
pub fn parse_upload(kind: DatasetKind, bytes: &[u8]) -> DatasetResult<Records> {
    if !is_zip_archive(bytes) {
        return parse_records_json(kind, bytes);
    }
    if kind != DatasetKind::Courses {
        return Err(DatasetError::Import(format!(
            "zip archives hold course sections, not {}",
            kind
        )));
    }

    let import = parse_courses_zip(bytes)?;
    warn_skipped(&import, "upload");
    Ok(Records::Courses(import.sections))
}

fn warn_skipped(import: &CourseImport, source: &str) {
    if import.rows_skipped > 0 {
        tracing::warn!(
            "Skipped {} of {} rows in {}",
            import.rows_skipped,
            import.rows_processed,
            source
        );
    }
}

/// Parse a JSON array of records of the given kind
pub fn parse_records_json(kind: DatasetKind, bytes: &[u8]) -> DatasetResult<Records> {
    Ok(match kind {
        DatasetKind::Courses => Records::Courses(serde_json::from_slice::<Vec<CourseSection>>(bytes)?),
        DatasetKind::Rooms => Records::Rooms(serde_json::from_slice::<Vec<Room>>(bytes)?),
    })
}

/// Read and concatenate every source file into one record collection
pub async fn import_files(kind: DatasetKind, paths: &[PathBuf]) -> DatasetResult<Records> {
    let mut records = match kind {
        DatasetKind::Courses => Records::Courses(Vec::new()),
        DatasetKind::Rooms => Records::Rooms(Vec::new()),
    };

    for path in paths {
        let bytes = tokio::fs::read(path).await?;
        let parsed = match extension(path).as_deref() {
            Some("csv") if kind == DatasetKind::Courses => {
                let import = parse_courses_csv(bytes.as_slice())?;
                warn_skipped(&import, &path.display().to_string());
                Records::Courses(import.sections)
            }
            Some("zip") if kind == DatasetKind::Courses => {
                let import = parse_courses_zip(&bytes)?;
                warn_skipped(&import, &path.display().to_string());
                Records::Courses(import.sections)
            }
            Some("json") => parse_records_json(kind, &bytes)?,
            _ => {
                return Err(DatasetError::Import(format!(
                    "unsupported source file for {} dataset: {:?}",
                    kind, path
                )))
            }
        };

        match (&mut records, parsed) {
            (Records::Courses(all), Records::Courses(more)) => all.extend(more),
            (Records::Rooms(all), Records::Rooms(more)) => all.extend(more),
            _ => return Err(DatasetError::Import(format!("mixed record kinds in {:?}", path))),
        }
    }

    Ok(records)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::course_archive;
    use tempfile::tempdir;

    const SAMPLE: &str = "Title|id|Professor|Audit|Year|Course|Pass|Fail|Avg|Subject\n\
        intr sftwr eng|1234|holmes, reid|0|2015|310|120|3|78.5|cpsc\n\
        intr sftwr eng|1235|holmes, reid|1|2016|310|98|2|81.25|cpsc\r\n\
        broken row|with|too|few\n\
        algebra|9|lee, ann|0|twenty|200|10|0|70|math\n";

    #[test]
    fn test_parse_courses_csv() {
        let import = parse_courses_csv(SAMPLE.as_bytes()).unwrap();

        assert_eq!(import.rows_processed, 4);
        assert_eq!(import.rows_skipped, 2);
        assert_eq!(import.sections.len(), 2);

        let first = &import.sections[0];
        assert_eq!(first.dept, "cpsc");
        assert_eq!(first.id, "310");
        assert_eq!(first.uuid, "1234");
        assert_eq!(first.instructor, "holmes, reid");
        assert_eq!(first.avg, 78.5);
        assert_eq!(first.year, 2015.0);

        assert_eq!(import.sections[1].dept, "cpsc");
        assert_eq!(import.sections[1].avg, 81.25);
    }

    #[test]
    fn test_parse_courses_zip() {
        let archive = course_archive(&[
            ("courses/CPSC310", SAMPLE),
            ("courses/README", "not a section export\n"),
            (
                "courses/MATH200",
                "Title|id|Professor|Audit|Year|Course|Pass|Fail|Avg|Subject\n\
                 algebra|77|lee, ann|0|2014|200|40|4|71.5|math\n",
            ),
        ]);
        assert!(is_zip_archive(&archive));

        let import = parse_courses_zip(&archive).unwrap();
        assert_eq!(import.sections.len(), 3);
        assert_eq!(import.rows_processed, 5);
        assert_eq!(import.rows_skipped, 2);
        assert!(import.sections.iter().any(|s| s.dept == "math" && s.uuid == "77"));
    }

    #[test]
    fn test_parse_courses_zip_without_sections() {
        let archive = course_archive(&[("courses/README", "nothing here\n")]);
        let err = parse_courses_zip(&archive).unwrap_err();
        assert!(matches!(err, DatasetError::Import(_)));

        let err = parse_courses_zip(b"PK\x03\x04 truncated").unwrap_err();
        assert!(matches!(err, DatasetError::Import(_)));
    }

    #[test]
    fn test_parse_upload() {
        let archive = course_archive(&[("courses/CPSC310", SAMPLE)]);
        assert_eq!(parse_upload(DatasetKind::Courses, &archive).unwrap().len(), 2);

        let err = parse_upload(DatasetKind::Rooms, &archive).unwrap_err();
        assert!(matches!(err, DatasetError::Import(_)));

        let json = serde_json::to_vec(&vec![crate::dataset::fixtures::section("math", "100", 66.0)]).unwrap();
        assert_eq!(parse_upload(DatasetKind::Courses, &json).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_courses_csv_wrong_header() {
        let err = parse_courses_csv("a|b|c\n1|2|3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::Import(_)));
    }

    #[test]
    fn test_parse_records_json() {
        let json = r#"[{"fullname":"Hugh Dempster Pavilion","shortname":"DMP","number":"110",
            "name":"DMP_110","address":"6245 Agronomy Road V6T 1Z4","seats":120,
            "lat":49.26125,"lon":-123.24807,"type":"Tiered Large Group",
            "furniture":"Classroom-Fixed Tables/Movable Chairs","href":"http://x/DMP-110"}]"#;

        let records = parse_records_json(DatasetKind::Rooms, json.as_bytes()).unwrap();
        match records {
            Records::Rooms(rooms) => {
                assert_eq!(rooms.len(), 1);
                assert_eq!(rooms[0].seats, 120.0);
                assert_eq!(rooms[0].r#type, "Tiered Large Group");
            }
            other => panic!("expected rooms, got {:?}", other.kind()),
        }

        assert!(parse_records_json(DatasetKind::Courses, json.as_bytes()).is_err());
    }

    #[tokio::test]
    async fn test_import_files() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("CPSC310.csv");
        let b = dir.path().join("extra.json");
        std::fs::write(&a, SAMPLE).unwrap();
        let extra = vec![crate::dataset::fixtures::section("math", "100", 66.0)];
        std::fs::write(&b, serde_json::to_vec(&extra).unwrap()).unwrap();

        let c = dir.path().join("courses.zip");
        std::fs::write(&c, course_archive(&[("courses/CPSC310", SAMPLE)])).unwrap();

        let records = import_files(DatasetKind::Courses, &[a.clone(), b, c.clone()]).await.unwrap();
        assert_eq!(records.len(), 5);

        let err = import_files(DatasetKind::Rooms, &[c]).await.unwrap_err();
        assert!(matches!(err, DatasetError::Import(_)));

        let err = import_files(DatasetKind::Rooms, &[a]).await.unwrap_err();
        assert!(matches!(err, DatasetError::Import(_)));
    }
}
