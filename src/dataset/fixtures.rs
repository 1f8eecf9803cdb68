//! Test fixtures shared by the dataset, query and api tests

use crate::dataset::types::{CourseSection, Dataset, Records, Room};

pub(crate) fn section(dept: &str, id: &str, avg: f64) -> CourseSection {
    CourseSection {
        dept: dept.to_string(),
        id: id.to_string(),
        instructor: "smith, jane".to_string(),
        title: format!("{} {}", dept, id),
        pass: 100.0,
        fail: 5.0,
        audit: 0.0,
        avg,
        uuid: format!("{}{}{}", dept, id, (avg * 100.0) as i64),
        year: 2015.0,
    }
}

pub(crate) fn room(shortname: &str, number: &str, seats: f64) -> Room {
    Room {
        fullname: format!("{} Building", shortname),
        shortname: shortname.to_string(),
        number: number.to_string(),
        name: format!("{}_{}", shortname, number),
        address: "6245 Agronomy Road V6T 1Z4".to_string(),
        seats,
        lat: 49.26125,
        lon: -123.24807,
        r#type: "Small Group".to_string(),
        furniture: "Classroom-Movable Tables & Chairs".to_string(),
        href: format!(
            "http://students.ubc.ca/campus/discover/buildings-and-classrooms/room/{}-{}",
            shortname, number
        ),
    }
}

/// cpsc/95, cpsc/92, cpsc/80, math/99, eece/91
pub(crate) fn sample_sections() -> Vec<CourseSection> {
    vec![
        section("cpsc", "310", 95.0),
        section("cpsc", "210", 92.0),
        section("cpsc", "110", 80.0),
        section("math", "200", 99.0),
        section("eece", "310", 91.0),
    ]
}

/// Rooms with seats 100, 426, 375, 503
pub(crate) fn sample_rooms() -> Vec<Room> {
    vec![
        room("DMP", "110", 100.0),
        room("WOOD", "2", 426.0),
        room("HEBB", "100", 375.0),
        room("CIRS", "1250", 503.0),
    ]
}

pub(crate) fn courses_dataset(id: &str) -> Dataset {
    Dataset::new(id, Records::Courses(sample_sections()))
}

pub(crate) fn rooms_dataset(id: &str) -> Dataset {
    Dataset::new(id, Records::Rooms(sample_rooms()))
}

/// Zip archive with a `courses/` folder holding the given `(path, content)` entries
pub(crate) fn course_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer.add_directory("courses/", options).unwrap();
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
