//! Tabular import: delimited text to headered rows, heuristic column mapping,
//! and conversion of mapped rows into typed student records.
//!
//! Conversion happens in two stages. Each row is first keyed by canonical
//! field as raw strings, then coerced into a [`StudentRecord`] under the
//! configured [`ParseFailurePolicy`] and [`InputPolicy`](crate::config::InputPolicy).

use csv::ReaderBuilder;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{ImportOptions, ParseFailurePolicy};
use crate::error::{Result, RiskError};
use crate::model::StudentFeatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Name,
    RollNo,
    Class,
    StudentEmail,
    Attendance,
    AvgMarks,
    AssignmentCompletion,
    BehaviorScore,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Name,
        CanonicalField::RollNo,
        CanonicalField::Class,
        CanonicalField::StudentEmail,
        CanonicalField::Attendance,
        CanonicalField::AvgMarks,
        CanonicalField::AssignmentCompletion,
        CanonicalField::BehaviorScore,
    ];

    pub const FEATURES: [CanonicalField; 4] = [
        CanonicalField::Attendance,
        CanonicalField::AvgMarks,
        CanonicalField::AssignmentCompletion,
        CanonicalField::BehaviorScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Name => "name",
            CanonicalField::RollNo => "rollNo",
            CanonicalField::Class => "class",
            CanonicalField::StudentEmail => "studentEmail",
            CanonicalField::Attendance => "attendance",
            CanonicalField::AvgMarks => "avgMarks",
            CanonicalField::AssignmentCompletion => "assignmentCompletion",
            CanonicalField::BehaviorScore => "behaviorScore",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parse comma-separated text. The first non-blank line is the header row.
/// Each line is tokenized on its own: commas inside double quotes do not
/// split a field, one enclosing pair of quotes is stripped, and a quote never
/// spans a line break.
pub fn parse_delimited_text(raw: &str) -> Result<ImportTable> {
    let mut lines = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let cells = tokenize_line(line)?;
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        lines.push(cells);
    }

    let mut lines = lines.into_iter();
    let headers = lines.next().unwrap_or_default();
    let rows: Vec<Vec<String>> = lines.collect();
    debug!("parsed {} columns, {} rows", headers.len(), rows.len());

    Ok(ImportTable { headers, rows })
}

fn tokenize_line(line: &str) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(|c| c.trim().to_string()).collect()),
        None => Ok(Vec::new()),
    }
}

/// Header (exactly as it appears in the header row) to canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    fields: HashMap<String, CanonicalField>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, header: &str) -> Option<CanonicalField> {
        self.fields.get(header).copied()
    }

    pub fn assign(&mut self, header: impl Into<String>, field: CanonicalField) {
        self.fields.insert(header.into(), field);
    }

    pub fn unassign(&mut self, header: &str) -> Option<CanonicalField> {
        self.fields.remove(header)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn maps_to(&self, field: CanonicalField) -> bool {
        self.fields.values().any(|f| *f == field)
    }

    /// Headers with no assignment, in header order.
    pub fn unmapped<S: AsRef<str>>(&self, headers: &[S]) -> Vec<String> {
        headers
            .iter()
            .map(|h| h.as_ref())
            .filter(|h| !self.fields.contains_key(*h))
            .map(str::to_string)
            .collect()
    }

    /// Numeric features that no header maps to.
    pub fn missing_features(&self) -> Vec<CanonicalField> {
        CanonicalField::FEATURES
            .iter()
            .copied()
            .filter(|f| !self.maps_to(*f))
            .collect()
    }
}

/// Keyword heuristic; the first matching rule wins for each header. The
/// marks rule is skipped once another header already maps to `avgMarks`.
pub fn auto_map_fields<S: AsRef<str>>(headers: &[S]) -> FieldMapping {
    let mut mapping = FieldMapping::new();

    for header in headers {
        let header = header.as_ref();
        let key: String = header
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if let Some(field) = match_header(&key, mapping.maps_to(CanonicalField::AvgMarks)) {
            debug!("auto-mapped {header:?} -> {field}");
            mapping.assign(header, field);
        }
    }

    mapping
}

fn match_header(key: &str, avg_marks_taken: bool) -> Option<CanonicalField> {
    let has = |needle: &str| key.contains(needle);

    if has("name") && !has("email") {
        Some(CanonicalField::Name)
    } else if has("roll") || has("id") {
        Some(CanonicalField::RollNo)
    } else if has("class") || has("grade") {
        Some(CanonicalField::Class)
    } else if has("email") {
        Some(CanonicalField::StudentEmail)
    } else if has("attendance") {
        Some(CanonicalField::Attendance)
    } else if (has("avg") || has("mark") || has("score")) && !avg_marks_taken {
        Some(CanonicalField::AvgMarks)
    } else if has("assignment") || has("completion") {
        Some(CanonicalField::AssignmentCompletion)
    } else if has("behavior") || has("behaviour") {
        Some(CanonicalField::BehaviorScore)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub name: Option<String>,
    pub roll_no: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub student_email: Option<String>,
    pub features: StudentFeatures,
}

impl StudentRecord {
    /// `row` is the 1-based data row number used in error messages.
    fn from_raw(row: usize, raw: &HashMap<CanonicalField, &str>, options: &ImportOptions) -> Result<Self> {
        let text = |field: CanonicalField| {
            raw.get(&field)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let number = |field: CanonicalField| coerce(row, field, raw.get(&field).copied(), options.parse_failure);

        let features = StudentFeatures {
            attendance: number(CanonicalField::Attendance)?,
            avg_marks: number(CanonicalField::AvgMarks)?,
            assignment_completion: number(CanonicalField::AssignmentCompletion)?,
            behavior_score: number(CanonicalField::BehaviorScore)?,
        }
        .normalize(options.input_policy)?;

        Ok(Self {
            name: text(CanonicalField::Name),
            roll_no: text(CanonicalField::RollNo),
            class_name: text(CanonicalField::Class),
            student_email: text(CanonicalField::StudentEmail),
            features,
        })
    }
}

fn coerce(row: usize, field: CanonicalField, cell: Option<&str>, policy: ParseFailurePolicy) -> Result<f64> {
    let cell = cell.map(str::trim).filter(|c| !c.is_empty());

    let Some(cell) = cell else {
        return match policy {
            ParseFailurePolicy::UseZero => Ok(0.0),
            ParseFailurePolicy::UseDefault(value) => Ok(value),
            ParseFailurePolicy::Reject => Err(RiskError::MissingField {
                row,
                field: field.as_str(),
            }),
        };
    };

    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => match policy {
            ParseFailurePolicy::UseZero => {
                warn!("row {row}: {field} value {cell:?} is not a number, using 0");
                Ok(0.0)
            }
            ParseFailurePolicy::UseDefault(value) => {
                warn!("row {row}: {field} value {cell:?} is not a number, using {value}");
                Ok(value)
            }
            ParseFailurePolicy::Reject => Err(RiskError::InvalidCell {
                row,
                field: field.as_str(),
                value: cell.to_string(),
            }),
        },
    }
}

impl ImportTable {
    /// Key one row by canonical field. The first column mapped to a field wins.
    fn raw_row<'a>(&self, mapping: &FieldMapping, cells: &'a [String]) -> HashMap<CanonicalField, &'a str> {
        let mut raw = HashMap::new();
        for (header, cell) in self.headers.iter().zip(cells) {
            if let Some(field) = mapping.get(header) {
                raw.entry(field).or_insert(cell.as_str());
            }
        }
        raw
    }

    pub fn records(&self, mapping: &FieldMapping, options: &ImportOptions) -> Result<Vec<StudentRecord>> {
        let missing = mapping.missing_features();
        if !missing.is_empty() {
            warn!("no column mapped for {missing:?}");
        }

        let records = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, cells)| StudentRecord::from_raw(i + 1, &self.raw_row(mapping, cells), options))
            .collect::<Result<Vec<_>>>()?;

        info!("converted {} import rows", records.len());
        Ok(records)
    }
}
