use ndarray::{Array2, Axis};
use serde::Serialize;

use crate::model::{RiskLevel, ScoredStudent, StudentFeatures};

const UNASSIGNED_CLASS: &str = "Unassigned";
const DEFAULT_AT_RISK_LIMIT: usize = 5;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CohortOverview {
    pub total_students: usize,
    pub high_risk_count: usize,
    pub avg_attendance: f64,
    pub avg_score: f64,
    pub mean_features: StudentFeatures,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskBucket {
    pub level: RiskLevel,
    pub count: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AttendanceBucket {
    pub range: String,
    pub count: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub class: String,
    pub students: usize,
    pub avg_marks: f64,
    pub attendance: f64,
    pub assignments: f64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CohortReport {
    pub overview: CohortOverview,
    pub risk_distribution: Vec<RiskBucket>,
    pub attendance_distribution: Vec<AttendanceBucket>,
    pub class_comparison: Vec<ClassSummary>,
    pub at_risk_students: Vec<ScoredStudent>,
}

pub struct CohortAnalyzer {
    at_risk_limit: usize,
}

impl Default for CohortAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CohortAnalyzer {
    pub fn new() -> Self {
        CohortAnalyzer {
            at_risk_limit: DEFAULT_AT_RISK_LIMIT,
        }
    }

    pub fn with_at_risk_limit(at_risk_limit: usize) -> Self {
        CohortAnalyzer { at_risk_limit }
    }

    pub fn report(&self, students: &[ScoredStudent]) -> CohortReport {
        CohortReport {
            overview: self.overview(students),
            risk_distribution: self.risk_distribution(students),
            attendance_distribution: self.attendance_distribution(students),
            class_comparison: self.class_comparison(students),
            at_risk_students: self.at_risk_students(students),
        }
    }

    pub fn overview(&self, students: &[ScoredStudent]) -> CohortOverview {
        let mean = mean_features(students);
        let avg_score = if students.is_empty() {
            0.0
        } else {
            students.iter().map(|s| s.prediction.score).sum::<f64>() / students.len() as f64
        };

        CohortOverview {
            total_students: students.len(),
            high_risk_count: students
                .iter()
                .filter(|s| s.prediction.risk_level == RiskLevel::High)
                .count(),
            avg_attendance: round_half_up(mean.attendance),
            avg_score,
            mean_features: mean,
        }
    }

    /// All four levels, best to worst, including empty ones.
    pub fn risk_distribution(&self, students: &[ScoredStudent]) -> Vec<RiskBucket> {
        RiskLevel::ALL
            .iter()
            .map(|&level| RiskBucket {
                level,
                count: students.iter().filter(|s| s.prediction.risk_level == level).count(),
            })
            .collect()
    }

    pub fn attendance_distribution(&self, students: &[ScoredStudent]) -> Vec<AttendanceBucket> {
        let ranges: [(&str, f64, f64); 5] = [
            ("90-100%", 90.0, f64::INFINITY),
            ("80-89%", 80.0, 90.0),
            ("70-79%", 70.0, 80.0),
            ("60-69%", 60.0, 70.0),
            ("<60%", f64::NEG_INFINITY, 60.0),
        ];

        ranges
            .iter()
            .map(|&(range, low, high)| AttendanceBucket {
                range: range.to_string(),
                count: students
                    .iter()
                    .filter(|s| {
                        let a = s.record.features.attendance;
                        a >= low && a < high
                    })
                    .count(),
            })
            .collect()
    }

    /// Per-class rounded means, in first-seen class order.
    pub fn class_comparison(&self, students: &[ScoredStudent]) -> Vec<ClassSummary> {
        let mut classes: Vec<(String, Vec<StudentFeatures>)> = Vec::new();

        for student in students {
            let class = student
                .record
                .class_name
                .clone()
                .unwrap_or_else(|| UNASSIGNED_CLASS.to_string());
            match classes.iter_mut().find(|(name, _)| *name == class) {
                Some((_, members)) => members.push(student.record.features),
                None => classes.push((class, vec![student.record.features])),
            }
        }

        classes
            .into_iter()
            .map(|(class, members)| {
                let mean = mean_of(&members);
                ClassSummary {
                    class,
                    students: members.len(),
                    avg_marks: round_half_up(mean.avg_marks),
                    attendance: round_half_up(mean.attendance),
                    assignments: round_half_up(mean.assignment_completion),
                }
            })
            .collect()
    }

    /// Medium and High students, highest risk probability first.
    pub fn at_risk_students(&self, students: &[ScoredStudent]) -> Vec<ScoredStudent> {
        let mut at_risk: Vec<ScoredStudent> = students
            .iter()
            .filter(|s| s.prediction.risk_level.is_at_risk())
            .cloned()
            .collect();
        at_risk.sort_by(|a, b| b.prediction.risk_probability.cmp(&a.prediction.risk_probability));
        at_risk.truncate(self.at_risk_limit);
        at_risk
    }
}

fn mean_features(students: &[ScoredStudent]) -> StudentFeatures {
    let features: Vec<StudentFeatures> = students.iter().map(|s| s.record.features).collect();
    mean_of(&features)
}

fn mean_of(features: &[StudentFeatures]) -> StudentFeatures {
    let matrix = Array2::from_shape_fn((features.len(), 4), |(i, j)| {
        let f = &features[i];
        match j {
            0 => f.attendance,
            1 => f.avg_marks,
            2 => f.assignment_completion,
            _ => f.behavior_score,
        }
    });

    match matrix.mean_axis(Axis(0)) {
        Some(mean) => StudentFeatures::new(mean[0], mean[1], mean[2], mean[3]),
        None => StudentFeatures::new(0.0, 0.0, 0.0, 0.0),
    }
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StudentRecord;
    use crate::model::RiskModel;

    fn student(name: &str, class: Option<&str>, features: StudentFeatures) -> StudentRecord {
        StudentRecord {
            name: Some(name.to_string()),
            roll_no: None,
            class_name: class.map(str::to_string),
            student_email: None,
            features,
        }
    }

    fn cohort() -> Vec<ScoredStudent> {
        RiskModel::default().score_records(vec![
            student("Arjun", Some("10-A"), StudentFeatures::new(92.0, 85.0, 95.0, 9.0)),
            student("Pooja", Some("10-B"), StudentFeatures::new(60.0, 45.0, 50.0, 5.0)),
            student("Karan", Some("10-A"), StudentFeatures::new(85.0, 78.0, 82.0, 8.0)),
            student("Ravi", None, StudentFeatures::new(55.0, 42.0, 40.0, 4.0)),
            student("Neha", Some("10-B"), StudentFeatures::new(75.0, 65.0, 70.0, 6.0)),
        ])
    }

    #[test]
    fn distribution_covers_every_level() {
        let analyzer = CohortAnalyzer::new();
        let dist = analyzer.risk_distribution(&cohort());

        assert_eq!(dist.len(), 4);
        assert_eq!(dist.iter().map(|b| b.count).sum::<usize>(), 5);
        assert_eq!(dist[0].level, RiskLevel::VeryLow);
        assert_eq!(dist[3].level, RiskLevel::High);
        // 89.5, 80.85, 67.75 and 50.5, 44.55
        let counts: Vec<usize> = dist.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 2, 1]);
    }

    #[test]
    fn attendance_buckets_are_half_open() {
        let analyzer = CohortAnalyzer::new();
        let buckets = analyzer.attendance_distribution(&cohort());
        let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
        // 92 | 85 | 75 | 60 | 55
        assert_eq!(counts, vec![1, 1, 1, 1, 1]);
        assert_eq!(buckets[4].range, "<60%");
    }

    #[test]
    fn classes_keep_first_seen_order() {
        let analyzer = CohortAnalyzer::new();
        let classes = analyzer.class_comparison(&cohort());

        let names: Vec<&str> = classes.iter().map(|c| c.class.as_str()).collect();
        assert_eq!(names, vec!["10-A", "10-B", UNASSIGNED_CLASS]);
        assert_eq!(classes[0].students, 2);
        // (85 + 78) / 2 = 81.5
        assert_eq!(classes[0].avg_marks, 82.0);
        assert_eq!(classes[1].attendance, 68.0);
    }

    #[test]
    fn at_risk_sorted_by_probability() {
        let analyzer = CohortAnalyzer::with_at_risk_limit(2);
        let at_risk = analyzer.at_risk_students(&cohort());

        assert_eq!(at_risk.len(), 2);
        assert_eq!(at_risk[0].record.name.as_deref(), Some("Ravi"));
        assert_eq!(at_risk[1].record.name.as_deref(), Some("Pooja"));
        assert!(at_risk
            .windows(2)
            .all(|w| w[0].prediction.risk_probability >= w[1].prediction.risk_probability));
    }

    #[test]
    fn overview_of_empty_cohort() {
        let overview = CohortAnalyzer::new().overview(&[]);
        assert_eq!(overview.total_students, 0);
        assert_eq!(overview.avg_attendance, 0.0);
        assert_eq!(overview.mean_features, StudentFeatures::new(0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn overview_means() {
        let overview = CohortAnalyzer::new().overview(&cohort());
        assert_eq!(overview.total_students, 5);
        assert_eq!(overview.high_risk_count, 1);
        // (92 + 60 + 85 + 55 + 75) / 5 = 73.4
        assert_eq!(overview.avg_attendance, 73.0);
        assert!((overview.mean_features.behavior_score - 6.4).abs() < 1e-9);
    }
}
