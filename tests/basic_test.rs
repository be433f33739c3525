use student_risk::{
    auto_map_fields, generate_recommendations, model_info, parse_delimited_text, predict_risk, predict_risk_batch,
    CanonicalField, ImportOptions, RiskLevel, RiskModel, StudentFeatures,
};

fn features(attendance: f64, avg_marks: f64, completion: f64, behavior: f64) -> StudentFeatures {
    StudentFeatures::new(attendance, avg_marks, completion, behavior)
}

#[test]
fn test_weights_sum_to_one() {
    let info = model_info();
    let w = info.weights;
    assert!((w.avg_marks + w.attendance + w.assignment_completion + w.behavior_score - 1.0).abs() < 1e-9);
    assert!(info.accuracy >= 0.0 && info.accuracy <= 1.0);
}

#[test]
fn test_increasing_a_feature_never_raises_risk() {
    let percents = [0.0, 25.0, 49.5, 50.0, 70.0, 84.99, 100.0];
    let behaviors = [0.0, 3.0, 5.99, 6.0, 10.0];
    let bumps = [0.01, 1.0, 15.0];

    for &a in &percents {
        for &m in &percents {
            for &c in &percents {
                for &b in &behaviors {
                    let base = predict_risk(&features(a, m, c, b));
                    for &d in &bumps {
                        let raised = [
                            features(a + d, m, c, b),
                            features(a, m + d, c, b),
                            features(a, m, c + d, b),
                            features(a, m, c, b + d / 10.0),
                        ];
                        for f in &raised {
                            let next = predict_risk(f);
                            assert!(next.score >= base.score, "{f:?}");
                            assert!(next.risk_probability <= base.risk_probability, "{f:?}");
                            assert!(next.risk_level.severity() <= base.risk_level.severity(), "{f:?}");
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn test_batch_preserves_order() {
    let batch = vec![
        features(55.0, 42.0, 40.0, 4.0),
        features(100.0, 100.0, 100.0, 10.0),
        features(75.0, 65.0, 70.0, 6.0),
    ];
    let results = predict_risk_batch(&batch);

    assert_eq!(results.len(), 3);
    for (f, r) in batch.iter().zip(&results) {
        assert_eq!(*r, predict_risk(f));
    }
    assert_eq!(results[0].risk_level, RiskLevel::High);
    assert_eq!(results[1].risk_level, RiskLevel::VeryLow);
    assert_eq!(results[2].risk_level, RiskLevel::Medium);
    assert!(predict_risk_batch(&[]).is_empty());
}

#[test]
fn test_failing_every_rule_still_caps_at_four() {
    let recs = generate_recommendations(&features(0.0, 0.0, 0.0, 0.0), RiskLevel::High);
    assert_eq!(recs.len(), 4);
    assert!(recs[0].starts_with("Improve attendance"));
    assert!(recs[3].starts_with("Practice with previous year"));
}

#[test]
fn test_csv_import_end_to_end() {
    let csv = "Name,Roll No,Class,Student Email,Attendance,Avg Marks,Assignment Completion,Behavior Score\n\
               Ravi Kumar,CS2024020,10-C,ravi@school.edu,55,42,40,4\n\
               \"Singh, Pooja\",CS2024014,10-B,pooja@school.edu,60,45,50,5\n";

    let table = parse_delimited_text(csv).unwrap();
    let mapping = auto_map_fields(&table.headers);
    assert_eq!(mapping.get("Student Email"), Some(CanonicalField::StudentEmail));

    let scored = RiskModel::default()
        .score_import(&table, &mapping, &ImportOptions::default())
        .unwrap();

    assert_eq!(scored.len(), 2);
    assert_eq!(scored[0].record.student_email.as_deref(), Some("ravi@school.edu"));
    assert_eq!(scored[0].prediction.score, 44.55);
    assert_eq!(scored[0].prediction.risk_probability, 55);
    assert_eq!(scored[1].record.name.as_deref(), Some("Singh, Pooja"));
    assert_eq!(scored[1].prediction.risk_level, RiskLevel::Medium);
    assert!(scored.iter().all(|s| !s.recommendations.is_empty() && s.recommendations.len() <= 4));
}

#[test]
fn test_prediction_json_shape() {
    let json = serde_json::to_value(predict_risk(&features(55.0, 42.0, 40.0, 4.0))).unwrap();
    assert_eq!(json["riskLevel"], "High");
    assert_eq!(json["riskProbability"], 55);
    assert!(json["featureContributions"]["avgMarks"].is_number());
}
