use std::collections::HashMap;

use crate::models::{ImprovementArea, IssueCount, NormalizedRecord, Role};
use crate::schema::CanonicalField;

const NON_ANSWERS: [&str; 4] = ["", "no", "none", "n/a"];

/// Ratings below this mark a focus area.
const FOCUS_THRESHOLD: f64 = 3.0;

fn is_meaningful(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    !NON_ANSWERS.contains(&lowered.as_str())
}

fn problems(record: &NormalizedRecord) -> impl Iterator<Item = &str> {
    CanonicalField::ALL
        .into_iter()
        .filter(|field| field.is_problem_field())
        .map(move |field| record.text(field))
        .filter(|text| is_meaningful(text))
}

/// Most frequently reported problems, most common first. Equal counts keep
/// the order in which the problem was first reported.
pub fn issue_frequency(records: &[NormalizedRecord], limit: usize) -> Vec<IssueCount> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for problem in records.iter().flat_map(problems) {
        let issue = problem.trim();
        match counts.get_mut(issue) {
            Some(count) => *count += 1,
            None => {
                order.push(issue.to_string());
                counts.insert(issue.to_string(), 1);
            }
        }
    }

    let mut issues: Vec<IssueCount> = order
        .into_iter()
        .map(|issue| {
            let count = counts.get(&issue).copied().unwrap_or_default();
            IssueCount { issue, count }
        })
        .collect();
    issues.sort_by(|a, b| b.count.cmp(&a.count));
    issues.truncate(limit);
    issues
}

/// Distinct problems per role, roles in order of first appearance.
pub fn problems_by_role(records: &[NormalizedRecord]) -> Vec<(Role, Vec<String>)> {
    let mut grouped: Vec<(Role, Vec<String>)> = Vec::new();
    for record in records {
        let role = record.role();
        for problem in problems(record) {
            let problem = problem.trim().to_string();
            match grouped.iter_mut().find(|(known, _)| *known == role) {
                Some((_, list)) => {
                    if !list.contains(&problem) {
                        list.push(problem);
                    }
                }
                None => grouped.push((role.clone(), vec![problem])),
            }
        }
    }
    grouped
}

/// Every rating under 3, labelled by the area it was given for.
pub fn improvement_areas(records: &[NormalizedRecord]) -> Vec<ImprovementArea> {
    records
        .iter()
        .filter_map(|record| record.identity.as_ref().map(|identity| (identity, record)))
        .flat_map(|(identity, record)| {
            record
                .scores()
                .filter(|(_, score)| *score < FOCUS_THRESHOLD)
                .map(move |(field, score)| ImprovementArea {
                    identity: identity.clone(),
                    area: field
                        .canonical_name()
                        .replace("Productivity", "")
                        .trim()
                        .to_string(),
                    score,
                })
        })
        .collect()
}

/// Free-text "other comments" that say something.
pub fn comments(records: &[NormalizedRecord]) -> Vec<&str> {
    records
        .iter()
        .map(|record| record.text(CanonicalField::OtherComments).trim())
        .filter(|text| is_meaningful(text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, RawTable};
    use crate::normalize::normalize_batch;
    use crate::schema::AliasTable;

    fn records() -> Vec<NormalizedRecord> {
        let raw = RawTable::new([
            "Name",
            "Role",
            "video_problems",
            "design_problems",
            "video_productivity",
            "design_productivity",
            "Any other comments?",
        ])
        .with_row([
            CellValue::from("Sam"),
            CellValue::from("Video Editor"),
            CellValue::from("Slow render farm"),
            CellValue::Null,
            CellValue::Int(2),
            CellValue::Null,
            CellValue::from("N/A"),
        ])
        .with_row([
            CellValue::from("Ana"),
            CellValue::from("Video Editor"),
            CellValue::from("Late client feedback"),
            CellValue::Null,
            CellValue::Int(4),
            CellValue::Null,
            CellValue::from("Need a second monitor"),
        ])
        .with_row([
            CellValue::from("Kim"),
            CellValue::from("Designer"),
            CellValue::Null,
            CellValue::from(" Late client feedback "),
            CellValue::Null,
            CellValue::Int(1),
            CellValue::from("none"),
        ])
        .with_row([
            CellValue::from("Lee"),
            CellValue::from("Designer"),
            CellValue::from("No"),
            CellValue::from("none"),
            CellValue::Null,
            CellValue::Int(5),
            CellValue::Null,
        ]);
        normalize_batch(&raw, &AliasTable::default(), 1).records
    }

    #[test]
    fn issues_are_counted_and_non_answers_skipped() {
        let issues = issue_frequency(&records(), 5);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].issue, "Late client feedback");
        assert_eq!(issues[0].count, 2);
        assert_eq!(issues[1].issue, "Slow render farm");
        assert_eq!(issue_frequency(&records(), 1).len(), 1);
    }

    #[test]
    fn problems_group_by_role() {
        let grouped = problems_by_role(&records());
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, Role::VideoEditor);
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].1, vec!["Late client feedback".to_string()]);
    }

    #[test]
    fn low_ratings_become_focus_areas() {
        let areas = improvement_areas(&records());
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].identity.as_str(), "Sam (Video Editor)");
        assert_eq!(areas[0].area, "Video");
        assert_eq!(areas[1].area, "Design");
        assert_eq!(areas[1].score, 1.0);
    }

    #[test]
    fn trivial_comments_are_dropped() {
        assert_eq!(comments(&records()), vec!["Need a second monitor"]);
    }
}
