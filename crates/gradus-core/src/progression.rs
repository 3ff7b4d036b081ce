use crate::error::ProgressionError;
use crate::types::enums::ProgressStatus;
use crate::types::{Lesson, LessonId, Level, ProgressRecord, Standing};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which branch of the selection ladder produced the active lesson. Public so
/// callers and tests can assert on the branch instead of guessing from the
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SelectionRule {
    InProgress,
    NextUnstarted,
    LastCompleted,
    AnyRecorded,
    FirstLesson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLesson {
    pub lesson_id: LessonId,
    pub rule: SelectionRule,
}

/// Selects the lesson a learner is currently working in, given the level's
/// lessons ordered by `order_index` ascending and the learner's progress
/// records for that level.
///
/// Ladder, first match wins:
/// 1. first lesson `InProgress`
/// 2. first lesson not started or `AwaitingReview` (a lesson with no record
///    counts as not started)
/// 3. highest-order `Completed` lesson
/// 4. lowest-order lesson with any record at all
/// 5. the level's first lesson
pub fn select_active_lesson(
    lessons: &[Lesson],
    progress: &HashMap<LessonId, ProgressRecord>,
) -> Result<ActiveLesson, ProgressionError> {
    if lessons.is_empty() {
        return Err(ProgressionError::NoLessons);
    }

    let status_of = |lesson: &Lesson| progress.get(&lesson.id).map(|record| record.status);

    if let Some(lesson) = lessons
        .iter()
        .find(|lesson| status_of(lesson) == Some(ProgressStatus::InProgress))
    {
        return Ok(ActiveLesson {
            lesson_id: lesson.id.clone(),
            rule: SelectionRule::InProgress,
        });
    }

    if let Some(lesson) = lessons.iter().find(|lesson| {
        matches!(
            status_of(lesson),
            None | Some(ProgressStatus::NotStarted) | Some(ProgressStatus::AwaitingReview)
        )
    }) {
        return Ok(ActiveLesson {
            lesson_id: lesson.id.clone(),
            rule: SelectionRule::NextUnstarted,
        });
    }

    if let Some(lesson) = lessons
        .iter()
        .rev()
        .find(|lesson| status_of(lesson) == Some(ProgressStatus::Completed))
    {
        return Ok(ActiveLesson {
            lesson_id: lesson.id.clone(),
            rule: SelectionRule::LastCompleted,
        });
    }

    if let Some(lesson) = lessons.iter().find(|lesson| progress.contains_key(&lesson.id)) {
        return Ok(ActiveLesson {
            lesson_id: lesson.id.clone(),
            rule: SelectionRule::AnyRecorded,
        });
    }

    Ok(ActiveLesson {
        lesson_id: lessons[0].id.clone(),
        rule: SelectionRule::FirstLesson,
    })
}

/// The learner's position across a formation: the highest-order level holding
/// any of their progress records, paired with the active lesson's order within
/// it. `None` when the learner has no records anywhere in the formation.
pub fn formation_standing(
    levels_with_lessons: &[(Level, Vec<Lesson>)],
    progress: &HashMap<LessonId, ProgressRecord>,
) -> Option<Standing> {
    let mut candidate: Option<(&Level, &Vec<Lesson>)> = None;
    for (level, lessons) in levels_with_lessons {
        let has_record = lessons.iter().any(|lesson| progress.contains_key(&lesson.id));
        if has_record {
            match candidate {
                Some((current, _)) if current.order_index >= level.order_index => {}
                _ => candidate = Some((level, lessons)),
            }
        }
    }

    let (level, lessons) = candidate?;
    let active = select_active_lesson(lessons, progress).ok()?;
    let lesson_order = lessons
        .iter()
        .find(|lesson| lesson.id == active.lesson_id)
        .map(|lesson| lesson.order_index)?;
    Some(Standing::new(level.order_index, lesson_order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormationId, LearnerId, LevelId};
    use chrono::Utc;

    fn lesson(level: &LevelId, formation: &FormationId, order: i64) -> Lesson {
        Lesson {
            id: LessonId::generate(),
            level_id: level.clone(),
            formation_id: formation.clone(),
            name: format!("lesson {order}"),
            order_index: order,
            has_exercise: false,
        }
    }

    fn record(lesson: &Lesson, status: ProgressStatus) -> ProgressRecord {
        ProgressRecord {
            learner_id: LearnerId::generate(),
            lesson_id: lesson.id.clone(),
            formation_id: lesson.formation_id.clone(),
            status,
            exercise_done: false,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    fn level_fixture() -> (Vec<Lesson>, HashMap<LessonId, ProgressRecord>) {
        let level = LevelId::generate();
        let formation = FormationId::generate();
        let lessons = vec![
            lesson(&level, &formation, 0),
            lesson(&level, &formation, 1),
            lesson(&level, &formation, 2),
        ];
        (lessons, HashMap::new())
    }

    #[test]
    fn in_progress_wins() {
        let (lessons, mut progress) = level_fixture();
        progress.insert(
            lessons[0].id.clone(),
            record(&lessons[0], ProgressStatus::Completed),
        );
        progress.insert(
            lessons[1].id.clone(),
            record(&lessons[1], ProgressStatus::InProgress),
        );
        progress.insert(
            lessons[2].id.clone(),
            record(&lessons[2], ProgressStatus::NotStarted),
        );

        let active = select_active_lesson(&lessons, &progress).unwrap();
        assert_eq!(active.lesson_id, lessons[1].id);
        assert_eq!(active.rule, SelectionRule::InProgress);
    }

    #[test]
    fn next_unstarted_after_completed() {
        let (lessons, mut progress) = level_fixture();
        progress.insert(
            lessons[0].id.clone(),
            record(&lessons[0], ProgressStatus::Completed),
        );
        progress.insert(
            lessons[1].id.clone(),
            record(&lessons[1], ProgressStatus::NotStarted),
        );

        let active = select_active_lesson(&lessons, &progress).unwrap();
        assert_eq!(active.lesson_id, lessons[1].id);
        assert_eq!(active.rule, SelectionRule::NextUnstarted);
    }

    #[test]
    fn all_unstarted_returns_first() {
        let (lessons, progress) = level_fixture();
        let active = select_active_lesson(&lessons, &progress).unwrap();
        assert_eq!(active.lesson_id, lessons[0].id);
        assert_eq!(active.rule, SelectionRule::NextUnstarted);
    }

    #[test]
    fn awaiting_review_counts_as_open() {
        let (lessons, mut progress) = level_fixture();
        progress.insert(
            lessons[0].id.clone(),
            record(&lessons[0], ProgressStatus::Completed),
        );
        progress.insert(
            lessons[1].id.clone(),
            record(&lessons[1], ProgressStatus::AwaitingReview),
        );
        progress.insert(
            lessons[2].id.clone(),
            record(&lessons[2], ProgressStatus::NotStarted),
        );

        let active = select_active_lesson(&lessons, &progress).unwrap();
        assert_eq!(active.lesson_id, lessons[1].id);
        assert_eq!(active.rule, SelectionRule::NextUnstarted);
    }

    #[test]
    fn all_completed_returns_last() {
        let (lessons, mut progress) = level_fixture();
        for lesson in &lessons {
            progress.insert(lesson.id.clone(), record(lesson, ProgressStatus::Completed));
        }

        let active = select_active_lesson(&lessons, &progress).unwrap();
        assert_eq!(active.lesson_id, lessons[2].id);
        assert_eq!(active.rule, SelectionRule::LastCompleted);
    }

    #[test]
    fn empty_level_is_an_error() {
        let progress = HashMap::new();
        let err = select_active_lesson(&[], &progress).unwrap_err();
        assert!(matches!(err, ProgressionError::NoLessons));
    }

    #[test]
    fn standing_uses_highest_level_with_records() {
        let formation = FormationId::generate();
        let level_a = LevelId::generate();
        let level_b = LevelId::generate();
        let lessons_a = vec![lesson(&level_a, &formation, 0), lesson(&level_a, &formation, 1)];
        let lessons_b = vec![lesson(&level_b, &formation, 0), lesson(&level_b, &formation, 1)];

        let mut progress = HashMap::new();
        for lesson in &lessons_a {
            progress.insert(lesson.id.clone(), record(lesson, ProgressStatus::Completed));
        }
        progress.insert(
            lessons_b[0].id.clone(),
            record(&lessons_b[0], ProgressStatus::InProgress),
        );

        let levels = vec![
            (
                Level {
                    id: level_a,
                    formation_id: formation.clone(),
                    name: "level 1".to_string(),
                    order_index: 0,
                },
                lessons_a,
            ),
            (
                Level {
                    id: level_b,
                    formation_id: formation.clone(),
                    name: "level 2".to_string(),
                    order_index: 1,
                },
                lessons_b,
            ),
        ];

        let standing = formation_standing(&levels, &progress).unwrap();
        assert_eq!(standing, Standing::new(1, 0));
    }

    #[test]
    fn standing_is_none_without_records() {
        let formation = FormationId::generate();
        let level = LevelId::generate();
        let lessons = vec![lesson(&level, &formation, 0)];
        let levels = vec![(
            Level {
                id: level,
                formation_id: formation,
                name: "level 1".to_string(),
                order_index: 0,
            },
            lessons,
        )];

        assert_eq!(formation_standing(&levels, &HashMap::new()), None);
    }
}
