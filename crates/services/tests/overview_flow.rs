use std::collections::BTreeSet;
use std::sync::Arc;

use services::{ChannelReporter, TrackerServices, TrackerServicesError};
use storage::repository::Storage;
use storage::CourseCatalog;
use tracker_core::calendar::{CalendarCell, MeterCell};
use tracker_core::model::{CourseId, CourseStatus, SettingsDraft};
use tracker_core::time::fixed_clock;

const ALGEBRA: &str = r#"
title = "Algebra"

[[books]]
label = "Main text"
file = "algebra.epub"

[[books.chapters]]
root = "ch1"

[[books.chapters.groups]]
sections = ["s1", "s2"]

[[books.chapters]]
root = "ch2"
"#;

const GLOSSARY: &str = r#"
title = "Glossary"

[[books]]
label = "Terms"
file = "terms.pdf"
"#;

async fn write_course(dir: &std::path::Path, body: &str) -> CourseId {
    let id = CourseId::random();
    tokio::fs::write(dir.join(format!("{id}.toml")), body)
        .await
        .unwrap();
    id
}

#[tokio::test(start_paused = true)]
async fn listing_and_heatmaps_follow_study_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let algebra = write_course(dir.path(), ALGEBRA).await;
    let glossary = write_course(dir.path(), GLOSSARY).await;

    let (reporter, mut notices) = ChannelReporter::channel();
    let services = TrackerServices::new(
        Storage::in_memory(),
        CourseCatalog::new(dir.path()),
        fixed_clock(),
        Arc::new(reporter),
    );

    let courses = services.courses().await.unwrap();
    assert_eq!(courses.len(), 2);
    let summaries = services.overview().course_summaries(&courses).await.unwrap();
    for summary in &summaries {
        let expected = if summary.course.id == glossary {
            CourseStatus::Reference
        } else {
            CourseStatus::New
        };
        assert_eq!(summary.status, expected);
    }

    let course = services.course(algebra).await.unwrap();
    let mut session = services
        .open_session(Arc::clone(&course), 0, None)
        .await
        .unwrap();
    session.toggle("ch2", true).await;
    tokio::time::sleep(std::time::Duration::from_millis(3500)).await;
    session.close().await.unwrap();

    let summaries = services
        .overview()
        .course_summaries(&[Arc::clone(&course)])
        .await
        .unwrap();
    assert_eq!(summaries[0].status, CourseStatus::Started);
    assert_eq!(summaries[0].progress.time_spent_today, 3);
    let clock = summaries[0].clock.as_ref().unwrap();
    assert!(clock.iter().all(|cell| *cell == MeterCell::Empty));

    let overview = services.overview().overview().await.unwrap();
    let today = overview.time.series.active_index.unwrap();
    assert_eq!(overview.time.series.cells[today], CalendarCell::Value(3.0));
    assert_eq!(overview.chapters.series.cells[today], CalendarCell::Value(1.0));
    assert_eq!(overview.chapters.levels[today], Some(2));

    let store = services.progress_store(Arc::clone(&course)).await.unwrap();
    store.mark_course_complete().await.unwrap();
    let summaries = services
        .overview()
        .course_summaries(&[Arc::clone(&course)])
        .await
        .unwrap();
    assert_eq!(summaries[0].status, CourseStatus::Completed);

    let overview = services.overview().overview().await.unwrap();
    assert_eq!(overview.chapters.series.cells[today], CalendarCell::Value(2.0));
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn settings_shape_the_overview() {
    let dir = tempfile::tempdir().unwrap();
    let (reporter, _notices) = ChannelReporter::channel();
    let services = TrackerServices::new(
        Storage::in_memory(),
        CourseCatalog::new(dir.path()),
        fixed_clock(),
        Arc::new(reporter),
    );

    services
        .settings()
        .update(SettingsDraft {
            weeks_displayed: Some(1),
            show_course_clock: Some(false),
            ..SettingsDraft::default()
        })
        .await
        .unwrap();

    let overview = services.overview().overview().await.unwrap();
    // 2023-11-14 is a Tuesday: five unelapsed days, then today.
    assert_eq!(overview.time.series.cells.len(), 6);
    assert_eq!(overview.time.series.active_index, Some(5));

    assert!(services.courses().await.unwrap().is_empty());
}

#[tokio::test]
async fn active_courses_are_listed_by_title() {
    let dir = tempfile::tempdir().unwrap();
    let glossary = write_course(dir.path(), GLOSSARY).await;
    let algebra = write_course(dir.path(), ALGEBRA).await;
    let dropped = write_course(dir.path(), ALGEBRA).await;

    let (reporter, mut notices) = ChannelReporter::channel();
    let services = TrackerServices::new(
        Storage::in_memory(),
        CourseCatalog::new(dir.path()),
        fixed_clock(),
        Arc::new(reporter),
    );
    assert!(services.active_courses().await.unwrap().is_empty());

    services.set_course_active(glossary, true).await.unwrap();
    services.set_course_active(algebra, true).await.unwrap();
    let titles: Vec<_> = services
        .active_courses()
        .await
        .unwrap()
        .iter()
        .map(|course| course.title.clone())
        .collect();
    assert_eq!(titles, ["Algebra", "Glossary"]);

    let unknown = CourseId::random();
    assert!(matches!(
        services.set_course_active(unknown, true).await,
        Err(TrackerServicesError::Catalog(_))
    ));

    services.set_course_active(dropped, true).await.unwrap();
    tokio::fs::remove_file(dir.path().join(format!("{dropped}.toml")))
        .await
        .unwrap();
    assert_eq!(services.active_courses().await.unwrap().len(), 2);
    let notice = notices.try_recv().unwrap();
    assert!(notice.message.contains(&dropped.to_string()));

    services.set_course_active(glossary, false).await.unwrap();
    services
        .set_active_courses(&BTreeSet::from([glossary]))
        .await
        .unwrap();
    let active = services.active_courses().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, glossary);
}
