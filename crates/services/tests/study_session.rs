use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use services::{
    ChannelReporter, LocationChanged, NavigationItem, SessionContext, StudySession, ViewerError,
    ViewerSyncAdapter,
};
use storage::repository::{
    CompletionRepository, InMemoryRepository, SaveOutcome, StorageError, StoredCompletion,
};
use tokio::sync::mpsc;
use tracker_core::model::{
    Chapter, Course, CourseCompletionData, CourseId, SectionGroup, Settings, Textbook,
};
use tracker_core::time::fixed_clock;

fn build_course() -> Arc<Course> {
    Arc::new(Course {
        id: CourseId::random(),
        title: "Thermodynamics".into(),
        description: None,
        books: vec![Textbook {
            label: "Main text".into(),
            file: PathBuf::from("thermo.epub"),
            chapters: vec![
                Chapter {
                    root: Some("ch1".into()),
                    groups: vec![SectionGroup {
                        weight: None,
                        sections: vec!["s1".into(), "s2".into()],
                    }],
                },
                Chapter {
                    root: Some("ch2".into()),
                    groups: Vec::new(),
                },
            ],
        }],
    })
}

#[derive(Default)]
struct ViewerLog {
    restored: Mutex<Vec<String>>,
    torn_down: AtomicBool,
}

struct ScriptedViewer {
    open_result: Result<Vec<NavigationItem>, ViewerError>,
    events: Option<mpsc::Receiver<LocationChanged>>,
    log: Arc<ViewerLog>,
}

impl ScriptedViewer {
    fn new(log: Arc<ViewerLog>) -> (Self, mpsc::Sender<LocationChanged>) {
        let (tx, rx) = mpsc::channel(8);
        let viewer = Self {
            open_result: Ok(vec![
                NavigationItem::new("Chapter 1", Some("ch1")).with_subitems(vec![
                    NavigationItem::new("Section 1", Some("s1")),
                    NavigationItem::new("Section 2", Some("s2")),
                ]),
                NavigationItem::new("Chapter 2", Some("ch2")),
            ]),
            events: Some(rx),
            log,
        };
        (viewer, tx)
    }

    fn failing(log: Arc<ViewerLog>) -> Self {
        Self {
            open_result: Err(ViewerError::Open("unsupported format".into())),
            events: None,
            log,
        }
    }
}

#[async_trait]
impl ViewerSyncAdapter for ScriptedViewer {
    async fn open(
        &mut self,
        _course: &Course,
        _textbook_index: usize,
    ) -> Result<Vec<NavigationItem>, ViewerError> {
        self.open_result.clone()
    }

    fn location_events(&mut self) -> Option<mpsc::Receiver<LocationChanged>> {
        self.events.take()
    }

    async fn restore_position(&mut self, position: &str) -> Result<(), ViewerError> {
        self.log
            .restored
            .lock()
            .unwrap()
            .push(position.to_string());
        Ok(())
    }

    async fn teardown(&mut self) {
        self.events = None;
        self.log.torn_down.store(true, Ordering::SeqCst);
    }
}

fn context(repo: &InMemoryRepository, reporter: ChannelReporter) -> SessionContext {
    SessionContext {
        completions: Arc::new(repo.clone()),
        reporter: Arc::new(reporter),
        settings: Settings::default(),
        clock: fixed_clock(),
    }
}

#[tokio::test(start_paused = true)]
async fn toggling_sections_rolls_up_to_the_chapter() {
    let repo = InMemoryRepository::new();
    let (reporter, mut notices) = ChannelReporter::channel();
    let ctx = context(&repo, reporter);
    let course = build_course();

    let mut session = StudySession::open(&ctx, Arc::clone(&course), 0, None)
        .await
        .unwrap();
    assert_eq!(session.next_actionable_item(), Some("ch1"));

    session.toggle("s1", true).await;
    assert_eq!(session.progress().overall_fraction(0), 0.0);
    assert!(!session.model().is_checked("ch1"));

    assert!(session.toggle("s2", true).await);
    assert!(session.model().is_checked("ch1"));
    assert_eq!(session.next_actionable_item(), Some("ch2"));
    let stored = repo.load_completion(course.id).await.unwrap().unwrap();
    assert_eq!(
        stored.data.book(0).unwrap().completed_sections,
        BTreeSet::from(["ch1".to_string(), "s1".to_string(), "s2".to_string()])
    );

    assert!(session.toggle("s1", false).await);
    assert!(!session.model().is_checked("ch1"));
    assert_eq!(session.store().progress().completed_chapters(), 0);

    assert!(!session.toggle("not-a-section", true).await);

    session.close().await.unwrap();
    assert!(notices.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn viewer_position_is_restored_and_recorded() {
    let repo = InMemoryRepository::new();
    let course = build_course();
    let mut seeded = tracker_core::model::CourseCompletionData::default();
    seeded.book_mut(0).position = Some("epubcfi(/6/8)".into());
    repo.save_completion(&course, &seeded, 1, fixed_clock().today())
        .await
        .unwrap();

    let (reporter, _notices) = ChannelReporter::channel();
    let ctx = context(&repo, reporter);
    let log = Arc::new(ViewerLog::default());
    let (viewer, events) = ScriptedViewer::new(Arc::clone(&log));

    let mut session = StudySession::open(&ctx, Arc::clone(&course), 0, Some(Box::new(viewer)))
        .await
        .unwrap();
    assert!(session.has_viewer());
    assert_eq!(session.navigation().len(), 2);
    assert_eq!(*log.restored.lock().unwrap(), vec!["epubcfi(/6/8)".to_string()]);

    events
        .send(LocationChanged {
            position: "epubcfi(/6/12)".into(),
            identifier: Some("s2".into()),
        })
        .await
        .unwrap();
    let event = session.next_location().await.unwrap();
    assert_eq!(session.on_location_changed(event), Some(0));

    let unresolved = LocationChanged {
        position: "epubcfi(/6/14)".into(),
        identifier: None,
    };
    assert_eq!(session.on_location_changed(unresolved), None);

    let outcome = session.close().await.unwrap();
    assert_eq!(outcome, SaveOutcome::Applied);
    assert!(log.torn_down.load(Ordering::SeqCst));

    let stored = repo.load_completion(course.id).await.unwrap().unwrap();
    assert_eq!(
        stored.data.book(0).unwrap().position.as_deref(),
        Some("epubcfi(/6/14)")
    );
}

#[tokio::test(start_paused = true)]
async fn viewer_failure_is_reported_and_session_continues() {
    let repo = InMemoryRepository::new();
    let (reporter, mut notices) = ChannelReporter::channel();
    let ctx = context(&repo, reporter);
    let log = Arc::new(ViewerLog::default());

    let mut session = StudySession::open(
        &ctx,
        build_course(),
        0,
        Some(Box::new(ScriptedViewer::failing(Arc::clone(&log)))),
    )
    .await
    .unwrap();

    assert!(!session.has_viewer());
    assert!(session.navigation().is_empty());
    assert!(session.next_location().await.is_none());
    assert!(log.torn_down.load(Ordering::SeqCst));

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.message, "Failed to open Main text");
    assert!(notice.cause.contains("unsupported format"));

    session.toggle("ch2", true).await;
    assert_eq!(session.progress().completed_chapters(), 1);
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn session_time_accrues_while_visible() {
    let repo = InMemoryRepository::new();
    let (reporter, _notices) = ChannelReporter::channel();
    let ctx = context(&repo, reporter);
    let course = build_course();

    let session = StudySession::open(&ctx, Arc::clone(&course), 0, None)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(4500)).await;
    session.set_visible(false);
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    session.set_visible(true);
    tokio::time::sleep(std::time::Duration::from_millis(2000)).await;
    session.close().await.unwrap();

    let stored = repo.load_completion(course.id).await.unwrap().unwrap();
    assert_eq!(stored.data.total_time(), 6);
}

/// Fails the first read, then behaves.
#[derive(Default)]
struct ColdStartRepository {
    inner: InMemoryRepository,
    fail_next_load: AtomicBool,
}

#[async_trait]
impl CompletionRepository for ColdStartRepository {
    async fn load_completion(&self, id: CourseId) -> Result<Option<StoredCompletion>, StorageError> {
        if self.fail_next_load.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Connection("database is locked".into()));
        }
        self.inner.load_completion(id).await
    }

    async fn save_completion(
        &self,
        course: &Course,
        data: &CourseCompletionData,
        revision: u64,
        today: chrono::NaiveDate,
    ) -> Result<SaveOutcome, StorageError> {
        self.inner.save_completion(course, data, revision, today).await
    }
}

#[tokio::test(start_paused = true)]
async fn toggle_after_failed_load_keeps_stored_progress() {
    let course = build_course();
    let repo = Arc::new(ColdStartRepository::default());
    let today = fixed_clock().today();
    let mut earlier = CourseCompletionData::default();
    earlier.add_time(today, 200);
    earlier.book_mut(0).completed_sections.insert("s2".into());
    repo.inner
        .save_completion(&course, &earlier, 3, today)
        .await
        .unwrap();
    repo.fail_next_load.store(true, Ordering::SeqCst);

    let (reporter, mut notices) = ChannelReporter::channel();
    let ctx = SessionContext {
        completions: repo.clone(),
        reporter: Arc::new(reporter),
        settings: Settings::default(),
        clock: fixed_clock(),
    };
    let mut session = StudySession::open(&ctx, Arc::clone(&course), 0, None)
        .await
        .unwrap();
    assert!(notices.try_recv().unwrap().message.starts_with("Failed to load progress"));
    assert!(!session.model().is_checked("s2"));

    session.toggle("s1", true).await;
    assert!(notices.try_recv().is_err());
    assert!(session.model().is_checked("s2"));
    assert!(session.model().is_checked("ch1"));

    let stored = repo.inner.load_completion(course.id).await.unwrap().unwrap();
    assert_eq!(stored.revision, 4);
    assert_eq!(stored.data.time_on(today), 200);
    let completed = &stored.data.book(0).unwrap().completed_sections;
    assert!(completed.contains("s1") && completed.contains("s2"));

    session.close().await.unwrap();
    let stored = repo.inner.load_completion(course.id).await.unwrap().unwrap();
    assert!(stored.data.time_on(today) >= 200);
}

#[tokio::test]
async fn unknown_textbook_is_an_error() {
    let repo = InMemoryRepository::new();
    let (reporter, _notices) = ChannelReporter::channel();
    let ctx = context(&repo, reporter);

    let result = StudySession::open(&ctx, build_course(), 4, None).await;
    assert!(matches!(
        result,
        Err(services::SessionError::UnknownTextbook(4))
    ));
}

#[tokio::test(start_paused = true)]
async fn random_toggles_always_persist_the_model_state() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let repo = InMemoryRepository::new();
    let (reporter, _notices) = ChannelReporter::channel();
    let ctx = context(&repo, reporter);
    let course = build_course();
    let mut session = StudySession::open(&ctx, Arc::clone(&course), 0, None)
        .await
        .unwrap();

    let identifiers = ["ch1", "s1", "s2", "ch2"];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let identifier = identifiers[rng.random_range(0..identifiers.len())];
        session.toggle(identifier, rng.random_bool(0.5)).await;

        let model = session.model();
        assert_eq!(
            model.is_checked("ch1"),
            model.is_checked("s1") && model.is_checked("s2")
        );
        let stored = repo.load_completion(course.id).await.unwrap().unwrap();
        assert_eq!(
            &stored.data.book(0).unwrap().completed_sections,
            model.completed_sections()
        );
    }

    session.close().await.unwrap();
}
