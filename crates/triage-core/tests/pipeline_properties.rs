//! End-to-end pipeline properties against the in-memory fakes.

use std::sync::Arc;

use triage_core::fakes::{
    AnalyzerScript, MemoryNotifier, MemoryThreadSource, MemoryTicketTracker,
    ScriptedLanguageAnalyzer,
};
use triage_core::{
    CollaboratorError, Collaborators, Comment, CommentState, DetectedLanguage, Orchestrator,
    PipelineConfig, Priority, Sentence, SentenceOpinion, Sentiment, SentimentResult, Stage,
    SummaryDocument, TargetSentiment, TicketRequest, TriageError,
};

const THREAD: &str = "t3thread";

struct Harness {
    threads: Arc<MemoryThreadSource>,
    tracker: Arc<MemoryTicketTracker>,
    analyzer: Arc<ScriptedLanguageAnalyzer>,
    notifier: Arc<MemoryNotifier>,
}

impl Harness {
    fn new(
        comments: Vec<Comment>,
        tracker: MemoryTicketTracker,
        analyzer: ScriptedLanguageAnalyzer,
    ) -> Self {
        Self::with_notifier(comments, tracker, analyzer, MemoryNotifier::new())
    }

    fn with_notifier(
        comments: Vec<Comment>,
        tracker: MemoryTicketTracker,
        analyzer: ScriptedLanguageAnalyzer,
        notifier: MemoryNotifier,
    ) -> Self {
        Self {
            threads: Arc::new(MemoryThreadSource::new().with_thread(THREAD, comments)),
            tracker: Arc::new(tracker),
            analyzer: Arc::new(analyzer),
            notifier: Arc::new(notifier),
        }
    }

    fn orchestrator(&self, config: PipelineConfig) -> Orchestrator {
        Orchestrator::new(
            Collaborators::new(
                self.threads.clone(),
                self.tracker.clone(),
                self.analyzer.clone(),
                self.notifier.clone(),
            ),
            config,
        )
        .unwrap()
    }
}

fn negative(target: &str, assessments: &[&str]) -> SentenceOpinion {
    SentenceOpinion::new(target, TargetSentiment::Negative, assessments.iter().copied())
}

fn positive(target: &str, assessments: &[&str]) -> SentenceOpinion {
    SentenceOpinion::new(target, TargetSentiment::Positive, assessments.iter().copied())
}

fn crash_analyzer() -> ScriptedLanguageAnalyzer {
    ScriptedLanguageAnalyzer::new().with_script(
        "game crashes constantly",
        AnalyzerScript::english(Sentiment::Negative, vec![negative("game", &["crashes"])])
            .with_summary(&["The game crashes constantly"]),
    )
}

/// Test: the canonical complaint files exactly one High ticket
#[tokio::test]
async fn test_crash_comment_files_one_high_priority_ticket() {
    let harness = Harness::new(
        vec![Comment::new("c1", "game crashes constantly")],
        MemoryTicketTracker::new("GAME"),
        crash_analyzer(),
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .expect("run failed");

    let tickets = harness.tracker.tickets();
    assert_eq!(tickets.len(), 1);
    let request = &tickets[0].request;
    assert_eq!(request.priority, Priority::High);
    assert!(request.summary.starts_with("Game:"), "summary: {}", request.summary);
    assert!(request.description.contains("c1"));
    assert!(request.description.contains("The game crashes constantly. "));

    let comment = report.comment("c1").unwrap();
    assert_eq!(
        comment.path,
        vec![
            CommentState::Fetched,
            CommentState::DedupChecked,
            CommentState::LanguageGated,
            CommentState::SentimentGated,
            CommentState::Summarized,
            CommentState::ComplaintsExtracted,
            CommentState::Filed,
        ]
    );
    assert_eq!(comment.tickets[0].target, "game");
    assert_eq!(comment.language.as_ref().unwrap().language_code, "en");
    assert!(report.errors.is_empty());
    assert!(!report.digest_sent);
    assert!(harness.notifier.sent().is_empty());
}

/// Test: an already-filed comment halts at the dedup gate
#[tokio::test]
async fn test_duplicate_comment_makes_no_further_calls() {
    let tracker = MemoryTicketTracker::new("GAME").with_ticket(TicketRequest {
        summary: "Game: crashes".to_string(),
        description: "User has made 1 complaint(s)...\nComment: c1.\nSummary: ".to_string(),
        priority: Priority::High,
    });
    let harness = Harness::new(
        vec![Comment::new("c1", "game crashes constantly")],
        tracker,
        crash_analyzer(),
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    assert_eq!(report.comment("c1").unwrap().state(), CommentState::SkippedDuplicate);
    assert!(harness.tracker.create_calls().is_empty());
    assert!(harness.analyzer.detect_calls().is_empty());
    assert!(harness.analyzer.sentiment_calls().is_empty());
    assert!(harness.analyzer.summarize_calls().is_empty());
    assert!(report.errors.is_empty());
}

/// Test: unsupported language skips quietly with no sentiment call
#[tokio::test]
async fn test_unsupported_language_skips_without_error() {
    let body = "игра постоянно вылетает";
    let analyzer = ScriptedLanguageAnalyzer::new().with_script(
        body,
        AnalyzerScript::new("ru", 0.91, SentimentResult::new(Sentiment::Negative, Vec::new())),
    );
    let harness = Harness::new(
        vec![Comment::new("c2", body)],
        MemoryTicketTracker::default(),
        analyzer,
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    assert_eq!(
        report.comment("c2").unwrap().state(),
        CommentState::SkippedUnsupportedLanguage
    );
    assert!(harness.analyzer.sentiment_calls().is_empty());
    assert!(harness.tracker.create_calls().is_empty());
    assert!(report.errors.is_empty());
    assert!(harness.notifier.sent().is_empty());
}

/// Test: opting in to language reporting records one digest entry
#[tokio::test]
async fn test_unsupported_language_reported_when_enabled() {
    let body = "Spelet kraschar hela tiden";
    let analyzer = ScriptedLanguageAnalyzer::new().with_script(
        body,
        AnalyzerScript::new("sv", 0.93, SentimentResult::new(Sentiment::Negative, Vec::new())),
    );
    let harness = Harness::new(
        vec![Comment::new("c3", body)],
        MemoryTicketTracker::default(),
        analyzer,
    );

    let report = harness
        .orchestrator(PipelineConfig::default().with_report_unsupported_language(true))
        .run(THREAD)
        .await
        .unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].cause, "unsupported language");
    assert!(report.errors[0].message.contains("sv"));
    assert_eq!(harness.notifier.sent().len(), 1);
    assert!(harness.analyzer.sentiment_calls().is_empty());
}

/// Test: errored detection entries are ignored when picking the language
#[tokio::test]
async fn test_language_pick_ignores_errored_entries() {
    let body = "el juego se cierra";
    let mut errored = DetectedLanguage::new("ru", 0.99);
    errored.is_error = true;
    let analyzer = ScriptedLanguageAnalyzer::new().with_script(
        body,
        AnalyzerScript::new(
            "es",
            0.8,
            SentimentResult::new(
                Sentiment::Negative,
                vec![Sentence {
                    text: body.to_string(),
                    opinions: vec![negative("juego", &["se cierra"])],
                }],
            ),
        )
        .with_detections(Ok(vec![errored, DetectedLanguage::new("es", 0.8)])),
    );
    let harness = Harness::new(
        vec![Comment::new("c4", body)],
        MemoryTicketTracker::default(),
        analyzer,
    );

    harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    assert_eq!(
        harness.analyzer.sentiment_calls(),
        vec![(body.to_string(), "es".to_string())]
    );
    assert_eq!(harness.tracker.tickets().len(), 1);
}

/// Test: positive and neutral comments are dropped without error
#[tokio::test]
async fn test_positive_and_neutral_comments_file_nothing() {
    let analyzer = ScriptedLanguageAnalyzer::new()
        .with_script(
            "love the new map",
            AnalyzerScript::english(Sentiment::Positive, vec![positive("map", &["love"])]),
        )
        .with_script(
            "patch notes are out",
            AnalyzerScript::english(Sentiment::Neutral, Vec::new()),
        );
    let harness = Harness::new(
        vec![
            Comment::new("p1", "love the new map"),
            Comment::new("n1", "patch notes are out"),
        ],
        MemoryTicketTracker::default(),
        analyzer,
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    assert_eq!(report.count_in(CommentState::SkippedNeutralSentiment), 2);
    assert!(harness.tracker.create_calls().is_empty());
    assert!(harness.analyzer.summarize_calls().is_empty());
    assert!(report.errors.is_empty());
}

/// Test: a mixed comment gets Medium tickets for its negative targets only
#[tokio::test]
async fn test_mixed_comment_files_medium_tickets_for_negative_targets() {
    let body = "great graphics but the servers lag and matchmaking is unfair";
    let analyzer = ScriptedLanguageAnalyzer::new().with_script(
        body,
        AnalyzerScript::english(
            Sentiment::Mixed,
            vec![
                positive("graphics", &["great"]),
                negative("servers", &["lag"]),
                negative("matchmaking", &["unfair"]),
            ],
        ),
    );
    let harness = Harness::new(
        vec![Comment::new("m1", body)],
        MemoryTicketTracker::default(),
        analyzer,
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    let tickets = harness.tracker.tickets();
    assert_eq!(tickets.len(), 2);
    assert!(tickets.iter().all(|t| t.request.priority == Priority::Medium));
    assert_eq!(tickets[0].request.summary, "Servers: lag");
    assert_eq!(tickets[1].request.summary, "Matchmaking: unfair");
    assert!(!tickets.iter().any(|t| t.request.summary.contains("graphics")));
    assert_eq!(report.tickets().count(), 2);
}

/// Test: mixed overall with no negative opinion files nothing and records nothing
#[tokio::test]
async fn test_mixed_without_negative_opinions_is_filed_empty() {
    let body = "not sure how I feel about the story";
    let analyzer = ScriptedLanguageAnalyzer::new().with_script(
        body,
        AnalyzerScript::english(Sentiment::Mixed, vec![positive("story", &["interesting"])]),
    );
    let harness = Harness::new(
        vec![Comment::new("m2", body)],
        MemoryTicketTracker::default(),
        analyzer,
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    let comment = report.comment("m2").unwrap();
    assert_eq!(comment.state(), CommentState::Filed);
    assert!(comment.tickets.is_empty());
    assert!(harness.tracker.create_calls().is_empty());
    assert!(report.errors.is_empty());
}

/// Test: a sentiment 500 fails one comment but not its siblings
#[tokio::test]
async fn test_failing_comment_is_isolated_from_siblings() {
    let analyzer = crash_analyzer()
        .with_script(
            "poisoned comment",
            AnalyzerScript::english(Sentiment::Negative, Vec::new()).with_sentiment(Err(
                CollaboratorError::Status {
                    status: 500,
                    body: "internal error".to_string(),
                },
            )),
        )
        .with_script(
            "the lobby is slow",
            AnalyzerScript::english(Sentiment::Negative, vec![negative("lobby", &["slow"])]),
        );
    let harness = Harness::new(
        vec![
            Comment::new("ok1", "game crashes constantly"),
            Comment::new("bad", "poisoned comment"),
            Comment::new("ok2", "the lobby is slow"),
        ],
        MemoryTicketTracker::default(),
        analyzer,
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    assert_eq!(
        report.comment("bad").unwrap().state(),
        CommentState::Failed(Stage::Sentiment)
    );
    assert_eq!(report.comment("ok1").unwrap().state(), CommentState::Filed);
    assert_eq!(report.comment("ok2").unwrap().state(), CommentState::Filed);
    assert_eq!(harness.tracker.tickets().len(), 2);

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].cause, "sentiment");
    assert!(report.errors[0].message.contains("bad"));

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1, "digest must be sent exactly once");
    assert_eq!(sent[0].records, report.errors);
    assert!(report.digest_sent);
}

/// Test: an errored sentiment document is a stage failure
#[tokio::test]
async fn test_sentiment_error_document_fails_comment() {
    let analyzer = ScriptedLanguageAnalyzer::new().with_script(
        "???",
        AnalyzerScript::english(Sentiment::Negative, Vec::new())
            .with_sentiment(Ok(SentimentResult::error("InvalidDocument"))),
    );
    let harness = Harness::new(
        vec![Comment::new("e1", "???")],
        MemoryTicketTracker::default(),
        analyzer,
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    assert_eq!(
        report.comment("e1").unwrap().state(),
        CommentState::Failed(Stage::Sentiment)
    );
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("InvalidDocument"));
}

/// Test: a failed dedup lookup skips the comment and records the comment id
#[tokio::test]
async fn test_dedup_failure_skips_comment_and_records_error() {
    let harness = Harness::new(
        vec![Comment::new("c1", "game crashes constantly")],
        MemoryTicketTracker::default().fail_search_for("c1"),
        crash_analyzer(),
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    assert_eq!(
        report.comment("c1").unwrap().state(),
        CommentState::Failed(Stage::Dedup)
    );
    assert!(harness.tracker.create_calls().is_empty());
    assert!(harness.analyzer.detect_calls().is_empty());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].cause, "dedup (comment c1)");
}

/// Test: one group failing to file does not stop its siblings
#[tokio::test]
async fn test_filing_failure_is_isolated_per_group() {
    let body = "servers lag, lobby is slow, menus are ugly";
    let analyzer = ScriptedLanguageAnalyzer::new().with_script(
        body,
        AnalyzerScript::english(
            Sentiment::Negative,
            vec![
                negative("servers", &["lag"]),
                negative("lobby", &["slow"]),
                negative("menus", &["ugly"]),
            ],
        ),
    );
    let harness = Harness::new(
        vec![Comment::new("f1", body)],
        MemoryTicketTracker::default().fail_create_when_summary_starts_with("Lobby"),
        analyzer,
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    assert_eq!(harness.tracker.create_calls().len(), 3);
    let filed: Vec<String> = harness
        .tracker
        .tickets()
        .into_iter()
        .map(|t| t.request.summary)
        .collect();
    assert_eq!(filed, vec!["Servers: lag", "Menus: ugly"]);

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].cause, "file (target 'lobby')");
    assert_eq!(report.comment("f1").unwrap().state(), CommentState::Filed);
}

/// Test: summarizer failure degrades to an empty summary
#[tokio::test]
async fn test_summarizer_failure_degrades_to_empty_summary() {
    let analyzer = ScriptedLanguageAnalyzer::new().with_script(
        "game crashes constantly",
        AnalyzerScript::english(Sentiment::Negative, vec![negative("game", &["crashes"])])
            .with_summary_result(Err(CollaboratorError::Operation(
                "job failed".to_string(),
            ))),
    );
    let harness = Harness::new(
        vec![Comment::new("c1", "game crashes constantly")],
        MemoryTicketTracker::default(),
        analyzer,
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    let tickets = harness.tracker.tickets();
    assert_eq!(tickets.len(), 1);
    assert!(tickets[0].request.description.ends_with("Summary: "));
    assert!(report.errors.is_empty());
}

/// Test: errored summary documents contribute nothing
#[tokio::test]
async fn test_errored_summary_documents_are_skipped() {
    let analyzer = ScriptedLanguageAnalyzer::new().with_script(
        "game crashes constantly",
        AnalyzerScript::english(Sentiment::Negative, vec![negative("game", &["crashes"])])
            .with_summary_result(Ok(vec![
                SummaryDocument {
                    is_error: true,
                    summaries: vec!["bogus".to_string()],
                },
                SummaryDocument {
                    is_error: false,
                    summaries: vec!["Crashes".to_string()],
                },
            ])),
    );
    let harness = Harness::new(
        vec![Comment::new("c1", "game crashes constantly")],
        MemoryTicketTracker::default(),
        analyzer,
    );

    harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .unwrap();

    let description = harness.tracker.tickets()[0].request.description.clone();
    assert!(description.ends_with("Summary: Crashes. "));
    assert!(!description.contains("bogus"));
}

/// Test: a second run over the same thread files nothing new
#[tokio::test]
async fn test_second_run_is_idempotent() {
    let harness = Harness::new(
        vec![
            Comment::new("c1", "game crashes constantly"),
            Comment::new("c2", "love it"),
        ],
        MemoryTicketTracker::default(),
        crash_analyzer(),
    );
    let orchestrator = harness.orchestrator(PipelineConfig::default());

    let first = orchestrator.run(THREAD).await.unwrap();
    assert_eq!(first.tickets().count(), 1);

    let second = orchestrator.run(THREAD).await.unwrap();
    assert_eq!(second.tickets().count(), 0);
    assert_eq!(
        second.comment("c1").unwrap().state(),
        CommentState::SkippedDuplicate
    );
    assert_eq!(harness.tracker.tickets().len(), 1);
    assert_ne!(first.run_id, second.run_id);
}

/// Test: thread fetch failure aborts the run before any comment work
#[tokio::test]
async fn test_thread_fetch_failure_aborts_run() {
    let tracker = Arc::new(MemoryTicketTracker::default());
    let notifier = Arc::new(MemoryNotifier::new());
    let orchestrator = Orchestrator::new(
        Collaborators::new(
            Arc::new(
                MemoryThreadSource::new()
                    .failing_with(CollaboratorError::Auth("invalid_grant".to_string())),
            ),
            tracker.clone(),
            Arc::new(ScriptedLanguageAnalyzer::new()),
            notifier.clone(),
        ),
        PipelineConfig::default(),
    )
    .unwrap();

    let err = orchestrator.run(THREAD).await.unwrap_err();
    match err {
        TriageError::ThreadFetch {
            submission_id,
            source,
        } => {
            assert_eq!(submission_id, THREAD);
            assert_eq!(source, CollaboratorError::Auth("invalid_grant".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(tracker.search_calls().is_empty());
    assert!(notifier.sent().is_empty());
}

/// Test: a failing notifier is swallowed and reported in the run report
#[tokio::test]
async fn test_notification_failure_is_swallowed() {
    let harness = Harness::with_notifier(
        vec![Comment::new("c1", "game crashes constantly")],
        MemoryTicketTracker::default().fail_search_for("c1"),
        crash_analyzer(),
        MemoryNotifier::failing(),
    );

    let report = harness
        .orchestrator(PipelineConfig::default())
        .run(THREAD)
        .await
        .expect("notification failure must not fail the run");

    assert_eq!(harness.notifier.sent().len(), 1);
    assert!(!report.digest_sent);
    assert_eq!(report.errors.len(), 1);
}

/// Test: invalid configuration is rejected up front
#[test]
fn test_orchestrator_rejects_invalid_config() {
    let result = Orchestrator::new(
        Collaborators::new(
            Arc::new(MemoryThreadSource::new()),
            Arc::new(MemoryTicketTracker::default()),
            Arc::new(ScriptedLanguageAnalyzer::new()),
            Arc::new(MemoryNotifier::new()),
        ),
        PipelineConfig::default().with_max_concurrent(0),
    );
    assert!(matches!(result, Err(TriageError::Config(_))));
}
