use chrono::Duration;
use storage::repository::{
    AttemptLogRepository, LearnerRepository, MasteryRepository, ProgressionCommit,
    ProgressionPersistence, StorageError, StudyPlanRepository, VocabularyRepository,
};
use storage::sqlite::SqliteRepository;
use tutor_core::model::{
    AttemptRecord, BloomLevel, Learner, LearnerId, MasteryRecord, Proficiency, StudyPlan,
    StudyPlanDraft, TopicDraft, VocabularyEntry,
};
use tutor_core::progression::ProgressionPolicy;
use tutor_core::time::fixed_now;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed_learner(repo: &SqliteRepository, id: u64) -> (Learner, StudyPlan) {
    let learner = Learner::new(LearnerId::new(id), Proficiency::Intermediate, fixed_now())
        .with_display_name("Ana")
        .with_goal("read church slavonic");
    repo.upsert_learner(&learner).await.unwrap();

    let draft = StudyPlanDraft {
        learner_id: learner.id(),
        topics: vec![
            TopicDraft::new("Alphabet", "Glagolitic and Cyrillic letters"),
            TopicDraft::new("Nouns", "First declension"),
            TopicDraft::new("Verbs", "Present tense"),
        ],
    };
    let plan = repo.insert_plan(&draft, fixed_now()).await.unwrap();
    (learner, plan)
}

fn attempt_for(record: &MasteryRecord, is_correct: bool, minutes: i64) -> AttemptRecord {
    AttemptRecord {
        learner_id: record.learner_id(),
        topic_id: record.topic_id(),
        bloom_level: record.bloom_level(),
        question: "Which letter is 'az'?".into(),
        chosen_option: "A".into(),
        correct_option: if is_correct { "A" } else { "B" }.into(),
        is_correct,
        answered_at: fixed_now() + Duration::minutes(minutes),
    }
}

#[tokio::test]
async fn sqlite_roundtrips_learner_and_plan() {
    let repo = connect("memdb_learner_plan").await;
    let (learner, plan) = seed_learner(&repo, 1).await;

    let fetched = repo.get_learner(learner.id()).await.unwrap();
    assert_eq!(fetched, learner);

    let loaded = repo.load_plan(learner.id()).await.unwrap().expect("plan");
    assert_eq!(loaded, plan);
    let names: Vec<_> = loaded.topics().iter().map(|t| t.name().to_owned()).collect();
    assert_eq!(names, ["Alphabet", "Nouns", "Verbs"]);
    let positions: Vec<_> = loaded.topics().iter().map(|t| t.position()).collect();
    assert_eq!(positions, [1, 2, 3]);

    assert!(repo.load_plan(LearnerId::new(99)).await.unwrap().is_none());
    assert!(matches!(
        repo.get_learner(LearnerId::new(99)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_rejects_second_plan_and_unknown_learner() {
    let repo = connect("memdb_plan_conflict").await;
    let (learner, _) = seed_learner(&repo, 1).await;

    let again = StudyPlanDraft {
        learner_id: learner.id(),
        topics: vec![TopicDraft::new("Numbers", "")],
    };
    assert!(matches!(
        repo.insert_plan(&again, fixed_now()).await,
        Err(StorageError::Conflict)
    ));

    let orphan = StudyPlanDraft {
        learner_id: LearnerId::new(42),
        topics: vec![TopicDraft::new("Numbers", "")],
    };
    assert!(matches!(
        repo.insert_plan(&orphan, fixed_now()).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_current_topic_round_trip() {
    let repo = connect("memdb_current_topic").await;
    let (learner, plan) = seed_learner(&repo, 1).await;
    let second = plan.topics()[1].id();

    repo.save_current_topic(learner.id(), Some(second))
        .await
        .unwrap();
    let fetched = repo.get_learner(learner.id()).await.unwrap();
    assert_eq!(fetched.current_topic(), Some(second));

    repo.save_current_topic(learner.id(), None).await.unwrap();
    let fetched = repo.get_learner(learner.id()).await.unwrap();
    assert_eq!(fetched.current_topic(), None);

    assert!(matches!(
        repo.save_current_topic(LearnerId::new(77), None).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_upsert_keeps_the_current_topic() {
    let repo = connect("memdb_upsert_current_topic").await;
    let (learner, plan) = seed_learner(&repo, 1).await;
    let second = plan.topics()[1].id();
    repo.save_current_topic(learner.id(), Some(second))
        .await
        .unwrap();

    let edited = learner.clone().with_goal("read the psalter");
    repo.upsert_learner(&edited).await.unwrap();
    let fetched = repo.get_learner(learner.id()).await.unwrap();
    assert_eq!(fetched.goal(), edited.goal());
    assert_eq!(fetched.current_topic(), Some(second));

    // a pointer carried by a new profile is not trusted either
    let mut newcomer = Learner::new(LearnerId::new(2), Proficiency::Beginner, fixed_now());
    newcomer.set_current_topic(Some(second));
    repo.upsert_learner(&newcomer).await.unwrap();
    let fetched = repo.get_learner(LearnerId::new(2)).await.unwrap();
    assert_eq!(fetched.current_topic(), None);
}

#[tokio::test]
async fn sqlite_mastery_uses_optimistic_versions() {
    let repo = connect("memdb_mastery_versions").await;
    let (learner, plan) = seed_learner(&repo, 1).await;
    let topic = plan.topics()[0].id();

    assert!(repo.load_mastery(learner.id(), topic).await.unwrap().is_none());

    let fresh = MasteryRecord::new(learner.id(), topic, fixed_now());
    let saved = repo.save_mastery(&fresh).await.unwrap();
    assert_eq!(saved.version(), 1);

    assert!(matches!(
        repo.save_mastery(&fresh).await,
        Err(StorageError::Conflict)
    ));

    let policy = ProgressionPolicy::default();
    let mut updated = saved.clone();
    let decision = policy.decide(updated.bloom_level(), updated.correct_streak(), true);
    updated.apply_decision(&decision, true, fixed_now());
    let updated = repo.save_mastery(&updated).await.unwrap();
    assert_eq!(updated.version(), 2);

    // `saved` still carries version 1
    assert!(matches!(
        repo.save_mastery(&saved).await,
        Err(StorageError::Conflict)
    ));

    let loaded = repo.load_mastery(learner.id(), topic).await.unwrap().unwrap();
    assert_eq!(loaded, updated);
    assert_eq!(loaded.correct_streak(), 1);

    let all = repo.mastery_for_learner(learner.id()).await.unwrap();
    assert_eq!(all, vec![updated]);
}

#[tokio::test]
async fn sqlite_commit_progression_is_atomic() {
    let repo = connect("memdb_commit_atomic").await;
    let (learner, plan) = seed_learner(&repo, 1).await;
    let first = plan.topics()[0].id();
    let second = plan.topics()[1].id();

    let mut record = MasteryRecord::from_persisted(
        learner.id(),
        first,
        BloomLevel::EVALUATE,
        1,
        false,
        20,
        18,
        0,
        fixed_now(),
    )
    .unwrap();
    let decision = ProgressionPolicy::default().decide(BloomLevel::EVALUATE, 1, true);
    assert!(decision.completed);
    record.apply_decision(&decision, true, fixed_now());

    let commit = ProgressionCommit {
        attempt: attempt_for(&record, true, 0),
        record: record.clone(),
        advance_to: Some(second),
    };
    let saved = repo.commit_progression(&commit).await.unwrap();
    assert_eq!(saved.version(), 1);
    assert!(saved.is_completed());

    let learner_after = repo.get_learner(learner.id()).await.unwrap();
    assert_eq!(learner_after.current_topic(), Some(second));
    assert_eq!(repo.learner_stats(learner.id()).await.unwrap().total_attempts, 1);

    // replaying the same commit expects version 0 and must change nothing
    let replay = ProgressionCommit {
        advance_to: Some(plan.topics()[2].id()),
        ..commit
    };
    assert!(matches!(
        repo.commit_progression(&replay).await,
        Err(StorageError::Conflict)
    ));
    let learner_after = repo.get_learner(learner.id()).await.unwrap();
    assert_eq!(learner_after.current_topic(), Some(second));
    assert_eq!(repo.learner_stats(learner.id()).await.unwrap().total_attempts, 1);
}

#[tokio::test]
async fn sqlite_attempt_history_and_stats() {
    let repo = connect("memdb_attempt_stats").await;
    let (learner, plan) = seed_learner(&repo, 1).await;
    let record = MasteryRecord::new(learner.id(), plan.topics()[0].id(), fixed_now());

    repo.append_attempt(&attempt_for(&record, true, 0)).await.unwrap();
    repo.append_attempt(&attempt_for(&record, false, 10)).await.unwrap();
    repo.append_attempt(&attempt_for(&record, true, 60 * 24 * 2))
        .await
        .unwrap();

    let stats = repo.learner_stats(learner.id()).await.unwrap();
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.correct_attempts, 2);
    assert_eq!(stats.active_days, 2);

    let recent = repo.recent_attempts(learner.id(), 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].answered_at > recent[1].answered_at);
    assert!(recent[0].is_correct);
    assert!(!recent[1].is_correct);

    let empty = repo.learner_stats(LearnerId::new(5)).await.unwrap();
    assert_eq!(empty.total_attempts, 0);
}

#[tokio::test]
async fn sqlite_vocabulary_upserts_and_samples() {
    let repo = connect("memdb_vocabulary").await;
    let entries = vec![
        VocabularyEntry::new("voda", "water", Some("n.")),
        VocabularyEntry::new("dobrъ", "good", Some("adj.")),
        VocabularyEntry::new("pisati", "to write", Some("v.")),
        VocabularyEntry::new("i", "and", None),
    ];
    assert_eq!(repo.insert_vocabulary(&entries).await.unwrap(), 4);
    repo.insert_vocabulary(&[VocabularyEntry::new("voda", "water (n.)", Some("n."))])
        .await
        .unwrap();

    let all = repo.sample_vocabulary(10).await.unwrap();
    assert_eq!(all.len(), 4);
    let voda = all.iter().find(|e| e.word == "voda").unwrap();
    assert_eq!(voda.translation, "water (n.)");
    let conj = all.iter().find(|e| e.word == "i").unwrap();
    assert_eq!(conj.part_of_speech, None);

    assert_eq!(repo.sample_vocabulary(2).await.unwrap().len(), 2);
}
