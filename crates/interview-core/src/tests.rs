#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::assistant::build_assistant_config;
    use crate::event_bus::EventBus;
    use crate::extract::*;
    use crate::feedback::*;
    use crate::lifecycle::{ServicePorts, SessionManager};
    use crate::ports::*;
    use crate::questions::*;
    use interview_types::analytics::{AnalyticsUpdate, CallAnalytics};
    use interview_types::config::InterviewPolicy;
    use interview_types::event::SessionEvent;
    use interview_types::feedback::*;
    use interview_types::message::{Message, TranscriptMessage};
    use interview_types::session::*;
    use interview_types::user::{Identity, User};
    use interview_types::{InterviewError, Result};

    // ─── Mocks ───────────────────────────────────────────────

    /// LLM that answers question prompts and scoring prompts separately
    struct RoutingLlm {
        questions: Result<String>,
        feedback: Result<String>,
        feedback_delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl RoutingLlm {
        fn new(questions: Result<String>, feedback: Result<String>) -> Self {
            Self {
                questions,
                feedback,
                feedback_delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn healthy() -> Self {
            Self::new(Ok(QUESTIONS_JSON.to_string()), Ok(feedback_json(85)))
        }
    }

    #[async_trait]
    impl LlmPort for RoutingLlm {
        async fn chat_completion(&self, req: ChatRequest) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = req.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            let answer = if prompt.contains("Transcript:") {
                if let Some(delay) = self.feedback_delay {
                    tokio::time::sleep(delay).await;
                }
                self.feedback.clone()
            } else {
                self.questions.clone()
            };
            answer.map(|text| ChatResponse {
                message: Message::assistant(text),
                usage: None,
            })
        }
    }

    #[derive(Default)]
    struct MockSessions {
        sessions: Mutex<HashMap<String, Session>>,
        updates: AtomicUsize,
    }

    #[async_trait]
    impl SessionStore for MockSessions {
        async fn create(&self, session: Session) -> Result<Session> {
            self.sessions
                .lock()
                .unwrap()
                .insert(session.id.clone(), session.clone());
            Ok(session)
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
            Ok(self.sessions.lock().unwrap().get(id).cloned())
        }

        async fn find_owned(&self, id: &str, owner_id: &str) -> Result<Option<Session>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .get(id)
                .filter(|s| s.owner_id == owner_id)
                .cloned())
        }

        async fn update(&self, id: &str, update: SessionUpdate) -> Result<Session> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get_mut(id)
                .ok_or_else(|| InterviewError::session_not_found(id))?;
            update.apply_to(session)?;
            Ok(session.clone())
        }

        async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Session>> {
            let mut list: Vec<Session> = self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.owner_id == owner_id)
                .cloned()
                .collect();
            list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(list)
        }

        fn backend_name(&self) -> &str {
            "mock"
        }
    }

    #[derive(Default)]
    struct MockAnalytics {
        records: Mutex<HashMap<String, CallAnalytics>>,
        fail: bool,
    }

    #[async_trait]
    impl AnalyticsStore for MockAnalytics {
        async fn upsert(&self, session_id: &str, update: AnalyticsUpdate) -> Result<CallAnalytics> {
            if self.fail {
                return Err(InterviewError::Storage("analytics table missing".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let record = records
                .entry(session_id.to_string())
                .or_insert_with(|| CallAnalytics::new(session_id));
            update.apply_to(record);
            Ok(record.clone())
        }

        async fn find(&self, session_id: &str) -> Result<Option<CallAnalytics>> {
            Ok(self.records.lock().unwrap().get(session_id).cloned())
        }
    }

    struct MockUsers {
        users: Vec<User>,
    }

    #[async_trait]
    impl UserDirectory for MockUsers {
        async fn find_by_identity(&self, identity: &Identity) -> Result<Option<User>> {
            Ok(self.users.iter().find(|u| &u.identity == identity).cloned())
        }
    }

    const QUESTIONS_JSON: &str = r#"["What is ownership?", "Explain async/await.", "Describe a *hard* bug."]"#;

    fn feedback_json(total: u8) -> String {
        format!(
            r#"{{
                "totalScore": {total},
                "categoryScores": [
                    {{"name": "Communication Skills", "score": 80, "comment": "Clear"}},
                    {{"name": "Technical Knowledge", "score": 92, "comment": "Deep"}},
                    {{"name": "Problem Solving", "score": 84, "comment": "Methodical"}},
                    {{"name": "Cultural Fit", "score": 86, "comment": "Collaborative"}},
                    {{"name": "Confidence and Clarity", "score": 78, "comment": "Steady"}}
                ],
                "strengths": ["Ownership model", "Testing habits"],
                "areasForImprovement": ["Concurrency depth"],
                "finalAssessment": "A strong candidate."
            }}"#
        )
    }

    fn transcript_messages() -> Vec<TranscriptMessage> {
        vec![
            TranscriptMessage::structured("assistant", "What is ownership in Rust?"),
            TranscriptMessage::structured(
                "user",
                "Every value has a single owner and is dropped when the owner goes out of scope.",
            ),
        ]
    }

    struct Harness {
        manager: SessionManager,
        sessions: Arc<MockSessions>,
        analytics: Arc<MockAnalytics>,
        bus: EventBus,
        alice: Identity,
        bob: Identity,
    }

    fn harness_with(llm: RoutingLlm, analytics: MockAnalytics, policy: InterviewPolicy) -> Harness {
        let alice = Identity::new("auth|alice");
        let bob = Identity::new("auth|bob");
        let users = MockUsers {
            users: vec![User::new(alice.clone(), "Alice"), User::new(bob.clone(), "Bob")],
        };
        let sessions = Arc::new(MockSessions::default());
        let analytics = Arc::new(analytics);
        let bus = EventBus::new();
        let ports = ServicePorts {
            llm: Arc::new(llm),
            sessions: sessions.clone(),
            analytics: analytics.clone(),
            users: Arc::new(users),
        };
        Harness {
            manager: SessionManager::new(ports, policy, bus.clone()),
            sessions,
            analytics,
            bus,
            alice,
            bob,
        }
    }

    fn harness(llm: RoutingLlm) -> Harness {
        harness_with(llm, MockAnalytics::default(), InterviewPolicy::default())
    }

    // ─── EventBus Tests ──────────────────────────────────────

    #[test]
    fn test_event_bus_emit_and_drain() {
        let bus = EventBus::new();
        assert!(bus.drain().is_empty());
        bus.emit(SessionEvent::Started {
            session_id: "s1".to_string(),
        });
        bus.emit(SessionEvent::AnalyticsFailed {
            session_id: "s1".to_string(),
        });
        assert_eq!(bus.drain().len(), 2);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_event_bus_clone_shares_state() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        bus1.emit(SessionEvent::Started {
            session_id: "s1".to_string(),
        });
        assert_eq!(bus2.drain().len(), 1);
        assert!(bus1.drain().is_empty());
    }

    // ─── Extraction Tests ────────────────────────────────────

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("Here:\n```\n[1]\n```\nDone"), "[1]");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn test_outermost_span() {
        assert_eq!(
            outermost_span("pre {\"a\":{\"b\":1}} post", '{', '}'),
            Some("{\"a\":{\"b\":1}}")
        );
        assert_eq!(outermost_span("no braces", '{', '}'), None);
        assert_eq!(outermost_span("} backwards {", '{', '}'), None);
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_speech_safe() {
        assert_eq!(speech_safe("CI/CD *pipelines*"), "CI CD pipelines");
        assert_eq!(speech_safe("  many   spaces "), "many spaces");
    }

    // ─── Question Generator Tests ────────────────────────────

    fn request(role: &str) -> QuestionRequest {
        QuestionRequest::from(&NewSession::for_role(role))
    }

    #[test]
    fn test_parse_questions_sanitizes() {
        let questions = parse_questions(QUESTIONS_JSON, 10).unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[1], "Explain async await.");
        assert_eq!(questions[2], "Describe a hard bug.");
    }

    #[test]
    fn test_parse_questions_fenced_and_wrapped() {
        let raw = "Sure! Here you go:\n```json\n[\"One?\", \"Two?\"]\n```";
        assert_eq!(parse_questions(raw, 10).unwrap(), vec!["One?", "Two?"]);
    }

    #[test]
    fn test_parse_questions_truncates_and_skips_non_strings() {
        let raw = r#"["A?", 42, "", "B?", "C?"]"#;
        assert_eq!(parse_questions(raw, 2).unwrap(), vec!["A?", "B?"]);
    }

    #[test]
    fn test_parse_questions_rejects_garbage() {
        assert!(parse_questions("I cannot help with that.", 5).is_none());
        assert!(parse_questions("[]", 5).is_none());
        assert!(parse_questions(r#"{"questions": 1}"#, 5).is_none());
    }

    #[test]
    fn test_fallback_questions() {
        let questions = fallback_questions("UI/UX Designer");
        assert_eq!(questions.len(), FALLBACK_QUESTION_COUNT);
        assert!(questions.iter().any(|q| q.contains("UI UX Designer")));
        assert!(questions.iter().all(|q| !q.contains('/') && !q.contains('*')));
    }

    #[test]
    fn test_question_prompt_mentions_inputs() {
        let req = QuestionRequest {
            role: "SRE".to_string(),
            difficulty: "Senior".to_string(),
            tech_stack: Some("Kubernetes".to_string()),
            session_type: "Technical".to_string(),
            question_count: None,
        };
        let prompt = build_question_prompt(&req, 6);
        assert!(prompt.contains("SRE"));
        assert!(prompt.contains("Senior"));
        assert!(prompt.contains("Kubernetes"));
        assert!(prompt.contains("6"));
        assert!(prompt.contains("JSON array"));
    }

    #[tokio::test]
    async fn test_generator_success() {
        let llm = Arc::new(RoutingLlm::healthy());
        let generator = QuestionGenerator::new(llm, InterviewPolicy::default());
        let generated = generator.generate(&request("Rust Engineer")).await;
        assert!(!generated.fallback);
        assert_eq!(generated.questions.len(), 3);
    }

    #[tokio::test]
    async fn test_generator_llm_error_uses_fallback() {
        let llm = Arc::new(RoutingLlm::new(
            Err(InterviewError::Network("connection reset".to_string())),
            Ok(String::new()),
        ));
        let generator = QuestionGenerator::new(llm, InterviewPolicy::default());
        let generated = generator.generate(&request("Data Analyst")).await;
        assert!(generated.fallback);
        assert_eq!(generated.questions, fallback_questions("Data Analyst"));
    }

    #[tokio::test]
    async fn test_generator_unparseable_uses_fallback() {
        let llm = Arc::new(RoutingLlm::new(
            Ok("Question one. Question two.".to_string()),
            Ok(String::new()),
        ));
        let generator = QuestionGenerator::new(llm, InterviewPolicy::default());
        let generated = generator.generate(&request("PM")).await;
        assert!(generated.fallback);
        assert_eq!(generated.questions.len(), FALLBACK_QUESTION_COUNT);
    }

    // ─── Assistant Config Tests ──────────────────────────────

    #[test]
    fn test_assistant_config_embeds_questions() {
        let questions = vec!["What is a lifetime?".to_string(), "Why Tokio?".to_string()];
        let session = Session::new("u1", &NewSession::for_role("Rust Engineer"), questions);
        let config = build_assistant_config(&session).unwrap();

        assert!(config.first_message.contains("Rust Engineer"));
        let prompt = config.system_prompt().unwrap();
        assert!(prompt.contains("- What is a lifetime?\n- Why Tokio?"));
        assert!(prompt.contains("follow-up"));
        assert_eq!(config.voice.provider, "11labs");
        assert_eq!(config.transcriber.provider, "deepgram");
    }

    #[test]
    fn test_assistant_config_is_deterministic() {
        let session = Session::new("u1", &NewSession::for_role("QA"), vec!["Q?".to_string()]);
        assert_eq!(
            build_assistant_config(&session).unwrap(),
            build_assistant_config(&session).unwrap()
        );
    }

    #[test]
    fn test_assistant_config_speech_safe_role() {
        let session = Session::new("u1", &NewSession::for_role("UI/UX"), vec!["Q?".to_string()]);
        let config = build_assistant_config(&session).unwrap();
        assert!(!config.first_message.contains('/'));
    }

    #[test]
    fn test_assistant_config_requires_questions() {
        let session = Session::new("u1", &NewSession::for_role("QA"), vec![]);
        let err = build_assistant_config(&session).unwrap_err();
        assert!(matches!(err, InterviewError::InvalidInput(_)));
    }

    // ─── Repair Ladder Tests ─────────────────────────────────

    fn policy() -> InterviewPolicy {
        InterviewPolicy::default()
    }

    #[test]
    fn test_whole_response_strategy() {
        let raw = format!("```json\n{}\n```", feedback_json(85));
        let feedback = ParseStrategy::WholeResponse.apply(&raw, &policy()).unwrap();
        assert_eq!(feedback.total_score, 85);
        assert_eq!(feedback.category_scores.len(), 5);
        assert!(!feedback.is_fallback);
    }

    #[test]
    fn test_whole_response_rejects_prose() {
        let raw = format!("Here is my evaluation: {} Hope it helps!", feedback_json(70));
        assert!(ParseStrategy::WholeResponse.apply(&raw, &policy()).is_none());
    }

    #[test]
    fn test_brace_span_strategy() {
        let raw = format!("Here is my evaluation: {} Hope it helps!", feedback_json(70));
        let feedback = ParseStrategy::BraceSpan.apply(&raw, &policy()).unwrap();
        assert_eq!(feedback.total_score, 70);
        assert_eq!(feedback.strengths.len(), 2);
    }

    #[test]
    fn test_score_recovery_strategy() {
        let raw = "The candidate did well overall, I would give them 82/100 for this one.";
        let feedback = ParseStrategy::ScoreRecovery.apply(raw, &policy()).unwrap();
        assert_eq!(feedback.total_score, 82);
        assert!(feedback.category_scores.iter().all(|c| c.score == 75));
        assert!(feedback.is_fallback);
        assert!(feedback.final_assessment.contains("82/100"));
    }

    #[test]
    fn test_recover_score_patterns() {
        assert_eq!(recover_score(r#"{"totalScore": 64, "categoryScores": [1,"#), Some(64));
        assert_eq!(recover_score("score 3 of 5, overall 91/100"), Some(91));
        assert_eq!(recover_score("I'd say about 70"), Some(70));
        assert_eq!(recover_score("year 2024, 450 points"), None);
        assert_eq!(recover_score("nothing numeric"), None);
    }

    #[test]
    fn test_ladder_order() {
        let raw = format!("prefix {} suffix", feedback_json(66));
        let parsed = parse_feedback(&raw, &policy());
        assert_eq!(parsed.strategy, Some(ParseStrategy::BraceSpan));
        assert_eq!(parsed.feedback.total_score, 66);

        let parsed = parse_feedback(&feedback_json(90), &policy());
        assert_eq!(parsed.strategy, Some(ParseStrategy::WholeResponse));
    }

    #[test]
    fn test_ladder_synthesizes_default() {
        let parsed = parse_feedback("I am unable to evaluate this.", &policy());
        assert_eq!(parsed.strategy, None);
        assert_eq!(parsed.feedback.total_score, 75);
        assert!(parsed.feedback.is_fallback);
        assert_eq!(parsed.feedback.category_scores.len(), 5);
        assert_eq!(parsed.feedback.final_assessment, "I am unable to evaluate this.");
    }

    #[test]
    fn test_ladder_truncates_raw_excerpt() {
        let raw = "word ".repeat(400);
        let parsed = parse_feedback(&raw, &policy());
        assert!(parsed.feedback.final_assessment.chars().count() <= 503);
    }

    #[test]
    fn test_normalize_missing_fields() {
        let parsed = parse_feedback("{}", &policy());
        let feedback = parsed.feedback;
        assert_eq!(feedback.total_score, 75);
        assert_eq!(feedback.category_scores.len(), 5);
        assert!(feedback.strengths.is_empty());
        assert!(feedback.areas_for_improvement.is_empty());
        assert!(feedback.is_fallback);
    }

    #[test]
    fn test_normalize_clamps_and_coerces() {
        let raw = r#"{"totalScore": "88", "categoryScores": [
            {"name": "Technical Knowledge", "score": 140},
            {"name": "Communication Skills", "score": 71.6}
        ], "strengths": "Curiosity"}"#;
        let feedback = parse_feedback(raw, &policy()).feedback;
        assert_eq!(feedback.total_score, 88);
        assert_eq!(feedback.category_score_or(TECHNICAL_KNOWLEDGE, 0), 100);
        assert_eq!(feedback.category_score_or(COMMUNICATION_SKILLS, 0), 72);
        // Missing categories are filled at the total score
        assert_eq!(feedback.category_scores.len(), 5);
        assert_eq!(feedback.category_score_or(CULTURAL_FIT, 0), 88);
        assert_eq!(feedback.strengths, vec!["Curiosity"]);
        assert!(!feedback.is_fallback);
    }

    #[test]
    fn test_normalize_caps_extra_categories() {
        let raw = r#"{"totalScore": 60, "categoryScores": [
            {"name": "A", "score": 1}, {"name": "B", "score": 2}, {"name": "C", "score": 3},
            {"name": "D", "score": 4}, {"name": "E", "score": 5}, {"name": "F", "score": 6}
        ]}"#;
        let feedback = parse_feedback(raw, &policy()).feedback;
        assert_eq!(feedback.category_scores.len(), 5);
        assert_eq!(feedback.category_scores[0].name, "A");
    }

    // ─── Transcript & Persistence Mapping Tests ──────────────

    #[test]
    fn test_normalize_transcript_prefers_messages() {
        let messages = vec![TranscriptMessage::structured("user", "from messages")];
        assert_eq!(
            normalize_transcript(Some("from transcript"), &messages, 10),
            "user: from messages"
        );
        assert_eq!(normalize_transcript(Some("  raw text here "), &[], 10), "raw text here");
        assert_eq!(normalize_transcript(None, &[], 10), "");
    }

    #[test]
    fn test_normalize_transcript_falls_back_when_messages_are_short() {
        let messages = vec![TranscriptMessage::structured("u", "ok")];
        let transcript = "assistant: Tell me about ownership.\nuser: Every value has exactly one owner.";
        assert_eq!(normalize_transcript(Some(transcript), &messages, 10), transcript);

        // Both short: the longer one comes back and the caller short-circuits
        assert_eq!(normalize_transcript(Some("hi"), &messages, 10), "u: ok");
        assert_eq!(normalize_transcript(Some("hello"), &[], 10), "hello");
    }

    #[test]
    fn test_feedback_prompt_lists_categories() {
        let prompt = build_feedback_prompt("user: hello");
        assert!(prompt.contains("Transcript:\nuser: hello"));
        for name in FEEDBACK_CATEGORIES {
            assert!(prompt.contains(name), "missing category {}", name);
        }
        assert!(prompt.contains("\"totalScore\""));
    }

    #[test]
    fn test_completion_update_maps_categories() {
        let feedback = parse_feedback(&feedback_json(85), &policy()).feedback;
        let update = completion_update(&feedback, None, &policy());
        assert_eq!(update.status, Some(SessionStatus::Completed));
        assert_eq!(update.overall_score, Some(85));
        assert_eq!(update.technical_score, Some(92));
        assert_eq!(update.communication_score, Some(80));
        assert_eq!(update.confidence_score, Some(78));
        assert_eq!(update.weaknesses, Some(vec!["Concurrency depth".to_string()]));
        assert_eq!(update.detailed_feedback.as_deref(), Some("A strong candidate."));
        assert!(update.ended_at.is_some());
    }

    #[test]
    fn test_completion_update_defaults() {
        let mut feedback = Feedback::uniform(70, "x");
        feedback.category_scores.retain(|c| c.name != TECHNICAL_KNOWLEDGE);
        let update = completion_update(&feedback, Some("raw model text"), &policy());
        assert_eq!(update.technical_score, Some(50));
        assert_eq!(update.detailed_feedback.as_deref(), Some("raw model text"));
    }

    #[test]
    fn test_degraded_documents() {
        let empty = empty_transcript_feedback(&policy());
        assert!(empty.category_scores.iter().all(|c| c.score == 50));
        assert_eq!(empty.category_scores[0].comment, NO_TRANSCRIPT_COMMENT);

        let errored = model_error_feedback(&policy());
        assert_eq!(errored.total_score, 60);
        assert_eq!(errored.category_scores[0].comment, MODEL_ERROR_COMMENT);
    }

    // ─── Feedback Deriver Tests ──────────────────────────────

    async fn seeded_deriver(llm: RoutingLlm) -> (FeedbackDeriver, Arc<MockSessions>, String) {
        let sessions = Arc::new(MockSessions::default());
        let session = Session::new("u1", &NewSession::for_role("Dev"), vec!["Q?".to_string()]);
        let id = session.id.clone();
        sessions.create(session).await.unwrap();
        let deriver = FeedbackDeriver::new(
            Arc::new(llm),
            sessions.clone(),
            Arc::new(MockAnalytics::default()),
            policy(),
        );
        (deriver, sessions, id)
    }

    #[tokio::test]
    async fn test_deriver_missing_session_returns_none() {
        let (deriver, _, _) = seeded_deriver(RoutingLlm::healthy()).await;
        let req = FeedbackRequest {
            session_id: "missing".to_string(),
            transcript: Some("long enough transcript".to_string()),
            messages: vec![],
        };
        assert!(deriver.derive(req, Abandonment::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_deriver_skips_write_when_abandoned() {
        let (deriver, sessions, id) = seeded_deriver(RoutingLlm::healthy()).await;
        let abandoned = Abandonment::new();
        abandoned.abandon().await;
        let req = FeedbackRequest {
            session_id: id.clone(),
            transcript: None,
            messages: transcript_messages(),
        };
        let feedback = deriver.derive(req, abandoned).await.unwrap();
        assert_eq!(feedback.total_score, 85);

        let stored = sessions.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Scheduled);
        assert_eq!(sessions.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deriver_uses_transcript_when_messages_are_short() {
        let (deriver, sessions, id) = seeded_deriver(RoutingLlm::healthy()).await;
        let req = FeedbackRequest {
            session_id: id.clone(),
            transcript: Some(
                "assistant: Tell me about ownership.\nuser: Every value has exactly one owner."
                    .to_string(),
            ),
            messages: vec![TranscriptMessage::structured("u", "ok")],
        };
        let feedback = deriver.derive(req, Abandonment::new()).await.unwrap();
        assert_eq!(feedback.total_score, 85);
        assert!(!feedback.is_fallback);

        let stored = sessions.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.overall_score, Some(85));
    }

    #[tokio::test]
    async fn test_abandon_waits_for_in_flight_write() {
        let abandoned = Abandonment::new();
        let guard = abandoned.write_guard().await;
        assert!(guard.is_some());

        let pending = abandoned.clone();
        let abandon = tokio::spawn(async move { pending.abandon().await });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(!abandoned.is_abandoned());

        drop(guard);
        abandon.await.unwrap();
        assert!(abandoned.is_abandoned());
        assert!(abandoned.write_guard().await.is_none());
    }

    // ─── Lifecycle Tests ─────────────────────────────────────

    #[tokio::test]
    async fn test_create_requires_identity() {
        let h = harness(RoutingLlm::healthy());
        let err = h
            .manager
            .create(NewSession::for_role("Dev"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, InterviewError::Unauthorized));
    }

    #[tokio::test]
    async fn test_create_unknown_user() {
        let h = harness(RoutingLlm::healthy());
        let stranger = Identity::new("auth|nobody");
        let err = h
            .manager
            .create(NewSession::for_role("Dev"), Some(&stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, InterviewError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_role() {
        let h = harness(RoutingLlm::healthy());
        let err = h
            .manager
            .create(NewSession::for_role("   "), Some(&h.alice))
            .await
            .unwrap_err();
        assert!(matches!(err, InterviewError::InvalidInput(_)));
        assert!(h.sessions.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_schedules_session() {
        let h = harness(RoutingLlm::healthy());
        let created = h
            .manager
            .create(NewSession::for_role("Rust Engineer"), Some(&h.alice))
            .await
            .unwrap();
        assert_eq!(created.session.status, SessionStatus::Scheduled);
        assert_eq!(created.session.questions.len(), 3);
        assert!(created
            .session
            .questions
            .iter()
            .all(|q| !q.contains('/') && !q.contains('*')));
        assert_eq!(created.session.overall_score, None);
        assert!(!created.interview_id.is_empty());

        let events = h.bus.drain();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Created { fallback_questions: false, question_count: 3, .. }]
        ));
    }

    #[tokio::test]
    async fn test_create_with_failed_generation_uses_fallback() {
        let llm = RoutingLlm::new(Err(InterviewError::Llm("quota".to_string())), Ok(String::new()));
        let h = harness(llm);
        let created = h
            .manager
            .create(NewSession::for_role("Designer"), Some(&h.alice))
            .await
            .unwrap();
        assert_eq!(created.session.questions, fallback_questions("Designer"));
    }

    #[tokio::test]
    async fn test_start_nonexistent_is_not_found_without_mutation() {
        let h = harness(RoutingLlm::healthy());
        let err = h.manager.start("nope", Some(&h.alice)).await.unwrap_err();
        assert!(matches!(err, InterviewError::NotFound(_)));
        assert_eq!(h.sessions.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_other_owner_is_not_found() {
        let h = harness(RoutingLlm::healthy());
        let created = h
            .manager
            .create(NewSession::for_role("Dev"), Some(&h.alice))
            .await
            .unwrap();
        let err = h
            .manager
            .start(&created.session.id, Some(&h.bob))
            .await
            .unwrap_err();
        assert!(matches!(err, InterviewError::NotFound(_)));
        assert_eq!(h.sessions.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_moves_to_in_progress() {
        let h = harness(RoutingLlm::healthy());
        let created = h
            .manager
            .create(NewSession::for_role("Dev"), Some(&h.alice))
            .await
            .unwrap();
        let started = h
            .manager
            .start(&created.session.id, Some(&h.alice))
            .await
            .unwrap();
        assert_eq!(started.session.status, SessionStatus::InProgress);
        assert!(started.session.started_at.is_some());
        assert_eq!(started.questions, created.session.questions);
        assert!(started
            .assistant_config
            .system_prompt()
            .unwrap()
            .contains("- What is ownership?"));
    }

    #[tokio::test]
    async fn test_start_without_questions_marks_failed() {
        let h = harness(RoutingLlm::healthy());
        let session = Session::new(
            h.manager_user_id(&h.alice).await,
            &NewSession::for_role("Dev"),
            vec![],
        );
        let id = session.id.clone();
        h.sessions.create(session).await.unwrap();

        let err = h.manager.start(&id, Some(&h.alice)).await.unwrap_err();
        assert!(matches!(err, InterviewError::InvalidInput(_)));
        let stored = h.sessions.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Failed);
        assert!(h
            .bus
            .drain()
            .iter()
            .any(|e| matches!(e, SessionEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_start_completed_session_is_rejected() {
        let h = harness(RoutingLlm::healthy());
        let id = h.completed_session().await;
        let err = h.manager.start(&id, Some(&h.alice)).await.unwrap_err();
        assert!(matches!(
            err,
            InterviewError::InvalidTransition {
                from: SessionStatus::Completed,
                to: SessionStatus::InProgress
            }
        ));
    }

    #[tokio::test]
    async fn test_complete_persists_parsed_feedback() {
        let h = harness(RoutingLlm::healthy());
        let id = h.started_session().await;
        let done = h
            .manager
            .complete(&id, Some(&h.alice), None, transcript_messages())
            .await
            .unwrap();

        assert_eq!(done.session.status, SessionStatus::Completed);
        assert_eq!(done.session.overall_score, Some(85));
        assert_eq!(done.session.technical_score, Some(92));
        assert_eq!(done.session.communication_score, Some(80));
        assert_eq!(done.session.confidence_score, Some(78));
        assert_eq!(done.session.weaknesses, vec!["Concurrency depth"]);
        assert!(done.session.ended_at.is_some());
        let feedback = done.feedback.unwrap();
        assert_eq!(feedback.total_score, 85);

        let analytics = h.manager.get_analytics(&id, Some(&h.alice)).await.unwrap();
        assert_eq!(analytics.message_count, 2);
        assert!(analytics.metadata.contains_key("rawFeedback"));
        assert!(analytics.started_at.is_some());
        assert_eq!(analytics.started_at, done.session.started_at);
    }

    #[tokio::test]
    async fn test_complete_twice_stays_completed() {
        let h = harness(RoutingLlm::healthy());
        let id = h.started_session().await;
        for _ in 0..2 {
            let done = h
                .manager
                .complete(&id, Some(&h.alice), None, transcript_messages())
                .await
                .unwrap();
            assert_eq!(done.session.status, SessionStatus::Completed);
            assert_eq!(done.session.overall_score, Some(85));
        }
    }

    #[tokio::test]
    async fn test_complete_short_transcript_is_neutral() {
        let h = harness(RoutingLlm::healthy());
        let id = h.started_session().await;
        let done = h
            .manager
            .complete(&id, Some(&h.alice), Some("hi".to_string()), vec![])
            .await
            .unwrap();
        assert_eq!(done.session.status, SessionStatus::Completed);
        let feedback = done.feedback.unwrap();
        assert!(feedback.category_scores.iter().all(|c| c.score == 50));
        assert_eq!(done.session.overall_score, Some(50));
    }

    #[tokio::test]
    async fn test_complete_model_error_still_completes() {
        let llm = RoutingLlm::new(
            Ok(QUESTIONS_JSON.to_string()),
            Err(InterviewError::Llm("HTTP 429".to_string())),
        );
        let h = harness(llm);
        let id = h.started_session().await;
        let done = h
            .manager
            .complete(&id, Some(&h.alice), None, transcript_messages())
            .await
            .unwrap();
        assert_eq!(done.session.status, SessionStatus::Completed);
        assert_eq!(done.session.overall_score, Some(60));
        assert!(done.session.detailed_feedback.is_some());

        let analytics = h.analytics.find(&id).await.unwrap().unwrap();
        assert!(analytics.metadata.contains_key("feedbackError"));
    }

    #[tokio::test]
    async fn test_analytics_failure_does_not_block_feedback() {
        let analytics = MockAnalytics {
            fail: true,
            ..Default::default()
        };
        let h = harness_with(RoutingLlm::healthy(), analytics, policy());
        let id = h.started_session().await;
        let done = h
            .manager
            .complete(&id, Some(&h.alice), None, transcript_messages())
            .await
            .unwrap();
        assert_eq!(done.session.overall_score, Some(85));
        assert!(h
            .bus
            .drain()
            .iter()
            .any(|e| matches!(e, SessionEvent::AnalyticsFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_timeout_writes_degraded_and_ignores_late_result() {
        let mut llm = RoutingLlm::healthy();
        llm.feedback_delay = Some(Duration::from_secs(5));
        let policy = InterviewPolicy {
            feedback_timeout_secs: 1,
            ..InterviewPolicy::default()
        };
        let h = harness_with(llm, MockAnalytics::default(), policy);
        let id = h.started_session().await;

        let done = h
            .manager
            .complete(&id, Some(&h.alice), None, transcript_messages())
            .await
            .unwrap();
        assert!(done.feedback.is_none());
        assert_eq!(done.session.status, SessionStatus::Completed);
        assert_eq!(done.session.overall_score, Some(50));
        assert!(done.session.detailed_feedback.is_some());
        assert!(h
            .bus
            .drain()
            .iter()
            .any(|e| matches!(e, SessionEvent::FeedbackTimedOut { .. })));

        // Let the abandoned derivation finish; it must not overwrite.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let stored = h.sessions.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.overall_score, Some(50));
    }

    #[tokio::test]
    async fn test_complete_failed_session_keeps_status() {
        let h = harness(RoutingLlm::healthy());
        let user_id = h.manager_user_id(&h.alice).await;
        let mut session = Session::new(user_id, &NewSession::for_role("Dev"), vec!["Q?".into()]);
        session.status = SessionStatus::Failed;
        let id = session.id.clone();
        h.sessions.create(session).await.unwrap();

        let done = h
            .manager
            .complete(&id, Some(&h.alice), None, transcript_messages())
            .await
            .unwrap();
        assert_eq!(done.session.status, SessionStatus::Failed);
        assert!(done.feedback.is_none());
        // Diagnostics are still captured
        assert!(h.analytics.find(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_complete_unknown_session_is_not_found() {
        let h = harness(RoutingLlm::healthy());
        let err = h
            .manager
            .complete("ghost", Some(&h.alice), None, transcript_messages())
            .await
            .unwrap_err();
        assert!(matches!(err, InterviewError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_newest_first() {
        let h = harness(RoutingLlm::healthy());
        let first = h
            .manager
            .create(NewSession::for_role("First"), Some(&h.alice))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = h
            .manager
            .create(NewSession::for_role("Second"), Some(&h.alice))
            .await
            .unwrap();
        h.manager
            .create(NewSession::for_role("Bob's"), Some(&h.bob))
            .await
            .unwrap();

        let list = h.manager.list(Some(&h.alice)).await.unwrap();
        let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![second.session.id.as_str(), first.session.id.as_str()]);

        let err = h
            .manager
            .get(&first.session.id, Some(&h.bob))
            .await
            .unwrap_err();
        assert!(matches!(err, InterviewError::NotFound(_)));
    }

    // ─── Harness helpers ─────────────────────────────────────

    impl Harness {
        async fn manager_user_id(&self, identity: &Identity) -> String {
            // The owner id is whatever the directory assigned at construction
            let created = self
                .manager
                .create(NewSession::for_role("Warmup"), Some(identity))
                .await
                .unwrap();
            created.session.owner_id
        }

        async fn started_session(&self) -> String {
            let created = self
                .manager
                .create(NewSession::for_role("Rust Engineer"), Some(&self.alice))
                .await
                .unwrap();
            self.manager
                .start(&created.session.id, Some(&self.alice))
                .await
                .unwrap();
            self.bus.drain();
            created.session.id
        }

        async fn completed_session(&self) -> String {
            let id = self.started_session().await;
            self.manager
                .complete(&id, Some(&self.alice), None, transcript_messages())
                .await
                .unwrap();
            self.bus.drain();
            id
        }
    }
}
