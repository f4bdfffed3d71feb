//! 对话流程集成测试：跨轮次历史、执行桥下的并发对话、检查点故障

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use async_trait::async_trait;
    use investica::agents::{AgentRegistry, LlmAgent, ScriptedAgent};
    use investica::checkpoint::{
        CheckpointError, CheckpointRecord, CheckpointStore, MemoryCheckpointStore,
    };
    use investica::core::{BridgeConfig, ExecutionBridge, FlowError};
    use investica::flow::{AgenticFlow, RoutingPolicy};
    use investica::llm::LlmClient;
    use investica::memory::Message;
    use investica::Assistant;

    /// 可切换读 / 写失败的存储，其余委托给内存实现
    struct FaultyStore {
        inner: MemoryCheckpointStore,
        fail_load: AtomicBool,
        fail_save: AtomicBool,
    }

    impl FaultyStore {
        fn new() -> Self {
            Self {
                inner: MemoryCheckpointStore::new(),
                fail_load: AtomicBool::new(false),
                fail_save: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl CheckpointStore for FaultyStore {
        async fn load(&self, conversation_id: &str) -> Result<CheckpointRecord, CheckpointError> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(CheckpointError::Unavailable("disk offline".into()));
            }
            self.inner.load(conversation_id).await
        }

        async fn save(&self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(CheckpointError::Unavailable("disk full".into()));
            }
            self.inner.save(record).await
        }

        async fn list_conversations(&self) -> Result<Vec<String>, CheckpointError> {
            self.inner.list_conversations().await
        }
    }

    fn flow_with_store(
        router_script: Vec<&str>,
        store: Arc<dyn CheckpointStore>,
        agent_delay: Option<Duration>,
    ) -> AgenticFlow {
        let mut zerodha = ScriptedAgent::always("zerodha_agent", "Holdings: INFY x10");
        if let Some(delay) = agent_delay {
            zerodha = zerodha.with_delay(delay);
        }
        let agents = AgentRegistry::builder()
            .register("zerodha_agent", "trading", Arc::new(zerodha))
            .build()
            .unwrap();
        AgenticFlow::new(
            RoutingPolicy::new(Arc::new(ScriptedAgent::new("router", router_script))),
            agents,
            Arc::new(ScriptedAgent::always("end_conversation_agent", "Summary")),
            store,
        )
    }

    #[tokio::test]
    async fn test_two_turns_concatenate_history() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let flow = flow_with_store(
            vec!["zerodha_agent", "end_conversation_agent"],
            store.clone(),
            None,
        );

        flow.handle_turn("conv", "show holdings").await.unwrap();
        let after_first = flow.history("conv").await.unwrap();
        flow.handle_turn("conv", "thanks").await.unwrap();
        let after_second = flow.history("conv").await.unwrap();

        assert_eq!(after_second[..after_first.len()], after_first[..]);
        assert_eq!(after_second[after_first.len()], Message::user("thanks"));
        assert_eq!(after_second.last(), Some(&Message::assistant("Summary")));
    }

    #[tokio::test]
    async fn test_load_failure_is_fatal_and_writes_nothing() {
        let store = Arc::new(FaultyStore::new());
        store.fail_load.store(true, Ordering::SeqCst);
        let flow = flow_with_store(vec!["end_conversation_agent"], store.clone(), None);

        let err = flow.handle_turn("x", "hello").await.unwrap_err();
        assert!(matches!(err, FlowError::CheckpointUnavailable(_)));
        assert!(!err.is_resumable());
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_save_failure_is_fatal() {
        let store = Arc::new(FaultyStore::new());
        store.fail_save.store(true, Ordering::SeqCst);
        let flow = flow_with_store(vec!["end_conversation_agent"], store.clone(), None);

        let err = flow.handle_turn("x", "hello").await.unwrap_err();
        assert!(matches!(err, FlowError::CheckpointUnavailable(_)));
        assert!(err.user_message().starts_with("I encountered an error"));
    }

    #[test]
    fn test_concurrent_conversations_through_bridge() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let flow = flow_with_store(vec!["end_conversation_agent"], store.clone(), None);
        let assistant = Arc::new(Assistant::new(flow, ExecutionBridge::default()));

        let handles: Vec<_> = ["alpha", "beta", "gamma", "delta"]
            .into_iter()
            .map(|id| {
                let assistant = Arc::clone(&assistant);
                thread::spawn(move || {
                    for turn in 0..3 {
                        let text = format!("{id} message {turn}");
                        assistant.handle_turn(id, &text).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for id in ["alpha", "beta", "gamma", "delta"] {
            let history = assistant.history(id).unwrap();
            assert_eq!(history.len(), 6, "conversation {id}");
            for (turn, pair) in history.chunks(2).enumerate() {
                assert_eq!(pair[0], Message::user(format!("{id} message {turn}")));
                assert_eq!(pair[1], Message::assistant("Summary"));
            }
        }
        assert_eq!(assistant.conversations().unwrap().len(), 4);
    }

    /// 永不返回的 LLM
    struct HangingLlm;

    #[async_trait]
    impl LlmClient for HangingLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }
    }

    #[test]
    fn test_agent_retry_budget_within_bridge_timeout_yields_visible_error() {
        let agent = LlmAgent::new("zerodha_agent", "sys", Arc::new(HangingLlm))
            .with_max_attempts(2)
            .with_request_timeout(Duration::from_millis(100));
        let agents = AgentRegistry::builder()
            .register("zerodha_agent", "trading", Arc::new(agent))
            .build()
            .unwrap();
        let flow = AgenticFlow::new(
            RoutingPolicy::new(Arc::new(ScriptedAgent::new(
                "router",
                vec!["zerodha_agent", "end_conversation_agent"],
            ))),
            agents,
            Arc::new(ScriptedAgent::always("end_conversation_agent", "Summary")),
            Arc::new(MemoryCheckpointStore::new()),
        );
        let bridge = ExecutionBridge::new(BridgeConfig {
            submit_timeout: Duration::from_secs(2),
            shutdown_timeout: Duration::from_millis(200),
        });
        let assistant = Assistant::new(flow, bridge);

        assert_eq!(assistant.handle_turn("slow", "first").unwrap().reply, "Summary");
        assert_eq!(assistant.handle_turn("slow", "second").unwrap().reply, "Summary");

        let history = assistant.history("slow").unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents.len(), 5);
        assert_eq!(contents[0], "first");
        assert!(contents[1].starts_with("I encountered an error"));
        assert!(contents[1].contains("timed out after 100ms"));
        assert_eq!(contents[2], "Summary");
        assert_eq!(contents[3], "second");
        assert_eq!(contents[4], "Summary");
    }

    #[test]
    fn test_slow_turn_times_out_for_caller() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let flow = flow_with_store(
            vec!["zerodha_agent", "end_conversation_agent"],
            store,
            Some(Duration::from_millis(500)),
        );
        let bridge = ExecutionBridge::new(BridgeConfig {
            submit_timeout: Duration::from_millis(50),
            shutdown_timeout: Duration::from_millis(200),
        });
        let assistant = Assistant::new(flow, bridge);

        let err = assistant.handle_turn("slow", "show holdings").unwrap_err();
        assert!(matches!(err, FlowError::BridgeTimeout(_)));
        assert!(err.is_resumable());
        assert!(err.user_message().contains("background"));
    }
}
