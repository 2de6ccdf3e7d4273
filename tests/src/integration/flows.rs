//! # Bus and Lifecycle Flows
//!
//! Request/reply correlation, timeouts and the component lifecycle, all
//! over one shared in-memory broker.

#[cfg(test)]
mod tests {
    use super::super::{client, collect, registry};
    use async_trait::async_trait;
    use futures::future::join_all;
    use sic_bus::{request_fn, BusError, HandlerError, InMemoryBroker};
    use sic_component::{
        launch, Component, ComponentContext, ComponentError, ComponentState, LaunchOptions,
    };
    use sic_message::{
        Message, NoConf, PingRequest, PongMessage, StopRequest, SuccessMessage, TextMessage,
        TextRequest,
    };
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::time::timeout;

    const IP: &str = "10.1.0.1";
    const WAIT: Duration = Duration::from_secs(2);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Upper;

    #[async_trait]
    impl Component for Upper {
        const NAME: &'static str = "Upper";
        type Conf = NoConf;

        async fn create(_ctx: &ComponentContext, _conf: NoConf) -> Result<Self, HandlerError> {
            Ok(Upper)
        }

        async fn on_request(
            &self,
            _ctx: &ComponentContext,
            request: Box<dyn Message>,
        ) -> Result<Box<dyn Message>, HandlerError> {
            let request = request.downcast::<TextRequest>()?;
            Ok(TextMessage::new(request.text.to_uppercase().into()).boxed())
        }
    }

    struct Faulty;

    #[async_trait]
    impl Component for Faulty {
        const NAME: &'static str = "Faulty";
        type Conf = NoConf;

        async fn create(_ctx: &ComponentContext, _conf: NoConf) -> Result<Self, HandlerError> {
            Err("no such device /dev/video0".into())
        }
    }

    // =============================================================================
    // REQUEST / REPLY
    // =============================================================================

    /// Sixteen callers share one reply channel.
    #[tokio::test]
    async fn test_concurrent_requests_receive_their_own_replies() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let server = client(&broker, "server").await?;
        server
            .register_request_handler(
                "calc",
                request_fn(|request: Box<dyn Message>| async move {
                    let request = request.downcast::<TextRequest>()?;
                    let n: u64 = request.text.parse()?;
                    Ok::<Box<dyn Message>, HandlerError>(
                        TextMessage::new(format!("reply {n}").into()).boxed(),
                    )
                }),
            )
            .await?;

        let callers: Vec<_> = (0..16)
            .map(|i| {
                let broker = broker.clone();
                async move {
                    let bus = client(&broker, &format!("caller-{i}")).await?;
                    let reply = bus
                        .request_as::<TextMessage>(
                            "calc",
                            &TextRequest::new(i.to_string().into()),
                            WAIT,
                        )
                        .await?;
                    anyhow::Ok((i, reply.text.clone()))
                }
            })
            .collect();

        for result in join_all(callers).await {
            let (i, text) = result?;
            assert_eq!(text, format!("reply {i}"));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_request_without_handler_times_out() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let bus = client(&broker, "caller").await?;

        let started = Instant::now();
        let err = bus
            .request("nobody", &PingRequest::default(), Duration::from_millis(300), true)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < WAIT);
        assert_eq!(broker.subscriber_count("nobody"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_non_blocking_request_returns_immediately() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let bus = client(&broker, "caller").await?;
        let watcher = client(&broker, "watcher").await?;
        let mut seen = collect(&watcher, "jobs").await?;

        let reply = bus
            .request("jobs", &TextRequest::new("fire".into()), WAIT, false)
            .await?;
        assert!(reply.is_none());

        // The watcher drops requests, so nothing reaches it.
        assert!(timeout(Duration::from_millis(100), seen.recv()).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_data_message_is_not_a_request() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let bus = client(&broker, "caller").await?;
        let err = bus
            .request("calc", &TextMessage::new("x".into()), WAIT, true)
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::ContractViolation(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_publish_counts_subscribers() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let publisher = client(&broker, "publisher").await?;
        let first = client(&broker, "first").await?;
        let second = client(&broker, "second").await?;
        let mut a = collect(&first, "news").await?;
        let mut b = collect(&second, "news").await?;

        let delivered = publisher
            .publish("news", &TextMessage::new("hello".into()).with_origin("publisher"))
            .await?;
        assert_eq!(delivered, 2);

        for rx in [&mut a, &mut b] {
            let message = timeout(WAIT, rx.recv()).await?.expect("message");
            assert_eq!(message.origin(), Some("publisher"));
        }
        Ok(())
    }

    // =============================================================================
    // LIFECYCLE
    // =============================================================================

    #[tokio::test]
    async fn test_component_lifecycle_end_to_end() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let handle = launch::<Upper>(LaunchOptions::new(Arc::new(broker.clone()), registry(), IP));
        handle.wait_ready(WAIT).await?;
        assert_eq!(handle.state(), ComponentState::Running);

        let bus = client(&broker, "operator").await?;
        let reqreply = handle.reqreply_channel();
        bus.request_as::<PongMessage>(&reqreply, &PingRequest::default(), WAIT)
            .await?;
        let reply = bus
            .request_as::<TextMessage>(&reqreply, &TextRequest::new("loud".into()), WAIT)
            .await?;
        assert_eq!(reply.text, "LOUD");

        bus.request_as::<SuccessMessage>(&reqreply, &StopRequest::default(), WAIT)
            .await?;
        timeout(WAIT, handle.join()).await??;

        assert_eq!(handle.state(), ComponentState::Stopped);
        assert_eq!(broker.subscriber_count(&reqreply), 0);
        let err = bus
            .request(&reqreply, &PingRequest::default(), Duration::from_millis(200), true)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_constructor_leaves_nothing_running() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let handle = launch::<Faulty>(LaunchOptions::new(Arc::new(broker.clone()), registry(), IP));

        let err = handle.wait_ready(WAIT).await.unwrap_err();
        match &err {
            ComponentError::Start { name, reason } => {
                assert_eq!(name, "Faulty");
                assert!(reason.contains("/dev/video0"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let _ = timeout(WAIT, handle.join()).await?;
        assert!(handle.is_finished());
        assert_eq!(broker.channel_count(), 0);
        Ok(())
    }
}
