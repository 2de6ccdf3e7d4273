//! # Fusion Flows
//!
//! Two timestamped streams fused by a running service, plus buffer
//! overflow accounting.

#[cfg(test)]
mod tests {
    use super::super::{client, collect, registry};
    use async_trait::async_trait;
    use sic_bus::{HandlerError, InMemoryBroker};
    use sic_component::fusion::{is_drop_warning, PushOutcome};
    use sic_component::{
        launch_service, Component, ComponentContext, FusedInputs, FusionBuffers, FusionConfig,
        InputSpec, LaunchOptions, Service,
    };
    use sic_message::{ConnectRequest, Message, NoConf, TextMessage};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const IP: &str = "10.1.0.2";
    const WAIT: Duration = Duration::from_secs(2);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Reports the source timestamps of each fused pair as "a,b".
    struct Pairing;

    #[async_trait]
    impl Component for Pairing {
        const NAME: &'static str = "Pairing";
        type Conf = NoConf;

        async fn create(_ctx: &ComponentContext, _conf: NoConf) -> Result<Self, HandlerError> {
            Ok(Pairing)
        }
    }

    #[async_trait]
    impl Service for Pairing {
        fn inputs() -> Vec<InputSpec> {
            vec![
                InputSpec::of::<TextMessage>().from_component("A"),
                InputSpec::of::<TextMessage>().from_component("B"),
            ]
        }

        async fn execute(
            &self,
            _ctx: &ComponentContext,
            inputs: FusedInputs,
        ) -> Result<Option<Box<dyn Message>>, HandlerError> {
            let a = inputs.get_from::<TextMessage>("A").ok_or("missing A")?;
            let b = inputs.get_from::<TextMessage>("B").ok_or("missing B")?;
            Ok(Some(TextMessage::new(format!("{},{}", a.text, b.text).into()).boxed()))
        }
    }

    fn sample(origin: &str, ts: f64) -> TextMessage {
        TextMessage::new(format!("{ts}").into())
            .with_timestamp(ts)
            .with_origin(origin)
    }

    // =============================================================================
    // ALIGNMENT THROUGH A RUNNING SERVICE
    // =============================================================================

    #[tokio::test]
    async fn test_two_streams_fuse_into_three_pairs() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let handle = launch_service::<Pairing>(LaunchOptions::new(
            Arc::new(broker.clone()),
            registry(),
            IP,
        ));
        handle.wait_ready(WAIT).await?;

        let bus = client(&broker, "streams").await?;
        let mut fused = collect(&bus, handle.output_channel()).await?;
        bus.request(
            &handle.reqreply_channel(),
            &ConnectRequest::to_channel("streams"),
            WAIT,
            true,
        )
        .await?;

        for ts in [1.0, 2.0, 3.0] {
            bus.publish("streams", &sample("A", ts)).await?;
        }
        // Stream B has not arrived, so nothing may fuse yet.
        assert!(timeout(Duration::from_millis(300), fused.recv()).await.is_err());

        for ts in [1.05, 1.95, 3.2] {
            bus.publish("streams", &sample("B", ts)).await?;
        }

        let mut pairs = Vec::new();
        for _ in 0..3 {
            let message = timeout(WAIT, fused.recv()).await?.expect("fused output");
            let message = message.downcast::<TextMessage>()?;
            assert_eq!(message.header.origin.as_deref(), Some("Pairing"));
            pairs.push(message.text.clone());
        }
        pairs.sort();
        assert_eq!(pairs, vec!["1,1.05", "2,1.95", "3,3.2"]);

        // Every pair was consumed exactly once.
        assert!(timeout(Duration::from_millis(300), fused.recv()).await.is_err());

        handle.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_undeclared_origin_never_fuses() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let handle = launch_service::<Pairing>(LaunchOptions::new(
            Arc::new(broker.clone()),
            registry(),
            IP,
        ));
        handle.wait_ready(WAIT).await?;

        let bus = client(&broker, "streams").await?;
        let mut fused = collect(&bus, handle.output_channel()).await?;
        bus.request(
            &handle.reqreply_channel(),
            &ConnectRequest::to_channel("streams"),
            WAIT,
            true,
        )
        .await?;

        bus.publish("streams", &sample("A", 1.0)).await?;
        bus.publish("streams", &sample("C", 1.0)).await?;
        assert!(timeout(Duration::from_millis(300), fused.recv()).await.is_err());

        handle.shutdown().await?;
        Ok(())
    }

    // =============================================================================
    // OVERFLOW
    // =============================================================================

    #[test]
    fn test_overflow_keeps_newest_and_counts_once() -> anyhow::Result<()> {
        let config = FusionConfig {
            capacity: 4,
            ..FusionConfig::default()
        };
        let buffers = FusionBuffers::new(Pairing::inputs(), config)?;

        for ts in 0..4 {
            let outcome = buffers.push(sample("A", f64::from(ts)).boxed());
            assert_eq!(outcome, PushOutcome::Buffered);
        }
        let outcome = buffers.push(sample("A", 4.0).boxed());
        assert_eq!(
            outcome,
            PushOutcome::Evicted {
                dropped: 1,
                warn: false
            }
        );
        assert_eq!(buffers.buffered(), 4);

        // The oldest sample is gone: B at 0.0 cannot pair with anything.
        buffers.push(sample("B", 0.0).boxed());
        assert!(buffers.pop_aligned().is_none());

        let stats = buffers.stats();
        assert_eq!(stats["buffers"][0]["dropped"], 1);
        assert_eq!(stats["buffers"][0]["buffered"], 4);
        Ok(())
    }

    #[test]
    fn test_drop_warnings_fire_at_thresholds_only() -> anyhow::Result<()> {
        let config = FusionConfig {
            capacity: 1,
            ..FusionConfig::default()
        };
        let buffers = FusionBuffers::new(Pairing::inputs(), config)?;
        buffers.push(sample("A", 0.0).boxed());

        let mut warned_at = Vec::new();
        for ts in 1..=60 {
            if let PushOutcome::Evicted { dropped, warn: true } =
                buffers.push(sample("A", f64::from(ts)).boxed())
            {
                warned_at.push(dropped);
            }
        }
        assert_eq!(warned_at, vec![5, 10, 50]);
        assert!(is_drop_warning(100));
        assert!(!is_drop_warning(99));
        Ok(())
    }
}
