//! # Manager Choreography
//!
//! A component manager serving several classes, driven entirely by
//! connectors: start on demand, configure, chain outputs, stop.

#[cfg(test)]
mod tests {
    use super::super::registry;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sic_bus::{handler_fn, HandlerError, InMemoryBroker};
    use sic_component::{Component, ComponentContext, Sensor};
    use sic_manager::{ComponentManager, Connector, ConnectorConfig, ConnectorError, ManagerConfig};
    use sic_message::{
        message_types, payload_fields, Message, MessageRegistry, NoConf, TextMessage, TextRequest,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const IP: &str = "10.1.0.3";
    const WAIT: Duration = Duration::from_secs(2);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Greeting {
        greeting: String,
    }
    payload_fields!(Greeting { greeting });

    impl Default for Greeting {
        fn default() -> Self {
            Self {
                greeting: "Hello".to_string(),
            }
        }
    }

    message_types! {
        GreeterConf = Greeting as Conf;
    }

    struct Greeter {
        greeting: String,
    }

    #[async_trait]
    impl Component for Greeter {
        const NAME: &'static str = "Greeter";
        type Conf = GreeterConf;

        async fn create(_ctx: &ComponentContext, conf: GreeterConf) -> Result<Self, HandlerError> {
            Ok(Greeter {
                greeting: conf.into_payload().greeting,
            })
        }

        async fn on_request(
            &self,
            _ctx: &ComponentContext,
            request: Box<dyn Message>,
        ) -> Result<Box<dyn Message>, HandlerError> {
            let request = request.downcast::<TextRequest>()?;
            Ok(TextMessage::new(format!("{}, {}", self.greeting, request.text).into()).boxed())
        }
    }

    struct Metronome;

    #[async_trait]
    impl Component for Metronome {
        const NAME: &'static str = "Metronome";
        type Conf = NoConf;

        async fn create(_ctx: &ComponentContext, _conf: NoConf) -> Result<Self, HandlerError> {
            Ok(Metronome)
        }
    }

    #[async_trait]
    impl Sensor for Metronome {
        async fn execute(
            &self,
            _ctx: &ComponentContext,
        ) -> Result<Option<Box<dyn Message>>, HandlerError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Some(TextMessage::new("tick".into()).boxed()))
        }
    }

    struct Shout;

    #[async_trait]
    impl Component for Shout {
        const NAME: &'static str = "Shout";
        type Conf = NoConf;

        async fn create(_ctx: &ComponentContext, _conf: NoConf) -> Result<Self, HandlerError> {
            Ok(Shout)
        }

        async fn on_message(
            &self,
            ctx: &ComponentContext,
            message: Box<dyn Message>,
        ) -> Result<(), HandlerError> {
            let text = message.downcast::<TextMessage>()?;
            let timestamp = text.header.timestamp;
            let mut loud = TextMessage::new(text.text.to_uppercase().into());
            loud.header.timestamp = timestamp;
            ctx.output(loud).await?;
            Ok(())
        }
    }

    fn full_registry() -> Arc<MessageRegistry> {
        let mut registry = MessageRegistry::with_core_types();
        registry.register::<GreeterConf>();
        Arc::new(registry)
    }

    async fn manager(broker: &InMemoryBroker) -> anyhow::Result<ComponentManager> {
        Ok(ComponentManager::builder(
            Arc::new(broker.clone()),
            full_registry(),
            ManagerConfig::default().with_ip(IP),
        )
        .register::<Greeter>()
        .register::<Shout>()
        .register_sensor::<Metronome>()
        .start()
        .await?)
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_sensor_output_flows_through_chained_component() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let manager = manager(&broker).await?;

        let metronome =
            Connector::<Metronome>::connect(&broker, full_registry(), IP, ConnectorConfig::default())
                .await?;
        let shout =
            Connector::<Shout>::connect(&broker, full_registry(), IP, ConnectorConfig::default())
                .await?;
        shout.connect_to(&metronome).await?;

        let (tx, mut loud) = mpsc::unbounded_channel();
        shout
            .register_callback(handler_fn(move |message: Box<dyn Message>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(message);
                    Ok::<(), HandlerError>(())
                }
            }))
            .await?;

        let first = timeout(WAIT, loud.recv()).await?.expect("chained output");
        let first = first.downcast::<TextMessage>()?;
        assert_eq!(first.text, "TICK");
        assert_eq!(first.header.origin.as_deref(), Some("Shout"));
        assert!(first.header.timestamp.is_some());
        assert_eq!(manager.running(), 2);

        metronome.stop().await?;
        timeout(WAIT, async {
            while manager.running() > 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await?;

        shout.close().await;
        manager.stop().await;
        assert_eq!(broker.subscriber_count(shout.reqreply_channel()), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_connector_configures_started_component() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let manager = manager(&broker).await?;

        let conf = GreeterConf::new(Greeting {
            greeting: "Hoi".to_string(),
        });
        let greeter = Connector::<Greeter>::connect(
            &broker,
            full_registry(),
            IP,
            ConnectorConfig::default().with_conf(conf.boxed()),
        )
        .await?;

        let reply = greeter
            .request_as::<TextMessage>(&TextRequest::new("Pepper".into()))
            .await?;
        assert_eq!(reply.text, "Hoi, Pepper");

        greeter.close().await;
        manager.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_default_configuration_applies_without_conf() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let manager = manager(&broker).await?;

        let greeter =
            Connector::<Greeter>::connect(&broker, full_registry(), IP, ConnectorConfig::default())
                .await?;
        let reply = greeter
            .request_as::<TextMessage>(&TextRequest::new("Nao".into()))
            .await?;
        assert_eq!(reply.text, "Hello, Nao");

        greeter.close().await;
        manager.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_two_managers_share_nothing_across_hosts() -> anyhow::Result<()> {
        let broker = InMemoryBroker::new();
        let here = manager(&broker).await?;
        let there = ComponentManager::builder(
            Arc::new(broker.clone()),
            registry(),
            ManagerConfig::default().with_ip("10.1.0.4"),
        )
        .register::<Shout>()
        .start()
        .await?;

        let remote =
            Connector::<Shout>::connect(&broker, registry(), "10.1.0.4", ConnectorConfig::default())
                .await?;
        assert_eq!(there.running(), 1);
        assert_eq!(here.running(), 0);
        assert_eq!(remote.output_channel(), "Shout:10.1.0.4");

        // Greeter is only registered on this host.
        let quick = ConnectorConfig {
            ping_timeout: Duration::from_millis(100),
            start_timeout: Some(Duration::from_millis(300)),
            ..ConnectorConfig::default()
        };
        let err = Connector::<Greeter>::connect(&broker, full_registry(), "10.1.0.4", quick)
            .await
            .err()
            .expect("no Greeter on the remote host");
        assert!(matches!(err, ConnectorError::Unreachable { .. }));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        remote
            .register_callback(handler_fn(move |message: Box<dyn Message>| {
                let sink = sink.clone();
                async move {
                    if let Some(text) = message.downcast_ref::<TextMessage>() {
                        sink.lock().push(text.text.clone());
                    }
                    Ok::<(), HandlerError>(())
                }
            }))
            .await?;
        remote.send_message(TextMessage::new("far".into())).await?;
        timeout(WAIT, async {
            while seen.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await?;
        assert_eq!(seen.lock().as_slice(), ["FAR".to_string()]);

        remote.close().await;
        there.stop().await;
        here.stop().await;
        Ok(())
    }
}
