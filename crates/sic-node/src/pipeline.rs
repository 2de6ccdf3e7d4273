//! # Camera Pipeline
//!
//! Starts a manager serving the demo classes, then drives it the way a
//! client application would: connectors start each camera and the merge
//! service, and the service is connected to both camera outputs.

use crate::components::{BottomCamera, Camera, CameraConf, MergeImages, TopCamera};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use sic_bus::{handler_fn, Broker, HandlerError};
use sic_manager::{ComponentManager, Connector, ConnectorConfig, ManagerConfig};
use sic_message::{Message, MessageRegistry, UncompressedImageMessage};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Node settings.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub manager: ManagerConfig,
    pub camera: Camera,
    /// Stop after this long; `None` runs until Ctrl-C.
    pub run_for: Option<Duration>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            camera: Camera::default(),
            run_for: None,
        }
    }
}

impl NodeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIC_CAMERA_WIDTH` / `SIC_CAMERA_HEIGHT` / `SIC_CAMERA_FPS`: frame settings
    /// - `SIC_RUN_SECONDS`: stop after this many seconds (default: run until Ctrl-C)
    ///
    /// Manager settings come from `ManagerConfig::from_env`.
    pub fn from_env() -> Self {
        let defaults = Camera::default();
        let read = |key: &str, default: u32| {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };
        Self {
            manager: ManagerConfig::from_env(),
            camera: Camera {
                width: read("SIC_CAMERA_WIDTH", defaults.width),
                height: read("SIC_CAMERA_HEIGHT", defaults.height),
                fps: read("SIC_CAMERA_FPS", defaults.fps),
            },
            run_for: env::var("SIC_RUN_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
        }
    }
}

/// Registry with the core types plus the demo configuration.
pub fn registry() -> Arc<MessageRegistry> {
    let mut registry = MessageRegistry::with_core_types();
    registry.register::<CameraConf>();
    Arc::new(registry)
}

#[derive(Default)]
struct MergedStats {
    frames: AtomicU64,
    last_shape: Mutex<Vec<usize>>,
}

/// A running manager and the connectors driving it.
pub struct Pipeline {
    manager: ComponentManager,
    top: Connector<TopCamera>,
    bottom: Connector<BottomCamera>,
    merge: Connector<MergeImages>,
    stats: Arc<MergedStats>,
}

impl Pipeline {
    pub async fn start(broker: Arc<dyn Broker>, config: NodeConfig) -> Result<Self> {
        let registry = registry();
        let ip = config.manager.ip.clone();

        let manager = ComponentManager::builder(broker.clone(), registry.clone(), config.manager)
            .register_sensor::<TopCamera>()
            .register_sensor::<BottomCamera>()
            .register_service::<MergeImages>()
            .start()
            .await
            .context("starting component manager")?;

        match Self::connect(broker.as_ref(), registry, &ip, config.camera).await {
            Ok((top, bottom, merge, stats)) => {
                info!("[Node] ✓ Pipeline running on {}", ip);
                Ok(Self {
                    manager,
                    top,
                    bottom,
                    merge,
                    stats,
                })
            }
            Err(err) => {
                manager.stop().await;
                Err(err)
            }
        }
    }

    async fn connect(
        broker: &dyn Broker,
        registry: Arc<MessageRegistry>,
        ip: &str,
        camera: Camera,
    ) -> Result<(
        Connector<TopCamera>,
        Connector<BottomCamera>,
        Connector<MergeImages>,
        Arc<MergedStats>,
    )> {
        let camera = ConnectorConfig::default().with_conf(CameraConf::new(camera).boxed());
        let top = Connector::<TopCamera>::connect(broker, registry.clone(), ip, camera.clone())
            .await
            .context("connecting top camera")?;
        let bottom = Connector::<BottomCamera>::connect(broker, registry.clone(), ip, camera)
            .await
            .context("connecting bottom camera")?;
        let merge = Connector::<MergeImages>::connect(broker, registry, ip, ConnectorConfig::default())
            .await
            .context("connecting merge service")?;

        merge.connect_to(&top).await?;
        merge.connect_to(&bottom).await?;

        let stats = Arc::new(MergedStats::default());
        let sink = stats.clone();
        merge
            .register_callback(handler_fn(move |message: Box<dyn Message>| {
                let sink = sink.clone();
                async move {
                    if let Some(frame) = message.downcast_ref::<UncompressedImageMessage>() {
                        let count = sink.frames.fetch_add(1, Ordering::Relaxed) + 1;
                        *sink.last_shape.lock() = frame.image.shape().to_vec();
                        if count % 20 == 1 {
                            info!("[Node] Merged frame {} shape {:?}", count, frame.image.shape());
                        }
                    }
                    Ok::<(), HandlerError>(())
                }
            }))
            .await?;
        Ok((top, bottom, merge, stats))
    }

    /// Merged frames received so far.
    #[must_use]
    pub fn merged_frames(&self) -> u64 {
        self.stats.frames.load(Ordering::Relaxed)
    }

    /// Shape of the most recent merged frame.
    #[must_use]
    pub fn last_shape(&self) -> Vec<usize> {
        self.stats.last_shape.lock().clone()
    }

    #[must_use]
    pub fn manager(&self) -> &ComponentManager {
        &self.manager
    }

    /// Close every connector, then stop the manager and its instances.
    pub async fn stop(self) {
        self.merge.close().await;
        self.top.close().await;
        self.bottom.close().await;
        self.manager.stop().await;
        info!("[Node] Pipeline stopped after {} merged frames", self.merged_frames());
    }
}
