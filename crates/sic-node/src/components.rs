//! Demo components: two test-pattern cameras and a service stacking their
//! frames.

use async_trait::async_trait;
use sic_bus::HandlerError;
use sic_component::{Component, ComponentContext, FusedInputs, InputSpec, Sensor, Service};
use sic_message::{
    message_types, payload_fields, CodecError, Message, NdArray, NoConf,
    UncompressedImage, UncompressedImageMessage,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Frame geometry and rate of a test-pattern camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Camera {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}
payload_fields!(Camera { width, height, fps });

impl Default for Camera {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            fps: 20,
        }
    }
}

message_types! {
    pub CameraConf = Camera as Conf;
}

/// Camera producing a moving gradient. `TOP` selects the class name and
/// the gradient direction.
pub struct TestPatternCamera<const TOP: bool> {
    camera: Camera,
    frame: AtomicU64,
}

pub type TopCamera = TestPatternCamera<true>;
pub type BottomCamera = TestPatternCamera<false>;

impl<const TOP: bool> TestPatternCamera<TOP> {
    fn capture(&self) -> Result<NdArray, CodecError> {
        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        let (width, height) = (self.camera.width as usize, self.camera.height as usize);
        let mut pixels = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            let row = if TOP { y } else { height - 1 - y };
            let shade = ((row as u64 + frame) % 256) as u8;
            for _ in 0..width {
                pixels.extend_from_slice(&[shade, shade, 255 - shade]);
            }
        }
        NdArray::from_vec(vec![height, width, 3], pixels)
    }
}

#[async_trait]
impl<const TOP: bool> Component for TestPatternCamera<TOP> {
    const NAME: &'static str = if TOP { "TopCamera" } else { "BottomCamera" };
    type Conf = CameraConf;

    async fn create(ctx: &ComponentContext, conf: CameraConf) -> Result<Self, HandlerError> {
        let camera = conf.into_payload();
        if camera.fps == 0 || camera.width == 0 || camera.height == 0 {
            return Err(format!("invalid camera settings {camera:?}").into());
        }
        ctx.logger().info(format!(
            "Capturing {}x{} at {} fps",
            camera.width, camera.height, camera.fps
        ));
        Ok(Self {
            camera,
            frame: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl<const TOP: bool> Sensor for TestPatternCamera<TOP> {
    async fn execute(
        &self,
        _ctx: &ComponentContext,
    ) -> Result<Option<Box<dyn Message>>, HandlerError> {
        tokio::time::sleep(Duration::from_secs(1) / self.camera.fps).await;
        let image = self.capture()?;
        Ok(Some(
            UncompressedImageMessage::new(UncompressedImage { image }).boxed(),
        ))
    }
}

/// Stacks one top and one bottom frame taken at about the same time.
pub struct MergeImages;

#[async_trait]
impl Component for MergeImages {
    const NAME: &'static str = "MergeImages";
    type Conf = NoConf;

    async fn create(_ctx: &ComponentContext, _conf: NoConf) -> Result<Self, HandlerError> {
        Ok(MergeImages)
    }
}

#[async_trait]
impl Service for MergeImages {
    fn inputs() -> Vec<InputSpec> {
        vec![
            InputSpec::of::<UncompressedImageMessage>().from_component(TopCamera::NAME),
            InputSpec::of::<UncompressedImageMessage>().from_component(BottomCamera::NAME),
        ]
    }

    async fn execute(
        &self,
        _ctx: &ComponentContext,
        inputs: FusedInputs,
    ) -> Result<Option<Box<dyn Message>>, HandlerError> {
        let top = inputs
            .get_from::<UncompressedImageMessage>(TopCamera::NAME)
            .ok_or("missing top frame")?;
        let bottom = inputs
            .get_from::<UncompressedImageMessage>(BottomCamera::NAME)
            .ok_or("missing bottom frame")?;
        let image = vstack(&top.image, &bottom.image)?;
        Ok(Some(
            UncompressedImageMessage::new(UncompressedImage { image }).boxed(),
        ))
    }
}

/// Concatenate two arrays along the first axis.
pub fn vstack(top: &NdArray, bottom: &NdArray) -> Result<NdArray, CodecError> {
    let (Some((&rows_top, rest_top)), Some((&rows_bottom, rest_bottom))) =
        (top.shape().split_first(), bottom.shape().split_first())
    else {
        return Err(CodecError::TypeMismatch {
            expected: "arrays with at least one axis".to_string(),
            found: format!("{:?} and {:?}", top.shape(), bottom.shape()),
        });
    };
    if top.dtype() != bottom.dtype() || rest_top != rest_bottom {
        return Err(CodecError::TypeMismatch {
            expected: format!("{:?} rows of shape {:?}", top.dtype(), rest_top),
            found: format!("{:?} rows of shape {:?}", bottom.dtype(), rest_bottom),
        });
    }

    let mut shape = vec![rows_top + rows_bottom];
    shape.extend_from_slice(rest_top);
    let mut data = Vec::with_capacity(top.as_bytes().len() + bottom.as_bytes().len());
    data.extend_from_slice(top.as_bytes());
    data.extend_from_slice(bottom.as_bytes());
    NdArray::from_raw(top.dtype(), shape, data)
}
