//! Batch metadata types.
//!
//! A [`Batch`] is the per-cycle bundle that crosses a pad: one frame per
//! source stream, each carrying the objects detected in it. Probe handlers
//! inspect and mutate batches in flight.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Axis-aligned bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Area of the box.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// A detected object within a frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Detector class id.
    pub class_id: u32,
    /// Tracker id, if the object is tracked.
    pub object_id: Option<u64>,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
    /// Location in the frame.
    pub bbox: BoundingBox,
    /// Optional label.
    pub label: Option<String>,
}

/// Metadata for one frame of one source stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMeta {
    /// Source stream id within the batch.
    pub source_id: u32,
    /// Frame number within the source stream.
    pub frame_num: u64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Objects detected in this frame.
    pub objects: Vec<ObjectMeta>,
}

impl FrameMeta {
    /// Create frame metadata for a source and frame number.
    pub fn new(source_id: u32, frame_num: u64) -> Self {
        Self {
            source_id,
            frame_num,
            ..Default::default()
        }
    }

    /// Add an object, builder style.
    pub fn with_object(mut self, object: ObjectMeta) -> Self {
        self.objects.push(object);
        self
    }
}

/// A batch of frames flowing through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Monotonic batch sequence number.
    pub sequence: u64,
    /// Presentation timestamp.
    pub pts: Option<Duration>,
    /// Frames in the batch, one per source that contributed.
    pub frames: Vec<FrameMeta>,
}

impl Batch {
    /// Create an empty batch with a sequence number.
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            ..Default::default()
        }
    }

    /// Set the presentation timestamp.
    pub fn with_pts(mut self, pts: Duration) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Add a frame, builder style.
    pub fn with_frame(mut self, frame: FrameMeta) -> Self {
        self.frames.push(frame);
        self
    }

    /// Number of frames in the batch.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the batch has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total objects over all frames.
    pub fn object_count(&self) -> usize {
        self.frames.iter().map(|f| f.objects.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_builder() {
        let batch = Batch::new(7)
            .with_pts(Duration::from_millis(40))
            .with_frame(FrameMeta::new(0, 1).with_object(ObjectMeta {
                class_id: 2,
                confidence: 0.9,
                bbox: BoundingBox::new(10.0, 10.0, 20.0, 40.0),
                ..Default::default()
            }))
            .with_frame(FrameMeta::new(1, 1));

        assert_eq!(batch.sequence, 7);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.object_count(), 1);
        assert_eq!(batch.frames[0].objects[0].bbox.area(), 800.0);
    }
}
