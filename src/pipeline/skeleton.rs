use image::Rgba;

use super::{
    drawing::{DrawingContext, Pen, TRANSPARENT},
    projector::{ScreenPoint, SkeletonProjector},
};
use crate::{
    sensor::CoordinateMapper,
    types::{
        DepthImageFormat, Joint, JointTrackingState, JointType, Skeleton, SkeletonFrame,
        SkeletonPoint, SkeletonTrackingState,
    },
};

pub const BONES: &[(JointType, JointType)] = &[
    // torso
    (JointType::Head, JointType::ShoulderCenter),
    (JointType::ShoulderCenter, JointType::ShoulderLeft),
    (JointType::ShoulderCenter, JointType::ShoulderRight),
    (JointType::ShoulderCenter, JointType::Spine),
    (JointType::Spine, JointType::HipCenter),
    (JointType::HipCenter, JointType::HipLeft),
    (JointType::HipCenter, JointType::HipRight),
    // left arm
    (JointType::ShoulderLeft, JointType::ElbowLeft),
    (JointType::ElbowLeft, JointType::WristLeft),
    (JointType::WristLeft, JointType::HandLeft),
    // right arm
    (JointType::ShoulderRight, JointType::ElbowRight),
    (JointType::ElbowRight, JointType::WristRight),
    (JointType::WristRight, JointType::HandRight),
    // left leg
    (JointType::HipLeft, JointType::KneeLeft),
    (JointType::KneeLeft, JointType::AnkleLeft),
    (JointType::AnkleLeft, JointType::FootLeft),
    // right leg
    (JointType::HipRight, JointType::KneeRight),
    (JointType::KneeRight, JointType::AnkleRight),
    (JointType::AnkleRight, JointType::FootRight),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoneStyle {
    Tracked,
    Inferred,
}

/// Brushes and pens for the overlay. Built once and handed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderStyle {
    pub background: Rgba<u8>,
    pub tracked_joint: Rgba<u8>,
    pub inferred_joint: Rgba<u8>,
    pub tracked_bone: Pen,
    pub inferred_bone: Pen,
    pub body_center: Rgba<u8>,
    pub joint_radius: f32,
    pub body_center_radius: f32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        RenderStyle {
            background: TRANSPARENT,
            tracked_joint: Rgba([68, 192, 68, 255]),
            inferred_joint: Rgba([255, 255, 0, 255]),
            tracked_bone: Pen {
                color: Rgba([255, 0, 0, 255]),
                thickness: 6.0,
            },
            inferred_bone: Pen {
                color: Rgba([0, 0, 128, 255]),
                thickness: 10.0,
            },
            body_center: Rgba([0, 0, 255, 255]),
            joint_radius: 3.0,
            body_center_radius: 10.0,
        }
    }
}

impl RenderStyle {
    pub fn bone_pen(&self, style: BoneStyle) -> Pen {
        match style {
            BoneStyle::Tracked => self.tracked_bone,
            BoneStyle::Inferred => self.inferred_bone,
        }
    }

    pub fn joint_brush(&self, state: JointTrackingState) -> Option<Rgba<u8>> {
        match state {
            JointTrackingState::Tracked => Some(self.tracked_joint),
            JointTrackingState::Inferred => Some(self.inferred_joint),
            JointTrackingState::NotTracked => None,
        }
    }
}

/// `None` means the bone is not drawn.
pub fn bone_style(from: JointTrackingState, to: JointTrackingState) -> Option<BoneStyle> {
    use JointTrackingState::*;

    match (from, to) {
        (NotTracked, _) | (_, NotTracked) => None,
        (Inferred, Inferred) => None,
        (Tracked, Tracked) => Some(BoneStyle::Tracked),
        _ => Some(BoneStyle::Inferred),
    }
}

pub struct SkeletonRenderer<'a, M: ?Sized> {
    mapper: &'a M,
    projector: SkeletonProjector,
    depth_format: DepthImageFormat,
    style: &'a RenderStyle,
}

impl<'a, M> SkeletonRenderer<'a, M>
where
    M: CoordinateMapper + ?Sized,
{
    pub fn new(
        mapper: &'a M,
        projector: SkeletonProjector,
        depth_format: DepthImageFormat,
        style: &'a RenderStyle,
    ) -> Self {
        SkeletonRenderer {
            mapper,
            projector,
            depth_format,
            style,
        }
    }

    /// Clears the surface, then draws every skeleton in the order the sensor
    /// reported them.
    pub fn draw_frame(&self, ctx: &mut DrawingContext<'_>, frame: &SkeletonFrame) {
        let (width, height) = self.projector.bounds();
        ctx.draw_rectangle(
            self.style.background,
            ScreenPoint { x: 0.0, y: 0.0 },
            width,
            height,
        );

        for skeleton in &frame.skeletons {
            self.draw_skeleton(ctx, skeleton);
        }
    }

    pub fn draw_skeleton(&self, ctx: &mut DrawingContext<'_>, skeleton: &Skeleton) {
        match skeleton.tracking_state {
            SkeletonTrackingState::Tracked => self.draw_bones_and_joints(ctx, skeleton),
            SkeletonTrackingState::PositionOnly => ctx.draw_ellipse(
                self.style.body_center,
                self.to_screen(skeleton.position),
                self.style.body_center_radius,
            ),
            SkeletonTrackingState::NotTracked => {}
        }
    }

    fn draw_bones_and_joints(&self, ctx: &mut DrawingContext<'_>, skeleton: &Skeleton) {
        for &(from, to) in BONES {
            self.draw_bone(ctx, &skeleton.joints[from], &skeleton.joints[to]);
        }

        for joint in skeleton.joints.iter() {
            if let Some(brush) = self.style.joint_brush(joint.tracking_state) {
                ctx.draw_ellipse(brush, self.to_screen(joint.position), self.style.joint_radius);
            }
        }
    }

    fn draw_bone(&self, ctx: &mut DrawingContext<'_>, from: &Joint, to: &Joint) {
        let Some(style) = bone_style(from.tracking_state, to.tracking_state) else {
            return;
        };
        ctx.draw_line(
            self.style.bone_pen(style),
            self.to_screen(from.position),
            self.to_screen(to.position),
        );
    }

    fn to_screen(&self, position: SkeletonPoint) -> ScreenPoint {
        self.projector.project(self.mapper, position, self.depth_format)
    }
}
