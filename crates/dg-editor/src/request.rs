//! Requests: what a tool wants done, addressed to controllers.
//!
//! One `Request` value is reused across the phases of a gesture; trackers
//! retag it (`kind`) as the gesture moves between move, orphan, add and
//! clone.

use std::fmt;
use std::str::FromStr;

use dg_core::Direction;
use kurbo::{Point, Rect, Size, Vec2};

use crate::controller::ControllerId;
use crate::input::Modifiers;

/// The request vocabulary. `as_str` gives the wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Add,
    Move,
    Create,
    Clone,
    Orphan,
    OrphanChildren,
    DeleteDependant,
    MoveChildren,
    Resize,
    ResizeChildren,
    Align,
    AlignChildren,
    Selection,
    SelectionHover,
    Open,
    DirectEdit,
}

impl RequestKind {
    pub const ALL: [RequestKind; 16] = [
        RequestKind::Add,
        RequestKind::Move,
        RequestKind::Create,
        RequestKind::Clone,
        RequestKind::Orphan,
        RequestKind::OrphanChildren,
        RequestKind::DeleteDependant,
        RequestKind::MoveChildren,
        RequestKind::Resize,
        RequestKind::ResizeChildren,
        RequestKind::Align,
        RequestKind::AlignChildren,
        RequestKind::Selection,
        RequestKind::SelectionHover,
        RequestKind::Open,
        RequestKind::DirectEdit,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            RequestKind::Add => "REQ_ADD",
            RequestKind::Move => "REQ_MOVE",
            RequestKind::Create => "REQ_CREATE",
            RequestKind::Clone => "REQ_CLONE",
            RequestKind::Orphan => "REQ_ORPHAN",
            RequestKind::OrphanChildren => "REQ_ORPHAN_CHILDREN",
            RequestKind::DeleteDependant => "REQ_DELETE_DEPENDANT",
            RequestKind::MoveChildren => "REQ_MOVE_CHILDREN",
            RequestKind::Resize => "REQ_RESIZE",
            RequestKind::ResizeChildren => "REQ_RESIZE_CHILDREN",
            RequestKind::Align => "REQ_ALIGN",
            RequestKind::AlignChildren => "REQ_ALIGN_CHILDREN",
            RequestKind::Selection => "REQ_SELECTION",
            RequestKind::SelectionHover => "REQ_SELECTION_HOVER",
            RequestKind::Open => "REQ_OPEN",
            RequestKind::DirectEdit => "REQ_DIRECT_EDIT",
        }
    }

    /// Kinds that carry move/size deltas.
    pub fn changes_bounds(self) -> bool {
        matches!(
            self,
            RequestKind::Add
                | RequestKind::Move
                | RequestKind::Clone
                | RequestKind::MoveChildren
                | RequestKind::Resize
                | RequestKind::ResizeChildren
                | RequestKind::Align
                | RequestKind::AlignChildren
        )
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown request type {s:?}"))
    }
}

/// An intended edit, mutable until dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub kind: RequestKind,
    /// Pointer location in absolute coordinates, if the request has one.
    pub location: Option<Point>,
    pub move_delta: Vec2,
    pub size_delta: Size,
    /// Resize edges.
    pub direction: Direction,
    /// Controllers the request operates on.
    pub controllers: Vec<ControllerId>,
    pub modifiers: Modifiers,
    pub centered: bool,
    pub constrained: bool,
    pub snap_enabled: bool,
    /// Button that started the gesture (selection requests).
    pub last_button: u8,
}

impl Request {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            location: None,
            move_delta: Vec2::ZERO,
            size_delta: Size::ZERO,
            direction: Direction::NONE,
            controllers: Vec::new(),
            modifiers: Modifiers::NONE,
            centered: false,
            constrained: false,
            snap_enabled: true,
            last_button: 0,
        }
    }

    #[must_use]
    pub fn at(mut self, location: Point) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_controllers(mut self, controllers: Vec<ControllerId>) -> Self {
        self.controllers = controllers;
        self
    }

    /// A copy retagged as `kind`, keeping the payload.
    #[must_use]
    pub fn retagged(&self, kind: RequestKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// `r` moved by `move_delta` and grown by `size_delta`.
    pub fn transformed_rect(&self, r: Rect) -> Rect {
        dg_core::rect_transform(r, self.move_delta, self.size_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in RequestKind::ALL {
            assert_eq!(kind.as_str().parse::<RequestKind>(), Ok(kind));
        }
        assert!("REQ_BOGUS".parse::<RequestKind>().is_err());
    }

    #[test]
    fn transformed_rect_applies_both_deltas() {
        let mut req = Request::new(RequestKind::Resize);
        req.move_delta = Vec2::new(-20.0, -10.0);
        req.size_delta = Size::new(40.0, 20.0);
        assert_eq!(
            req.transformed_rect(Rect::new(0.0, 0.0, 100.0, 50.0)),
            Rect::new(-20.0, -10.0, 120.0, 60.0)
        );
    }

    #[test]
    fn retagging_keeps_payload() {
        let mut req = Request::new(RequestKind::Move).at(Point::new(3.0, 4.0));
        req.move_delta = Vec2::new(1.0, 2.0);
        let add = req.retagged(RequestKind::Add);
        assert_eq!(add.kind, RequestKind::Add);
        assert_eq!(add.move_delta, req.move_delta);
        assert_eq!(add.location, req.location);
    }
}
