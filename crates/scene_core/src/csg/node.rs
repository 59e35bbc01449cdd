//! BSP tree used by the boolean operations
//!
//! Every polygon stored under a node's front (back) child lies in front of
//! (behind) the node's plane; polygons crossing it are split on insertion.
//! Trees are built for a single operation and flattened afterwards.

use crate::csg::plane::{CsgPlane, SplitResult};
use crate::csg::polygon::Polygon;

/// BSP tree node owning its subtrees
#[derive(Debug, Clone, Default)]
pub struct Node {
    plane: Option<CsgPlane>,
    front: Option<Box<Node>>,
    back: Option<Box<Node>>,
    polygons: Vec<Polygon>,
}

impl Node {
    /// Build a tree from a polygon list; an empty list gives an empty node
    pub fn new(polygons: Vec<Polygon>) -> Self {
        let mut node = Self::default();
        node.build(polygons);
        node
    }

    /// Swap solid and empty space
    pub fn invert(&mut self) {
        for polygon in &mut self.polygons {
            polygon.flip();
        }
        if let Some(plane) = self.plane.as_mut() {
            plane.flip();
        }
        if let Some(front) = self.front.as_mut() {
            front.invert();
        }
        if let Some(back) = self.back.as_mut() {
            back.invert();
        }
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Remove the parts of `polygons` inside the solid this tree describes
    pub fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let Some(plane) = self.plane.as_ref() else {
            return polygons;
        };

        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in &polygons {
            match plane.split_polygon(polygon) {
                SplitResult::CoplanarFront(p) | SplitResult::Front(p) => front.push(p),
                SplitResult::CoplanarBack(p) | SplitResult::Back(p) => back.push(p),
                SplitResult::Spanning { front: f, back: b } => {
                    front.extend(f);
                    back.extend(b);
                }
            }
        }

        let mut kept = match self.front.as_ref() {
            Some(node) => node.clip_polygons(front),
            None => front,
        };
        if let Some(node) = self.back.as_ref() {
            kept.extend(node.clip_polygons(back));
        }
        kept
    }

    /// Remove every polygon of this tree that lies inside `bsp`
    pub fn clip_to(&mut self, bsp: &Node) {
        self.polygons = bsp.clip_polygons(std::mem::take(&mut self.polygons));
        if let Some(front) = self.front.as_mut() {
            front.clip_to(bsp);
        }
        if let Some(back) = self.back.as_mut() {
            back.clip_to(bsp);
        }
    }

    /// Flatten the tree into a polygon list
    pub fn all_polygons(&self) -> Vec<Polygon> {
        let mut polygons = self.polygons.clone();
        if let Some(front) = self.front.as_ref() {
            polygons.extend(front.all_polygons());
        }
        if let Some(back) = self.back.as_ref() {
            polygons.extend(back.all_polygons());
        }
        polygons
    }

    /// Insert polygons, splitting them on existing planes.
    ///
    /// The first polygon's plane becomes this node's plane when it has none.
    /// No depth cap: recursion depth is bounded only by the polygon count.
    pub fn build(&mut self, polygons: Vec<Polygon>) {
        let Some(first) = polygons.first() else {
            return;
        };
        let plane = *self.plane.get_or_insert(first.plane);

        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in &polygons {
            match plane.split_polygon(polygon) {
                SplitResult::CoplanarFront(p) | SplitResult::CoplanarBack(p) => self.polygons.push(p),
                SplitResult::Front(p) => front.push(p),
                SplitResult::Back(p) => back.push(p),
                SplitResult::Spanning { front: f, back: b } => {
                    front.extend(f);
                    back.extend(b);
                }
            }
        }

        if !front.is_empty() {
            self.front.get_or_insert_with(Box::default).build(front);
        }
        if !back.is_empty() {
            self.back.get_or_insert_with(Box::default).build(back);
        }
    }
}
